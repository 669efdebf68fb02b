//! Hot-reloadable configuration: an `ArcSwap` holding the live `RouterConfig`
//! plus a bounded history of prior snapshots for operator visibility.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{ConfigError, RouterConfig};

/// Number of prior configs retained for inspection after a reload.
const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub config: RouterConfig,
    pub loaded_at: DateTime<Utc>,
}

/// Ring buffer of the last `HISTORY_CAPACITY` configs a `ConfigManager` has
/// held, oldest first.
#[derive(Default)]
pub struct ConfigHistory {
    snapshots: Mutex<VecDeque<ConfigSnapshot>>,
}

impl ConfigHistory {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    fn push(&self, snapshot: ConfigSnapshot) {
        let mut snapshots = self.snapshots.lock().expect("config history lock poisoned");
        if snapshots.len() == HISTORY_CAPACITY {
            snapshots.pop_front();
        }
        snapshots.push_back(snapshot);
    }

    pub fn snapshots(&self) -> Vec<ConfigSnapshot> {
        self.snapshots
            .lock()
            .expect("config history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

/// Holds the live config behind an `ArcSwap` so readers never block a
/// reloader and never observe a torn update, with the source path retained
/// for `reload()`.
pub struct ConfigManager {
    current: ArcSwap<RouterConfig>,
    history: ConfigHistory,
    path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn load(path: Option<PathBuf>, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let config = RouterConfig::load(path.as_deref())?.with_env_overrides();
        config.validate()?;

        let history = ConfigHistory::new();
        history.push(ConfigSnapshot {
            config: config.clone(),
            loaded_at: now,
        });

        info!(path = ?path, "configuration_loaded");

        Ok(Self {
            current: ArcSwap::from_pointee(config),
            history,
            path,
        })
    }

    pub fn current(&self) -> Arc<RouterConfig> {
        self.current.load_full()
    }

    pub fn history(&self) -> &ConfigHistory {
        &self.history
    }

    /// Re-read the config file this manager was constructed with and swap it
    /// in atomically, validating first so a bad file never takes effect. On
    /// rejection the previously-loaded config stays live — logged as a
    /// rollback rather than silently swallowed.
    pub fn reload(&self, now: DateTime<Utc>) -> Result<Arc<RouterConfig>, ConfigError> {
        let loaded = RouterConfig::load(self.path.as_deref()).and_then(|c| {
            let c = c.with_env_overrides();
            c.validate()?;
            Ok(c)
        });

        let config = match loaded {
            Ok(config) => config,
            Err(err) => {
                warn!(path = ?self.path, error = %err, "configuration_rollback");
                return Err(err);
            }
        };

        self.history.push(ConfigSnapshot {
            config: config.clone(),
            loaded_at: now,
        });
        self.current.store(Arc::new(config));
        info!(path = ?self.path, "configuration_loaded");
        Ok(self.current())
    }
}
