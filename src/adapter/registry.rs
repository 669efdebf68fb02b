//! Adapter Registry: maps provider ids to their `ProviderAdapter`
//! implementation, lock-free `DashMap`-backed.

use std::sync::Arc;

use dashmap::DashMap;

use super::ProviderAdapter;

#[derive(Debug, thiserror::Error)]
pub enum AdapterRegistryError {
    #[error("no adapter registered for provider {0}")]
    NotFound(String),
    #[error("adapter already registered for provider {0}")]
    Duplicate(String),
}

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        provider_id: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), AdapterRegistryError> {
        let provider_id = provider_id.into();
        if self.adapters.contains_key(&provider_id) {
            return Err(AdapterRegistryError::Duplicate(provider_id));
        }
        self.adapters.insert(provider_id, adapter);
        Ok(())
    }

    pub fn get(&self, provider_id: &str) -> Result<Arc<dyn ProviderAdapter>, AdapterRegistryError> {
        self.adapters
            .get(provider_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AdapterRegistryError::NotFound(provider_id.to_string()))
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.adapters.iter().map(|e| e.key().clone()).collect()
    }
}
