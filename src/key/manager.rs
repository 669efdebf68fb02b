//! Key Manager (spec §4.1): owns the key record and its state machine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::KeyManagerError;
use super::model::{is_valid_transition, Key, KeyState, Metadata, MetadataValue};
use super::validation::{validate_key_material, validate_metadata, validate_provider_id};
use crate::clock::Context;
use crate::crypto::EncryptionService;
use crate::quota::{ExhaustionNotifier, QuotaError};
use crate::store::model::{EntityType, StateTransition};
use crate::store::{StateStore, StateStoreError};

/// Default cooldown applied when a key enters Throttled without an explicit
/// duration (spec §4.1: "typically 60 s").
pub const DEFAULT_COOLDOWN_SECS: i64 = 60;

pub struct KeyManager {
    store: Arc<dyn StateStore>,
    encryption: Arc<EncryptionService>,
    ctx: Context,
}

impl KeyManager {
    pub fn new(store: Arc<dyn StateStore>, encryption: Arc<EncryptionService>, ctx: Context) -> Self {
        Self {
            store,
            encryption,
            ctx,
        }
    }

    pub async fn register_key(
        &self,
        material: &str,
        provider_id: &str,
        metadata: Metadata,
    ) -> Result<Key, KeyManagerError> {
        validate_key_material(material)?;
        validate_provider_id(provider_id)?;
        validate_metadata(&metadata)?;

        let encrypted = self.encryption.encrypt(material)?;
        let now = self.ctx.now();
        let key = Key {
            id: Uuid::new_v4().to_string(),
            material: encrypted,
            provider_id: provider_id.to_string(),
            state: KeyState::Available,
            last_state_change: now,
            created_at: now,
            last_used_at: None,
            usage_count: 0,
            failure_count: 0,
            cooldown_until: None,
            metadata,
        };

        self.store.save_key(&key).await?;
        info!(key_id = %key.id, provider_id, "key_registered");
        Ok(key)
    }

    pub async fn get_key(&self, id: &str) -> Result<Key, KeyManagerError> {
        self.store
            .get_key(id)
            .await?
            .ok_or_else(|| KeyManagerError::NotFound(id.to_string()))
    }

    /// Decrypt a key's material. Emits `key_access`; failures never reveal
    /// the plaintext, only that decryption failed.
    pub async fn get_material(&self, id: &str) -> Result<String, KeyManagerError> {
        let key = self.get_key(id).await?;
        let plaintext = self
            .encryption
            .decrypt(&key.material)
            .map_err(|e| KeyManagerError::Registration(e.to_string()))?;
        info!(key_id = %id, "key_access");
        Ok(plaintext)
    }

    pub async fn list_keys(&self, provider_id: Option<&str>) -> Result<Vec<Key>, KeyManagerError> {
        Ok(self.store.list_keys(provider_id).await?)
    }

    /// Transition `id` to `to_state`. A no-op (`from == to`) persists nothing
    /// and returns a synthetic transition record.
    pub async fn update_state(
        &self,
        id: &str,
        to_state: KeyState,
        trigger: &str,
        cooldown: Option<chrono::Duration>,
        context: std::collections::HashMap<String, MetadataValue>,
    ) -> Result<StateTransition, KeyManagerError> {
        let mut key = self.get_key(id).await?;
        let from_state = key.state;

        if from_state == to_state {
            return Ok(StateTransition::new(
                self.ctx.next_id(),
                EntityType::Key,
                id.to_string(),
                from_state.to_string(),
                to_state.to_string(),
                self.ctx.now(),
                format!("{trigger}_noop"),
                context,
            ));
        }

        if !is_valid_transition(from_state, to_state) {
            return Err(KeyManagerError::InvalidStateTransition {
                from: from_state,
                to: to_state,
            });
        }

        let now = self.ctx.now();
        key.state = to_state;
        key.last_state_change = now;
        key.cooldown_until = if to_state == KeyState::Throttled {
            let duration = cooldown.unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_COOLDOWN_SECS));
            Some(now + duration)
        } else {
            None
        };

        self.store.save_key(&key).await?;
        let transition = StateTransition::new(
            self.ctx.next_id(),
            EntityType::Key,
            id.to_string(),
            from_state.to_string(),
            to_state.to_string(),
            now,
            trigger.to_string(),
            context,
        );
        self.store.save_state_transition(&transition).await?;
        info!(key_id = %id, from = %from_state, to = %to_state, "state_transition");
        Ok(transition)
    }

    /// Scan Throttled keys whose cooldown has elapsed and move them back to
    /// Available. Called periodically by the Orchestrator's recovery task.
    pub async fn check_and_recover(&self) -> Result<Vec<String>, KeyManagerError> {
        let now = self.ctx.now();
        let keys = self.store.list_keys(None).await?;
        let mut recovered = Vec::new();
        for key in keys {
            if key.state == KeyState::Throttled {
                if let Some(cooldown_until) = key.cooldown_until {
                    if now >= cooldown_until {
                        self.update_state(
                            &key.id,
                            KeyState::Available,
                            "cooldown_elapsed",
                            None,
                            Default::default(),
                        )
                        .await?;
                        recovered.push(key.id);
                    }
                }
            }
        }
        Ok(recovered)
    }

    pub async fn revoke(&self, id: &str) -> Result<(), KeyManagerError> {
        self.update_state(id, KeyState::Disabled, "manual_revocation", None, Default::default())
            .await?;
        warn!(key_id = %id, "key_revoked");
        Ok(())
    }

    /// Replace encrypted material while preserving id, state, metadata, and
    /// usage/failure counters. Writes a `key_rotation` transition even
    /// though state itself doesn't change.
    pub async fn rotate(&self, id: &str, new_material: &str) -> Result<Key, KeyManagerError> {
        validate_key_material(new_material)?;
        let mut key = self.get_key(id).await?;
        key.material = self.encryption.encrypt(new_material)?;
        self.store.save_key(&key).await?;

        let transition = StateTransition::new(
            self.ctx.next_id(),
            EntityType::Key,
            id.to_string(),
            key.state.to_string(),
            key.state.to_string(),
            self.ctx.now(),
            "key_rotation".to_string(),
            Default::default(),
        );
        self.store.save_state_transition(&transition).await?;
        info!(key_id = %id, "key_rotated");
        Ok(key)
    }

    /// Keys for `provider` that are Available, Recovering, or
    /// Throttled-with-elapsed-cooldown. Excludes Disabled, Invalid,
    /// Exhausted, and Throttled-still-in-cooldown.
    pub async fn get_eligible_keys(&self, provider_id: &str) -> Result<Vec<Key>, KeyManagerError> {
        let now = self.ctx.now();
        let keys = self.store.list_keys(Some(provider_id)).await?;
        Ok(keys
            .into_iter()
            .filter(|k| match k.state {
                KeyState::Available | KeyState::Recovering => true,
                KeyState::Throttled => k.cooldown_until.map(|until| now >= until).unwrap_or(true),
                KeyState::Exhausted | KeyState::Disabled | KeyState::Invalid => false,
            })
            .collect())
    }

    /// Record a successful call: bump usage count and `last_used_at`.
    pub async fn record_success(&self, id: &str) -> Result<(), KeyManagerError> {
        let now = self.ctx.now();
        self.store
            .update_key(
                id,
                Box::new(move |key: &mut Key| {
                    key.usage_count += 1;
                    key.last_used_at = Some(now);
                }),
            )
            .await
            .map_err(|e| self.map_not_found(id, e))?;
        Ok(())
    }

    /// Record a failed call: bump failure count only. State transitions (if
    /// any) are driven separately by the Orchestrator's retry classification.
    pub async fn record_failure(&self, id: &str) -> Result<(), KeyManagerError> {
        self.store
            .update_key(
                id,
                Box::new(|key: &mut Key| {
                    key.failure_count += 1;
                }),
            )
            .await
            .map_err(|e| self.map_not_found(id, e))?;
        Ok(())
    }

    /// `StateStoreError::NotFound` from an atomic update carries the store's
    /// internal id string, not necessarily formatted the way callers expect
    /// from `get_key`; normalize it to the same `KeyManagerError::NotFound`
    /// shape the rest of this type returns.
    fn map_not_found(&self, id: &str, err: StateStoreError) -> KeyManagerError {
        match err {
            StateStoreError::NotFound(_) => KeyManagerError::NotFound(id.to_string()),
            other => KeyManagerError::Store(other),
        }
    }
}

/// Bridges the Quota Engine's one-way dependency on the Key Manager: on
/// crossing to Exhausted, the Quota Engine asks the Key Manager to transition
/// the key out of eligibility.
#[async_trait]
impl ExhaustionNotifier for KeyManager {
    async fn notify_exhausted(&self, key_id: &str) -> Result<(), QuotaError> {
        self.update_state(
            key_id,
            KeyState::Exhausted,
            "quota_exhausted",
            None,
            Default::default(),
        )
        .await
        .map_err(|e| QuotaError::Store(crate::store::StateStoreError::Unavailable(e.to_string())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIdSource};
    use crate::store::memory::InMemoryStateStore;
    use chrono::Utc;

    fn manager() -> KeyManager {
        let ctx = Context::new(
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(SequentialIdSource::new("key-test")),
        );
        let store = Arc::new(InMemoryStateStore::new(1000, 1000));
        let encryption = Arc::new(EncryptionService::new(&[9u8; 32]).unwrap());
        KeyManager::new(store, encryption, ctx)
    }

    #[tokio::test]
    async fn register_then_get_material_round_trips() {
        let mgr = manager();
        let key = mgr
            .register_key("sk-test-material-0123456789", "openai", Metadata::new())
            .await
            .unwrap();
        let plaintext = mgr.get_material(&key.id).await.unwrap();
        assert_eq!(plaintext, "sk-test-material-0123456789");
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let mgr = manager();
        let key = mgr
            .register_key("sk-test-material-0123456789", "openai", Metadata::new())
            .await
            .unwrap();
        let result = mgr
            .update_state(&key.id, KeyState::Recovering, "bad", None, Default::default())
            .await;
        assert!(matches!(
            result,
            Err(KeyManagerError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn throttled_key_excluded_until_cooldown_elapses() {
        let mgr = manager();
        let key = mgr
            .register_key("sk-test-material-0123456789", "openai", Metadata::new())
            .await
            .unwrap();
        mgr.update_state(
            &key.id,
            KeyState::Throttled,
            "rate_limited",
            Some(chrono::Duration::seconds(60)),
            Default::default(),
        )
        .await
        .unwrap();

        let eligible = mgr.get_eligible_keys("openai").await.unwrap();
        assert!(eligible.is_empty());
    }

    #[tokio::test]
    async fn eligible_keys_exclude_exhausted_and_disabled() {
        let mgr = manager();
        let k1 = mgr
            .register_key("sk-test-material-0000000000", "openai", Metadata::new())
            .await
            .unwrap();
        let k2 = mgr
            .register_key("sk-test-material-1111111111", "openai", Metadata::new())
            .await
            .unwrap();
        mgr.update_state(&k1.id, KeyState::Exhausted, "quota", None, Default::default())
            .await
            .unwrap();
        mgr.revoke(&k2.id).await.unwrap();

        let eligible = mgr.get_eligible_keys("openai").await.unwrap();
        assert!(eligible.is_empty());
    }
}
