//! Key command implementation

use crate::cli::output::{format_keys_json, format_keys_table};
use crate::cli::{KeyListArgs, KeyRegisterArgs, KeyRevokeArgs, KeyRotateArgs};
use crate::key::model::KeyView;
use crate::key::KeyManager;

pub async fn handle_key_register(
    args: &KeyRegisterArgs,
    key_manager: &KeyManager,
) -> Result<String, Box<dyn std::error::Error>> {
    let key = key_manager
        .register_key(&args.material, &args.provider_id, Default::default())
        .await?;
    let view = KeyView::from(&key);
    Ok(format!(
        "Registered key {} for provider {}",
        view.id, view.provider_id
    ))
}

pub async fn handle_key_list(
    args: &KeyListArgs,
    key_manager: &KeyManager,
) -> Result<String, Box<dyn std::error::Error>> {
    let keys = key_manager.list_keys(args.provider_id.as_deref()).await?;
    let views: Vec<KeyView> = keys.iter().map(KeyView::from).collect();

    if args.json {
        Ok(format_keys_json(&views))
    } else {
        Ok(format_keys_table(&views))
    }
}

pub async fn handle_key_rotate(
    args: &KeyRotateArgs,
    key_manager: &KeyManager,
) -> Result<String, Box<dyn std::error::Error>> {
    let key = key_manager.rotate(&args.id, &args.material).await?;
    Ok(format!("Rotated key {}", key.id))
}

pub async fn handle_key_revoke(
    args: &KeyRevokeArgs,
    key_manager: &KeyManager,
) -> Result<String, Box<dyn std::error::Error>> {
    key_manager.revoke(&args.id).await?;
    Ok(format!("Revoked key {}", args.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Context;
    use crate::crypto::EncryptionService;
    use crate::store::memory::InMemoryStateStore;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn test_key_manager() -> KeyManager {
        let store: Arc<dyn crate::store::StateStore> = Arc::new(InMemoryStateStore::default());
        let encryption = Arc::new(EncryptionService::new(&[0u8; 32]).unwrap());
        KeyManager::new(store, encryption, Context::system())
    }

    #[tokio::test]
    async fn key_register_succeeds() {
        let manager = test_key_manager();
        let args = KeyRegisterArgs {
            material: "sk-test-material-value".to_string(),
            provider_id: "openai".to_string(),
            config: PathBuf::from("keyrouter.toml"),
        };

        let output = handle_key_register(&args, &manager).await.unwrap();
        assert!(output.contains("openai"));
    }

    #[tokio::test]
    async fn key_list_reflects_registered_keys() {
        let manager = test_key_manager();
        manager
            .register_key("sk-test-material-value", "openai", Default::default())
            .await
            .unwrap();

        let args = KeyListArgs {
            json: false,
            provider_id: None,
            config: PathBuf::from("keyrouter.toml"),
        };
        let output = handle_key_list(&args, &manager).await.unwrap();
        assert!(output.contains("openai"));
    }

    #[tokio::test]
    async fn key_list_json_output() {
        let manager = test_key_manager();
        manager
            .register_key("sk-test-material-value", "openai", Default::default())
            .await
            .unwrap();

        let args = KeyListArgs {
            json: true,
            provider_id: None,
            config: PathBuf::from("keyrouter.toml"),
        };
        let output = handle_key_list(&args, &manager).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed.get("keys").is_some());
    }

    #[tokio::test]
    async fn key_rotate_replaces_material() {
        let manager = test_key_manager();
        let key = manager
            .register_key("sk-old-material-value", "openai", Default::default())
            .await
            .unwrap();

        let args = KeyRotateArgs {
            id: key.id.clone(),
            material: "sk-new-material-value".to_string(),
            config: PathBuf::from("keyrouter.toml"),
        };
        let output = handle_key_rotate(&args, &manager).await.unwrap();
        assert!(output.contains(&key.id));
    }

    #[tokio::test]
    async fn key_revoke_disables_key() {
        let manager = test_key_manager();
        let key = manager
            .register_key("sk-test-material-value", "openai", Default::default())
            .await
            .unwrap();

        let args = KeyRevokeArgs {
            id: key.id.clone(),
            config: PathBuf::from("keyrouter.toml"),
        };
        handle_key_revoke(&args, &manager).await.unwrap();

        let stored = manager.get_key(&key.id).await.unwrap();
        assert_eq!(stored.state, crate::key::model::KeyState::Disabled);
    }
}
