//! Driver settings loaded from host storage.

use serde::{Deserialize, Serialize};

use tabpilot_core_types::host::keys;
use tabpilot_core_types::Storage;

use crate::errors::DispatchError;

/// The LLM-facing slice of the user's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    /// Vision analyst model, served by Groq regardless of the primary
    /// provider.
    pub vision_model: Option<String>,
    pub search_enabled: bool,
    pub search_model: Option<String>,
}

impl LlmSettings {
    /// Read settings from storage, failing on missing essentials.
    pub async fn load(storage: &dyn Storage) -> Result<Self, DispatchError> {
        let provider = storage
            .get(keys::AI_PROVIDER)
            .await
            .ok_or_else(|| DispatchError::MissingConfig("no provider selected".to_string()))?;
        let model = storage
            .get(keys::AI_MODEL)
            .await
            .ok_or_else(|| DispatchError::MissingConfig("no model selected".to_string()))?;
        let api_key = storage
            .get(keys::AI_API_KEY)
            .await
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DispatchError::MissingConfig("no API key saved".to_string()))?;

        let search_enabled = storage
            .get(keys::SEARCH_ENABLED)
            .await
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            provider,
            model,
            api_key,
            vision_model: storage.get(keys::GROQ_VISION_MODEL).await,
            search_enabled,
            search_model: storage.get(keys::SEARCH_MODEL).await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MapStorage {
        map: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl Storage for MapStorage {
        async fn get(&self, key: &str) -> Option<String> {
            self.map.lock().get(key).cloned()
        }

        async fn set(&self, key: &str, value: String) {
            self.map.lock().insert(key.to_string(), value);
        }
    }

    #[tokio::test]
    async fn load_requires_key_and_model() {
        let storage = MapStorage::default();
        storage.set(keys::AI_PROVIDER, "groq".to_string()).await;
        storage.set(keys::AI_MODEL, "llama-3.3-70b".to_string()).await;
        let err = LlmSettings::load(&storage).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingConfig(_)));

        storage.set(keys::AI_API_KEY, "sk-test".to_string()).await;
        let settings = LlmSettings::load(&storage).await.unwrap();
        assert_eq!(settings.provider, "groq");
        assert!(!settings.search_enabled);
    }

    #[tokio::test]
    async fn search_flag_parses_truthy_strings() {
        let storage = MapStorage::default();
        storage.set(keys::AI_PROVIDER, "openrouter".to_string()).await;
        storage.set(keys::AI_MODEL, "m".to_string()).await;
        storage.set(keys::AI_API_KEY, "k".to_string()).await;
        storage.set(keys::SEARCH_ENABLED, "true".to_string()).await;
        storage
            .set(keys::SEARCH_MODEL, "openrouter/auto".to_string())
            .await;
        let settings = LlmSettings::load(&storage).await.unwrap();
        assert!(settings.search_enabled);
        assert_eq!(settings.search_model.as_deref(), Some("openrouter/auto"));
    }
}
