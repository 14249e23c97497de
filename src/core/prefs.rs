use crate::core::io::Storage;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const PREFS_FILE: &str = "prefs.json";

pub const GEMINI_API_KEY: &str = "gemini_api_key";
pub const OPENAI_API_KEY: &str = "openai_api_key";
pub const CHANNEL_NAME: &str = "channel_name";
pub const NARRATOR_NAME: &str = "narrator_name";

/// Flat string store for raw key text and a few display preferences.
///
/// Values are kept verbatim; key text is only split when a request is made.
pub struct Preferences {
    storage: Arc<dyn Storage>,
    path: String,
    values: BTreeMap<String, String>,
}

impl Preferences {
    pub async fn load(storage: Arc<dyn Storage>, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let values = if storage.exists(&path).await? {
            let content = storage.read_to_string(&path).await?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse preferences at {}", path))?
        } else {
            BTreeMap::new()
        };
        log::debug!("Loaded {} preference entries from {}", values.len(), path);
        Ok(Self {
            storage,
            path,
            values,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub async fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.values)?;
        self.storage.write(&self.path, content.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;

    #[tokio::test]
    async fn test_values_round_trip_verbatim() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new(dir.path()));

        let mut prefs = Preferences::load(storage.clone(), PREFS_FILE).await?;
        assert_eq!(prefs.get(GEMINI_API_KEY), None);

        let raw = "  AIzaOne\nAIzaTwo ; AIzaThree,  ";
        prefs.set(GEMINI_API_KEY, raw);
        prefs.set(CHANNEL_NAME, "ND Group");
        prefs.save().await?;

        let reloaded = Preferences::load(storage, PREFS_FILE).await?;
        assert_eq!(reloaded.get(GEMINI_API_KEY), Some(raw));
        assert_eq!(reloaded.get_or_empty(CHANNEL_NAME), "ND Group");
        assert_eq!(reloaded.get_or_empty(OPENAI_API_KEY), "");
        Ok(())
    }
}
