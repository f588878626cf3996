use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/messaging.json";

const ENV_DATABASE_PATH: &str = "CHAT_DATABASE_PATH";
const ENV_PLACEHOLDER_NAME: &str = "CHAT_PLACEHOLDER_NAME";
const ENV_OBJECT_STORE_ROOT: &str = "CHAT_OBJECT_STORE_ROOT";
const ENV_OBJECT_BASE_URL: &str = "CHAT_OBJECT_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// SQLite file backing the document store.
    pub database_path: String,
    /// Top-level collection holding conversation summaries.
    pub conversations_collection: String,
    /// Subcollection under each conversation holding its messages.
    pub messages_collection: String,
    /// Display name used when a participant name is missing.
    pub placeholder_name: String,
    pub object_store_root: String,
    pub object_base_url: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            database_path: "data/messaging.db".to_string(),
            conversations_collection: "chats".to_string(),
            messages_collection: "messages".to_string(),
            placeholder_name: "User".to_string(),
            object_store_root: "data/objects".to_string(),
            object_base_url: "file://data/objects".to_string(),
        }
    }
}

impl MessagingConfig {
    /// File config with `.env` and process environment overrides applied.
    pub fn from_env(path: &str) -> Self {
        dotenvy::dotenv().ok();
        let mut config = load_config(path);
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields = [
            (ENV_DATABASE_PATH, &mut self.database_path),
            (ENV_PLACEHOLDER_NAME, &mut self.placeholder_name),
            (ENV_OBJECT_STORE_ROOT, &mut self.object_store_root),
            (ENV_OBJECT_BASE_URL, &mut self.object_base_url),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|value| !value.trim().is_empty()) {
                log::debug!("Config override from {key}");
                *field = value;
            }
        }
    }
}

pub fn load_config(path: &str) -> MessagingConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<MessagingConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                MessagingConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            MessagingConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &MessagingConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
