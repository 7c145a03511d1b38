use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "rider.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub store_url: Option<String>,
    pub auth_token: Option<String>,
    pub app_name: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            auth_token: None,
            app_name: "RideLink".into(),
            log_filter: "info".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `path` (flat `key = "value"` TOML), then environment.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("store_url") {
                settings.store_url = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("auth_token") {
                settings.auth_token = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("app_name") {
                settings.app_name = v.clone();
            }
            if let Some(v) = file_cfg.get("log_filter") {
                settings.log_filter = v.clone();
            }
        }
    }

    if let Some(v) = env("RIDER_STORE_URL") {
        settings.store_url = Some(v);
    }
    if let Some(v) = env("APP__STORE_URL") {
        settings.store_url = Some(v);
    }

    if let Some(v) = env("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = env("APP__APP_NAME") {
        settings.app_name = v;
    }

    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings.store_url = settings
        .store_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    settings
}
