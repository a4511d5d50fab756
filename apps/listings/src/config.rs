use std::fs;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub debounce_ms: u64,
}

/// On-disk shape of `listings.toml`; every key is optional and
/// `debounce_ms` is a native TOML integer.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    debounce_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://jsonplaceholder.typicode.com".into(),
            debounce_ms: 300,
        }
    }
}

/// Defaults, overridden by `listings.toml` in the working directory,
/// overridden by `APP__*` environment variables. CLI flags are layered on
/// top by the caller.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("listings.toml") {
        apply_file(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.debounce_ms = parsed;
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    match toml::from_str::<FileSettings>(raw) {
        Ok(file_cfg) => {
            if let Some(v) = file_cfg.api_base_url {
                settings.api_base_url = v;
            }
            if let Some(v) = file_cfg.debounce_ms {
                settings.debounce_ms = v;
            }
        }
        Err(err) => tracing::warn!(%err, "ignoring malformed listings.toml"),
    }
}
