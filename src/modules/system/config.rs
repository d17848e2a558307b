use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const CONFIG_FILE: &str = "config.json";
const DATA_DIR: &str = ".fleetgate";

fn env_first(keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Ok(v) = std::env::var(k) {
            let t = v.trim();
            if !t.is_empty() {
                return Some(t.to_string());
            }
        }
    }
    None
}

pub fn get_data_dir() -> AppResult<PathBuf> {
    fn ensure_dir(path: &Path) -> AppResult<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    if let Some(env_path) = env_first(&["FLEETGATE_DATA_DIR", "DATA_DIR"]) {
        let data_dir = PathBuf::from(env_path);
        ensure_dir(&data_dir)?;
        return Ok(data_dir);
    }

    if let Some(home) = dirs::home_dir() {
        let data_dir = home.join(DATA_DIR);
        if ensure_dir(&data_dir).is_ok() {
            return Ok(data_dir);
        }
    }
    let fallback_dir = std::env::temp_dir().join(DATA_DIR);
    ensure_dir(&fallback_dir)?;
    Ok(fallback_dir)
}

/// Reads `config.json` under `data_dir`, writing defaults when it is missing.
pub fn load_app_config_from(data_dir: &Path) -> AppResult<AppConfig> {
    let config_path = data_dir.join(CONFIG_FILE);

    if !config_path.exists() {
        let config = AppConfig::new();
        if let Err(e) = save_app_config_to(data_dir, &config) {
            tracing::warn!("Failed to write default config: {}", e);
        }
        return Ok(config);
    }

    let content = fs::read_to_string(&config_path)?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("failed_to_parse_config_file: {}", e)))
}

pub fn save_app_config_to(data_dir: &Path, config: &AppConfig) -> AppResult<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(data_dir.join(CONFIG_FILE), content)?;
    Ok(())
}

/// Secrets for unattended runs arrive through the environment.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(url) = env_first(&["FLEETGATE_REMOTE_URL"]) {
        tracing::info!("Using pool document URL from environment");
        config.remote.document_url = Some(url);
    }
    if let Some(key) = env_first(&["FLEETGATE_REMOTE_API_KEY"]) {
        tracing::info!("Using pool document API key from environment");
        config.remote.api_key = Some(key);
    }
    if let Some(url) = env_first(&["FLEETGATE_GENERATOR_URL"]) {
        tracing::info!("Using generator endpoint from environment");
        config.generator.endpoint = Some(url);
    }
    if let Some(key) = env_first(&["FLEETGATE_GENERATOR_API_KEY"]) {
        tracing::info!("Using generator API key from environment");
        config.generator.api_key = Some(key);
    }
    if let Some(port) = env_first(&["FLEETGATE_ADMIN_PORT"]) {
        match port.parse::<u16>() {
            Ok(parsed) => {
                config.admin.port = parsed;
                tracing::info!("Using admin port from environment: {}", parsed);
            }
            Err(_) => tracing::warn!("Ignoring invalid admin port value: {}", port),
        }
    }
    if let Some(ua) = env_first(&["FLEETGATE_USER_AGENT"]) {
        config.gateway.user_agent = Some(ua);
    }
}
