use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::drive::DEFAULT_PAGE_SIZE;
use crate::google::DEFAULT_API_BASE;

pub const CONFIG_FILE: &str = "sheetdrive.toml";
const MAX_PAGE_SIZE: u32 = 1000;
/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub bind_addr: String,
    pub work_dir: PathBuf,
    pub page_size: u32,
    pub credentials_path: PathBuf,
    /// Argon2 PHC string. Without one, nobody can log in.
    pub password_hash: Option<String>,
    pub api_base: String,
    pub session_hours: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            work_dir: PathBuf::from("./work"),
            page_size: DEFAULT_PAGE_SIZE,
            credentials_path: PathBuf::from("./service_account.json"),
            password_hash: None,
            api_base: DEFAULT_API_BASE.into(),
            session_hours: 24,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("page_size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    PageSize(u32),
    #[error("session_hours must be between 1 and {MAX_SESSION_HOURS}, got {0}")]
    SessionHours(u64),
}

/// Defaults, then the config file (if present), then the environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = std::env::var("SHEETDRIVE_CONFIG").unwrap_or_else(|_| CONFIG_FILE.to_string());
    let settings = load_file(Path::new(&path))?;
    apply_env(settings, |var| std::env::var(var).ok())
}

fn load_file(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_settings(raw: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(raw)
}

fn apply_env(
    mut settings: Settings,
    var: impl Fn(&'static str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    if let Some(v) = var("SHEETDRIVE_BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("SHEETDRIVE_WORK_DIR") {
        settings.work_dir = PathBuf::from(v);
    }
    if let Some(v) = var("SHEETDRIVE_PAGE_SIZE") {
        settings.page_size = v.parse().map_err(|_| ConfigError::Env {
            var: "SHEETDRIVE_PAGE_SIZE",
            value: v.clone(),
        })?;
    }
    if let Some(v) = var("SHEETDRIVE_CREDENTIALS") {
        settings.credentials_path = PathBuf::from(v);
    }
    if let Some(v) = var("SHEETDRIVE_PASSWORD_HASH") {
        settings.password_hash = Some(v);
    }
    if let Some(v) = var("SHEETDRIVE_API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = var("SHEETDRIVE_SESSION_HOURS") {
        settings.session_hours = v.parse().map_err(|_| ConfigError::Env {
            var: "SHEETDRIVE_SESSION_HOURS",
            value: v.clone(),
        })?;
    }

    if settings.page_size == 0 || settings.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::PageSize(settings.page_size));
    }
    if settings.session_hours == 0 || settings.session_hours > MAX_SESSION_HOURS {
        return Err(ConfigError::SessionHours(settings.session_hours));
    }
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
