use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AltSendError, Result},
    models::RelayMode,
};

pub const CONFIG_FILE_NAME: &str = "altsend.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where received content lands when the caller doesn't pick a location.
    pub download_dir: PathBuf,
    pub tick_interval_ms: u64,
    pub chunk_divisor: u64,
    pub min_chunk_size: u64,
    pub event_capacity: usize,
    pub relay_mode: RelayMode,
    /// Decode unreadable ticket sizes as 1 MiB instead of failing the session.
    pub size_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            tick_interval_ms: 50,
            chunk_divisor: 100,
            min_chunk_size: 1024,
            event_capacity: 256,
            relay_mode: RelayMode::Default,
            size_fallback: false,
        }
    }
}

/// The user's download folder, else `~/Downloads`, else a folder in the temp dir.
fn default_download_dir() -> PathBuf {
    let user_downloads = directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf));
    if let Some(dir) = user_downloads {
        return dir;
    }
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join("Downloads"),
        None => std::env::temp_dir().join("altsend"),
    }
}

impl Config {
    /// Loads `altsend.toml` from the user config dir, writing the defaults first if missing.
    pub fn new() -> Result<Self> {
        let dirs = directories::BaseDirs::new().ok_or(AltSendError::NoHomeDir)?;
        let config_file = dirs.config_dir().join(CONFIG_FILE_NAME);

        let defaults = Self::default();

        let config = if !config_file.exists() {
            log::info!("creating config file at {config_file:?}");
            if let Some(parent) = config_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_file, toml::to_string(&defaults)?)?;
            defaults
        } else {
            log::info!("reading config from {config_file:?}");
            Self::merge(defaults, &config_file)?
        };

        log::info!("using config: {config:?}");

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::merge(Self::default(), path.as_ref())
    }

    fn merge(defaults: Self, path: &Path) -> Result<Self> {
        Figment::from(Serialized::defaults(defaults))
            .merge(Toml::file(path))
            .extract()
            // boxed because the error size from figment is large
            .map_err(|e| AltSendError::ConfigParseError(Box::new(e)))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }
}
