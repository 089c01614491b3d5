use engine::EngineOptions;
use serde::Deserialize;
use std::path::PathBuf;
use std::{num::NonZeroUsize, path::Path};
use thiserror::Error;
use wal::SyncPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO Error")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Parse Error")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub wal: WalConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub buffer_pages: NonZeroUsize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalConfig {
    /// `always` | `commit` | `off`
    pub sync: String,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            sync: "commit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub max_concurrent_commands: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7654".to_string(),
            max_concurrent_commands: 8,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
                logs_dir: PathBuf::from("./logs"),
                buffer_pages: NonZeroUsize::new(256).expect("non-zero"),
            },
            wal: WalConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads `minidb.toml`, falling back to defaults when the file does not
    /// exist, then applies the `MINIDB_DATA_DIR` and `MINIDB_WAL_SYNC`
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseToml {
                path: path.clone(),
                source: e,
            })?
        } else {
            DaemonConfig::default()
        };

        if let Ok(data_dir) = std::env::var("MINIDB_DATA_DIR") {
            cfg.storage.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(sync) = std::env::var("MINIDB_WAL_SYNC") {
            cfg.wal.sync = sync;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // buffer_pages is already NonZeroUsize, so "0" can't happen.
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                message: "storage.data_dir must not be empty".to_string(),
            });
        }
        self.wal
            .sync
            .parse::<SyncPolicy>()
            .map_err(|message| ConfigError::Invalid { message })?;
        Ok(())
    }

    /// The engine-facing subset of this configuration.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            data_dir: self.storage.data_dir.clone(),
            buffer_pages: self.storage.buffer_pages,
            // validate() already proved this parses.
            wal_sync: self.wal.sync.parse().unwrap_or_default(),
        }
    }
}
