//! Application configuration loaded from TOML.
//!
//! # Invariants
//! - Every section is optional; missing sections take their defaults.
//! - Relative storage paths in a loaded file resolve against that file's
//!   directory.

use crate::manager::{
    DataManager, DataResult, ExportFormat, FileDataManager, SqliteDataManager,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_SQLITE_PATH: &str = "sms.db";

/// Which backend to open, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Unpersisted store; contents vanish on exit.
    Memory,
    /// File-backed store rewritten after every mutation.
    File {
        path: PathBuf,
        #[serde(default = "default_file_format")]
        format: ExportFormat,
    },
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from(DEFAULT_SQLITE_PATH),
        }
    }
}

impl StorageConfig {
    fn resolve_against(&mut self, base: &Path) {
        match self {
            Self::Memory => {}
            Self::File { path, .. } | Self::Sqlite { path } => {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

fn default_file_format() -> ExportFormat {
    ExportFormat::Json
}

/// Logging settings. Unset values fall back to the caller's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: Option<String>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::Parse)
    }

    /// Reads and parses the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.storage.resolve_against(base);
        }
        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

/// Opens the backend described by `config`.
pub fn open_data_manager(config: &StorageConfig) -> DataResult<Box<dyn DataManager>> {
    let manager: Box<dyn DataManager> = match config {
        StorageConfig::Memory => Box::new(FileDataManager::in_memory()),
        StorageConfig::File { path, format } => {
            Box::new(FileDataManager::open(path.clone(), *format)?)
        }
        StorageConfig::Sqlite { path } => Box::new(SqliteDataManager::open(path)?),
    };
    Ok(manager)
}
