//! Runtime configuration: where the journal lives on disk and how chatty the
//! log file should be. Both come from the environment with sensible defaults.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".day-rater";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "day-rater.sqlite";
const LOG_DIR_NAME: &str = "logs";
const EXPORT_DIR_NAME: &str = "exports";

/// Overrides the data directory (handy for keeping a scratch journal).
pub const HOME_ENV: &str = "DAY_RATER_HOME";
/// `EnvFilter` directives for the log file, e.g. `day_rater=debug`.
pub const LOG_ENV: &str = "DAY_RATER_LOG";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_filter: String,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::resolve(env::var_os(HOME_ENV), env::var(LOG_ENV).ok())
    }

    /// Build a configuration rooted at an explicit directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    fn resolve(home: Option<OsString>, log_filter: Option<String>) -> Result<Self> {
        let data_dir = match home {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let log_filter = log_filter
            .map(|filter| filter.trim().to_string())
            .filter(|filter| !filter.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            data_dir,
            log_filter,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join(EXPORT_DIR_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Resolve `~/.day-rater` inside the user's home.
fn default_data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_home_wins_and_paths_hang_off_it() {
        let config = AppConfig::resolve(Some(OsString::from("/tmp/journal")), None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/journal"));
        assert_eq!(
            config.db_path(),
            PathBuf::from("/tmp/journal/day-rater.sqlite")
        );
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/journal/logs"));
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/journal/exports"));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn blank_log_filter_falls_back_to_default() {
        let config =
            AppConfig::resolve(Some(OsString::from("/tmp/j")), Some("   ".to_string())).unwrap();
        assert_eq!(config.log_filter, "info");

        let config = AppConfig::resolve(
            Some(OsString::from("/tmp/j")),
            Some("day_rater=debug".to_string()),
        )
        .unwrap();
        assert_eq!(config.log_filter, "day_rater=debug");
    }

    #[test]
    fn with_data_dir_uses_default_filter() {
        let config = AppConfig::with_data_dir("/srv/rater");
        assert_eq!(config.data_dir(), Path::new("/srv/rater"));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }
}
