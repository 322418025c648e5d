//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate locations.
//!
//! | Purpose | Linux | macOS |
//! |---------|-------|-------|
//! | Data | `~/.local/share/seo-monitor/` | `~/Library/Application Support/seo-monitor/` |
//! | Config | `~/.config/seo-monitor/` | `~/Library/Application Support/seo-monitor/` |
//!
//! # Environment Overrides
//!
//! - `SEO_MONITOR_DATA_DIR` overrides [`data_dir`]
//! - `SEO_MONITOR_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "seo-monitor";

/// Application data root (rank database, log files).
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SEO_MONITOR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/seo-monitor-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("SEO_MONITOR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/seo-monitor-config"))
}

/// Default rank database file (`data_dir()/seo-monitor.db`).
#[must_use]
pub fn database_file() -> PathBuf {
    data_dir().join("seo-monitor.db")
}

/// Default log directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        assert!(!data_dir().as_os_str().is_empty());
    }

    #[test]
    fn config_dir_is_nonempty() {
        assert!(!config_dir().as_os_str().is_empty());
    }

    #[test]
    fn database_file_lives_in_data_dir() {
        let db = database_file();
        assert!(db.starts_with(data_dir()));
        assert_eq!(
            db.file_name().and_then(|n| n.to_str()),
            Some("seo-monitor.db")
        );
    }

    #[test]
    fn logs_dir_lives_in_data_dir() {
        assert!(logs_dir().starts_with(data_dir()));
    }
}
