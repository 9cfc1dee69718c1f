//! Configuration types for xdcc-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Keys of the global transfer settings in the configuration store
pub mod setting_keys {
    /// Cancel a transfer whose offered filename differs from the announced one
    pub const CHECK_FILENAME: &str = "xdcc:checkFilename";
    /// Request SSL-wrapped DCC transfers
    pub const USE_SSL: &str = "xdcc:useSSL";
    /// Refuse to fall back to plaintext when SSL negotiation fails
    pub const FORCE_SSL: &str = "xdcc:forceSSL";
    /// Bytes received between two progress reports
    pub const PROGRESS_THRESHOLD: &str = "xdcc:progressThreshold";
    /// Resume partially received files
    pub const RESUME: &str = "xdcc:resume";
    /// Destination directory for received files
    pub const DOWNLOAD_PATH: &str = "basic:dlPath";
}

/// Transfer behavior applied to every new transfer-engine handle
///
/// These values are the defaults; each one can be overridden at runtime through
/// the configuration store (see [`setting_keys`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Compare the filename offered at connect time with the announced one (default: false)
    #[serde(default)]
    pub check_filename: bool,

    /// Request SSL transfers (default: false)
    #[serde(default)]
    pub use_ssl: bool,

    /// Disallow falling back to plaintext if SSL fails (default: false)
    #[serde(default)]
    pub force_ssl: bool,

    /// Bytes between progress events (default: 1 MiB)
    #[serde(default = "default_progress_threshold")]
    pub progress_threshold: u64,

    /// Resume partial files (default: true)
    #[serde(default = "default_true")]
    pub resume: bool,

    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            check_filename: false,
            use_ssl: false,
            force_ssl: false,
            progress_threshold: default_progress_threshold(),
            resume: true,
            download_dir: default_download_dir(),
        }
    }
}

/// Data storage and event plumbing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./xdcc-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Broadcast buffer for [`crate::types::Event`] subscribers (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Main configuration for XdccDownloader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.transfer.download_dir
    }
}

fn default_progress_threshold() -> u64 {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./xdcc-dl.db")
}

fn default_event_buffer() -> usize {
    1000
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.transfer, TransferConfig::default());
        assert_eq!(config.transfer.progress_threshold, 1024 * 1024);
        assert!(config.transfer.resume);
        assert_eq!(config.persistence.event_buffer, 1000);
    }

    #[test]
    fn test_partial_override() {
        let config: Config =
            serde_json::from_str(r#"{"transfer": {"use_ssl": true, "download_dir": "/tmp/dl"}}"#)
                .unwrap();
        assert!(config.transfer.use_ssl);
        assert!(!config.transfer.force_ssl);
        assert_eq!(config.download_dir(), &PathBuf::from("/tmp/dl"));
    }
}
