//! Error types for xdcc-dl
//!
//! Errors fall into three groups:
//! - Validation errors (bad or duplicate network name, unknown network/channel/bot/pack),
//!   returned synchronously and never retried
//! - Operational conflicts (removing a network that still has pending downloads)
//! - Infrastructure failures (database, serialization, protocol client, transfer engine)
//!
//! Transfer failures reported by the engine never surface here: they are absorbed
//! by the requeue cycle and only logged.

use thiserror::Error;

/// Result type alias for xdcc-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xdcc-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "xdcc:progressThreshold")
        key: Option<String>,
    },

    /// Network registry error
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Download queue error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IRC protocol client error
    #[error("IRC error: {0}")]
    Irc(String),

    /// Transfer engine error
    #[error("transfer error: {0}")]
    Transfer(String),

    /// Invalid announcement pattern
    #[error("invalid announcement pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Whether this error is a caller mistake (bad input, unknown entity, conflict)
    /// rather than an infrastructure failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Download(_) | Error::Pattern(_) | Error::Config { .. }
        )
    }
}

/// Network registry errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Network name was empty
    #[error("network name must be a non-empty string")]
    InvalidName,

    /// A network with this name is already registered
    #[error("network {name} already exists")]
    AlreadyExists {
        /// The duplicate network name
        name: String,
    },

    /// No network with this name is registered
    #[error("network {name} not found")]
    NotFound {
        /// The unknown network name
        name: String,
    },

    /// Channel is not configured on the network
    #[error("channel {channel} not found on network {network}")]
    ChannelNotFound {
        /// Network the channel was looked up on
        network: String,
        /// The unknown channel
        channel: String,
    },

    /// Network still has queued or active downloads
    #[error("network {name} has {count} pending download(s)")]
    PendingDownloads {
        /// Network that was asked to be removed
        name: String,
        /// Number of requests still queued across all bots
        count: usize,
    },
}

/// Download queue errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// No pack-offer record with this id, or its network is not registered
    #[error("pack not found: {id}")]
    PackNotFound {
        /// The pack id that was looked up
        id: String,
    },

    /// The bot has no transfer queue on this network
    #[error("no queue for bot {bot} on network {network}")]
    QueueNotFound {
        /// Network name
        network: String,
        /// Bot nick
        bot: String,
    },

    /// The pack is not in the bot's queue
    #[error("download {id} is not queued")]
    NotQueued {
        /// The pack id that was not found in the queue
        id: String,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be decoded
    #[error("corrupt record {key}: {reason}")]
    CorruptRecord {
        /// Key of the record that failed to decode
        key: String,
        /// Decoder error
        reason: String,
    },
}
