//! Core types for xdcc-dl

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::session::SessionView;

/// Composite identifier of a pack offer: `"<network>:<bot>:<pack>"`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackId(String);

impl PackId {
    /// Build the id of pack `pack` offered by `bot` on `network`
    pub fn new(network: &str, bot: &str, pack: u32) -> Self {
        Self(format!("{}:{}:{}", network, bot, pack))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for PackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a per-(network, bot) pending list in the configuration store
pub fn queue_key(network: &str, bot: &str) -> String {
    format!("{}:{}", network, bot)
}

/// Split a pending-list key back into (network, bot)
///
/// Bot nicks cannot contain `:`, so the split happens at the last separator.
pub fn split_queue_key(key: &str) -> Option<(&str, &str)> {
    let (network, bot) = key.rsplit_once(':')?;
    if network.is_empty() || bot.is_empty() {
        return None;
    }
    Some((network, bot))
}

/// Lifecycle of a download request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting behind the head of its bot's queue
    Queued,
    /// Head of the queue with a started transfer
    Active,
    /// Removed by the user or by a filename mismatch
    Canceled,
    /// Transfer finished
    Completed,
    /// Transfer engine reported an error
    Errored,
}

/// Structured record parsed from a channel announcement
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackInfo {
    /// Pack number
    pub pack: u32,
    /// Announced filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Size, scaled to bytes when the unit was recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Size unit, kept only when it was not recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Download counter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gets: Option<u32>,
    /// Any other captured fields, by configured field name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One entry of a durable pending list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Pack number
    pub pack: u32,
    /// Announced filename
    pub name: String,
}

/// Event emitted by the downloader
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Network registered
    NetworkAdded {
        /// Network name
        network: String,
    },

    /// Network removed
    NetworkRemoved {
        /// Network name
        network: String,
    },

    /// IRC registration finished
    Registered {
        /// Network name
        network: String,
        /// Nick assigned by the server
        nick: String,
    },

    /// Join acknowledged
    ChannelJoined {
        /// Network name
        network: String,
        /// Channel name
        channel: String,
    },

    /// Part acknowledged
    ChannelLeft {
        /// Network name
        network: String,
        /// Channel name
        channel: String,
    },

    /// We were kicked
    Kicked {
        /// Network name
        network: String,
        /// Channel name
        channel: String,
        /// Nick that kicked us
        by: String,
        /// Kick reason
        reason: Option<String>,
    },

    /// Pack offer recorded in the document store
    PackFound {
        /// Pack id
        id: PackId,
    },

    /// Download appended to a queue
    Queued {
        /// Pack id
        id: PackId,
        /// Position in the bot's queue (0 = head)
        position: usize,
    },

    /// Transfer started
    Started {
        /// Pack id
        id: PackId,
    },

    /// Transfer engine connected to the bot
    TransferConnected {
        /// Pack id
        id: PackId,
        /// Filename offered by the bot
        filename: String,
    },

    /// Bytes received
    Progress {
        /// Pack id
        id: PackId,
        /// Bytes received so far
        received: u64,
        /// Declared size, if known
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },

    /// Transfer finished
    Completed {
        /// Pack id
        id: PackId,
        /// Final path reported by the engine
        path: PathBuf,
    },

    /// Transfer failed and was put back into a queue
    Requeued {
        /// Pack id
        id: PackId,
        /// Error reported by the engine
        error: String,
    },

    /// Transfer canceled
    Canceled {
        /// Pack id
        id: PackId,
    },

    /// Offered filename did not match the announced one
    FilenameMismatch {
        /// Pack id
        id: PackId,
        /// Announced filename
        expected: String,
        /// Filename offered at connect time
        offered: String,
    },

    /// Informational message from the transfer engine
    TransferMessage {
        /// Pack id
        id: PackId,
        /// Message text
        message: String,
    },

    /// Downloader is shutting down
    Shutdown,
}

/// Read-only view of one download request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    /// Pack id
    pub id: PackId,
    /// Network name
    pub network: String,
    /// Bot nick
    pub bot: String,
    /// Pack number
    pub pack: u32,
    /// Announced filename
    pub name: String,
    /// Declared size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Current status
    pub status: RequestStatus,
    /// Bytes received so far
    pub received: u64,
    /// Notices collected from the transfer engine
    pub notices: Vec<String>,
}

/// Read-only view of one network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Network name
    pub name: String,
    /// Connection session state
    pub session: SessionView,
    /// Transfer queues by bot nick
    pub queues: BTreeMap<String, Vec<DownloadSnapshot>>,
}

/// Read-only view of the whole downloader
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloaderSnapshot {
    /// All registered networks, sorted by name
    pub networks: Vec<NetworkSnapshot>,
    /// Completed requests, oldest first
    pub finished: Vec<DownloadSnapshot>,
}
