//! Transfer engine abstraction
//!
//! The byte-level XDCC transfer (DCC SEND handshake, optional SSL, resume) is
//! done by an external engine. The downloader creates one [`TransferHandle`]
//! per download request, drives it with [`TransferCommand`]s and reacts to the
//! [`TransferEvent`]s it reports.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::TransferConfig;
use crate::downloader::Inbound;
use crate::error::Result;
use crate::irc::IrcClient;

/// Identifies one transfer-engine handle for the lifetime of the process
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of one transfer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Pack number to request
    pub pack: u32,
    /// Bot to request it from
    pub bot: String,
    /// Request an SSL transfer
    pub use_ssl: bool,
    /// Allow plaintext if SSL negotiation fails
    pub allow_ssl_fallback: bool,
    /// Destination directory
    pub destination: PathBuf,
    /// Bytes between progress events
    pub progress_threshold: u64,
    /// Resume a partial file if present
    pub resume: bool,
}

impl TransferRequest {
    /// Build a request for `pack` from `bot` using the current global settings
    pub fn new(settings: &TransferConfig, bot: &str, pack: u32) -> Self {
        Self {
            pack,
            bot: bot.to_string(),
            use_ssl: settings.use_ssl,
            allow_ssl_fallback: !settings.force_ssl,
            destination: settings.download_dir.clone(),
            progress_threshold: settings.progress_threshold,
            resume: settings.resume,
        }
    }
}

/// Signal sent to a transfer handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferCommand {
    /// Request the pack from the bot
    Start,
    /// Stop gracefully (tell the bot, close the socket, report `Progress` with phase `Canceled`)
    Cancel,
    /// Drop everything immediately
    Kill,
}

/// Phase of a transfer handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    /// Created, not yet started
    Created,
    /// Pack requested, waiting for the bot's offer
    Requested,
    /// Connected to the bot
    Connected,
    /// Receiving bytes
    Transferring,
    /// Canceled after a graceful stop
    Canceled,
    /// All bytes received
    Finished,
    /// Failed
    Failed,
}

/// Event reported by a transfer handle
#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    /// DCC connection established; `filename` is what the bot offered
    Connect {
        /// Offered filename
        filename: String,
        /// Offered size, if the bot announced one
        size: Option<u64>,
    },
    /// Bytes received; phase `Canceled` is the terminal report of a graceful cancel
    Progress {
        /// Bytes received so far
        received: u64,
        /// Current phase
        phase: TransferPhase,
    },
    /// Transfer finished
    Complete {
        /// Path of the received file
        path: PathBuf,
    },
    /// Informational message (bot notices, queue position, ...)
    Message(String),
    /// Transfer failed
    Error(String),
    /// Handle was killed
    Killed,
}

/// One live transfer
pub trait TransferHandle: Send + Sync {
    /// Deliver a signal; never blocks
    fn send(&self, command: TransferCommand) -> Result<()>;

    /// Current phase
    fn phase(&self) -> TransferPhase;

    /// Notices accumulated so far
    fn notices(&self) -> Vec<String>;
}

/// Creates transfer handles
pub trait TransferEngine: Send + Sync {
    /// Create a handle for `request`; the transfer begins on [`TransferCommand::Start`]
    fn create(
        &self,
        client: Arc<dyn IrcClient>,
        request: TransferRequest,
        events: TransferEventSink,
    ) -> Result<Box<dyn TransferHandle>>;
}

/// Delivers events of one transfer handle to the downloader
#[derive(Clone, Debug)]
pub struct TransferEventSink {
    transfer: TransferId,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl TransferEventSink {
    pub(crate) fn new(transfer: TransferId, tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { transfer, tx }
    }

    /// Handle this sink reports for
    pub fn transfer(&self) -> TransferId {
        self.transfer
    }

    /// Report an event; returns false once the downloader has shut down
    pub fn emit(&self, event: TransferEvent) -> bool {
        self.tx
            .send(Inbound::Transfer {
                transfer: self.transfer,
                event,
            })
            .is_ok()
    }
}
