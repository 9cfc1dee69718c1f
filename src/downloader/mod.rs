//! Download orchestrator split into focused submodules.
//!
//! The `XdccDownloader` struct and its methods are organized by domain:
//! - [`networks`] - Network registry and channel management
//! - [`downloads`] - Enqueue, cancel and inspect download requests
//! - [`transfer_events`] - Reactions to transfer-engine events (advance, requeue)
//! - [`event_loop`] - The single task that applies every inbound event
//! - [`lifecycle`] - Boot recovery and shutdown
//! - [`transfer_queue`] - Per-bot queue of download requests

mod downloads;
mod event_loop;
mod lifecycle;
mod networks;
mod transfer_events;
mod transfer_queue;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use networks::NetworkOptions;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, TransferConfig, setting_keys};
use crate::db::{Database, NewPackOffer};
use crate::error::{Error, Result};
use crate::irc::{IrcConnector, IrcEvent};
use crate::session::Session;
use crate::transfer::{TransferEngine, TransferEvent, TransferId};
use crate::types::Event;

use transfer_queue::{DownloadRequest, TransferQueue};

/// Everything the event loop consumes
#[derive(Debug)]
pub(crate) enum Inbound {
    /// Protocol-client event of one network
    Irc { network: String, event: IrcEvent },
    /// A session finished sending its post-registration commands
    CommandsSent { network: String, registration: u64 },
    /// Transfer-engine event of one handle
    Transfer {
        transfer: TransferId,
        event: TransferEvent,
    },
    /// Announcement parsed by a session
    PackFound(NewPackOffer),
}

/// One registered network
pub(crate) struct Network {
    pub(crate) session: Session,
    pub(crate) queues: BTreeMap<String, TransferQueue>,
}

impl Network {
    pub(crate) fn pending_count(&self) -> usize {
        self.queues.values().map(TransferQueue::len).sum()
    }
}

/// A request whose active transfer was asked to stop; it leaves its queue
/// immediately but keeps its bot busy until the engine confirms
pub(crate) struct Canceling {
    pub(crate) request: DownloadRequest,
}

/// Process-wide network registry
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) networks: BTreeMap<String, Network>,
    /// Completed requests, oldest first
    pub(crate) finished: Vec<DownloadRequest>,
    /// Live transfer handle -> (network, bot) of the queue holding its request
    pub(crate) bindings: HashMap<TransferId, (String, String)>,
    pub(crate) canceling: HashMap<TransferId, Canceling>,
}

impl Registry {
    pub(crate) fn is_canceling(&self, network: &str, bot: &str) -> bool {
        self.canceling
            .values()
            .any(|c| c.request.network == network && c.request.bot == bot)
    }
}

/// External collaborators the downloader drives
#[derive(Clone)]
pub struct Collaborators {
    /// Opens IRC connections
    pub irc: Arc<dyn IrcConnector>,
    /// Creates transfer handles
    pub transfers: Arc<dyn TransferEngine>,
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct XdccDownloader {
    /// Database instance for persistence
    /// Public for integration tests to inspect the stores
    pub db: Arc<Database>,
    pub(crate) config: Arc<Config>,
    pub(crate) collaborators: Collaborators,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) inbound_tx: mpsc::UnboundedSender<Inbound>,
    pub(crate) inbound_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>>,
    pub(crate) state: Arc<Mutex<Registry>>,
    pub(crate) next_transfer: Arc<AtomicU64>,
    pub(crate) accepting_new: Arc<AtomicBool>,
    pub(crate) shutdown_token: CancellationToken,
}

impl XdccDownloader {
    /// Create a new XdccDownloader instance
    ///
    /// Opens (or creates) the database, then replays the persisted networks
    /// and pending downloads. Call [`start`](Self::start) to begin processing
    /// events.
    pub async fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        tokio::fs::create_dir_all(&config.transfer.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.transfer.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;
        let downloader = Self::with_database(config, Arc::new(db), collaborators);
        downloader.restore().await?;

        Ok(downloader)
    }

    /// Create an instance over an already opened database, without replaying it
    pub fn with_database(config: Config, db: Arc<Database>, collaborators: Collaborators) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.persistence.event_buffer.max(1));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        Self {
            db,
            config: Arc::new(config),
            collaborators,
            event_tx,
            inbound_tx,
            inbound_rx: Arc::new(std::sync::Mutex::new(Some(inbound_rx))),
            state: Arc::new(Mutex::new(Registry::default())),
            next_transfer: Arc::new(AtomicU64::new(1)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Subscribe to downloader events
    ///
    /// Multiple subscribers are supported; each receives every event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the static configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Current global transfer settings
    ///
    /// Each value comes from the configuration store when set there, and from
    /// [`Config::transfer`] otherwise.
    pub async fn transfer_settings(&self) -> Result<TransferConfig> {
        let defaults = &self.config.transfer;
        Ok(TransferConfig {
            check_filename: self
                .db
                .get_setting(setting_keys::CHECK_FILENAME)
                .await?
                .unwrap_or(defaults.check_filename),
            use_ssl: self
                .db
                .get_setting(setting_keys::USE_SSL)
                .await?
                .unwrap_or(defaults.use_ssl),
            force_ssl: self
                .db
                .get_setting(setting_keys::FORCE_SSL)
                .await?
                .unwrap_or(defaults.force_ssl),
            progress_threshold: self
                .db
                .get_setting(setting_keys::PROGRESS_THRESHOLD)
                .await?
                .unwrap_or(defaults.progress_threshold),
            resume: self
                .db
                .get_setting(setting_keys::RESUME)
                .await?
                .unwrap_or(defaults.resume),
            download_dir: self
                .db
                .get_setting(setting_keys::DOWNLOAD_PATH)
                .await?
                .unwrap_or_else(|| defaults.download_dir.clone()),
        })
    }

    /// Update one global transfer setting
    ///
    /// Applies to transfers created afterwards.
    pub async fn set_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        const KNOWN: [&str; 6] = [
            setting_keys::CHECK_FILENAME,
            setting_keys::USE_SSL,
            setting_keys::FORCE_SSL,
            setting_keys::PROGRESS_THRESHOLD,
            setting_keys::RESUME,
            setting_keys::DOWNLOAD_PATH,
        ];
        if !KNOWN.contains(&key) {
            return Err(Error::Config {
                message: format!("unknown setting '{}'", key),
                key: Some(key.to_string()),
            });
        }

        self.db.set_setting(key, value).await?;
        // Reject values of the wrong type instead of failing at the next enqueue
        if let Err(e) = self.transfer_settings().await {
            self.db.kv_delete(crate::db::namespace::SETTINGS, key).await?;
            return Err(Error::Config {
                message: format!("invalid value for '{}': {}", key, e),
                key: Some(key.to_string()),
            });
        }
        Ok(())
    }

    /// Emit an event to all subscribers
    ///
    /// Events without subscribers are dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn next_transfer_id(&self) -> TransferId {
        TransferId(self.next_transfer.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Write the pending list of a (network, bot) queue from its current contents
    pub(crate) async fn persist_queue(&self, registry: &Registry, network: &str, bot: &str) -> Result<()> {
        let entries = registry
            .networks
            .get(network)
            .and_then(|n| n.queues.get(bot))
            .map(TransferQueue::pending_entries)
            .unwrap_or_default();
        self.db.save_pending(network, bot, &entries).await
    }
}
