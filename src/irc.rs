//! IRC protocol client abstraction
//!
//! The wire protocol lives outside this crate. An [`IrcConnector`] opens one
//! connection per network and hands back an [`IrcClient`] handle for outgoing
//! commands; everything the server sends is reported as [`IrcEvent`]s through
//! the [`IrcEventSink`] it was given.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::downloader::Inbound;
use crate::error::Result;

/// Options handed to the protocol client when connecting
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Server port (default: 6667)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect with TLS (default: false)
    #[serde(default)]
    pub tls: bool,

    /// Username (ident); defaults to the nick when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Real name; defaults to the nick when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realname: Option<String>,

    /// Server password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Let the protocol client rejoin channels after a kick (default: false)
    #[serde(default)]
    pub auto_rejoin: bool,

    /// Client-specific options passed through untouched
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            port: default_port(),
            tls: false,
            username: None,
            realname: None,
            password: None,
            auto_rejoin: false,
            extra: BTreeMap::new(),
        }
    }
}

fn default_port() -> u16 {
    6667
}

/// Event reported by the protocol client
#[derive(Clone, Debug, PartialEq)]
pub enum IrcEvent {
    /// Registration finished; `nick` is the nick the server assigned
    Registered {
        /// Our nick
        nick: String,
    },
    /// Message of the day
    Motd(String),
    /// Channel topic
    Topic {
        /// Channel name
        channel: String,
        /// Topic text
        topic: String,
    },
    /// Someone (possibly us) joined a channel
    Join {
        /// Channel name
        channel: String,
        /// Joining nick
        nick: String,
    },
    /// Someone (possibly us) left a channel
    Part {
        /// Channel name
        channel: String,
        /// Leaving nick
        nick: String,
    },
    /// Someone (possibly us) was kicked
    Kick {
        /// Channel name
        channel: String,
        /// Kicked nick
        nick: String,
        /// Nick that issued the kick
        by: String,
        /// Kick reason
        reason: Option<String>,
    },
    /// NOTICE
    Notice {
        /// Sender nick
        from: String,
        /// Notice text
        text: String,
    },
    /// CTCP reply (sent as NOTICE)
    CtcpNotice {
        /// Sender nick
        from: String,
        /// CTCP payload
        text: String,
    },
    /// PRIVMSG to a channel
    Message {
        /// Channel name
        channel: String,
        /// Sender nick
        nick: String,
        /// Message text
        text: String,
    },
    /// Protocol or connection error
    Error(String),
}

/// Outgoing command handle of one IRC connection
#[async_trait]
pub trait IrcClient: Send + Sync {
    /// Join `channel`, with its key if it has one
    fn join(&self, channel: &str, key: Option<&str>) -> Result<()>;

    /// Leave `channel`
    fn part(&self, channel: &str) -> Result<()>;

    /// Send a raw protocol line
    fn send_raw(&self, line: &str) -> Result<()>;

    /// Close the connection
    async fn disconnect(&self, reason: &str) -> Result<()>;
}

/// Opens IRC connections
#[async_trait]
pub trait IrcConnector: Send + Sync {
    /// Start connecting to `hostname`
    ///
    /// Returns as soon as the handle exists; registration completes later and
    /// is reported as [`IrcEvent::Registered`].
    async fn connect(
        &self,
        hostname: &str,
        nick: &str,
        options: &ClientOptions,
        events: IrcEventSink,
    ) -> Result<Arc<dyn IrcClient>>;
}

/// Delivers protocol-client events of one network to the downloader
#[derive(Clone, Debug)]
pub struct IrcEventSink {
    network: String,
    tx: mpsc::UnboundedSender<Inbound>,
}

impl IrcEventSink {
    pub(crate) fn new(network: String, tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { network, tx }
    }

    /// Network this sink reports for
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Report an event; returns false once the downloader has shut down
    pub fn emit(&self, event: IrcEvent) -> bool {
        self.tx
            .send(Inbound::Irc {
                network: self.network.clone(),
                event,
            })
            .is_ok()
    }

    pub(crate) fn commands_sent(&self, registration: u64) {
        let sent = self.tx.send(Inbound::CommandsSent {
            network: self.network.clone(),
            registration,
        });
        if sent.is_err() {
            tracing::debug!(network = %self.network, registration, "Dropping command completion after shutdown");
        }
    }
}
