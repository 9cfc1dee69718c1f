//! Connection session: one IRC connection and the channels joined through it.
//!
//! A session moves from `Connecting` to `Connected` when the protocol client
//! reports registration. It then sends the configured command sequence, paced
//! by [`COMMAND_DELAY`], and joins every configured channel. Once a join is
//! acknowledged the channel is observed: announcements are parsed and handed
//! to the session's pack-info callback.

mod channels;

pub use channels::{
    ChannelConfig, ChannelState, ChannelStatus, ChannelTracker, ChannelView, channel_key,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{NetworkError, Result};
use crate::irc::{ClientOptions, IrcClient, IrcEvent, IrcEventSink};
use crate::types::{Event, PackInfo};

/// Pause after each post-registration command
pub const COMMAND_DELAY: Duration = Duration::from_millis(200);

/// Receives every parsed announcement: (record, channel, announcing nick)
pub type PackInfoCallback = Box<dyn Fn(PackInfo, &str, &str) + Send + Sync>;

/// Connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Waiting for registration
    Connecting,
    /// Registered with the server
    Connected,
}

/// Persistable session configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Server hostname
    pub hostname: String,
    /// Nick to register with
    pub nick: String,
    /// Raw commands sent after registration
    #[serde(default)]
    pub commands: Vec<String>,
    /// Channels to join
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Protocol-client options
    #[serde(default)]
    pub client: ClientOptions,
}

/// Serializable view of a session's live state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    /// Server hostname
    pub hostname: String,
    /// Current nick
    pub nick: String,
    /// Connection state
    pub status: SessionStatus,
    /// Post-registration commands
    pub commands: Vec<String>,
    /// Tracked channels
    pub channels: Vec<ChannelView>,
    /// Protocol errors received
    pub errors: Vec<String>,
    /// Notices received
    pub notices: Vec<String>,
    /// Message of the day
    pub motd: String,
}

/// One IRC connection
pub struct Session {
    network: String,
    hostname: String,
    nick: String,
    commands: Vec<String>,
    client_options: ClientOptions,
    status: SessionStatus,
    // Set once the command sequence has been flushed; joins wait for it
    ready: bool,
    registration: u64,
    client: Arc<dyn IrcClient>,
    sink: IrcEventSink,
    tracker: ChannelTracker,
    replacements: HashMap<String, ChannelConfig>,
    errors: Vec<String>,
    notices: Vec<String>,
    motd: String,
    on_pack_info: PackInfoCallback,
}

impl Session {
    /// Build a session from its configuration
    ///
    /// The session starts in `Connecting`; every channel of the configuration
    /// is tracked as not joined and will be joined after registration.
    pub fn from_config(
        network: &str,
        config: SessionConfig,
        client: Arc<dyn IrcClient>,
        sink: IrcEventSink,
        on_pack_info: PackInfoCallback,
    ) -> Result<Self> {
        let mut tracker = ChannelTracker::new();
        for channel in config.channels {
            tracker.insert(ChannelState::new(channel)?);
        }

        Ok(Self {
            network: network.to_string(),
            hostname: config.hostname,
            nick: config.nick,
            commands: config.commands,
            client_options: config.client,
            status: SessionStatus::Connecting,
            ready: false,
            registration: 0,
            client,
            sink,
            tracker,
            replacements: HashMap::new(),
            errors: Vec::new(),
            notices: Vec::new(),
            motd: String::new(),
            on_pack_info,
        })
    }

    /// Configuration to persist
    ///
    /// Channels being left are omitted; channels being replaced appear with
    /// their new configuration.
    pub fn config(&self) -> SessionConfig {
        let channels = self
            .tracker
            .iter()
            .filter_map(|state| {
                let key = state.config.key();
                match self.replacements.get(&key) {
                    Some(replacement) => Some(replacement.clone()),
                    None if state.status == ChannelStatus::Left => None,
                    None => Some(state.config.clone()),
                }
            })
            .collect();

        SessionConfig {
            hostname: self.hostname.clone(),
            nick: self.nick.clone(),
            commands: self.commands.clone(),
            channels,
            client: self.client_options.clone(),
        }
    }

    /// Serializable view of the live state
    pub fn view(&self) -> SessionView {
        SessionView {
            hostname: self.hostname.clone(),
            nick: self.nick.clone(),
            status: self.status,
            commands: self.commands.clone(),
            channels: self.tracker.views(),
            errors: self.errors.clone(),
            notices: self.notices.clone(),
            motd: self.motd.clone(),
        }
    }

    /// Network name
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Server hostname
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Current nick
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Connection state
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Channel tracker
    pub fn channels(&self) -> &ChannelTracker {
        &self.tracker
    }

    /// Protocol errors received so far
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Notices received so far
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Message of the day
    pub fn motd(&self) -> &str {
        &self.motd
    }

    /// Outgoing command handle, shared with transfer handles
    pub fn client(&self) -> Arc<dyn IrcClient> {
        Arc::clone(&self.client)
    }

    /// Add a channel, or replace the configuration of one with the same name
    ///
    /// A replaced channel that is currently joined is left first; the new
    /// configuration is joined once the part is acknowledged.
    pub fn add_channel(&mut self, config: ChannelConfig) -> Result<()> {
        let state = ChannelState::new(config.clone())?;
        let key = config.key();

        let leave_first = self.ready
            && self.tracker.get(&key).is_some_and(|existing| {
                matches!(
                    existing.status,
                    ChannelStatus::Joining | ChannelStatus::Joined | ChannelStatus::Left
                )
            });

        if leave_first {
            let already_leaving = self
                .tracker
                .get(&key)
                .is_some_and(|existing| existing.status == ChannelStatus::Left);
            if !already_leaving {
                self.leave(&key);
            }
            self.replacements.insert(key, config);
            return Ok(());
        }

        self.replacements.remove(&key);
        self.tracker.insert(state);
        if self.ready {
            self.join(&key);
        }
        Ok(())
    }

    /// Leave and forget a channel
    pub fn remove_channel(&mut self, name: &str) -> Result<()> {
        let Some(status) = self.tracker.get(name).map(|state| state.status) else {
            return Err(NetworkError::ChannelNotFound {
                network: self.network.clone(),
                channel: name.to_string(),
            }
            .into());
        };

        self.replacements.remove(&channel_key(name));
        match status {
            ChannelStatus::Joining | ChannelStatus::Joined if self.ready => self.leave(name),
            ChannelStatus::Left => {}
            _ => {
                self.tracker.remove(name);
            }
        }
        Ok(())
    }

    /// Start parsing announcements of a channel
    ///
    /// Returns false if the channel is unknown or was already observed.
    pub fn observe(&mut self, name: &str) -> bool {
        match self.tracker.get_mut(name) {
            Some(state) if !state.observed => {
                state.observed = true;
                tracing::debug!(network = %self.network, channel = %state.config.name, "Observing channel");
                true
            }
            _ => false,
        }
    }

    /// Close the connection
    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect("leaving").await
    }

    /// React to a protocol-client event
    ///
    /// Returns the downloader event to broadcast, if any.
    pub fn handle_event(&mut self, event: IrcEvent) -> Option<Event> {
        match event {
            IrcEvent::Registered { nick } => Some(self.on_registered(nick)),
            IrcEvent::Motd(text) => {
                if !self.motd.is_empty() {
                    self.motd.push('\n');
                }
                self.motd.push_str(&text);
                None
            }
            IrcEvent::Topic { channel, topic } => {
                self.tracker.set_topic(&channel, &topic);
                None
            }
            IrcEvent::Join { channel, nick } => self.on_join(&channel, &nick),
            IrcEvent::Part { channel, nick } => self.on_part(&channel, &nick),
            IrcEvent::Kick {
                channel,
                nick,
                by,
                reason,
            } => self.on_kick(&channel, &nick, by, reason),
            IrcEvent::Notice { from, text } | IrcEvent::CtcpNotice { from, text } => {
                self.notices.push(format!("{}: {}", from, text));
                None
            }
            IrcEvent::Message {
                channel,
                nick,
                text,
            } => {
                self.on_message(&channel, &nick, &text);
                None
            }
            IrcEvent::Error(message) => {
                tracing::warn!(network = %self.network, error = %message, "IRC error");
                self.errors.push(message);
                None
            }
        }
    }

    /// Join every configured channel once the command sequence was sent
    ///
    /// Completions from an earlier registration are ignored.
    pub fn on_commands_sent(&mut self, registration: u64) {
        if registration != self.registration || self.status != SessionStatus::Connected {
            return;
        }
        self.ready = true;

        let pending: Vec<String> = self
            .tracker
            .iter()
            .filter(|state| state.status == ChannelStatus::NotJoined)
            .map(|state| state.config.key())
            .collect();
        for key in pending {
            self.join(&key);
        }
    }

    fn on_registered(&mut self, nick: String) -> Event {
        tracing::info!(network = %self.network, nick = %nick, "Registered");

        self.status = SessionStatus::Connected;
        self.nick = nick.clone();
        self.ready = false;
        self.registration += 1;

        // A new registration means a fresh connection: nothing is joined any more
        for state in self.tracker.iter_mut() {
            state.status = ChannelStatus::NotJoined;
            state.observed = false;
        }
        for (key, replacement) in self.replacements.drain() {
            match ChannelState::new(replacement) {
                Ok(state) => {
                    self.tracker.insert(state);
                }
                Err(e) => {
                    tracing::warn!(network = %self.network, channel = %key, error = %e, "Dropping invalid channel");
                }
            }
        }

        let client = Arc::clone(&self.client);
        let commands = self.commands.clone();
        let sink = self.sink.clone();
        let registration = self.registration;
        tokio::spawn(async move {
            for command in &commands {
                if let Err(e) = client.send_raw(command) {
                    tracing::warn!(network = %sink.network(), error = %e, "Failed to send command");
                }
                tokio::time::sleep(COMMAND_DELAY).await;
            }
            sink.commands_sent(registration);
        });

        Event::Registered {
            network: self.network.clone(),
            nick,
        }
    }

    fn on_join(&mut self, channel: &str, nick: &str) -> Option<Event> {
        if !nick.eq_ignore_ascii_case(&self.nick) {
            return None;
        }
        let state = self.tracker.get_mut(channel)?;
        state.status = ChannelStatus::Joined;
        let name = state.config.name.clone();
        self.observe(channel);

        tracing::info!(network = %self.network, channel = %name, "Joined channel");
        Some(Event::ChannelJoined {
            network: self.network.clone(),
            channel: name,
        })
    }

    fn on_part(&mut self, channel: &str, nick: &str) -> Option<Event> {
        if !nick.eq_ignore_ascii_case(&self.nick) {
            return None;
        }
        let removed = self.tracker.remove(channel)?;
        tracing::info!(network = %self.network, channel = %removed.config.name, "Left channel");

        if let Some(replacement) = self.replacements.remove(&channel_key(channel)) {
            match ChannelState::new(replacement) {
                Ok(state) => {
                    let key = state.config.key();
                    self.tracker.insert(state);
                    self.join(&key);
                }
                Err(e) => {
                    tracing::warn!(network = %self.network, channel = %channel, error = %e, "Dropping invalid channel");
                }
            }
        }

        Some(Event::ChannelLeft {
            network: self.network.clone(),
            channel: removed.config.name,
        })
    }

    fn on_kick(
        &mut self,
        channel: &str,
        nick: &str,
        by: String,
        reason: Option<String>,
    ) -> Option<Event> {
        if !nick.eq_ignore_ascii_case(&self.nick) {
            return None;
        }
        let state = self.tracker.get_mut(channel)?;
        state.status = ChannelStatus::Kicked;
        state.observed = false;
        let name = state.config.name.clone();

        tracing::warn!(network = %self.network, channel = %name, by = %by, "Kicked from channel");
        Some(Event::Kicked {
            network: self.network.clone(),
            channel: name,
            by,
            reason,
        })
    }

    fn on_message(&self, channel: &str, nick: &str, text: &str) {
        let Some(state) = self.tracker.get(channel) else {
            return;
        };
        if !state.observed {
            return;
        }
        if let Some(info) = state.parser.parse(text) {
            tracing::debug!(network = %self.network, channel = %state.config.name, bot = %nick, pack = info.pack, "Pack announced");
            (self.on_pack_info)(info, &state.config.name, nick);
        }
    }

    fn join(&mut self, key: &str) {
        let Some(state) = self.tracker.get_mut(key) else {
            return;
        };
        state.status = ChannelStatus::Joining;
        if let Err(e) = self
            .client
            .join(&state.config.name, state.config.password.as_deref())
        {
            tracing::warn!(network = %self.network, channel = %state.config.name, error = %e, "Failed to join channel");
            state.status = ChannelStatus::NotJoined;
            self.errors.push(e.to_string());
        }
    }

    fn leave(&mut self, key: &str) {
        let Some(state) = self.tracker.get_mut(key) else {
            return;
        };
        state.status = ChannelStatus::Left;
        state.observed = false;
        if let Err(e) = self.client.part(&state.config.name) {
            tracing::warn!(network = %self.network, channel = %state.config.name, error = %e, "Failed to part channel");
            self.errors.push(e.to_string());
        }
    }
}
