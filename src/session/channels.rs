//! Channel state tracking for one IRC connection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::parser::{AnnouncementParser, DEFAULT_FIELDS, DEFAULT_PATTERN};

/// Channel configuration as persisted with the network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name (matched case-insensitively)
    pub name: String,

    /// Join key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Announcement pattern
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Field names for the pattern's capture groups, in order
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,
}

impl ChannelConfig {
    /// Channel without a key, using the default announcement pattern
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: None,
            pattern: default_pattern(),
            fields: default_fields(),
        }
    }

    /// Set the join key
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set a custom announcement pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>, fields: &[&str]) -> Self {
        self.pattern = pattern.into();
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Tracker key of this channel
    pub fn key(&self) -> String {
        channel_key(&self.name)
    }
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

/// Lowercased channel name used as tracker key
pub fn channel_key(name: &str) -> String {
    name.to_lowercase()
}

/// Membership status of a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Known but no JOIN sent
    NotJoined,
    /// JOIN sent, waiting for acknowledgement
    Joining,
    /// JOIN acknowledged
    Joined,
    /// PART sent, waiting for acknowledgement
    Left,
    /// We were kicked
    Kicked,
}

/// Live state of one channel
#[derive(Clone, Debug)]
pub struct ChannelState {
    /// Configuration the channel was added with
    pub config: ChannelConfig,
    /// Current topic
    pub topic: Option<String>,
    /// Membership status
    pub status: ChannelStatus,
    /// Whether announcements are being parsed
    pub observed: bool,
    pub(crate) parser: AnnouncementParser,
}

impl ChannelState {
    /// Compile the channel's pattern; fails on an invalid regex
    pub fn new(config: ChannelConfig) -> Result<Self> {
        let parser = AnnouncementParser::new(&config.pattern, &config.fields)?;
        Ok(Self {
            config,
            topic: None,
            status: ChannelStatus::NotJoined,
            observed: false,
            parser,
        })
    }
}

/// Serializable view of a channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelView {
    /// Channel name
    pub name: String,
    /// Membership status
    pub status: ChannelStatus,
    /// Current topic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Whether announcements are being parsed
    pub observed: bool,
}

/// Channel membership and topics of one connection
#[derive(Clone, Debug, Default)]
pub struct ChannelTracker {
    channels: BTreeMap<String, ChannelState>,
}

impl ChannelTracker {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a channel, returning the previous state
    pub fn insert(&mut self, state: ChannelState) -> Option<ChannelState> {
        self.channels.insert(state.config.key(), state)
    }

    /// Remove a channel
    pub fn remove(&mut self, name: &str) -> Option<ChannelState> {
        self.channels.remove(&channel_key(name))
    }

    /// Look up a channel (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&ChannelState> {
        self.channels.get(&channel_key(name))
    }

    /// Look up a channel mutably (case-insensitive)
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ChannelState> {
        self.channels.get_mut(&channel_key(name))
    }

    /// Whether the channel is tracked
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(&channel_key(name))
    }

    /// Update a channel's topic; unknown channels are ignored
    pub fn set_topic(&mut self, name: &str, topic: &str) {
        if let Some(state) = self.get_mut(name) {
            state.topic = Some(topic.to_string());
        }
    }

    /// Iterate channels in key order
    pub fn iter(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.values()
    }

    /// Iterate channels mutably in key order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelState> {
        self.channels.values_mut()
    }

    /// Number of tracked channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is tracked
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Serializable view of every channel
    pub fn views(&self) -> Vec<ChannelView> {
        self.iter()
            .map(|state| ChannelView {
                name: state.config.name.clone(),
                status: state.status,
                topic: state.topic.clone(),
                observed: state.observed,
            })
            .collect()
    }
}
