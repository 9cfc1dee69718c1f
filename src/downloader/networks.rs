//! Network registry: networks and the channels they watch.

use crate::db::NewPackOffer;
use crate::error::{Error, NetworkError, Result};
use crate::irc::{ClientOptions, IrcEventSink};
use crate::session::{
    ChannelConfig, ChannelState, PackInfoCallback, Session, SessionConfig, SessionView,
};
use crate::transfer::TransferCommand;
use crate::types::{DownloaderSnapshot, Event, NetworkSnapshot, PackInfo};
use std::collections::BTreeMap;

use super::{Inbound, Network, Registry, XdccDownloader};

/// Connection options of a network
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkOptions {
    /// Nick to register with
    pub nick: String,
    /// Raw commands sent after registration, 200ms apart
    pub commands: Vec<String>,
    /// Channels to join once registered
    pub channels: Vec<ChannelConfig>,
    /// Protocol-client options
    pub client: ClientOptions,
}

impl NetworkOptions {
    /// Options with the given nick and nothing else
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Default::default()
        }
    }
}

impl Network {
    pub(crate) fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            name: self.session.network().to_string(),
            session: self.session.view(),
            queues: self
                .queues
                .iter()
                .map(|(bot, queue)| (bot.clone(), queue.snapshots()))
                .collect(),
        }
    }
}

impl XdccDownloader {
    /// Register a network and start connecting to it
    ///
    /// The network's configuration is persisted so it is reconnected on the
    /// next boot. Announcements parsed in its observed channels are recorded
    /// in the pack store.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::InvalidName`] if `name` is empty
    /// - [`NetworkError::AlreadyExists`] if a network with this name is registered
    /// - [`Error::Pattern`](crate::Error::Pattern) if a channel pattern does not compile
    pub async fn add_network(
        &self,
        name: &str,
        hostname: &str,
        options: NetworkOptions,
    ) -> Result<SessionView> {
        self.ensure_accepting()?;
        if name.trim().is_empty() {
            return Err(NetworkError::InvalidName.into());
        }

        let config = SessionConfig {
            hostname: hostname.to_string(),
            nick: options.nick,
            commands: options.commands,
            channels: options.channels,
            client: options.client,
        };

        let mut registry = self.state.lock().await;
        if registry.networks.contains_key(name) {
            return Err(NetworkError::AlreadyExists {
                name: name.to_string(),
            }
            .into());
        }

        self.register_network(&mut registry, name, config).await?;
        let network = registry
            .networks
            .get(name)
            .ok_or_else(|| NetworkError::NotFound {
                name: name.to_string(),
            })?;
        self.db
            .save_network_config(name, &network.session.config())
            .await?;

        tracing::info!(network = %name, hostname = %hostname, "Network added");
        self.emit_event(Event::NetworkAdded {
            network: name.to_string(),
        });

        Ok(network.session.view())
    }

    /// Connect a session for `config` and insert it into the registry
    ///
    /// Channel patterns are compiled before the connection is opened.
    pub(crate) async fn register_network(
        &self,
        registry: &mut Registry,
        name: &str,
        config: SessionConfig,
    ) -> Result<()> {
        for channel in &config.channels {
            ChannelState::new(channel.clone())?;
        }

        let sink = IrcEventSink::new(name.to_string(), self.inbound_tx.clone());
        let client = self
            .collaborators
            .irc
            .connect(&config.hostname, &config.nick, &config.client, sink.clone())
            .await?;

        let network = name.to_string();
        let tx = self.inbound_tx.clone();
        let on_pack_info: PackInfoCallback = Box::new(move |info: PackInfo, channel: &str, bot: &str| {
            let offer = NewPackOffer {
                network: network.clone(),
                bot: bot.to_string(),
                channel: channel.to_string(),
                info,
            };
            if tx.send(Inbound::PackFound(offer)).is_err() {
                tracing::debug!(network = %network, "Dropping announcement after shutdown");
            }
        });

        let session = Session::from_config(name, config, client, sink, on_pack_info)?;
        registry.networks.insert(
            name.to_string(),
            Network {
                session,
                queues: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Snapshot of one network
    pub async fn get_network(&self, name: &str) -> Result<NetworkSnapshot> {
        let registry = self.state.lock().await;
        registry
            .networks
            .get(name)
            .map(Network::snapshot)
            .ok_or_else(|| {
                NetworkError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Names of all registered networks, sorted
    pub async fn networks(&self) -> Vec<String> {
        self.state.lock().await.networks.keys().cloned().collect()
    }

    /// Disconnect and forget a network
    ///
    /// Refused while any of the network's queues holds a request. The session
    /// is disconnected and, with `flush`, the network's pack history cleared;
    /// both run concurrently and must succeed before the network and its
    /// persisted configuration are deleted.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::NotFound`] if the network is not registered
    /// - [`NetworkError::PendingDownloads`] if a queue is non-empty
    pub async fn remove_network(&self, name: &str, flush: bool) -> Result<()> {
        let mut registry = self.state.lock().await;
        let network = registry
            .networks
            .get(name)
            .ok_or_else(|| NetworkError::NotFound {
                name: name.to_string(),
            })?;

        let pending = network.pending_count();
        if pending > 0 {
            return Err(NetworkError::PendingDownloads {
                name: name.to_string(),
                count: pending,
            }
            .into());
        }

        let flush_history = async {
            if flush {
                let removed = self.db.delete_packs_for_network(name).await?;
                tracing::debug!(network = %name, removed, "Flushed pack history");
            }
            Ok::<_, Error>(())
        };
        futures::future::try_join(network.session.disconnect(), flush_history).await?;

        registry.networks.remove(name);
        let stale: Vec<_> = registry
            .canceling
            .iter()
            .filter(|(_, c)| c.request.network == name)
            .map(|(transfer, _)| *transfer)
            .collect();
        for transfer in stale {
            if let Some(canceling) = registry.canceling.remove(&transfer) {
                canceling.request.signal(TransferCommand::Kill);
            }
        }
        registry.bindings.retain(|_, (network, _)| network != name);
        self.db.delete_network_config(name).await?;

        tracing::info!(network = %name, flush, "Network removed");
        self.emit_event(Event::NetworkRemoved {
            network: name.to_string(),
        });
        Ok(())
    }

    /// Add a channel to a network, or replace one with the same name
    pub async fn add_channel(&self, network: &str, channel: ChannelConfig) -> Result<()> {
        let mut registry = self.state.lock().await;
        let entry = find_network(&mut registry, network)?;
        entry.session.add_channel(channel)?;
        let config = entry.session.config();
        self.db.save_network_config(network, &config).await
    }

    /// Leave and forget a channel of a network
    pub async fn remove_channel(&self, network: &str, channel: &str) -> Result<()> {
        let mut registry = self.state.lock().await;
        let entry = find_network(&mut registry, network)?;
        entry.session.remove_channel(channel)?;
        let config = entry.session.config();
        self.db.save_network_config(network, &config).await
    }

    /// Read-only view of every network and every finished request
    pub async fn snapshot(&self) -> DownloaderSnapshot {
        let registry = self.state.lock().await;
        DownloaderSnapshot {
            networks: registry.networks.values().map(Network::snapshot).collect(),
            finished: registry.finished.iter().map(|r| r.snapshot()).collect(),
        }
    }
}

pub(crate) fn find_network<'a>(registry: &'a mut Registry, name: &str) -> Result<&'a mut Network> {
    registry.networks.get_mut(name).ok_or_else(|| {
        NetworkError::NotFound {
            name: name.to_string(),
        }
        .into()
    })
}
