//! Shared test helpers: in-memory protocol client and transfer engine, plus
//! constructors for XdccDownloader instances backed by a throwaway database.

use crate::config::Config;
use crate::db::NewPackOffer;
use crate::downloader::{Collaborators, NetworkOptions, XdccDownloader};
use crate::error::{Error, Result};
use crate::irc::{ClientOptions, IrcClient, IrcConnector, IrcEvent, IrcEventSink};
use crate::session::ChannelConfig;
use crate::transfer::{
    TransferCommand, TransferEngine, TransferEvent, TransferEventSink, TransferHandle, TransferId,
    TransferPhase, TransferRequest,
};
use crate::types::{PackId, PackInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

/// Command received by a mock protocol client
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ClientCall {
    Join { channel: String, key: Option<String> },
    Part(String),
    Raw(String, tokio::time::Instant),
    Disconnect,
}

#[derive(Default)]
pub(crate) struct MockIrcClient {
    calls: Mutex<Vec<ClientCall>>,
}

impl MockIrcClient {
    pub(crate) fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn joins(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClientCall::Join { channel, .. } => Some(channel),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn parts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClientCall::Part(channel) => Some(channel),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ClientCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IrcClient for MockIrcClient {
    fn join(&self, channel: &str, key: Option<&str>) -> Result<()> {
        self.record(ClientCall::Join {
            channel: channel.to_string(),
            key: key.map(str::to_string),
        });
        Ok(())
    }

    fn part(&self, channel: &str) -> Result<()> {
        self.record(ClientCall::Part(channel.to_string()));
        Ok(())
    }

    fn send_raw(&self, line: &str) -> Result<()> {
        self.record(ClientCall::Raw(line.to_string(), tokio::time::Instant::now()));
        Ok(())
    }

    async fn disconnect(&self, _reason: &str) -> Result<()> {
        self.record(ClientCall::Disconnect);
        Ok(())
    }
}

/// Protocol-client connector keeping every connection it opened
#[derive(Default)]
pub(crate) struct MockIrcConnector {
    connections: Mutex<HashMap<String, (IrcEventSink, Arc<MockIrcClient>)>>,
}

impl MockIrcConnector {
    pub(crate) fn sink(&self, network: &str) -> IrcEventSink {
        self.connections.lock().unwrap()[network].0.clone()
    }

    pub(crate) fn client(&self, network: &str) -> Arc<MockIrcClient> {
        Arc::clone(&self.connections.lock().unwrap()[network].1)
    }

    pub(crate) fn connected(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl IrcConnector for MockIrcConnector {
    async fn connect(
        &self,
        hostname: &str,
        _nick: &str,
        _options: &ClientOptions,
        events: IrcEventSink,
    ) -> Result<Arc<dyn IrcClient>> {
        if hostname.is_empty() {
            return Err(Error::Irc("no hostname".to_string()));
        }
        let client = Arc::new(MockIrcClient::default());
        self.connections
            .lock()
            .unwrap()
            .insert(events.network().to_string(), (events, Arc::clone(&client)));
        Ok(client)
    }
}

/// State shared between a mock handle and the test observing it
pub(crate) struct MockHandleState {
    pub(crate) phase: Mutex<TransferPhase>,
    pub(crate) commands: Mutex<Vec<TransferCommand>>,
    pub(crate) notices: Mutex<Vec<String>>,
}

impl MockHandleState {
    pub(crate) fn commands(&self) -> Vec<TransferCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn set_phase(&self, phase: TransferPhase) {
        *self.phase.lock().unwrap() = phase;
    }
}

struct MockTransferHandle {
    state: Arc<MockHandleState>,
}

impl TransferHandle for MockTransferHandle {
    fn send(&self, command: TransferCommand) -> Result<()> {
        self.state.commands.lock().unwrap().push(command);
        if command == TransferCommand::Start {
            self.state.set_phase(TransferPhase::Requested);
        }
        Ok(())
    }

    fn phase(&self) -> TransferPhase {
        *self.state.phase.lock().unwrap()
    }

    fn notices(&self) -> Vec<String> {
        self.state.notices.lock().unwrap().clone()
    }
}

/// One handle created by the mock engine
#[derive(Clone)]
pub(crate) struct CreatedTransfer {
    pub(crate) id: TransferId,
    pub(crate) request: TransferRequest,
    pub(crate) state: Arc<MockHandleState>,
    pub(crate) sink: TransferEventSink,
}

impl CreatedTransfer {
    pub(crate) fn emit(&self, event: TransferEvent) {
        assert!(self.sink.emit(event));
    }
}

/// Transfer engine that only records handles; tests drive their events
#[derive(Default)]
pub(crate) struct MockTransferEngine {
    created: Mutex<Vec<CreatedTransfer>>,
}

impl MockTransferEngine {
    pub(crate) fn created(&self) -> Vec<CreatedTransfer> {
        self.created.lock().unwrap().clone()
    }

    /// Most recent handle created for `pack` from `bot`
    pub(crate) fn latest(&self, bot: &str, pack: u32) -> CreatedTransfer {
        self.created()
            .into_iter()
            .rev()
            .find(|t| t.request.bot == bot && t.request.pack == pack)
            .unwrap_or_else(|| panic!("no transfer created for {}#{}", bot, pack))
    }
}

impl TransferEngine for MockTransferEngine {
    fn create(
        &self,
        _client: Arc<dyn IrcClient>,
        request: TransferRequest,
        events: TransferEventSink,
    ) -> Result<Box<dyn TransferHandle>> {
        let state = Arc::new(MockHandleState {
            phase: Mutex::new(TransferPhase::Created),
            commands: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(CreatedTransfer {
            id: events.transfer(),
            request,
            state: Arc::clone(&state),
            sink: events,
        });
        Ok(Box::new(MockTransferHandle { state }))
    }
}

/// The mock collaborators behind one downloader
#[derive(Clone, Default)]
pub(crate) struct Mocks {
    pub(crate) irc: Arc<MockIrcConnector>,
    pub(crate) transfers: Arc<MockTransferEngine>,
}

impl Mocks {
    fn collaborators(&self) -> Collaborators {
        Collaborators {
            irc: self.irc.clone(),
            transfers: self.transfers.clone(),
        }
    }
}

pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.transfer.download_dir = temp_dir.path().join("downloads");
    config
}

/// Boot a downloader over the database in `temp_dir`, replaying whatever it holds
pub(crate) async fn boot_downloader(temp_dir: &TempDir) -> (XdccDownloader, Mocks) {
    let mocks = Mocks::default();
    let downloader = XdccDownloader::new(test_config(temp_dir), mocks.collaborators())
        .await
        .unwrap();
    (downloader, mocks)
}

/// Helper to create a test XdccDownloader instance with a persistent database.
/// Returns the downloader, the tempdir (which must be kept alive) and the mocks.
pub(crate) async fn create_test_downloader() -> (XdccDownloader, TempDir, Mocks) {
    let temp_dir = tempdir().unwrap();
    let (downloader, mocks) = boot_downloader(&temp_dir).await;
    (downloader, temp_dir, mocks)
}

/// Register `network` with one channel and report its registration
pub(crate) async fn add_registered_network(
    downloader: &XdccDownloader,
    mocks: &Mocks,
    network: &str,
) {
    let mut options = NetworkOptions::new("leech");
    options.channels = vec![ChannelConfig::new("#packs")];
    downloader
        .add_network(network, &format!("irc.{}.net", network), options)
        .await
        .unwrap();
    mocks.irc.sink(network).emit(IrcEvent::Registered {
        nick: "leech".to_string(),
    });
    // The command sequence runs on its own task before channels are joined
    for _ in 0..5 {
        downloader.process_pending().await;
        tokio::task::yield_now().await;
    }
    downloader.process_pending().await;
}

/// Record a pack offer in the pack store, as if announced in #packs
pub(crate) async fn seed_pack(
    downloader: &XdccDownloader,
    network: &str,
    bot: &str,
    pack: u32,
    name: &str,
) -> PackId {
    downloader
        .db
        .upsert_pack(&NewPackOffer {
            network: network.to_string(),
            bot: bot.to_string(),
            channel: "#packs".to_string(),
            info: PackInfo {
                pack,
                name: Some(name.to_string()),
                size: Some(1024.0),
                ..Default::default()
            },
        })
        .await
        .unwrap()
}
