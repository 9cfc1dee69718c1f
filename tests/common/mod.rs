//! Common test utilities for xdcc-dl integration tests
//!
//! Stand-ins for the protocol client and the transfer engine, written against
//! the public collaborator traits only.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use xdcc_dl::{
    ClientOptions, Collaborators, Config, Event, IrcClient, IrcConnector, IrcEventSink, Result,
    TransferCommand, TransferEngine, TransferEventSink, TransferHandle, TransferPhase,
    TransferRequest, XdccDownloader,
};

struct NullClient;

#[async_trait]
impl IrcClient for NullClient {
    fn join(&self, _channel: &str, _key: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn part(&self, _channel: &str) -> Result<()> {
        Ok(())
    }

    fn send_raw(&self, _line: &str) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self, _reason: &str) -> Result<()> {
        Ok(())
    }
}

/// Connector that hands every sink back to the test
#[derive(Default)]
pub struct ScriptedIrc {
    sinks: Mutex<HashMap<String, IrcEventSink>>,
}

impl ScriptedIrc {
    /// Event sink of a connected network
    pub fn sink(&self, network: &str) -> IrcEventSink {
        self.sinks.lock().unwrap()[network].clone()
    }
}

#[async_trait]
impl IrcConnector for ScriptedIrc {
    async fn connect(
        &self,
        _hostname: &str,
        _nick: &str,
        _options: &ClientOptions,
        events: IrcEventSink,
    ) -> Result<Arc<dyn IrcClient>> {
        self.sinks
            .lock()
            .unwrap()
            .insert(events.network().to_string(), events);
        Ok(Arc::new(NullClient))
    }
}

struct ScriptedHandle {
    started: Arc<Mutex<bool>>,
}

impl TransferHandle for ScriptedHandle {
    fn send(&self, command: TransferCommand) -> Result<()> {
        if command == TransferCommand::Start {
            *self.started.lock().unwrap() = true;
        }
        Ok(())
    }

    fn phase(&self) -> TransferPhase {
        if *self.started.lock().unwrap() {
            TransferPhase::Requested
        } else {
            TransferPhase::Created
        }
    }

    fn notices(&self) -> Vec<String> {
        vec!["** Sending you pack".to_string()]
    }
}

/// A handle the scripted engine created
#[derive(Clone)]
pub struct ScriptedTransfer {
    pub request: TransferRequest,
    pub sink: TransferEventSink,
    pub started: Arc<Mutex<bool>>,
}

/// Transfer engine whose handles only move when the test emits events
#[derive(Default)]
pub struct ScriptedEngine {
    transfers: Mutex<Vec<ScriptedTransfer>>,
}

impl ScriptedEngine {
    /// Most recent handle for `pack`
    pub fn latest(&self, pack: u32) -> ScriptedTransfer {
        self.transfers
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|t| t.request.pack == pack)
            .cloned()
            .unwrap()
    }

    /// Number of handles created so far
    pub fn count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

impl TransferEngine for ScriptedEngine {
    fn create(
        &self,
        _client: Arc<dyn IrcClient>,
        request: TransferRequest,
        events: TransferEventSink,
    ) -> Result<Box<dyn TransferHandle>> {
        let started = Arc::new(Mutex::new(false));
        self.transfers.lock().unwrap().push(ScriptedTransfer {
            request,
            sink: events,
            started: Arc::clone(&started),
        });
        Ok(Box::new(ScriptedHandle { started }))
    }
}

/// Downloader over the database in `temp_dir`, with its event loop running
pub async fn start_downloader(
    temp_dir: &TempDir,
) -> (XdccDownloader, Arc<ScriptedIrc>, Arc<ScriptedEngine>) {
    let irc = Arc::new(ScriptedIrc::default());
    let engine = Arc::new(ScriptedEngine::default());

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("xdcc-dl.db");
    config.transfer.download_dir = temp_dir.path().join("downloads");

    let downloader = XdccDownloader::new(
        config,
        Collaborators {
            irc: irc.clone(),
            transfers: engine.clone(),
        },
    )
    .await
    .unwrap();
    downloader.start().unwrap();
    (downloader, irc, engine)
}

/// Wait for the first event matching `pred`
pub async fn wait_for_event<F>(events: &mut broadcast::Receiver<Event>, mut pred: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .unwrap()
}
