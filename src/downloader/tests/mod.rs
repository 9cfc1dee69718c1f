use super::test_helpers::*;
use super::*;
use crate::config::setting_keys;
use crate::error::{DownloadError, NetworkError};
use crate::irc::IrcEvent;
use crate::session::{ChannelConfig, SessionStatus};
use crate::transfer::{TransferCommand, TransferEvent, TransferPhase};
use crate::types::{Event, PackId, PendingEntry, RequestStatus};
use std::path::PathBuf;

mod networks;

/// Let spawned session tasks run, then apply everything they queued
async fn settle(downloader: &XdccDownloader) {
    for _ in 0..5 {
        tokio::task::yield_now().await;
        downloader.process_pending().await;
    }
}

fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Statuses of one bot's queue, head first
async fn queue_statuses(downloader: &XdccDownloader, network: &str, bot: &str) -> Vec<(u32, RequestStatus)> {
    let snapshot = downloader.get_network(network).await.unwrap();
    snapshot
        .queues
        .get(bot)
        .map(|queue| queue.iter().map(|d| (d.pack, d.status)).collect())
        .unwrap_or_default()
}

fn entries(packs: &[(u32, &str)]) -> Vec<PendingEntry> {
    packs
        .iter()
        .map(|(pack, name)| PendingEntry {
            pack: *pack,
            name: name.to_string(),
        })
        .collect()
}

/// Registered network with two packs of the same bot enqueued
async fn two_queued(downloader: &XdccDownloader, mocks: &Mocks) -> (PackId, PackId) {
    add_registered_network(downloader, mocks, "rizon").await;
    let first = seed_pack(downloader, "rizon", "Bot", 1, "one.mkv").await;
    let second = seed_pack(downloader, "rizon", "Bot", 2, "two.mkv").await;
    downloader.add_download(&first).await.unwrap();
    downloader.add_download(&second).await.unwrap();
    (first, second)
}
