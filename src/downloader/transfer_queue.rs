//! Per-(network, bot) transfer queue.
//!
//! Only the head of a queue may be active. Every request owns its
//! transfer-engine handle from the moment it is enqueued until it finishes.

use std::collections::VecDeque;

use crate::db::PackOffer;
use crate::transfer::{TransferCommand, TransferHandle, TransferId};
use crate::types::{DownloadSnapshot, PackId, PendingEntry, RequestStatus};

/// One download request
pub(crate) struct DownloadRequest {
    pub(crate) id: PackId,
    pub(crate) network: String,
    pub(crate) bot: String,
    pub(crate) pack: u32,
    pub(crate) name: String,
    pub(crate) size: Option<u64>,
    pub(crate) status: RequestStatus,
    pub(crate) received: u64,
    pub(crate) transfer: TransferId,
    pub(crate) handle: Option<Box<dyn TransferHandle>>,
    pub(crate) notices: Vec<String>,
    // Snapshot of xdcc:checkFilename when the request was created
    pub(crate) check_filename: bool,
}

impl DownloadRequest {
    pub(crate) fn new(
        offer: PackOffer,
        transfer: TransferId,
        handle: Box<dyn TransferHandle>,
        check_filename: bool,
    ) -> Self {
        Self {
            id: offer.id,
            network: offer.network,
            bot: offer.bot,
            pack: offer.pack,
            name: offer.name,
            size: offer.size.filter(|s| *s >= 0.0).map(|s| s.round() as u64),
            status: RequestStatus::Queued,
            received: 0,
            transfer,
            handle: Some(handle),
            notices: Vec::new(),
            check_filename,
        }
    }

    /// Deliver a signal to the handle, logging failures
    pub(crate) fn signal(&self, command: TransferCommand) {
        let Some(handle) = &self.handle else {
            return;
        };
        if let Err(e) = handle.send(command) {
            tracing::warn!(pack_id = %self.id, command = ?command, error = %e, "Failed to signal transfer");
        }
    }

    pub(crate) fn snapshot(&self) -> DownloadSnapshot {
        DownloadSnapshot {
            id: self.id.clone(),
            network: self.network.clone(),
            bot: self.bot.clone(),
            pack: self.pack,
            name: self.name.clone(),
            size: self.size,
            status: self.status,
            received: self.received,
            notices: self.notices.clone(),
        }
    }
}

/// Ordered requests for one bot
#[derive(Default)]
pub(crate) struct TransferQueue {
    requests: VecDeque<DownloadRequest>,
}

impl TransferQueue {
    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn contains(&self, id: &PackId) -> bool {
        self.requests.iter().any(|r| &r.id == id)
    }

    pub(crate) fn get(&self, id: &PackId) -> Option<&DownloadRequest> {
        self.requests.iter().find(|r| &r.id == id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &DownloadRequest> {
        self.requests.iter()
    }

    /// Append a request, returning its position
    pub(crate) fn push_back(&mut self, request: DownloadRequest) -> usize {
        self.requests.push_back(request);
        self.requests.len() - 1
    }

    /// Remove a request by pack id, returning its former position
    pub(crate) fn remove(&mut self, id: &PackId) -> Option<(usize, DownloadRequest)> {
        let position = self.requests.iter().position(|r| &r.id == id)?;
        self.requests.remove(position).map(|r| (position, r))
    }

    /// Mutable access to the request bound to a transfer handle
    pub(crate) fn by_transfer_mut(&mut self, transfer: TransferId) -> Option<&mut DownloadRequest> {
        self.requests.iter_mut().find(|r| r.transfer == transfer)
    }

    /// Remove the request bound to a transfer handle
    pub(crate) fn take_transfer(&mut self, transfer: TransferId) -> Option<DownloadRequest> {
        let position = self.requests.iter().position(|r| r.transfer == transfer)?;
        self.requests.remove(position)
    }

    /// Start the head if it is still queued; returns its id when started
    pub(crate) fn start_head(&mut self) -> Option<PackId> {
        let head = self.requests.front_mut()?;
        if head.status != RequestStatus::Queued {
            return None;
        }
        head.status = RequestStatus::Active;
        head.signal(TransferCommand::Start);
        Some(head.id.clone())
    }

    /// Durable form of the queue, in order
    pub(crate) fn pending_entries(&self) -> Vec<PendingEntry> {
        self.requests
            .iter()
            .map(|r| PendingEntry {
                pack: r.pack,
                name: r.name.clone(),
            })
            .collect()
    }

    pub(crate) fn snapshots(&self) -> Vec<DownloadSnapshot> {
        self.requests.iter().map(DownloadRequest::snapshot).collect()
    }
}
