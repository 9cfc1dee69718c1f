//! Transfer engine event reactions, advancing and requeueing bot queues.
//!
//! Every event names the [`TransferId`] of the handle that reported it. An
//! event is applied only while that handle is still bound to a queued request
//! or parked as canceling; anything else is stale and ignored. Terminal
//! events (complete, error, canceled progress, killed) unbind the handle
//! before the queue advances, so each one advances its queue exactly once.

use crate::transfer::{TransferCommand, TransferEvent, TransferId, TransferPhase};
use crate::types::{Event, RequestStatus};

use super::{Registry, XdccDownloader};

impl XdccDownloader {
    pub(crate) async fn handle_transfer_event(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        event: TransferEvent,
    ) {
        if let Some((network, bot)) = registry.bindings.get(&transfer).cloned() {
            self.on_queued_transfer_event(registry, transfer, &network, &bot, event)
                .await;
        } else if registry.canceling.contains_key(&transfer) {
            self.on_canceling_transfer_event(registry, transfer, event)
                .await;
        } else {
            tracing::debug!(transfer = %transfer, event = ?event, "Ignoring event of stale transfer");
        }
    }

    async fn on_queued_transfer_event(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        network: &str,
        bot: &str,
        event: TransferEvent,
    ) {
        let Some(request) = registry
            .networks
            .get_mut(network)
            .and_then(|n| n.queues.get_mut(bot))
            .and_then(|q| q.by_transfer_mut(transfer))
        else {
            registry.bindings.remove(&transfer);
            return;
        };

        match event {
            TransferEvent::Connect { filename, size } => {
                if request.size.is_none() {
                    request.size = size;
                }
                tracing::debug!(pack_id = %request.id, filename = %filename, "Transfer connected");
                self.emit_event(Event::TransferConnected {
                    id: request.id.clone(),
                    filename: filename.clone(),
                });

                if request.check_filename && filename != request.name {
                    tracing::warn!(
                        pack_id = %request.id,
                        expected = %request.name,
                        offered = %filename,
                        "Offered filename does not match announcement, canceling"
                    );
                    request.status = RequestStatus::Canceled;
                    request.signal(TransferCommand::Cancel);
                    self.emit_event(Event::FilenameMismatch {
                        id: request.id.clone(),
                        expected: request.name.clone(),
                        offered: filename,
                    });
                }
            }
            TransferEvent::Progress {
                received,
                phase: TransferPhase::Canceled,
            } => {
                request.received = received;
                self.finish_canceled(registry, transfer, network, bot).await;
            }
            TransferEvent::Progress { received, .. } => {
                request.received = received;
                self.emit_event(Event::Progress {
                    id: request.id.clone(),
                    received,
                    total: request.size,
                });
            }
            TransferEvent::Message(message) => {
                tracing::debug!(pack_id = %request.id, message = %message, "Transfer message");
                request.notices.push(message.clone());
                self.emit_event(Event::TransferMessage {
                    id: request.id.clone(),
                    message,
                });
            }
            TransferEvent::Complete { path } => {
                self.on_complete(registry, transfer, network, bot, path).await;
            }
            TransferEvent::Error(error) => {
                self.on_error(registry, transfer, network, bot, error).await;
            }
            TransferEvent::Killed => {
                self.on_error(registry, transfer, network, bot, "transfer killed".to_string())
                    .await;
            }
        }
    }

    async fn on_complete(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        network: &str,
        bot: &str,
        path: std::path::PathBuf,
    ) {
        let Some(mut request) = self.take_bound(registry, transfer, network, bot) else {
            return;
        };

        if let Some(handle) = request.handle.take() {
            request.notices = handle.notices();
        }
        request.status = RequestStatus::Completed;
        if let Some(size) = request.size {
            request.received = request.received.max(size);
        }

        tracing::info!(network = %network, bot = %bot, pack_id = %request.id, path = %path.display(), "Download complete");
        self.emit_event(Event::Completed {
            id: request.id.clone(),
            path,
        });
        registry.finished.push(request);

        self.advance(registry, network, bot);
        self.persist_after_event(registry, network, bot).await;
    }

    async fn on_error(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        network: &str,
        bot: &str,
        error: String,
    ) {
        let Some(mut request) = self.take_bound(registry, transfer, network, bot) else {
            return;
        };
        request.status = RequestStatus::Errored;
        request.signal(TransferCommand::Kill);
        request.handle = None;

        tracing::warn!(network = %network, bot = %bot, pack_id = %request.id, error = %error, "Transfer failed, requeueing");
        match self.add_download_locked(registry, &request.id).await {
            Ok(_) => self.emit_event(Event::Requeued {
                id: request.id.clone(),
                error,
            }),
            Err(e) => {
                tracing::error!(pack_id = %request.id, error = %e, "Failed to requeue download, dropping it");
            }
        }

        self.advance(registry, network, bot);
        self.persist_after_event(registry, network, bot).await;
    }

    async fn finish_canceled(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        network: &str,
        bot: &str,
    ) {
        let Some(request) = self.take_bound(registry, transfer, network, bot) else {
            return;
        };
        tracing::info!(network = %network, bot = %bot, pack_id = %request.id, "Transfer canceled");
        self.emit_event(Event::Canceled {
            id: request.id.clone(),
        });

        self.advance(registry, network, bot);
        self.persist_after_event(registry, network, bot).await;
    }

    /// A transfer that was removed from its queue by a cancel reported back
    async fn on_canceling_transfer_event(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        event: TransferEvent,
    ) {
        let terminal = matches!(
            event,
            TransferEvent::Progress {
                phase: TransferPhase::Canceled,
                ..
            } | TransferEvent::Complete { .. }
                | TransferEvent::Error(_)
                | TransferEvent::Killed
        );
        if !terminal {
            return;
        }
        let Some(canceling) = registry.canceling.remove(&transfer) else {
            return;
        };

        let network = canceling.request.network;
        let bot = canceling.request.bot;
        tracing::debug!(network = %network, bot = %bot, pack_id = %canceling.request.id, "Canceled transfer stopped");
        self.advance(registry, &network, &bot);
    }

    fn take_bound(
        &self,
        registry: &mut Registry,
        transfer: TransferId,
        network: &str,
        bot: &str,
    ) -> Option<super::transfer_queue::DownloadRequest> {
        registry.bindings.remove(&transfer);
        registry
            .networks
            .get_mut(network)?
            .queues
            .get_mut(bot)?
            .take_transfer(transfer)
    }

    /// Start the new head of a queue, or drop the queue once it is empty
    ///
    /// A bot with a transfer still stopping after a cancel stays idle until
    /// that transfer reports back.
    pub(crate) fn advance(&self, registry: &mut Registry, network: &str, bot: &str) {
        let busy = registry.is_canceling(network, bot);
        let Some(entry) = registry.networks.get_mut(network) else {
            return;
        };
        let Some(queue) = entry.queues.get_mut(bot) else {
            return;
        };

        if queue.is_empty() {
            entry.queues.remove(bot);
            tracing::debug!(network = %network, bot = %bot, "Queue drained");
            return;
        }
        if busy {
            return;
        }
        if let Some(started) = queue.start_head() {
            tracing::info!(network = %network, bot = %bot, pack_id = %started, "Transfer started");
            self.emit_event(Event::Started { id: started });
        }
    }

    async fn persist_after_event(&self, registry: &Registry, network: &str, bot: &str) {
        if let Err(e) = self.persist_queue(registry, network, bot).await {
            tracing::error!(network = %network, bot = %bot, error = %e, "Failed to persist pending list");
        }
    }
}
