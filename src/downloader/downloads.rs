//! Download requests: enqueue, cancel and inspect.

use crate::db::PackOffer;
use crate::error::{DownloadError, NetworkError, Result};
use crate::transfer::{TransferCommand, TransferEventSink, TransferPhase, TransferRequest};
use crate::types::{DownloadSnapshot, Event, PackId, RequestStatus};

use super::networks::find_network;
use super::transfer_queue::DownloadRequest;
use super::{Canceling, Registry, XdccDownloader};

impl XdccDownloader {
    /// Enqueue a pack previously recorded from an announcement
    ///
    /// The request is appended to its bot's queue and started right away when
    /// the queue was empty. Enqueuing a pack that is already queued does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::PackNotFound`] if the pack store has no offer
    /// with this id or its network is not registered.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use xdcc_dl::*;
    /// # async fn example(downloader: XdccDownloader) -> Result<()> {
    /// let id = PackId::new("rizon", "Ginpachi-Sensei", 42);
    /// downloader.add_download(&id).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_download(&self, id: &PackId) -> Result<()> {
        self.ensure_accepting()?;
        let mut registry = self.state.lock().await;
        if let Some((network, bot)) = self.add_download_locked(&mut registry, id).await? {
            self.persist_queue(&registry, &network, &bot).await?;
        }
        Ok(())
    }

    /// Enqueue without writing the pending list
    ///
    /// Returns the (network, bot) of the queue the request was appended to, or
    /// `None` when it was already queued.
    pub(crate) async fn add_download_locked(
        &self,
        registry: &mut Registry,
        id: &PackId,
    ) -> Result<Option<(String, String)>> {
        let offer = self.db.get_pack(id).await?.ok_or_else(|| pack_not_found(id))?;
        let network = registry
            .networks
            .get(&offer.network)
            .ok_or_else(|| pack_not_found(id))?;

        if network
            .queues
            .get(&offer.bot)
            .is_some_and(|queue| queue.contains(id))
        {
            tracing::debug!(pack_id = %id, "Pack already queued");
            return Ok(None);
        }

        let settings = self.transfer_settings().await?;
        let transfer = self.next_transfer_id();
        let handle = self.collaborators.transfers.create(
            network.session.client(),
            TransferRequest::new(&settings, &offer.bot, offer.pack),
            TransferEventSink::new(transfer, self.inbound_tx.clone()),
        )?;

        let network_name = offer.network.clone();
        let bot = offer.bot.clone();
        let busy = registry.is_canceling(&network_name, &bot);
        let request = DownloadRequest::new(offer, transfer, handle, settings.check_filename);

        let network = find_network(registry, &network_name)?;
        let queue = network.queues.entry(bot.clone()).or_default();
        let was_empty = queue.is_empty();
        let position = queue.push_back(request);
        let started = if was_empty && !busy {
            queue.start_head()
        } else {
            None
        };
        registry
            .bindings
            .insert(transfer, (network_name.clone(), bot.clone()));

        tracing::info!(network = %network_name, bot = %bot, pack_id = %id, position, "Download queued");
        self.emit_event(Event::Queued {
            id: id.clone(),
            position,
        });
        if let Some(started) = started {
            tracing::info!(network = %network_name, bot = %bot, pack_id = %started, "Transfer started");
            self.emit_event(Event::Started { id: started });
        }

        Ok(Some((network_name, bot)))
    }

    /// Remove a request from its bot's queue
    ///
    /// An active request whose transfer already left the `Created` phase is
    /// canceled gracefully; any other request's transfer is killed. The queue
    /// moves on once the transfer engine reports the stop.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::NotFound`] if the network is not registered
    /// - [`DownloadError::QueueNotFound`] if the bot has no queue
    /// - [`DownloadError::NotQueued`] if the request is not in the queue
    pub async fn cancel_download(&self, network: &str, bot: &str, id: &PackId) -> Result<()> {
        let mut registry = self.state.lock().await;
        let entry = find_network(&mut registry, network)?;
        let queue = entry
            .queues
            .get_mut(bot)
            .ok_or_else(|| DownloadError::QueueNotFound {
                network: network.to_string(),
                bot: bot.to_string(),
            })?;
        let (position, mut request) = queue.remove(id).ok_or_else(|| DownloadError::NotQueued {
            id: id.to_string(),
        })?;

        registry.bindings.remove(&request.transfer);
        // A head canceled after a filename mismatch is still stopping
        let stopping = position == 0 && request.status == RequestStatus::Canceled;
        let was_active = request.status == RequestStatus::Active;
        request.status = RequestStatus::Canceled;

        if stopping {
            tracing::info!(network = %network, bot = %bot, pack_id = %id, "Transfer already stopping");
            registry
                .canceling
                .insert(request.transfer, Canceling { request });
        } else if was_active {
            let phase = request
                .handle
                .as_ref()
                .map(|handle| handle.phase())
                .unwrap_or(TransferPhase::Created);
            let command = if phase == TransferPhase::Created {
                TransferCommand::Kill
            } else {
                TransferCommand::Cancel
            };
            request.signal(command);
            tracing::info!(network = %network, bot = %bot, pack_id = %id, command = ?command, "Canceling active transfer");
            registry
                .canceling
                .insert(request.transfer, Canceling { request });
        } else {
            request.signal(TransferCommand::Kill);
            tracing::info!(network = %network, bot = %bot, pack_id = %id, position, "Removed queued download");
        }

        self.emit_event(Event::Canceled { id: id.clone() });
        self.persist_queue(&registry, network, bot).await
    }

    /// Snapshot of one queued request
    pub async fn get_download(
        &self,
        network: &str,
        bot: &str,
        id: &PackId,
    ) -> Result<DownloadSnapshot> {
        let registry = self.state.lock().await;
        let entry = registry
            .networks
            .get(network)
            .ok_or_else(|| NetworkError::NotFound {
                name: network.to_string(),
            })?;
        let queue = entry
            .queues
            .get(bot)
            .ok_or_else(|| DownloadError::QueueNotFound {
                network: network.to_string(),
                bot: bot.to_string(),
            })?;
        queue
            .get(id)
            .map(DownloadRequest::snapshot)
            .ok_or_else(|| {
                DownloadError::NotQueued {
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// Completed requests, oldest first
    pub async fn finished(&self) -> Vec<DownloadSnapshot> {
        let registry = self.state.lock().await;
        registry.finished.iter().map(DownloadRequest::snapshot).collect()
    }

    /// Forget completed requests, returning how many were dropped
    pub async fn clear_finished(&self) -> usize {
        let mut registry = self.state.lock().await;
        let count = registry.finished.len();
        registry.finished.clear();
        count
    }

    /// Search recorded pack offers by filename
    ///
    /// `query` is matched as a case-insensitive substring; `network` limits the
    /// search to one network.
    pub async fn search_packs(&self, network: Option<&str>, query: &str) -> Result<Vec<PackOffer>> {
        self.db.search_packs(network, query).await
    }

    /// Look up one recorded pack offer
    pub async fn get_pack(&self, id: &PackId) -> Result<Option<PackOffer>> {
        self.db.get_pack(id).await
    }
}

fn pack_not_found(id: &PackId) -> crate::error::Error {
    DownloadError::PackNotFound { id: id.to_string() }.into()
}
