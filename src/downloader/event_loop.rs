//! The single task applying every inbound event to the registry.

use crate::error::{Error, Result};
use crate::types::Event;
use tokio::sync::mpsc;

use super::{Inbound, XdccDownloader};

impl XdccDownloader {
    /// Spawn the event loop
    ///
    /// Protocol-client and transfer-engine events are queued until this is
    /// called. The loop runs until [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns an error if the loop was already started.
    pub fn start(&self) -> Result<tokio::task::JoinHandle<()>> {
        let mut rx = self.take_receiver().ok_or_else(|| Error::Config {
            message: "event loop already started".to_string(),
            key: None,
        })?;

        let downloader = self.clone();
        let token = self.shutdown_token.clone();
        Ok(tokio::spawn(async move {
            tracing::info!("Event loop started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = rx.recv() => match message {
                        Some(message) => downloader.handle_inbound(message).await,
                        None => break,
                    },
                }
            }
            tracing::info!("Event loop stopped");
        }))
    }

    pub(crate) async fn handle_inbound(&self, message: Inbound) {
        match message {
            Inbound::Irc { network, event } => {
                let mut registry = self.state.lock().await;
                let Some(entry) = registry.networks.get_mut(&network) else {
                    tracing::debug!(network = %network, event = ?event, "Ignoring event of removed network");
                    return;
                };
                if let Some(event) = entry.session.handle_event(event) {
                    self.emit_event(event);
                }
            }
            Inbound::CommandsSent {
                network,
                registration,
            } => {
                let mut registry = self.state.lock().await;
                if let Some(entry) = registry.networks.get_mut(&network) {
                    entry.session.on_commands_sent(registration);
                }
            }
            Inbound::Transfer { transfer, event } => {
                let mut registry = self.state.lock().await;
                self.handle_transfer_event(&mut registry, transfer, event)
                    .await;
            }
            Inbound::PackFound(offer) => match self.db.upsert_pack(&offer).await {
                Ok(id) => {
                    tracing::debug!(pack_id = %id, channel = %offer.channel, "Pack recorded");
                    self.emit_event(Event::PackFound { id });
                }
                Err(e) => {
                    tracing::error!(network = %offer.network, bot = %offer.bot, error = %e, "Failed to record pack offer");
                }
            },
        }
    }

    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<Inbound>> {
        match self.inbound_rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Apply every event queued so far, without a running loop
    #[cfg(test)]
    pub(crate) async fn process_pending(&self) {
        let Some(mut rx) = self.take_receiver() else {
            return;
        };
        while let Ok(message) = rx.try_recv() {
            self.handle_inbound(message).await;
        }
        if let Ok(mut slot) = self.inbound_rx.lock() {
            *slot = Some(rx);
        }
    }
}
