//! Boot recovery and graceful shutdown.

use crate::error::Result;
use crate::transfer::TransferCommand;
use crate::types::{Event, PackId};

use super::XdccDownloader;

impl XdccDownloader {
    /// Rebuild the registry from the configuration store
    ///
    /// Every persisted network is reconnected, then every persisted pending
    /// entry is enqueued again in order without rewriting its pending list.
    /// The first entry of each list lands in an empty queue and starts, the
    /// rest queue behind it. Entries that can no longer be enqueued are
    /// logged and skipped.
    pub(crate) async fn restore(&self) -> Result<()> {
        let configs = self.db.load_network_configs().await?;
        let pending = self.db.load_pending().await?;

        let mut registry = self.state.lock().await;
        for (name, config) in configs {
            match self.register_network(&mut registry, &name, config).await {
                Ok(()) => tracing::info!(network = %name, "Restored network"),
                Err(e) => {
                    tracing::warn!(network = %name, error = %e, "Failed to restore network");
                }
            }
        }

        let mut restored = 0usize;
        for (network, bot, entries) in pending {
            for entry in entries {
                let id = PackId::new(&network, &bot, entry.pack);
                match self.add_download_locked(&mut registry, &id).await {
                    Ok(_) => restored += 1,
                    Err(e) => {
                        tracing::warn!(pack_id = %id, name = %entry.name, error = %e, "Failed to restore pending download");
                    }
                }
            }
        }

        tracing::info!(
            networks = registry.networks.len(),
            downloads = restored,
            "Restored state from database"
        );
        Ok(())
    }

    /// Gracefully shut down the downloader
    ///
    /// Stops accepting new work, kills every live transfer and disconnects
    /// every session. Pending lists are left untouched, so the next boot
    /// resumes every queue where it stopped.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);

        let mut registry = self.state.lock().await;
        let mut killed = 0usize;
        for network in registry.networks.values() {
            for queue in network.queues.values() {
                for request in queue.iter() {
                    request.signal(TransferCommand::Kill);
                    killed += 1;
                }
            }
        }
        for (_, canceling) in registry.canceling.drain() {
            canceling.request.signal(TransferCommand::Kill);
            killed += 1;
        }
        registry.bindings.clear();
        tracing::info!(killed, "Killed live transfers");

        for network in registry.networks.values() {
            if let Err(e) = network.session.disconnect().await {
                tracing::warn!(network = %network.session.network(), error = %e, "Failed to disconnect");
            }
        }
        drop(registry);

        self.shutdown_token.cancel();
        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
