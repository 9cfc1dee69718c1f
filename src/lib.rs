//! # xdcc-dl
//!
//! Backend library for multi-network IRC XDCC download managers.
//!
//! ## Design Philosophy
//!
//! xdcc-dl is designed to be:
//! - **Durable** - Networks and pending downloads survive restarts
//! - **Self-healing** - Failed transfers are requeued automatically
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The IRC wire protocol and the byte-level DCC transfer are supplied by the
//! embedding application through [`IrcConnector`] and [`TransferEngine`].
//! xdcc-dl joins channels, parses pack announcements, keeps one queue per bot
//! and drives one transfer at a time per queue.
//!
//! ## Quick Start
//!
//! ```no_run
//! use xdcc_dl::{ChannelConfig, Collaborators, Config, NetworkOptions, XdccDownloader};
//!
//! # async fn example(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = XdccDownloader::new(Config::default(), collaborators).await?;
//! downloader.start()?;
//!
//! let mut options = NetworkOptions::new("leech");
//! options.channels = vec![ChannelConfig::new("#packs")];
//! downloader.add_network("rizon", "irc.rizon.net", options).await?;
//!
//! // Subscribe to events
//! let mut events = downloader.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Download orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// IRC protocol client abstraction
pub mod irc;
/// Pack announcement parsing
pub mod parser;
/// Connection sessions and channel tracking
pub mod session;
/// Transfer engine abstraction
pub mod transfer;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, PersistenceConfig, TransferConfig};
pub use db::{Database, PackOffer};
pub use downloader::{Collaborators, NetworkOptions, XdccDownloader};
pub use error::{DatabaseError, DownloadError, Error, NetworkError, Result};
pub use irc::{ClientOptions, IrcClient, IrcConnector, IrcEvent, IrcEventSink};
pub use parser::AnnouncementParser;
pub use session::{ChannelConfig, ChannelStatus, SessionConfig, SessionStatus, SessionView};
pub use transfer::{
    TransferCommand, TransferEngine, TransferEvent, TransferEventSink, TransferHandle,
    TransferId, TransferPhase, TransferRequest,
};
pub use types::{
    DownloadSnapshot, DownloaderSnapshot, Event, NetworkSnapshot, PackId, PackInfo,
    RequestStatus,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use xdcc_dl::{Collaborators, Config, XdccDownloader, run_with_shutdown};
///
/// # async fn example(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = XdccDownloader::new(Config::default(), collaborators).await?;
/// downloader.start()?;
///
/// // Run with automatic signal handling
/// run_with_shutdown(downloader).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(downloader: XdccDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
