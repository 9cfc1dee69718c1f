//! Database layer for xdcc-dl
//!
//! One SQLite file backs both external stores the downloader relies on:
//!
//! - [`kv`]: namespaced JSON values for network
//!   configs, per-(network, bot) pending lists and global settings
//! - [`packs`]: the document store of pack offers seen in announcements
//! - [`migrations`]: database lifecycle, schema migrations

use crate::error::DatabaseError;
use crate::types::PackId;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::collections::BTreeMap;

mod kv;
mod migrations;
mod packs;

pub use kv::namespace;

/// Pack offer to be recorded in the document store
#[derive(Debug, Clone)]
pub struct NewPackOffer {
    /// Network the announcement was seen on
    pub network: String,
    /// Announcing bot
    pub bot: String,
    /// Channel the announcement was seen in
    pub channel: String,
    /// Parsed announcement
    pub info: crate::types::PackInfo,
}

/// Pack offer record from the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackOffer {
    /// Composite id `"<network>:<bot>:<pack>"`
    pub id: PackId,
    /// Network name
    pub network: String,
    /// Bot nick
    pub bot: String,
    /// Channel of the latest announcement
    pub channel: String,
    /// Pack number
    pub pack: u32,
    /// Announced filename
    pub name: String,
    /// Announced size in bytes (unconverted if the unit was unknown)
    pub size: Option<f64>,
    /// Size unit, kept only when it was not recognized
    pub unit: Option<String>,
    /// Download counter at the latest announcement
    pub gets: Option<u32>,
    /// Remaining captured fields
    pub extra: BTreeMap<String, String>,
    /// Unix timestamp of the first announcement
    pub first_seen: i64,
    /// Unix timestamp of the latest announcement
    pub last_seen: i64,
}

/// Raw pack row from SQLite
#[derive(Debug, Clone, FromRow)]
pub(crate) struct PackRow {
    pub id: String,
    pub network: String,
    pub bot: String,
    pub channel: String,
    pub pack: i64,
    pub name: String,
    pub size: Option<f64>,
    pub unit: Option<String>,
    pub gets: Option<i64>,
    pub extra: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
}

impl TryFrom<PackRow> for PackOffer {
    type Error = crate::error::Error;

    fn try_from(row: PackRow) -> crate::Result<Self> {
        let corrupt = |reason: String| DatabaseError::CorruptRecord {
            key: format!("packs/{}", row.id),
            reason,
        };
        let pack = u32::try_from(row.pack)
            .map_err(|_| corrupt(format!("pack number {} out of range", row.pack)))?;
        let gets = row
            .gets
            .map(u32::try_from)
            .transpose()
            .map_err(|e| corrupt(format!("gets out of range: {}", e)))?;

        Ok(PackOffer {
            id: PackId::from(row.id.clone()),
            network: row.network,
            bot: row.bot,
            channel: row.channel,
            pack,
            name: row.name,
            size: row.size,
            unit: row.unit,
            gets,
            extra: row
                .extra
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            first_seen: row.first_seen,
            last_seen: row.last_seen,
        })
    }
}

/// Database handle for xdcc-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
