//! Pack offer document store.

use crate::error::DatabaseError;
use crate::types::PackId;
use crate::{Error, Result};

use super::{Database, NewPackOffer, PackOffer, PackRow};

const PACK_COLUMNS: &str =
    "id, network, bot, channel, pack, name, size, unit, gets, extra, first_seen, last_seen";

impl Database {
    /// Record a pack offer, refreshing it if the same id was announced before
    pub async fn upsert_pack(&self, offer: &NewPackOffer) -> Result<PackId> {
        let id = PackId::new(&offer.network, &offer.bot, offer.info.pack);
        let now = chrono::Utc::now().timestamp();
        let extra = if offer.info.extra.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&offer.info.extra)?)
        };

        sqlx::query(
            r#"
            INSERT INTO packs (
                id, network, bot, channel, pack, name, size, unit, gets, extra, first_seen, last_seen
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                channel = excluded.channel,
                name = excluded.name,
                size = excluded.size,
                unit = excluded.unit,
                gets = excluded.gets,
                extra = excluded.extra,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(id.as_str())
        .bind(&offer.network)
        .bind(&offer.bot)
        .bind(&offer.channel)
        .bind(i64::from(offer.info.pack))
        .bind(offer.info.name.as_deref().unwrap_or_default())
        .bind(offer.info.size)
        .bind(offer.info.unit.as_deref())
        .bind(offer.info.gets.map(i64::from))
        .bind(extra)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert pack {}: {}",
                id, e
            )))
        })?;

        Ok(id)
    }

    /// Get a pack offer by id
    pub async fn get_pack(&self, id: &PackId) -> Result<Option<PackOffer>> {
        let row = sqlx::query_as::<_, PackRow>(&format!(
            "SELECT {} FROM packs WHERE id = ?",
            PACK_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get pack {}: {}",
                id, e
            )))
        })?;

        row.map(PackOffer::try_from).transpose()
    }

    /// Search pack offers whose filename contains `query` (case-insensitive)
    ///
    /// Results are ordered by network, bot and pack number.
    pub async fn search_packs(&self, network: Option<&str>, query: &str) -> Result<Vec<PackOffer>> {
        let pattern = format!("%{}%", escape_like(query));
        let rows = sqlx::query_as::<_, PackRow>(&format!(
            r#"
            SELECT {} FROM packs
            WHERE name LIKE ? ESCAPE '\' AND (? IS NULL OR network = ?)
            ORDER BY network, bot, pack
            "#,
            PACK_COLUMNS
        ))
        .bind(pattern)
        .bind(network)
        .bind(network)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to search packs: {}",
                e
            )))
        })?;

        rows.into_iter().map(PackOffer::try_from).collect()
    }

    /// Count pack offers recorded for a network
    pub async fn count_packs(&self, network: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packs WHERE network = ?")
            .bind(network)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count packs: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// Delete every pack offer recorded for a network
    pub async fn delete_packs_for_network(&self, network: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM packs WHERE network = ?")
            .bind(network)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to flush packs for {}: {}",
                    network, e
                )))
            })?;

        Ok(result.rows_affected())
    }
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
