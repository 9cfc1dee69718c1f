//! Configuration store: namespaced JSON values.

use crate::error::DatabaseError;
use crate::session::SessionConfig;
use crate::types::{PendingEntry, queue_key, split_queue_key};
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Database;

/// Configuration store namespaces
pub mod namespace {
    /// Per-network connection config, keyed by network name
    pub const NETWORKS: &str = "networks";
    /// Pending-download lists, keyed by `"<network>:<bot>"`
    pub const QUEUES: &str = "queues";
    /// Global settings, keyed by setting name (`xdcc:useSSL`, ...)
    pub const SETTINGS: &str = "settings";
}

impl Database {
    /// Get a raw JSON value
    pub async fn kv_get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
                .bind(namespace)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read {}/{}: {}",
                        namespace, key, e
                    )))
                })?;

        Ok(value)
    }

    /// Store a raw JSON value, replacing any previous one
    pub async fn kv_set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO kv_store (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write {}/{}: {}",
                namespace, key, e
            )))
        })?;

        Ok(())
    }

    /// Delete a value, returning whether it existed
    pub async fn kv_delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete {}/{}: {}",
                    namespace, key, e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// List all (key, value) pairs of a namespace, ordered by key
    pub async fn kv_list(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM kv_store WHERE namespace = ? ORDER BY key")
                .bind(namespace)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to list {}: {}",
                        namespace, e
                    )))
                })?;

        Ok(rows)
    }

    /// Get and decode a JSON value
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<T>> {
        match self.kv_get(namespace, key).await? {
            Some(raw) => decode(namespace, key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Encode and store a JSON value
    pub async fn set_json<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv_set(namespace, key, &raw).await
    }

    /// Persist a network's connection config
    pub async fn save_network_config(&self, name: &str, config: &SessionConfig) -> Result<()> {
        self.set_json(namespace::NETWORKS, name, config).await
    }

    /// Delete a network's connection config
    pub async fn delete_network_config(&self, name: &str) -> Result<bool> {
        self.kv_delete(namespace::NETWORKS, name).await
    }

    /// Load every persisted network config
    pub async fn load_network_configs(&self) -> Result<Vec<(String, SessionConfig)>> {
        let mut configs = Vec::new();
        for (name, raw) in self.kv_list(namespace::NETWORKS).await? {
            configs.push((name.clone(), decode(namespace::NETWORKS, &name, &raw)?));
        }
        Ok(configs)
    }

    /// Persist the pending list of a (network, bot) pair
    ///
    /// An empty list removes the key entirely.
    pub async fn save_pending(
        &self,
        network: &str,
        bot: &str,
        entries: &[PendingEntry],
    ) -> Result<()> {
        let key = queue_key(network, bot);
        if entries.is_empty() {
            self.kv_delete(namespace::QUEUES, &key).await?;
            Ok(())
        } else {
            self.set_json(namespace::QUEUES, &key, &entries).await
        }
    }

    /// Get the pending list of a (network, bot) pair
    pub async fn get_pending(&self, network: &str, bot: &str) -> Result<Vec<PendingEntry>> {
        Ok(self
            .get_json(namespace::QUEUES, &queue_key(network, bot))
            .await?
            .unwrap_or_default())
    }

    /// Load every persisted pending list as (network, bot, entries)
    pub async fn load_pending(&self) -> Result<Vec<(String, String, Vec<PendingEntry>)>> {
        let mut lists = Vec::new();
        for (key, raw) in self.kv_list(namespace::QUEUES).await? {
            let Some((network, bot)) = split_queue_key(&key) else {
                tracing::warn!(key = %key, "Skipping pending list with malformed key");
                continue;
            };
            let entries: Vec<PendingEntry> = decode(namespace::QUEUES, &key, &raw)?;
            lists.push((network.to_string(), bot.to_string(), entries));
        }
        Ok(lists)
    }

    /// Get a global setting
    pub async fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_json(namespace::SETTINGS, key).await
    }

    /// Set a global setting
    pub async fn set_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_json(namespace::SETTINGS, key, value).await
    }
}

fn decode<T: DeserializeOwned>(namespace: &str, key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        Error::Database(DatabaseError::CorruptRecord {
            key: format!("{}/{}", namespace, key),
            reason: e.to_string(),
        })
    })
}
