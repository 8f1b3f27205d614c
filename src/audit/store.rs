use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::VersionRecord;

/// Result of walking the version hash chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    Intact { entries: usize },
    Broken { entry: usize, id: String, reason: String },
}

/// Append-only persistence for version records.
///
/// Every row stores the serialized record plus a SHA-256 over the previous
/// row's hash and its own payload, so any later edit of the history breaks
/// the chain from that row onward.
#[derive(Clone)]
pub struct VersionStore {
    pool: SqlitePool,
}

impl VersionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
        let mut hasher = Sha256::new();
        if let Some(prev) = prev_hash {
            hasher.update(prev.as_bytes());
        }
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Append one record to the chain and return its hash.
    pub async fn append(&self, record: &VersionRecord) -> Result<String, AppError> {
        let payload = serde_json::to_string(record)
            .map_err(|err| AppError::audit_write(format!("cannot serialize version: {err}")))?;

        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM versions ORDER BY rowid DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|err| AppError::audit_write(err.to_string()))?;

        let hash = Self::chain_hash(prev_hash.as_deref(), &payload);

        sqlx::query(
            r#"
            INSERT INTO versions
                (id, event, actor_id, item_type, item_id, source_ip, created_at,
                 payload, prev_hash, hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.event.as_str())
        .bind(record.actor_id.map(|id| id.to_string()))
        .bind(&record.item_type)
        .bind(&record.item_id)
        .bind(&record.source_ip)
        .bind(record.created_at)
        .bind(&payload)
        .bind(&prev_hash)
        .bind(&hash)
        .execute(&self.pool)
        .await
        .map_err(|err| AppError::audit_write(err.to_string()))?;

        Ok(hash)
    }

    /// Full mutation history of one record, oldest first.
    pub async fn list_for_item(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> Result<Vec<VersionRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT payload FROM versions WHERE item_type = ? AND item_id = ? ORDER BY rowid",
        )
        .bind(item_type)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            let record = serde_json::from_str(&payload)
                .map_err(|err| AppError::internal(format!("corrupt version payload: {err}")))?;
            records.push(record);
        }
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM versions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Walk the whole chain and verify every link: each row must reference
    /// its predecessor's hash and carry the hash of its own payload.
    pub async fn verify_chain(&self) -> Result<ChainStatus, AppError> {
        let rows = sqlx::query("SELECT id, payload, prev_hash, hash FROM versions ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut expected_prev: Option<String> = None;
        for (index, row) in rows.iter().enumerate() {
            let id: String = row.get("id");
            let payload: String = row.get("payload");
            let prev_hash: Option<String> = row.get("prev_hash");
            let hash: String = row.get("hash");

            if prev_hash != expected_prev {
                return Ok(ChainStatus::Broken {
                    entry: index,
                    id,
                    reason: "previous-hash link does not match".to_string(),
                });
            }

            let recomputed = Self::chain_hash(prev_hash.as_deref(), &payload);
            if recomputed != hash {
                return Ok(ChainStatus::Broken {
                    entry: index,
                    id,
                    reason: "payload hash mismatch".to_string(),
                });
            }

            expected_prev = Some(hash);
        }

        Ok(ChainStatus::Intact {
            entries: rows.len(),
        })
    }
}
