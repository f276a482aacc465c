//! Checkpoint Registry Database
//!
//! SQLite-backed store keyed by run id.
//!
//! # Storage
//! - `disbursement_runs`: fingerprint of the list, paging and asset a run id was started with
//! - `disbursement_pages`: one row per confirmed page (index, size, total, signature)
//! - `issuance_entities`: one row per entity (derived handle, step bitmask, status)

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

use crate::error::RegistryError;
use crate::types::{Address, EntityCheckpoint, EntityStatus, PageReceipt};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS disbursement_runs (
        run_id TEXT PRIMARY KEY,
        fingerprint TEXT NOT NULL,
        started_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS disbursement_pages (
        run_id TEXT NOT NULL,
        page_index INTEGER NOT NULL,
        recipients INTEGER NOT NULL,
        total TEXT NOT NULL,
        signature TEXT NOT NULL,
        completed_at TEXT NOT NULL,
        PRIMARY KEY (run_id, page_index)
    )",
    "CREATE TABLE IF NOT EXISTS issuance_entities (
        run_id TEXT NOT NULL,
        entity_index INTEGER NOT NULL,
        handle TEXT,
        steps_done INTEGER NOT NULL,
        status TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (run_id, entity_index)
    )",
];

/// Checkpoint registry
///
/// Writes happen after each confirmed page or step, so the registry never
/// claims progress the ledger has not confirmed.
#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    /// Connect to (and create if missing) the database at `url`
    ///
    /// # Arguments
    /// * `url` - SQLite URL, e.g. "sqlite://solscribe.db" or "sqlite::memory:"
    pub async fn connect(url: &str) -> Result<Self, RegistryError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // A single connection keeps in-memory databases shared across calls
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("checkpoint registry ready at {}", url);
        Ok(Self { pool })
    }

    /// Bind `run_id` to `fingerprint`, or check it against the stored one
    ///
    /// # Returns
    /// * `Ok(true)` if the run id is new or was started with the same fingerprint
    /// * `Ok(false)` if it belongs to a different disbursement
    pub async fn claim_run(&self, run_id: &str, fingerprint: &str) -> Result<bool, RegistryError> {
        // First claim wins; later ones only read
        sqlx::query(
            "INSERT OR IGNORE INTO disbursement_runs (run_id, fingerprint, started_at)
             VALUES (?, ?, ?)",
        )
        .bind(run_id)
        .bind(fingerprint)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let (stored,): (String,) =
            sqlx::query_as("SELECT fingerprint FROM disbursement_runs WHERE run_id = ?")
                .bind(run_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(stored == fingerprint)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record a confirmed disbursement page
    pub async fn record_page(&self, run_id: &str, receipt: &PageReceipt) -> Result<(), RegistryError> {
        sqlx::query(
            "INSERT OR REPLACE INTO disbursement_pages
                (run_id, page_index, recipients, total, signature, completed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(receipt.page as i64)
        .bind(receipt.recipients as i64)
        .bind(receipt.total.to_string())
        .bind(&receipt.signature.0)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Indices of pages already confirmed for `run_id`
    pub async fn completed_pages(&self, run_id: &str) -> Result<HashSet<usize>, RegistryError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT page_index FROM disbursement_pages WHERE run_id = ?")
                .bind(run_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(index,)| index as usize).collect())
    }

    /// Store the progress of one issuance entity
    pub async fn save_entity(
        &self,
        run_id: &str,
        index: u32,
        checkpoint: &EntityCheckpoint,
    ) -> Result<(), RegistryError> {
        let mask = checkpoint
            .steps_done
            .iter()
            .enumerate()
            .fold(0i64, |acc, (i, done)| if *done { acc | (1 << i) } else { acc });
        sqlx::query(
            "INSERT INTO issuance_entities
                (run_id, entity_index, handle, steps_done, status, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(run_id, entity_index) DO UPDATE SET
                handle = excluded.handle,
                steps_done = excluded.steps_done,
                status = excluded.status,
                updated_at = excluded.updated_at",
        )
        .bind(run_id)
        .bind(index as i64)
        .bind(checkpoint.handle.as_ref().map(|h| h.to_string()))
        .bind(mask)
        .bind(checkpoint.status.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load the stored progress of one issuance entity
    pub async fn load_entity(
        &self,
        run_id: &str,
        index: u32,
    ) -> Result<Option<EntityCheckpoint>, RegistryError> {
        let row: Option<(Option<String>, i64, String)> = sqlx::query_as(
            "SELECT handle, steps_done, status FROM issuance_entities
             WHERE run_id = ? AND entity_index = ?",
        )
        .bind(run_id)
        .bind(index as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some((handle, mask, status)) = row else {
            return Ok(None);
        };
        let handle = handle
            .map(|h| Address::parse(&h))
            .transpose()
            .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
        let status = EntityStatus::from_str(&status).map_err(RegistryError::Corrupt)?;
        let steps_done = [mask & 1 != 0, mask & 2 != 0, mask & 4 != 0];
        Ok(Some(EntityCheckpoint {
            handle,
            steps_done,
            status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Keypair;
    use crate::types::Signature;

    #[tokio::test]
    async fn test_pages_are_scoped_by_run_id() {
        let registry = Registry::connect("sqlite::memory:").await.unwrap();
        let receipt = PageReceipt {
            page: 1,
            recipients: 2,
            total: u64::MAX,
            signature: Signature("sig".to_string()),
        };
        registry.record_page("run-a", &receipt).await.unwrap();
        // Recording twice is harmless
        registry.record_page("run-a", &receipt).await.unwrap();

        assert_eq!(registry.completed_pages("run-a").await.unwrap(), HashSet::from([1]));
        assert!(registry.completed_pages("run-b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_claim_rejects_other_fingerprint() {
        let registry = Registry::connect("sqlite::memory:").await.unwrap();
        assert!(registry.claim_run("run-a", "abc").await.unwrap());
        assert!(registry.claim_run("run-a", "abc").await.unwrap());
        assert!(!registry.claim_run("run-a", "def").await.unwrap());
        assert!(registry.claim_run("run-b", "def").await.unwrap());
    }

    #[tokio::test]
    async fn test_entity_checkpoint_round_trip_and_update() {
        let registry = Registry::connect("sqlite::memory:").await.unwrap();
        assert!(registry.load_entity("run", 0).await.unwrap().is_none());

        let handle = Keypair::from_seed([9u8; 32]).address();
        let mut checkpoint = EntityCheckpoint {
            handle: Some(handle),
            steps_done: [true, false, false],
            status: EntityStatus::InProgress,
        };
        registry.save_entity("run", 0, &checkpoint).await.unwrap();
        assert_eq!(registry.load_entity("run", 0).await.unwrap(), Some(checkpoint.clone()));

        checkpoint.steps_done = [true, true, true];
        checkpoint.status = EntityStatus::Completed;
        registry.save_entity("run", 0, &checkpoint).await.unwrap();
        assert_eq!(registry.load_entity("run", 0).await.unwrap(), Some(checkpoint));
    }

    #[tokio::test]
    async fn test_file_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("checkpoints.db").display());
        let receipt = PageReceipt {
            page: 0,
            recipients: 1,
            total: 5,
            signature: Signature("sig".to_string()),
        };

        Registry::connect(&url).await.unwrap().record_page("run", &receipt).await.unwrap();
        let reopened = Registry::connect(&url).await.unwrap();
        assert_eq!(reopened.completed_pages("run").await.unwrap(), HashSet::from([0]));
    }
}
