//! # Durable Pending-Operation Queue
//!
//! Persists mutations that failed with a network error so they survive process
//! restarts and can be replayed once connectivity and a token are back. Backed
//! by a small SQLite table; each entry is a typed record (explicit operation
//! kind, token captured at failure time, full product snapshot as JSON) rather
//! than an ad hoc string-prefixed blob, so the reconciler enumerates each
//! class with a structured query.
//!
//! ## Keying
//!
//! - Update entries are keyed by product id: repeated offline edits to one
//!   product collapse to a single entry holding the latest snapshot.
//! - Create entries are keyed by a client-generated timestamp: multiple
//!   offline creates coexist without collision.
//!
//! An entry exists only between "mutation failed with a recoverable error"
//! and "replay confirmed or superseded". Entries are scoped to the token in
//! effect when they were written; teardown clears the ending session's
//! entries and the reconciler never replays another session's.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shelfsync::client::queue::{PendingOperation, PendingQueue};
//!
//! # async fn example(product: shelfsync::shared::Product) -> sqlx::Result<()> {
//! let queue = PendingQueue::open_default().await?;
//! queue.put(&PendingOperation::create("token", product)).await?;
//! for entry in queue.list(shelfsync::client::queue::OperationKind::Create, "token").await? {
//!     // replay entry...
//!     queue.remove(&entry.key).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::shared::product::Product;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Key prefix for create-kind entries
pub const CREATE_KEY_PREFIX: &str = "pending-create-";

/// Key prefix for update-kind entries
pub const UPDATE_KEY_PREFIX: &str = "pending-update-";

/// Result type for queue operations
pub type Result<T> = sqlx::Result<T>;

/// Kind of a pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// The product does not exist on the server yet
    Create,
    /// The product exists and carries a server (or placeholder) id
    Update,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            _ => None,
        }
    }
}

/// A durably queued mutation awaiting confirmed delivery
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOperation {
    /// Queue key (`pending-create-<timestamp>` / `pending-update-<productId>`)
    pub key: String,
    /// Operation kind
    pub kind: OperationKind,
    /// Bearer token in effect when the mutation failed
    pub token: String,
    /// Full product snapshot to replay
    pub product: Product,
    /// RFC3339 timestamp of the (latest) write
    pub queued_at: String,
    /// Replay attempts so far
    pub attempts: i64,
    /// RFC3339 timestamp before which the entry is not eligible for replay
    pub next_attempt_at: Option<String>,
    /// Error message from the last failed replay
    pub last_error: Option<String>,
}

impl PendingOperation {
    /// Queue entry for an offline create. The snapshot keeps its placeholder
    /// id; the key is timestamped so concurrent offline creates coexist.
    pub fn create(token: impl Into<String>, product: Product) -> Self {
        Self {
            key: format!("{}{}", CREATE_KEY_PREFIX, Utc::now().timestamp_micros()),
            kind: OperationKind::Create,
            token: token.into(),
            product,
            queued_at: Utc::now().to_rfc3339(),
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
        }
    }

    /// Queue entry for an offline update, keyed by the product id so later
    /// edits collapse onto it. Returns `None` when the product has no id.
    pub fn update(token: impl Into<String>, product: Product) -> Option<Self> {
        let id = product.id.clone()?;
        Some(Self {
            key: format!("{}{}", UPDATE_KEY_PREFIX, id),
            kind: OperationKind::Update,
            token: token.into(),
            product,
            queued_at: Utc::now().to_rfc3339(),
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
        })
    }

    /// Whether the entry is eligible for replay at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match &self.next_attempt_at {
            None => true,
            Some(at) => match DateTime::parse_from_rfc3339(at) {
                Ok(at) => at <= now,
                // An unreadable gate never blocks replay.
                Err(_) => true,
            },
        }
    }
}

/// Durable queue over a local SQLite database
#[derive(Debug, Clone)]
pub struct PendingQueue {
    pool: SqlitePool,
}

impl PendingQueue {
    /// Open or create the queue database at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let queue = Self { pool };
        queue.init_schema().await?;
        Ok(queue)
    }

    /// Open the queue at the platform data directory
    pub async fn open_default() -> Result<Self> {
        let base = dirs::data_dir().unwrap_or_else(|| ".".into());
        Self::open(&base.join("shelfsync").join("pending.db")).await
    }

    /// Open an in-memory queue (tests, ephemeral sessions)
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        // A single connection keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let queue = Self { pool };
        queue.init_schema().await?;
        Ok(queue)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pending_operations (
                queue_key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                token TEXT NOT NULL,
                product TEXT NOT NULL,
                queued_at TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                next_attempt_at TEXT,
                last_error TEXT
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_pending_kind_token
             ON pending_operations (kind, token)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or overwrite an entry. Overwriting resets the retry budget:
    /// a fresh snapshot is a fresh operation as far as backoff is concerned.
    pub async fn put(&self, entry: &PendingOperation) -> Result<()> {
        let product = serde_json::to_string(&entry.product)
            .map_err(|e| sqlx::Error::Protocol(format!("product snapshot: {}", e)))?;
        sqlx::query(
            "INSERT INTO pending_operations
                 (queue_key, kind, token, product, queued_at, attempts, next_attempt_at, last_error)
             VALUES (?, ?, ?, ?, ?, 0, NULL, NULL)
             ON CONFLICT(queue_key) DO UPDATE SET
                 token = excluded.token,
                 product = excluded.product,
                 queued_at = excluded.queued_at,
                 attempts = 0,
                 next_attempt_at = NULL,
                 last_error = NULL",
        )
        .bind(&entry.key)
        .bind(entry.kind.as_str())
        .bind(&entry.token)
        .bind(&product)
        .bind(&entry.queued_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one entry by key
    pub async fn get(&self, key: &str) -> Result<Option<PendingOperation>> {
        let row = sqlx::query(
            "SELECT queue_key, kind, token, product, queued_at, attempts, next_attempt_at, last_error
             FROM pending_operations WHERE queue_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(|row| Self::decode_row(&row)))
    }

    /// Remove one entry by key; returns whether an entry was removed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE queue_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-remove: removes the entry only if its snapshot has not been
    /// overwritten since `queued_at` was read. Keeps a freshly written edit
    /// from being lost to a replay of its predecessor.
    pub async fn remove_if_unchanged(&self, key: &str, queued_at: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM pending_operations WHERE queue_key = ? AND queued_at = ?")
                .bind(key)
                .bind(queued_at)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enumerate one class of entries for one session token, oldest first
    pub async fn list(&self, kind: OperationKind, token: &str) -> Result<Vec<PendingOperation>> {
        let rows = sqlx::query(
            "SELECT queue_key, kind, token, product, queued_at, attempts, next_attempt_at, last_error
             FROM pending_operations
             WHERE kind = ? AND token = ?
             ORDER BY queued_at ASC",
        )
        .bind(kind.as_str())
        .bind(token)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(Self::decode_row).collect())
    }

    /// All queue keys, for inspection
    pub async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT queue_key FROM pending_operations ORDER BY queue_key")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| row.try_get("queue_key")).collect()
    }

    /// Record a failed replay: bump the attempt count and gate the next one
    pub async fn record_failure(
        &self,
        key: &str,
        error: &str,
        next_attempt_at: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE pending_operations
             SET attempts = attempts + 1, last_error = ?, next_attempt_at = ?
             WHERE queue_key = ?",
        )
        .bind(error)
        .bind(next_attempt_at)
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Re-key a queued update from a confirmed create's placeholder id to the
    /// server-assigned id, rewriting the snapshot's id to match. Returns
    /// whether an entry was relinked.
    pub async fn relink_update(&self, placeholder_id: &str, server_id: &str) -> Result<bool> {
        let old_key = format!("{}{}", UPDATE_KEY_PREFIX, placeholder_id);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT token, product, queued_at FROM pending_operations WHERE queue_key = ?",
        )
        .bind(&old_key)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(false);
        };

        let token: String = row.try_get("token")?;
        let queued_at: String = row.try_get("queued_at")?;
        let raw: String = row.try_get("product")?;
        let mut product: Product = serde_json::from_str(&raw)
            .map_err(|e| sqlx::Error::Protocol(format!("stored snapshot: {}", e)))?;
        product.id = Some(server_id.to_string());
        let product = serde_json::to_string(&product)
            .map_err(|e| sqlx::Error::Protocol(format!("product snapshot: {}", e)))?;

        sqlx::query("DELETE FROM pending_operations WHERE queue_key = ?")
            .bind(&old_key)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT OR REPLACE INTO pending_operations
                 (queue_key, kind, token, product, queued_at, attempts, next_attempt_at, last_error)
             VALUES (?, 'update', ?, ?, ?, 0, NULL, NULL)",
        )
        .bind(format!("{}{}", UPDATE_KEY_PREFIX, server_id))
        .bind(&token)
        .bind(&product)
        .bind(&queued_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Drop every entry recorded under `token` (session teardown)
    pub async fn clear_token(&self, token: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pending_operations WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Total number of entries
    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM pending_operations")
            .fetch_one(&self.pool)
            .await
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> Option<PendingOperation> {
        let key: String = row.try_get("queue_key").ok()?;
        let kind: String = row.try_get("kind").ok()?;
        let raw: String = row.try_get("product").ok()?;
        let Some(kind) = OperationKind::parse(&kind) else {
            tracing::warn!(%key, %kind, "skipping entry with unknown kind");
            return None;
        };
        let product = match serde_json::from_str(&raw) {
            Ok(product) => product,
            Err(e) => {
                tracing::warn!(%key, error = %e, "skipping undecodable entry");
                return None;
            }
        };
        Some(PendingOperation {
            key,
            kind,
            token: row.try_get("token").ok()?,
            product,
            queued_at: row.try_get("queued_at").ok()?,
            attempts: row.try_get("attempts").ok()?,
            next_attempt_at: row.try_get("next_attempt_at").ok()?,
            last_error: row.try_get("last_error").ok()?,
        })
    }
}
