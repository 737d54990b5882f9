//! # Reconnection Reconciler
//!
//! Replays the durable pending queue through the product API whenever
//! connectivity and a session token are both available. A pass replays all
//! create entries first, then all update entries, so an update queued against
//! an offline create runs after its target exists on the server. At most one
//! pass runs at a time; concurrent triggers are absorbed by a single-flight
//! guard rather than stacking up.
//!
//! Replay is at-least-once with bounded, jittered exponential backoff per
//! entry. A network failure leaves the entry for a later trigger; an auth or
//! server rejection, or exhausting the attempt budget, surfaces a permanent
//! failure to the store and drops the entry. One entry failing never aborts
//! the pass for the rest.

use crate::client::api::ProductApi;
use crate::client::config::Config;
use crate::client::queue::{OperationKind, PendingOperation, PendingQueue, UPDATE_KEY_PREFIX};
use crate::client::store::{Action, Store};
use crate::shared::error::SyncError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Outcome counters for one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    /// Entries confirmed and removed
    pub replayed: usize,
    /// Entries left for a later trigger (backoff gate or pending create)
    pub deferred: usize,
    /// Entries surfaced as permanently failed and removed
    pub failed: usize,
}

/// Replays pending operations once connectivity and a token are back
#[derive(Debug)]
pub struct Reconciler {
    api: Arc<ProductApi>,
    queue: Arc<PendingQueue>,
    store: Arc<Store>,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_attempts: u32,
    pass_guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        config: &Config,
        api: Arc<ProductApi>,
        queue: Arc<PendingQueue>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            api,
            queue,
            store,
            backoff_base: config.get_backoff_base(),
            backoff_cap: config.get_backoff_cap(),
            max_attempts: config.get_max_attempts(),
            pass_guard: Mutex::new(()),
        }
    }

    /// Run one pass for the given session token.
    ///
    /// Returns `None` when another pass is already in flight.
    pub async fn run_pass(&self, token: &str) -> Option<PassSummary> {
        let Ok(_guard) = self.pass_guard.try_lock() else {
            tracing::debug!("reconciliation pass already running, skipping trigger");
            return None;
        };

        tracing::info!("reconciliation pass started");
        let mut summary = PassSummary::default();
        self.replay_creates(token, &mut summary).await;
        self.replay_updates(token, &mut summary).await;
        tracing::info!(
            replayed = summary.replayed,
            deferred = summary.deferred,
            failed = summary.failed,
            "reconciliation pass finished"
        );
        Some(summary)
    }

    async fn replay_creates(&self, token: &str, summary: &mut PassSummary) {
        let entries = match self.queue.list(OperationKind::Create, token).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "could not enumerate pending creates");
                return;
            }
        };

        for entry in entries {
            if !entry.is_due(Utc::now()) {
                summary.deferred += 1;
                continue;
            }

            let placeholder = entry.product.id.clone();
            let body = entry.product.clone().without_id();
            match self.api.create(token, &body).await {
                Ok(created) => {
                    self.confirm(&entry, summary).await;
                    self.store
                        .dispatch(Action::AddSucceeded {
                            product: created.clone(),
                            replaces: placeholder.clone(),
                        })
                        .await;
                    // An offline edit of the not-yet-created product was
                    // queued against the placeholder id; point it at the
                    // record the server just assigned.
                    if let (Some(placeholder), Some(server_id)) = (placeholder, created.id) {
                        match self.queue.relink_update(&placeholder, &server_id).await {
                            Ok(true) => {
                                tracing::debug!(%server_id, "relinked queued update to server id")
                            }
                            Ok(false) => {}
                            Err(e) => {
                                tracing::error!(error = %e, "could not relink queued update")
                            }
                        }
                    }
                }
                Err(e) => self.handle_replay_failure(&entry, e, summary).await,
            }
        }
    }

    async fn replay_updates(&self, token: &str, summary: &mut PassSummary) {
        // Ids of creates still queued after the create phase: their updates
        // must wait for the create to land.
        let pending_creates: HashSet<String> = match self.queue.list(OperationKind::Create, token).await
        {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| entry.product.id)
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "could not enumerate pending creates");
                return;
            }
        };

        let entries = match self.queue.list(OperationKind::Update, token).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "could not enumerate pending updates");
                return;
            }
        };

        for entry in entries {
            if !entry.is_due(Utc::now()) {
                summary.deferred += 1;
                continue;
            }
            let target = entry
                .key
                .strip_prefix(UPDATE_KEY_PREFIX)
                .unwrap_or(&entry.key);
            if pending_creates.contains(target) {
                tracing::debug!(key = %entry.key, "deferring update until its create replays");
                summary.deferred += 1;
                continue;
            }

            match self.api.update(token, &entry.product).await {
                Ok(updated) => {
                    self.confirm(&entry, summary).await;
                    self.store
                        .dispatch(Action::UpdateSucceeded { product: updated })
                        .await;
                }
                Err(e) => self.handle_replay_failure(&entry, e, summary).await,
            }
        }
    }

    /// Remove a confirmed entry unless a fresh edit superseded the snapshot
    /// that was just replayed.
    async fn confirm(&self, entry: &PendingOperation, summary: &mut PassSummary) {
        match self
            .queue
            .remove_if_unchanged(&entry.key, &entry.queued_at)
            .await
        {
            Ok(removed) => {
                if !removed {
                    tracing::debug!(key = %entry.key, "entry superseded during replay, keeping");
                }
                summary.replayed += 1;
            }
            Err(e) => {
                tracing::error!(key = %entry.key, error = %e, "could not remove confirmed entry");
                summary.replayed += 1;
            }
        }
    }

    async fn handle_replay_failure(
        &self,
        entry: &PendingOperation,
        error: SyncError,
        summary: &mut PassSummary,
    ) {
        let attempts_after = entry.attempts + 1;
        let exhausted = attempts_after >= i64::from(self.max_attempts);

        if error.is_recoverable() && !exhausted {
            let delay = self.backoff_delay(attempts_after);
            let next_attempt_at = (Utc::now()
                + chrono::Duration::milliseconds(delay.as_millis() as i64))
            .to_rfc3339();
            tracing::warn!(
                key = %entry.key,
                attempts = attempts_after,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "replay failed, keeping entry"
            );
            if let Err(e) = self
                .queue
                .record_failure(&entry.key, &error.to_string(), Some(next_attempt_at))
                .await
            {
                tracing::error!(key = %entry.key, error = %e, "could not record replay failure");
            }
            summary.deferred += 1;
            return;
        }

        // Retrying cannot help: auth/server rejection, or the attempt budget
        // is spent. Surface the failure and drop the entry; the optimistic
        // local copy stays (last-write-wins locally).
        tracing::warn!(
            key = %entry.key,
            attempts = attempts_after,
            error = %error,
            "replay permanently failed, dropping entry"
        );
        if let Err(e) = self.queue.remove(&entry.key).await {
            tracing::error!(key = %entry.key, error = %e, "could not drop failed entry");
        }
        let action = match entry.kind {
            OperationKind::Create => Action::AddFailed {
                error: error.to_string(),
            },
            OperationKind::Update => Action::UpdateFailed {
                error: error.to_string(),
            },
        };
        self.store.dispatch(action).await;
        summary.failed += 1;
    }

    /// Exponential backoff with uniform jitter, capped
    fn backoff_delay(&self, attempts: i64) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 16) as u32;
        let scaled = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.backoff_cap);
        let jitter = scaled.mul_f64(0.1 * rand::random::<f64>());
        (scaled + jitter).min(self.backoff_cap)
    }
}
