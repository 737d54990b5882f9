//! # Product Service
//!
//! The composed sync engine: one `ProductService` owns the store and drives it
//! from three directions at once.
//!
//! - **Mutations** go remote first; a network failure degrades to an
//!   optimistic local apply plus a durable queue entry and a transient notice,
//!   never a terminal error. Auth and server rejections surface as the
//!   operation's error state and are not queued.
//! - **The realtime channel** merges server-originated changes into the store
//!   for as long as a session token is active.
//! - **The reconciler** replays the queue whenever connectivity and a token
//!   are both present.
//!
//! Construction is explicit: the remote client, queue and channel factory are
//! injected; there is no process-wide instance. `start()` spawns the
//! lifecycle watchers; token loss tears the session down (channel closed,
//! in-flight fetch dropped, that token's queue entries cleared, store reset).

use crate::client::api::ProductApi;
use crate::client::config::Config;
use crate::client::queue::{PendingOperation, PendingQueue};
use crate::client::realtime::{ChannelFactory, RealtimeChannel};
use crate::client::reconcile::{PassSummary, Reconciler};
use crate::client::store::{Action, ProductsState, Store};
use crate::shared::error::SyncError;
use crate::shared::product::Product;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

/// Notice shown when a create is applied locally while offline
const OFFLINE_ADD_NOTICE: &str = "You are offline... Adding product locally!";

/// Notice shown when an update is applied locally while offline
const OFFLINE_UPDATE_NOTICE: &str = "You are offline... Updating product locally!";

/// Aborts its task when dropped, so background work never outlives the
/// session that spawned it.
#[derive(Debug)]
struct AbortGuard(JoinHandle<()>);

impl AbortGuard {
    fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Shared handles the lifecycle task works with
#[derive(Debug, Clone)]
struct LifecycleCtx {
    api: Arc<ProductApi>,
    store: Arc<Store>,
    queue: Arc<PendingQueue>,
    reconciler: Arc<Reconciler>,
    channels: ChannelFactory,
}

/// Per-session background tasks, torn down together
#[derive(Debug, Default)]
struct SessionTasks {
    active_token: Option<String>,
    channel: Option<RealtimeChannel>,
    fetch: Option<AbortGuard>,
    worker: Option<(Arc<Notify>, AbortGuard)>,
}

/// Client-facing product data provider with offline sync
#[derive(Debug)]
pub struct ProductService {
    api: Arc<ProductApi>,
    store: Arc<Store>,
    queue: Arc<PendingQueue>,
    reconciler: Arc<Reconciler>,
    channels: ChannelFactory,
    session: watch::Receiver<Option<String>>,
    connectivity: watch::Receiver<bool>,
    lifecycle: Mutex<Option<AbortGuard>>,
}

impl ProductService {
    /// Build a service from its injected dependencies.
    pub fn new(
        config: &Config,
        api: ProductApi,
        queue: PendingQueue,
        channels: ChannelFactory,
        session: watch::Receiver<Option<String>>,
        connectivity: watch::Receiver<bool>,
    ) -> Self {
        let api = Arc::new(api);
        let queue = Arc::new(queue);
        let store = Arc::new(Store::new());
        let reconciler = Arc::new(Reconciler::new(
            config,
            Arc::clone(&api),
            Arc::clone(&queue),
            Arc::clone(&store),
        ));
        Self {
            api,
            store,
            queue,
            reconciler,
            channels,
            session,
            connectivity,
            lifecycle: Mutex::new(None),
        }
    }

    /// Spawn the lifecycle watchers: fetch + push channel on login, reconcile
    /// on connectivity, teardown on token loss. Idempotent; calling again
    /// replaces the previous watchers.
    pub async fn start(&self) {
        let ctx = LifecycleCtx {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            reconciler: Arc::clone(&self.reconciler),
            channels: self.channels.clone(),
        };
        let session = self.session.clone();
        let connectivity = self.connectivity.clone();
        let guard = AbortGuard::spawn(run_lifecycle(ctx, session, connectivity));
        *self.lifecycle.lock().await = Some(guard);
    }

    /// Stop the engine: abort the watchers (which closes the channel and
    /// drops in-flight work), clear the active token's queue entries, and
    /// discard the state snapshot.
    pub async fn shutdown(&self) {
        *self.lifecycle.lock().await = None;
        if let Some(token) = self.current_token() {
            if let Err(e) = self.queue.clear_token(&token).await {
                tracing::error!(error = %e, "could not clear session queue entries");
            }
        }
        self.store.reset().await;
    }

    /// Current state snapshot
    pub async fn snapshot(&self) -> ProductsState {
        self.store.snapshot().await
    }

    /// Handle to the underlying store, for observers
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Fetch the collection from the server into the store
    pub async fn load_products(&self) -> Result<Vec<Product>, SyncError> {
        let token = self.token_or_empty();
        fetch_products(&self.api, &self.store, &token).await
    }

    /// Create a product. Online: server-confirmed. Offline (network error):
    /// applied locally under a placeholder id and queued for replay.
    pub async fn add_product(&self, product: Product) -> Result<Product, SyncError> {
        let token = self.token_or_empty();
        self.store.dispatch(Action::AddStarted).await;

        match self.api.create(&token, &product).await {
            Ok(created) => {
                tracing::info!(id = ?created.id, "product created");
                self.store
                    .dispatch(Action::AddSucceeded {
                        product: created.clone(),
                        replaces: None,
                    })
                    .await;
                Ok(created)
            }
            Err(e) if e.is_recoverable() => {
                let local = product.with_placeholder_id();
                tracing::warn!(error = %e, "create failed with network error, applying locally");
                self.store
                    .dispatch(Action::AddSucceeded {
                        product: local.clone(),
                        replaces: None,
                    })
                    .await;
                if let Err(se) = self
                    .queue
                    .put(&PendingOperation::create(&token, local.clone()))
                    .await
                {
                    tracing::error!(error = %se, "could not persist pending create");
                }
                self.store
                    .dispatch(Action::ShowSuccess {
                        message: OFFLINE_ADD_NOTICE.to_string(),
                    })
                    .await;
                Ok(local)
            }
            Err(e) => {
                self.store
                    .dispatch(Action::AddFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Update a product. Online: server-confirmed. Offline (network error):
    /// applied locally and queued; repeated offline edits collapse to one
    /// entry holding the latest snapshot.
    pub async fn update_product(&self, product: Product) -> Result<Product, SyncError> {
        let token = self.token_or_empty();
        self.store.dispatch(Action::UpdateStarted).await;

        match self.api.update(&token, &product).await {
            Ok(updated) => {
                tracing::info!(id = ?updated.id, "product updated");
                self.store
                    .dispatch(Action::UpdateSucceeded {
                        product: updated.clone(),
                    })
                    .await;
                Ok(updated)
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "update failed with network error, applying locally");
                self.store
                    .dispatch(Action::UpdateSucceeded {
                        product: product.clone(),
                    })
                    .await;
                if let Some(entry) = PendingOperation::update(&token, product.clone()) {
                    if let Err(se) = self.queue.put(&entry).await {
                        tracing::error!(error = %se, "could not persist pending update");
                    }
                }
                self.store
                    .dispatch(Action::ShowSuccess {
                        message: OFFLINE_UPDATE_NOTICE.to_string(),
                    })
                    .await;
                Ok(product)
            }
            Err(e) => {
                self.store
                    .dispatch(Action::UpdateFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Delete a product by id. Deletes are never queued: a failure of any
    /// kind surfaces as the operation's error state.
    pub async fn delete_product(&self, id: &str) -> Result<(), SyncError> {
        let token = self.token_or_empty();
        self.store.dispatch(Action::DeleteStarted).await;

        match self.api.delete(&token, id).await {
            Ok(()) => {
                tracing::info!(%id, "product deleted");
                self.store
                    .dispatch(Action::DeleteSucceeded { id: id.to_string() })
                    .await;
                Ok(())
            }
            Err(e) => {
                self.store
                    .dispatch(Action::DeleteFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Dismiss the transient success notice
    pub async fn close_success(&self) {
        self.store.dispatch(Action::HideSuccess).await;
    }

    /// Trigger a reconciliation pass now. Returns `None` when no session is
    /// active or a pass is already running.
    pub async fn reconcile(&self) -> Option<PassSummary> {
        let token = self.current_token()?;
        self.reconciler.run_pass(&token).await
    }

    fn current_token(&self) -> Option<String> {
        self.session
            .borrow()
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    fn token_or_empty(&self) -> String {
        self.current_token().unwrap_or_default()
    }
}

/// Fetch the collection and drive the store through the fetch cycle
async fn fetch_products(
    api: &ProductApi,
    store: &Store,
    token: &str,
) -> Result<Vec<Product>, SyncError> {
    tracing::debug!("fetch started");
    store.dispatch(Action::FetchStarted).await;
    match api.list(token).await {
        Ok(products) => {
            tracing::debug!(count = products.len(), "fetch succeeded");
            store
                .dispatch(Action::FetchSucceeded {
                    products: products.clone(),
                })
                .await;
            Ok(products)
        }
        Err(e) => {
            tracing::warn!(error = %e, "fetch failed");
            store
                .dispatch(Action::FetchFailed {
                    error: e.to_string(),
                })
                .await;
            Err(e)
        }
    }
}

/// Watch the session and connectivity signals, maintaining the per-session
/// background tasks.
async fn run_lifecycle(
    ctx: LifecycleCtx,
    mut session: watch::Receiver<Option<String>>,
    mut connectivity: watch::Receiver<bool>,
) {
    let mut tasks = SessionTasks::default();

    let initial = session.borrow_and_update().clone();
    let online = *connectivity.borrow();
    apply_token(&ctx, &mut tasks, initial, online).await;

    loop {
        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let token = session.borrow_and_update().clone();
                let online = *connectivity.borrow();
                apply_token(&ctx, &mut tasks, token, online).await;
            }
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *connectivity.borrow_and_update();
                if online && tasks.active_token.is_some() {
                    trigger_reconcile(&tasks);
                }
            }
        }
    }
}

/// React to a token value: no-op when unchanged, otherwise tear the previous
/// session down and bring the new one up.
async fn apply_token(
    ctx: &LifecycleCtx,
    tasks: &mut SessionTasks,
    token: Option<String>,
    online: bool,
) {
    let token = token.filter(|t| !t.trim().is_empty());
    if token == tasks.active_token {
        return;
    }
    tear_down(ctx, tasks).await;
    if let Some(token) = token {
        bring_up(ctx, tasks, token, online).await;
    }
}

async fn bring_up(ctx: &LifecycleCtx, tasks: &mut SessionTasks, token: String, online: bool) {
    tracing::info!("session starting");
    tasks.active_token = Some(token.clone());

    // Initial fetch; dropped (not merely ignored) if the token changes first.
    let api = Arc::clone(&ctx.api);
    let store = Arc::clone(&ctx.store);
    let fetch_token = token.clone();
    tasks.fetch = Some(AbortGuard::spawn(async move {
        let _ = fetch_products(&api, &store, &fetch_token).await;
    }));

    tasks.channel = Some(ctx.channels.open(token.clone(), Arc::clone(&ctx.store)));

    // Reconcile worker: triggers coalesce while a pass is running.
    let notify = Arc::new(Notify::new());
    let worker_notify = Arc::clone(&notify);
    let reconciler = Arc::clone(&ctx.reconciler);
    let worker_token = token;
    let guard = AbortGuard::spawn(async move {
        loop {
            worker_notify.notified().await;
            reconciler.run_pass(&worker_token).await;
        }
    });
    tasks.worker = Some((notify, guard));

    if online {
        trigger_reconcile(tasks);
    }
}

async fn tear_down(ctx: &LifecycleCtx, tasks: &mut SessionTasks) {
    let Some(prev) = tasks.active_token.take() else {
        return;
    };
    tracing::info!("session teardown");
    tasks.worker = None;
    tasks.fetch = None;
    if let Some(channel) = tasks.channel.take() {
        channel.close();
    }
    if let Err(e) = ctx.queue.clear_token(&prev).await {
        tracing::error!(error = %e, "could not clear session queue entries");
    }
    ctx.store.reset().await;
}

fn trigger_reconcile(tasks: &SessionTasks) {
    if let Some((notify, _)) = &tasks.worker {
        notify.notify_one();
    }
}
