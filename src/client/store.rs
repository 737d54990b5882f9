//! # Product State Store
//!
//! Single owner of the in-memory product collection and its status flags.
//! Every change flows through a pure reducer over an exhaustive action enum;
//! the `Store` applies transitions under a write lock, so no two transitions
//! ever interleave and the collection needs no further synchronization.
//!
//! ## Merge Rule
//!
//! `AddSucceeded` and `UpdateSucceeded` share one rule: locate the existing
//! entry by id and replace it in place, or insert at the front when absent.
//! Applying the same payload twice therefore leaves the collection unchanged,
//! which makes duplicate push frames harmless. `DeleteSucceeded` for an
//! absent id is a no-op, not an error.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shelfsync::client::store::{Action, Store};
//!
//! # async fn example(product: shelfsync::shared::Product) {
//! let store = Store::new();
//! store.dispatch(Action::AddStarted).await;
//! store
//!     .dispatch(Action::AddSucceeded { product, replaces: None })
//!     .await;
//! let state = store.snapshot().await;
//! assert_eq!(state.products.len(), 1);
//! # }
//! ```

use crate::shared::product::Product;
use tokio::sync::RwLock;

/// Snapshot of the product collection and its status flags
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductsState {
    /// The product collection; at most one entry per identifier
    pub products: Vec<Product>,
    /// Whether a fetch is in flight
    pub fetching: bool,
    /// Last fetch error, if any
    pub fetch_error: Option<String>,
    /// Whether a mutation is in flight
    pub updating: bool,
    /// Last mutation error, if any
    pub update_error: Option<String>,
    /// Transient user-facing notice
    pub success_message: Option<String>,
}

impl ProductsState {
    /// Locate a product by identifier
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.has_id(id))
    }
}

/// Every transition the store can make
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchStarted,
    FetchSucceeded {
        products: Vec<Product>,
    },
    FetchFailed {
        error: String,
    },
    AddStarted,
    /// A create was confirmed (remotely or optimistically). When the confirmed
    /// record supersedes an optimistic placeholder, `replaces` carries the
    /// placeholder id so the swap happens in a single transition.
    AddSucceeded {
        product: Product,
        replaces: Option<String>,
    },
    AddFailed {
        error: String,
    },
    UpdateStarted,
    UpdateSucceeded {
        product: Product,
    },
    UpdateFailed {
        error: String,
    },
    DeleteStarted,
    DeleteSucceeded {
        id: String,
    },
    DeleteFailed {
        error: String,
    },
    ShowSuccess {
        message: String,
    },
    HideSuccess,
}

/// Pure transition function: `(snapshot, action) -> new snapshot`.
///
/// Total over `Action`; the compiler enforces that every kind is handled.
pub fn reduce(state: &ProductsState, action: &Action) -> ProductsState {
    let mut next = state.clone();
    match action {
        Action::FetchStarted => {
            next.fetching = true;
            next.fetch_error = None;
        }
        Action::FetchSucceeded { products } => {
            next.products = products.clone();
            next.fetching = false;
        }
        Action::FetchFailed { error } => {
            next.fetch_error = Some(error.clone());
            next.fetching = false;
        }
        Action::AddStarted | Action::UpdateStarted | Action::DeleteStarted => {
            next.update_error = None;
            next.updating = true;
        }
        Action::AddSucceeded { product, replaces } => {
            if let Some(replaced) = replaces {
                next.products.retain(|p| !p.has_id(replaced));
            }
            merge(&mut next.products, product);
            next.updating = false;
            next.update_error = None;
        }
        Action::UpdateSucceeded { product } => {
            merge(&mut next.products, product);
            next.updating = false;
        }
        Action::DeleteSucceeded { id } => {
            next.products.retain(|p| !p.has_id(id));
            next.updating = false;
        }
        Action::AddFailed { error }
        | Action::UpdateFailed { error }
        | Action::DeleteFailed { error } => {
            next.update_error = Some(error.clone());
            next.updating = false;
        }
        Action::ShowSuccess { message } => {
            next.success_message = Some(message.clone());
        }
        Action::HideSuccess => {
            next.success_message = None;
        }
    }
    next
}

/// Locate by id and replace in place; insert at the front when absent.
fn merge(products: &mut Vec<Product>, product: &Product) {
    let existing = product
        .id
        .as_deref()
        .and_then(|id| products.iter().position(|p| p.has_id(id)));
    match existing {
        Some(index) => products[index] = product.clone(),
        None => products.insert(0, product.clone()),
    }
}

/// Serialized owner of the product state.
///
/// `dispatch` applies the reducer under the write lock, so transitions from
/// independent sources (user edits, push frames, fetch refreshes) apply in
/// whatever order their dispatch calls arrive, never concurrently.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<ProductsState>,
}

impl Store {
    /// Create a store with an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transition
    pub async fn dispatch(&self, action: Action) {
        let mut state = self.state.write().await;
        tracing::debug!(?action, "store transition");
        *state = reduce(&state, &action);
    }

    /// Clone the current snapshot
    pub async fn snapshot(&self) -> ProductsState {
        self.state.read().await.clone()
    }

    /// Discard the snapshot on session teardown
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        *state = ProductsState::default();
    }
}
