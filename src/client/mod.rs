//! # Sync Engine
//!
//! The client-side data-synchronization engine around the product collection.
//!
//! ## Architecture
//!
//! The engine consists of:
//! - **State Store**: reducer-owned product collection and status flags
//! - **Product API**: bounded, bearer-authenticated CRUD calls
//! - **Pending Queue**: durable record of offline mutations
//! - **Reconciler**: single-flight queue replay on reconnect
//! - **Realtime Channel**: push connection merging server-originated changes
//! - **Product Service**: the composition the application talks to
//!
//! ## Key Components
//!
//! - `store.rs`: pure reducer and serialized dispatch
//! - `api.rs`: remote data client
//! - `queue.rs`: durable pending-operation queue
//! - `reconcile.rs`: reconnection reconciler
//! - `realtime.rs`: realtime update channel
//! - `session.rs`: token and connectivity signals
//! - `service.rs`: composed product service
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shelfsync::client::api::ProductApi;
//! use shelfsync::client::config::Config;
//! use shelfsync::client::queue::PendingQueue;
//! use shelfsync::client::realtime::ChannelFactory;
//! use shelfsync::client::service::ProductService;
//! use shelfsync::client::session::{ConnectivitySignal, SessionSignal};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new();
//! let session = SessionSignal::new();
//! let connectivity = ConnectivitySignal::new(true);
//!
//! let service = ProductService::new(
//!     &config,
//!     ProductApi::new(&config),
//!     PendingQueue::open_default().await?,
//!     ChannelFactory::new(&config),
//!     session.subscribe(),
//!     connectivity.subscribe(),
//! );
//! service.start().await;
//!
//! session.set_token("bearer-token");
//! let products = service.load_products().await?;
//! # let _ = products;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod queue;
pub mod realtime;
pub mod reconcile;
pub mod service;
pub mod session;
pub mod store;

// Re-export main types
pub use api::ProductApi;
pub use config::Config;
pub use queue::{OperationKind, PendingOperation, PendingQueue};
pub use realtime::{ChannelFactory, ChannelStatus, RealtimeChannel};
pub use reconcile::{PassSummary, Reconciler};
pub use service::ProductService;
pub use session::{ConnectivitySignal, SessionSignal};
pub use store::{Action, ProductsState, Store};
