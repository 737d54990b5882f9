//! Shelfsync - Offline-First Product Sync Engine
//!
//! Shelfsync keeps a product catalog usable with or without a connection. The
//! in-memory collection is owned by a reducer-driven state store; mutations go
//! to the backend first and degrade to optimistic local applies backed by a
//! durable pending queue when the network is down; a realtime push channel
//! merges changes made by any client; and a reconciler replays the queue when
//! connectivity and a session token are both available again.
//!
//! # Module Structure
//!
//! - **`shared`** - Types independent of the engine itself
//!   - Product records and their wire encoding
//!   - Realtime frame definitions
//!   - The failure taxonomy
//!
//! - **`client`** - The sync engine
//!   - State store, product API, pending queue
//!   - Reconciler and realtime channel
//!   - The composed `ProductService`
//!
//! # Conflict Policy
//!
//! The server wins whenever it confirms an operation; while offline, the
//! latest local write wins (repeated offline edits to one product collapse to
//! a single queued snapshot). There is no merge algorithm beyond that.
//!
//! # Error Handling
//!
//! Fallible operations return `Result<T, SyncError>`; see
//! [`shared::error::SyncError`] for the taxonomy and how each category is
//! handled.

/// Shared types and data structures
pub mod shared;

/// Client-side sync engine
pub mod client;
