//! Shared Types
//!
//! Platform-agnostic types used across the sync engine: the product record and
//! its wire encoding, realtime frame definitions, the failure taxonomy, and
//! base configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod product;

pub use error::SyncError;
pub use event::{ChangeFrame, ChangeKind, ChangePayload, HandshakeFrame};
pub use product::{GeoPoint, PhotoRef, Product};
