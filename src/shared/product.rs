//! Product Records
//!
//! Defines the canonical product record exchanged with the backend and held in
//! the local store, together with its photo references and geographic tag.
//! Field names on the wire follow the backend's JSON contract (`_id`,
//! `inStock`, `webviewPath`), so these types serialize straight into request
//! bodies and deserialize straight out of push frames.
//!
//! A product has no identifier until the server assigns one; offline creates
//! carry a client-generated placeholder until the pending create is replayed
//! and confirmed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to a product photo: the captured file plus an optional
/// display URL resolved for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRef {
    /// Local file path of the captured photo
    pub filepath: String,
    /// Resolved display URL, when one exists
    #[serde(rename = "webviewPath", default, skip_serializing_if = "Option::is_none")]
    pub webview_path: Option<String>,
}

/// Geographic position attached to a product
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
}

/// A catalog product.
///
/// All fields other than the identifier default when absent, matching the
/// permissive decoding of the backend's push frames (a `deleted` frame may
/// carry little more than the identifier).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Product {
    /// Server-assigned identifier; `None` until the first successful create
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Category label
    #[serde(default)]
    pub category: String,
    /// Unit price
    #[serde(with = "rust_decimal::serde::float", default)]
    pub price: Decimal,
    /// Whether the product is currently in stock
    #[serde(rename = "inStock", default)]
    pub in_stock: bool,
    /// Ordered photo references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<PhotoRef>,
    /// Optional geographic tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl Product {
    /// Assign a client-generated placeholder identifier if the product does
    /// not have one yet. Used for optimistic offline creates.
    pub fn with_placeholder_id(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
        self
    }

    /// Strip the identifier, producing the body of a create request
    /// (the server assigns the canonical id).
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    /// Whether this record carries the given identifier
    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }
}
