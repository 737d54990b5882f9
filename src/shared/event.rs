//! Realtime Wire Frames
//!
//! Types for the push channel's JSON protocol. The client sends exactly one
//! outbound frame after the socket opens (the authorization handshake); every
//! inbound frame is a change notification carrying the event kind and the full
//! product record it concerns.
//!
//! # Wire Shapes
//!
//! Outbound handshake:
//!
//! ```json
//! {"type":"authorization","payload":{"token":"..."}}
//! ```
//!
//! Inbound change:
//!
//! ```json
//! {"event":"updated","payload":{"updatedProduct":{...},"successMessage":"..."}}
//! ```

use crate::shared::product::Product;
use serde::{Deserialize, Serialize};

/// First (and only) outbound frame on a fresh connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum HandshakeFrame {
    /// Presents the bearer token for this session
    Authorization {
        /// Token in effect when the channel opened
        token: String,
    },
}

/// Kind of change announced by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A product was created (by any client)
    Created,
    /// A product was updated (by any client)
    Updated,
    /// A product was deleted (by any client)
    Deleted,
}

/// Inbound change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFrame {
    /// What happened
    pub event: ChangeKind,
    /// The affected record plus an optional user-facing notice
    pub payload: ChangePayload,
}

/// Payload of a change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    /// The canonical record after the change
    #[serde(rename = "updatedProduct")]
    pub updated_product: Product,
    /// Optional notice to surface to the user
    #[serde(rename = "successMessage", default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
}

impl ChangeFrame {
    /// Build a change frame around a product record
    pub fn new(event: ChangeKind, updated_product: Product) -> Self {
        Self {
            event,
            payload: ChangePayload {
                updated_product,
                success_message: None,
            },
        }
    }

    /// Attach a user-facing notice
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.payload.success_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_wire_shape() {
        let frame = HandshakeFrame::Authorization {
            token: "secret".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "authorization");
        assert_eq!(json["payload"]["token"], "secret");
    }

    #[test]
    fn test_change_frame_decode() {
        let raw = r#"{
            "event": "updated",
            "payload": {
                "updatedProduct": {"_id": "7", "name": "Hammer", "category": "Tools", "price": 12.5, "inStock": false},
                "successMessage": "Product updated successfully!"
            }
        }"#;
        let frame: ChangeFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.event, ChangeKind::Updated);
        assert_eq!(frame.payload.updated_product.id.as_deref(), Some("7"));
        assert_eq!(
            frame.payload.success_message.as_deref(),
            Some("Product updated successfully!")
        );
    }

    #[test]
    fn test_deleted_frame_with_sparse_product() {
        let raw = r#"{"event":"deleted","payload":{"updatedProduct":{"_id":"42"}}}"#;
        let frame: ChangeFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.event, ChangeKind::Deleted);
        assert_eq!(frame.payload.updated_product.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_unknown_event_kind_rejected() {
        let raw = r#"{"event":"archived","payload":{"updatedProduct":{"_id":"1"}}}"#;
        assert!(serde_json::from_str::<ChangeFrame>(raw).is_err());
    }
}
