//! # Realtime Update Channel
//!
//! One push connection per active session token. After the socket opens, the
//! channel sends a single authorization handshake and then treats every
//! inbound text frame as a change notification, dispatching it into the store
//! through the same merge rule as local mutations, so a push-originated update
//! and a locally-originated one are indistinguishable to the store.
//!
//! Malformed frames are logged and dropped without closing the connection.
//! Socket-level failures do close it, and the channel reconnects with capped
//! exponential backoff for as long as its token remains active; `close()`
//! (driven by teardown or token loss) ends the lifecycle for good.
//!
//! ## States
//!
//! `Closed` → `Connecting` → `Open` → (`Error` → backoff → `Connecting` | `Closed`)

use crate::client::config::Config;
use crate::client::store::{Action, Store};
use crate::shared::event::{ChangeFrame, ChangeKind, HandshakeFrame};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Notice shown when a pushed update carries no message of its own
const UPDATED_NOTICE: &str = "Product updated successfully!";

/// Connection state of the push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// No connection and none being attempted
    Closed,
    /// Connection attempt in flight
    Connecting,
    /// Connected, handshake sent, receiving frames
    Open,
    /// Connection lost; a reconnect is pending
    Error(String),
}

/// Builds push channels bound to a session token.
///
/// Injected into the product service so tests (and alternative transports)
/// can point the channel anywhere.
#[derive(Debug, Clone)]
pub struct ChannelFactory {
    ws_url: String,
    connect_timeout: Duration,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl ChannelFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            ws_url: config.ws_url(),
            connect_timeout: config.get_connect_timeout(),
            backoff_base: config.get_backoff_base(),
            backoff_cap: config.get_backoff_cap(),
        }
    }

    /// Open a channel for `token`, dispatching decoded frames into `store`.
    ///
    /// The channel owns a background task whose lifetime is bound to the
    /// returned handle; dropping or closing the handle ends the connection.
    pub fn open(&self, token: impl Into<String>, store: Arc<Store>) -> RealtimeChannel {
        let (status_tx, status_rx) = watch::channel(ChannelStatus::Closed);
        let status_tx = Arc::new(status_tx);
        let task = tokio::spawn(run_channel(
            self.clone(),
            token.into(),
            store,
            Arc::clone(&status_tx),
        ));
        RealtimeChannel {
            task,
            status_tx,
            status_rx,
        }
    }
}

/// Handle to one live push connection
#[derive(Debug)]
pub struct RealtimeChannel {
    task: JoinHandle<()>,
    status_tx: Arc<watch::Sender<ChannelStatus>>,
    status_rx: watch::Receiver<ChannelStatus>,
}

impl RealtimeChannel {
    /// Current connection state
    pub fn status(&self) -> ChannelStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to connection state changes
    pub fn subscribe_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status_rx.clone()
    }

    /// End the channel's lifecycle (teardown / token loss)
    pub fn close(&self) {
        self.task.abort();
        self.status_tx.send_replace(ChannelStatus::Closed);
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connect-receive-reconnect loop; runs until the owning handle aborts it.
async fn run_channel(
    factory: ChannelFactory,
    token: String,
    store: Arc<Store>,
    status: Arc<watch::Sender<ChannelStatus>>,
) {
    let handshake = match serde_json::to_string(&HandshakeFrame::Authorization {
        token: token.clone(),
    }) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "handshake frame could not be encoded");
            status.send_replace(ChannelStatus::Closed);
            return;
        }
    };

    let mut delay = factory.backoff_base;
    loop {
        status.send_replace(ChannelStatus::Connecting);
        tracing::debug!(url = %factory.ws_url, "connecting push channel");

        let connected = tokio::time::timeout(
            factory.connect_timeout,
            connect_async(factory.ws_url.as_str()),
        )
        .await;
        let mut ws = match connected {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "push channel connect failed (will retry)");
                status.send_replace(ChannelStatus::Error(e.to_string()));
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(factory.backoff_cap);
                continue;
            }
            Err(_) => {
                tracing::warn!("push channel connect timed out (will retry)");
                status.send_replace(ChannelStatus::Error("connect timed out".to_string()));
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(factory.backoff_cap);
                continue;
            }
        };

        if let Err(e) = ws.send(Message::Text(handshake.clone())).await {
            tracing::warn!(error = %e, "handshake send failed (will retry)");
            status.send_replace(ChannelStatus::Error(e.to_string()));
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(factory.backoff_cap);
            continue;
        }

        tracing::info!("push channel open");
        status.send_replace(ChannelStatus::Open);
        delay = factory.backoff_base;

        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Text(text)) => apply_frame(&store, &text).await,
                Ok(Message::Close(_)) => {
                    tracing::info!("server closed push channel");
                    break;
                }
                // Pings and pongs are handled by the transport; binary
                // frames are not part of the protocol.
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "push channel read failed");
                    break;
                }
            }
        }

        status.send_replace(ChannelStatus::Error("connection lost".to_string()));
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(factory.backoff_cap);
    }
}

/// Decode one inbound frame and dispatch it. Undecodable frames are dropped;
/// the connection stays open.
async fn apply_frame(store: &Store, text: &str) {
    let frame: ChangeFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "dropping malformed push frame");
            return;
        }
    };

    tracing::debug!(event = ?frame.event, "push frame");
    match frame.event {
        ChangeKind::Created => {
            store
                .dispatch(Action::AddSucceeded {
                    product: frame.payload.updated_product,
                    replaces: None,
                })
                .await;
        }
        ChangeKind::Updated => {
            let message = frame
                .payload
                .success_message
                .unwrap_or_else(|| UPDATED_NOTICE.to_string());
            store
                .dispatch(Action::UpdateSucceeded {
                    product: frame.payload.updated_product,
                })
                .await;
            store.dispatch(Action::ShowSuccess { message }).await;
        }
        ChangeKind::Deleted => match frame.payload.updated_product.id {
            Some(id) => store.dispatch(Action::DeleteSucceeded { id }).await,
            None => tracing::warn!("dropping deleted frame without product id"),
        },
    }
}
