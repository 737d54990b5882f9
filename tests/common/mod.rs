//! Shared fixtures for the integration suites: sample records, a polling
//! helper, and a minimal push server speaking the realtime wire protocol.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use shelfsync::shared::event::ChangeFrame;
use shelfsync::shared::product::{GeoPoint, PhotoRef, Product};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// A plain in-stock tool
pub fn widget() -> Product {
    Product {
        id: None,
        name: "Widget".to_string(),
        category: "Tools".to_string(),
        price: Decimal::new(999, 2),
        in_stock: true,
        photos: Vec::new(),
        location: None,
    }
}

/// A fully populated record, photos and location included
pub fn widget_with_extras(id: &str) -> Product {
    Product {
        id: Some(id.to_string()),
        photos: vec![PhotoRef {
            filepath: "photos/widget.jpeg".to_string(),
            webview_path: Some("blob:widget".to_string()),
        }],
        location: Some(GeoPoint {
            lat: 46.77,
            lng: 23.59,
        }),
        ..widget()
    }
}

/// Poll `check` until it passes or five seconds elapse
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Minimal websocket push server: records each connection's authorization
/// handshake and broadcasts pushed frames to every open connection.
pub struct PushServer {
    url: String,
    frames: broadcast::Sender<String>,
    handshakes: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl PushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (frames, _) = broadcast::channel(64);
        let handshakes = Arc::new(Mutex::new(Vec::new()));

        let frames_tx = frames.clone();
        let recorded = Arc::clone(&handshakes);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let mut rx = frames_tx.subscribe();
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut outbound, mut inbound) = ws.split();
                    if let Some(Ok(Message::Text(text))) = inbound.next().await {
                        recorded.lock().await.push(text);
                    }
                    loop {
                        tokio::select! {
                            frame = rx.recv() => match frame {
                                Ok(text) => {
                                    if outbound.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            },
                            received = inbound.next() => match received {
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            url,
            frames,
            handshakes,
            task,
        }
    }

    /// Websocket URL of the server
    pub fn ws_url(&self) -> &str {
        &self.url
    }

    /// Same endpoint spelled as an HTTP base URL, for `Config`
    pub fn http_url(&self) -> String {
        self.url.replacen("ws://", "http://", 1)
    }

    /// Broadcast a change frame to connected clients
    pub fn push(&self, frame: &ChangeFrame) {
        let _ = self.frames.send(serde_json::to_string(frame).unwrap());
    }

    /// Broadcast a raw (possibly malformed) text frame
    pub fn push_raw(&self, text: &str) {
        let _ = self.frames.send(text.to_string());
    }

    /// Authorization handshakes received so far, in arrival order
    pub async fn handshakes(&self) -> Vec<String> {
        self.handshakes.lock().await.clone()
    }
}

impl Drop for PushServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
