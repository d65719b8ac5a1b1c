use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::infrastructure::processors::common::slash_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadEvent {
    Connected,
    CssUpdate { path: String },
    FullReload { path: String },
}

impl ReloadEvent {
    /// Stylesheets can be swapped in place, everything else needs a reload.
    pub fn for_path(path: &Path) -> Self {
        let path_str = slash_path(path);
        match path.extension().and_then(|e| e.to_str()) {
            Some("css") => ReloadEvent::CssUpdate { path: path_str },
            _ => ReloadEvent::FullReload { path: path_str },
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveReloadClient {
    pub id: String,
    pub connected_at: SystemTime,
}

/// Fan-out of reload events to every connected browser.
#[derive(Clone)]
pub struct LiveReloadHub {
    clients: Arc<DashMap<String, LiveReloadClient>>,
    sender: broadcast::Sender<ReloadEvent>,
}

impl Default for LiveReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            clients: Arc::new(DashMap::new()),
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// Returns how many receivers got the event.
    pub fn notify(&self, event: ReloadEvent) -> usize {
        tracing::info!("🔄 Reload: {:?} ({} clients)", event, self.client_count());
        self.sender.send(event).unwrap_or(0)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub async fn handle_socket(self, socket: WebSocket) {
        let (mut sender, mut receiver) = socket.split();
        let mut events = self.subscribe();
        let client_id = Uuid::new_v4().to_string();

        self.clients.insert(
            client_id.clone(),
            LiveReloadClient {
                id: client_id.clone(),
                connected_at: SystemTime::now(),
            },
        );
        tracing::debug!("🔌 Live reload client connected: {}", client_id);

        if let Ok(hello) = serde_json::to_string(&ReloadEvent::Connected) {
            let _ = sender.send(Message::Text(hello.into())).await;
        }

        loop {
            tokio::select! {
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        _ => {}
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            let Ok(json) = serde_json::to_string(&event) else { continue };
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        if let Some((_, client)) = self.clients.remove(&client_id) {
            let connected_for = client.connected_at.elapsed().unwrap_or_default();
            tracing::debug!(
                "🔌 Live reload client disconnected: {} after {:.1?}",
                client.id,
                connected_for
            );
        }
    }
}
