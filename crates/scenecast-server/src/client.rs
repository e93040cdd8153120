use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use scenecast_core::{ClientEvent, ConnectionId};
use scenecast_telemetry::{RELAY_DELIVERY_DROPS_TOTAL, RELAY_MALFORMED_TOTAL, WS_EVICTIONS_TOTAL};
use tokio::sync::mpsc;

use crate::relay::RelayHandle;

/// What to do with a frame whose recipient's queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Superseded by a later frame of the same kind; dropped on overflow.
    Lossy,
    /// Must arrive in order; on overflow the connection is closed instead.
    Reliable,
}

/// Send side of one connection's outbound queue.
struct ClientHandle {
    tx: mpsc::Sender<Arc<String>>,
    dropped: AtomicU64,
}

/// Outbound queues of every open WebSocket, keyed by connection id.
///
/// This is transport state only. Scene membership lives in the engine.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, ClientHandle>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Assign a new id and open its outbound queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<Arc<String>>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let _ = self.clients.insert(
            id.clone(),
            ClientHandle {
                tx,
                dropped: AtomicU64::new(0),
            },
        );
        (id, rx)
    }

    /// Close a connection's queue. Its writer drains what is left and stops.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Queue a frame for one connection without waiting.
    ///
    /// A full queue drops a [`Delivery::Lossy`] frame. For a
    /// [`Delivery::Reliable`] frame the connection is evicted instead: its
    /// queue is closed, the writer drains what is buffered and the socket
    /// goes through the normal disconnect path. A closed or unknown queue is
    /// ignored.
    pub fn send_to(&self, id: &ConnectionId, frame: Arc<String>, delivery: Delivery) -> bool {
        let overflow = {
            let Some(client) = self.clients.get(id) else {
                return false;
            };
            match client.tx.try_send(frame) {
                Ok(()) => return true,
                Err(mpsc::error::TrySendError::Closed(_)) => return false,
                Err(mpsc::error::TrySendError::Full(frame)) => {
                    let drops = client.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    (frame.len(), drops)
                }
            }
        };
        let (frame_len, drops) = overflow;

        match delivery {
            Delivery::Lossy => {
                counter!(RELAY_DELIVERY_DROPS_TOTAL).increment(1);
                tracing::warn!(
                    conn_id = %id,
                    frame_len,
                    total_drops = drops,
                    "send queue full, dropping frame"
                );
            }
            Delivery::Reliable => {
                // The map guard above is released; removing under it would deadlock.
                if self.clients.remove(id).is_some() {
                    counter!(WS_EVICTIONS_TOTAL).increment(1);
                    tracing::warn!(
                        conn_id = %id,
                        frame_len,
                        "send queue full on a reliable frame, closing connection"
                    );
                }
            }
        }
        false
    }

    /// Queue a frame for every open connection. Returns how many accepted it.
    pub fn send_all(&self, frame: &Arc<String>, delivery: Delivery) -> usize {
        let ids: Vec<ConnectionId> = self.clients.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.send_to(id, Arc::clone(frame), delivery))
            .count()
    }

    /// Number of open connections.
    pub fn count(&self) -> usize {
        self.clients.len()
    }
}

/// Pump one WebSocket until either direction closes.
///
/// Text frames are decoded and forwarded to the relay in arrival order;
/// anything that fails to decode is dropped. The writer drains the
/// connection's outbound queue and pings on `heartbeat_interval`. Once the
/// socket is done the relay is told the connection is gone.
pub async fn handle_ws_connection(
    socket: WebSocket,
    conn_id: ConnectionId,
    mut rx: mpsc::Receiver<Arc<String>>,
    relay: RelayHandle,
    heartbeat_interval: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = conn_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        let _ = ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(WsMessage::Text(frame.as_str().to_owned().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(conn_id = %writer_cid, "sent ping");
                }
            }
        }
    });

    let reader_cid = conn_id.clone();
    let reader_relay = relay.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match ClientEvent::decode(text.as_str()) {
                    Ok(event) => reader_relay.event(reader_cid.clone(), event).await,
                    Err(e) => {
                        counter!(RELAY_MALFORMED_TOTAL, "kind" => e.error_kind()).increment(1);
                        tracing::debug!(conn_id = %reader_cid, error = %e, "dropping inbound frame");
                    }
                },
                WsMessage::Close(_) => break,
                // axum answers pings itself; binary frames are not part of the protocol
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    relay.disconnect(conn_id).await;
}
