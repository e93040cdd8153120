use std::sync::Arc;

use metrics::{counter, gauge};
use scenecast_core::{ClientEvent, ConnectionId, Outbound, Recipient, ServerEvent};
use scenecast_engine::RelayEngine;
use scenecast_telemetry::{
    RELAY_EVENTS_TOTAL, RELAY_OUTBOUND_TOTAL, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{ClientRegistry, Delivery};

/// Work items for the relay task, in the order they must be applied.
#[derive(Debug)]
pub enum RelayCommand {
    Connect(ConnectionId),
    Event { from: ConnectionId, event: ClientEvent },
    Disconnect(ConnectionId),
}

/// Cloneable sender into the relay task.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    pub async fn connect(&self, id: ConnectionId) {
        self.send(RelayCommand::Connect(id)).await;
    }

    pub async fn event(&self, from: ConnectionId, event: ClientEvent) {
        self.send(RelayCommand::Event { from, event }).await;
    }

    pub async fn disconnect(&self, id: ConnectionId) {
        self.send(RelayCommand::Disconnect(id)).await;
    }

    async fn send(&self, command: RelayCommand) {
        if self.tx.send(command).await.is_err() {
            tracing::warn!("relay task stopped, dropping command");
        }
    }
}

/// Start the relay task. It is the only owner of `engine`, so every
/// operation sees the registry exactly as the previous one left it.
pub fn spawn_relay(
    engine: RelayEngine,
    registry: Arc<ClientRegistry>,
    capacity: usize,
) -> (RelayHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = tokio::spawn(run_relay(engine, rx, registry));
    (RelayHandle { tx }, handle)
}

async fn run_relay(
    mut engine: RelayEngine,
    mut rx: mpsc::Receiver<RelayCommand>,
    registry: Arc<ClientRegistry>,
) {
    while let Some(command) = rx.recv().await {
        let out = match command {
            RelayCommand::Connect(id) => {
                counter!(WS_CONNECTIONS_TOTAL).increment(1);
                tracing::info!(conn_id = %id, "client connected");
                engine.connect(id)
            }
            RelayCommand::Event { from, event } => {
                counter!(RELAY_EVENTS_TOTAL, "event" => event.name()).increment(1);
                engine.handle(&from, event)
            }
            RelayCommand::Disconnect(id) => {
                counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
                let out = engine.disconnect(&id);
                // Close the queue before delivering so a broadcast cannot reach it.
                let _ = registry.unregister(&id);
                out
            }
        };
        gauge!(WS_CONNECTIONS_ACTIVE).set(engine.registry().len() as f64);
        let _ = deliver(&registry, out);
    }
    tracing::info!("relay task stopped");
}

/// Hand each outbound event to the transport. Returns frames queued.
///
/// Identical consecutive events (one fan-out) are encoded once.
pub fn deliver(registry: &ClientRegistry, out: Vec<Outbound>) -> usize {
    let mut queued = 0;
    let mut last: Option<(ServerEvent, Arc<String>)> = None;

    for Outbound { to, event } in out {
        let cached = last
            .as_ref()
            .filter(|(prev, _)| *prev == event)
            .map(|(_, frame)| Arc::clone(frame));
        let frame = match cached {
            Some(frame) => frame,
            None => match event.encode() {
                Ok(json) => {
                    let frame = Arc::new(json);
                    last = Some((event.clone(), Arc::clone(&frame)));
                    frame
                }
                Err(e) => {
                    tracing::warn!(event = event.name(), error = %e, "failed to encode event");
                    continue;
                }
            },
        };

        let delivery = delivery_for(&event);
        let sent = match &to {
            Recipient::Connection(id) => usize::from(registry.send_to(id, frame, delivery)),
            Recipient::All => registry.send_all(&frame, delivery),
        };
        counter!(RELAY_OUTBOUND_TOTAL, "event" => event.name()).increment(sent as u64);
        queued += sent;
    }
    queued
}

/// Only movement may be lost on overflow: the next `playerMoved` carries the
/// full state again. Rosters, arrivals and departures are never repeated.
fn delivery_for(event: &ServerEvent) -> Delivery {
    match event {
        ServerEvent::PlayerMoved(_) => Delivery::Lossy,
        _ => Delivery::Reliable,
    }
}
