use std::collections::BTreeMap;

use scenecast_core::{
    ClientEvent, ConnectionId, DisconnectScope, MovementPatch, Outbound, PlayerUpdate, SceneName,
    ServerEvent,
};
use tracing::{debug, info, trace};

use crate::registry::Registry;

/// Scene membership and fan-out decisions.
///
/// Every operation runs to completion against the registry and returns the
/// events to deliver. Nothing here talks to a socket; the caller owns
/// delivery and must feed operations in one at a time.
#[derive(Debug, Default)]
pub struct RelayEngine {
    registry: Registry,
    disconnect_scope: DisconnectScope,
}

impl RelayEngine {
    pub fn new(disconnect_scope: DisconnectScope) -> Self {
        Self::with_registry(Registry::new(), disconnect_scope)
    }

    pub fn with_registry(registry: Registry, disconnect_scope: DisconnectScope) -> Self {
        Self {
            registry,
            disconnect_scope,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dispatch a decoded client event from `from`.
    pub fn handle(&mut self, from: &ConnectionId, event: ClientEvent) -> Vec<Outbound> {
        match event {
            ClientEvent::SetScene(scene) => self.set_scene(from, scene),
            ClientEvent::RequestCurrentPlayers(scene) => self.request_current_players(from, &scene),
            ClientEvent::NewPlayerReady(scene) => self.new_player_ready(from, &scene),
            ClientEvent::PlayerMovement(patch) => self.player_movement(from, &patch),
        }
    }

    /// Register a freshly accepted connection. Emits nothing.
    pub fn connect(&mut self, id: ConnectionId) -> Vec<Outbound> {
        if !self.registry.insert(id.clone()) {
            debug!(conn_id = %id, "connection already registered");
        }
        Vec::new()
    }

    /// Move `id` into `scene`, telling its previous scene-mates it left.
    ///
    /// Departures are computed from membership before the move. The new
    /// scene hears nothing until `new_player_ready`.
    pub fn set_scene(&mut self, id: &ConnectionId, scene: SceneName) -> Vec<Outbound> {
        let Some(conn) = self.registry.get(id) else {
            debug!(conn_id = %id, %scene, "set_scene from unknown connection");
            return Vec::new();
        };

        let mut out = Vec::new();
        if let Some(prev) = conn.scene.as_ref().filter(|prev| **prev != scene) {
            out = self
                .registry
                .peers(prev, id)
                .into_iter()
                .map(|peer| Outbound::to(peer, ServerEvent::PlayerDisconnected(id.clone())))
                .collect();
            info!(conn_id = %id, from = %prev, to = %scene, notified = out.len(), "scene change");
        } else if conn.scene.is_none() {
            info!(conn_id = %id, to = %scene, "joined scene");
        }

        let _ = self.registry.assign_scene(id, scene);
        out
    }

    /// Reply to `id` with every other occupant of `scene`.
    pub fn request_current_players(&self, id: &ConnectionId, scene: &SceneName) -> Vec<Outbound> {
        if !self.registry.contains(id) {
            debug!(conn_id = %id, %scene, "roster request from unknown connection");
            return Vec::new();
        }

        let players: BTreeMap<_, _> = self
            .registry
            .members(scene)
            .filter(|peer| *peer != id)
            .filter_map(|peer| self.registry.get(peer))
            .map(|peer| (peer.id.clone(), peer.snapshot()))
            .collect();

        trace!(conn_id = %id, %scene, players = players.len(), "current players");
        vec![Outbound::to(id.clone(), ServerEvent::CurrentPlayers(players))]
    }

    /// Announce `id` to every other occupant of `scene`.
    pub fn new_player_ready(&self, id: &ConnectionId, scene: &SceneName) -> Vec<Outbound> {
        let Some(conn) = self.registry.get(id) else {
            debug!(conn_id = %id, %scene, "ready from unknown connection");
            return Vec::new();
        };

        let update = PlayerUpdate {
            id: id.clone(),
            snapshot: conn.snapshot(),
        };
        let out = self.fan_out(scene, id, |_| ServerEvent::NewPlayer(update.clone()));
        trace!(conn_id = %id, %scene, recipients = out.len(), "new player");
        out
    }

    /// Merge `patch` into the mover's state and send the result to its
    /// scene-mates. Movement from an unregistered id is dropped.
    pub fn player_movement(&mut self, id: &ConnectionId, patch: &MovementPatch) -> Vec<Outbound> {
        let Some(conn) = self.registry.apply_movement(id, patch) else {
            trace!(conn_id = %id, "movement from unknown connection");
            return Vec::new();
        };

        let Some(scene) = conn.scene.clone() else {
            return Vec::new();
        };
        let update = PlayerUpdate {
            id: id.clone(),
            snapshot: conn.snapshot(),
        };
        self.fan_out(&scene, id, |_| ServerEvent::PlayerMoved(update.clone()))
    }

    /// Drop `id` and notify whoever should hear about it.
    ///
    /// The registry entry is gone before recipients are chosen, so the
    /// departed id is never a recipient.
    pub fn disconnect(&mut self, id: &ConnectionId) -> Vec<Outbound> {
        let Some(conn) = self.registry.remove(id) else {
            debug!(conn_id = %id, "disconnect of unknown connection");
            return Vec::new();
        };

        let departed = || ServerEvent::PlayerDisconnected(id.clone());
        let out = match (self.disconnect_scope, &conn.scene) {
            (DisconnectScope::Scene, Some(scene)) => self
                .registry
                .members(scene)
                .map(|peer| Outbound::to(peer.clone(), departed()))
                .collect(),
            (DisconnectScope::Scene, None) => Vec::new(),
            (DisconnectScope::All, _) => vec![Outbound::to_all(departed())],
        };

        info!(
            conn_id = %id,
            scene = conn.scene.as_ref().map(SceneName::as_str),
            remaining = self.registry.len(),
            "disconnected"
        );
        out
    }

    fn fan_out(
        &self,
        scene: &SceneName,
        except: &ConnectionId,
        event: impl Fn(&ConnectionId) -> ServerEvent,
    ) -> Vec<Outbound> {
        self.registry
            .peers(scene, except)
            .into_iter()
            .map(|peer| {
                let event = event(&peer);
                Outbound::to(peer, event)
            })
            .collect()
    }
}
