use std::collections::{BTreeSet, HashMap};

use scenecast_core::{ConnectionId, MovementPatch, PlayerSnapshot, PlayerState, SceneName};

/// One live transport session.
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub state: PlayerState,
    pub scene: Option<SceneName>,
}

impl Connection {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: PlayerState::default(),
            scene: None,
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state.clone(),
            scene: self.scene.clone(),
        }
    }
}

/// Every live connection, plus an index from scene to its occupants.
///
/// The index is only written by the methods that also write a connection's
/// `scene`, so the two never disagree. Scenes with no occupants are pruned.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    scenes: HashMap<SceneName, BTreeSet<ConnectionId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with default state. Returns `false` if it was
    /// already present, in which case nothing changes.
    pub fn insert(&mut self, id: ConnectionId) -> bool {
        if self.connections.contains_key(&id) {
            return false;
        }
        let _ = self.connections.insert(id.clone(), Connection::new(id));
        true
    }

    /// Remove a connection and drop it from its scene.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Connection> {
        let conn = self.connections.remove(id)?;
        if let Some(scene) = &conn.scene {
            self.unindex(scene, id);
        }
        Some(conn)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Move a connection into `scene`.
    ///
    /// Returns the previous scene, or `None` if the connection is unknown.
    pub fn assign_scene(
        &mut self,
        id: &ConnectionId,
        scene: SceneName,
    ) -> Option<Option<SceneName>> {
        let conn = self.connections.get_mut(id)?;
        if conn.scene.as_ref() == Some(&scene) {
            return Some(Some(scene));
        }
        let prev = conn.scene.replace(scene.clone());
        if let Some(prev) = &prev {
            self.unindex(prev, id);
        }
        let _ = self.scenes.entry(scene).or_default().insert(id.clone());
        Some(prev)
    }

    /// Merge a movement patch into a connection's state.
    pub fn apply_movement(
        &mut self,
        id: &ConnectionId,
        patch: &MovementPatch,
    ) -> Option<&Connection> {
        let conn = self.connections.get_mut(id)?;
        patch.apply(&mut conn.state);
        Some(conn)
    }

    /// Occupants of `scene`, in id order.
    pub fn members(&self, scene: &SceneName) -> impl Iterator<Item = &ConnectionId> {
        self.scenes.get(scene).into_iter().flatten()
    }

    /// Occupants of `scene` other than `except`.
    pub fn peers(&self, scene: &SceneName, except: &ConnectionId) -> Vec<ConnectionId> {
        self.members(scene)
            .filter(|id| *id != except)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of scenes with at least one occupant.
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    fn unindex(&mut self, scene: &SceneName, id: &ConnectionId) {
        if let Some(members) = self.scenes.get_mut(scene) {
            let _ = members.remove(id);
            if members.is_empty() {
                let _ = self.scenes.remove(scene);
            }
        }
    }
}
