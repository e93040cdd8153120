use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::ids::ConnectionId;
use crate::state::{MovementPatch, PlayerState, SceneName};

pub const SET_SCENE: &str = "set_scene";
pub const REQUEST_CURRENT_PLAYERS: &str = "requestCurrentPlayers";
pub const NEW_PLAYER_READY: &str = "newPlayerReady";
pub const PLAYER_MOVEMENT: &str = "playerMovement";

/// Named event with a body, as carried in one WebSocket text frame.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Events a client sends about itself.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    SetScene(SceneName),
    RequestCurrentPlayers(SceneName),
    NewPlayerReady(SceneName),
    PlayerMovement(MovementPatch),
}

impl ClientEvent {
    /// Decode a `{"event": ..., "data": ...}` text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        Self::from_parts(&frame.event, &frame.data)
    }

    pub fn from_parts(event: &str, data: &Value) -> Result<Self, ProtocolError> {
        match event {
            SET_SCENE => scene_payload(SET_SCENE, data).map(Self::SetScene),
            REQUEST_CURRENT_PLAYERS => {
                scene_payload(REQUEST_CURRENT_PLAYERS, data).map(Self::RequestCurrentPlayers)
            }
            NEW_PLAYER_READY => scene_payload(NEW_PLAYER_READY, data).map(Self::NewPlayerReady),
            PLAYER_MOVEMENT => MovementPatch::from_value(data)
                .map(Self::PlayerMovement)
                .ok_or(ProtocolError::MalformedPayload {
                    event: PLAYER_MOVEMENT,
                    reason: "expected an object",
                }),
            other => Err(ProtocolError::UnknownEvent(other.to_owned())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetScene(_) => SET_SCENE,
            Self::RequestCurrentPlayers(_) => REQUEST_CURRENT_PLAYERS,
            Self::NewPlayerReady(_) => NEW_PLAYER_READY,
            Self::PlayerMovement(_) => PLAYER_MOVEMENT,
        }
    }
}

fn scene_payload(event: &'static str, data: &Value) -> Result<SceneName, ProtocolError> {
    data.as_str()
        .and_then(SceneName::new)
        .ok_or(ProtocolError::MalformedPayload {
            event,
            reason: "expected a non-empty scene name",
        })
}

/// A player's transform plus the scene it is in.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    #[serde(flatten)]
    pub state: PlayerState,
    pub scene: Option<SceneName>,
}

/// A snapshot tagged with the id of the player it describes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerUpdate {
    pub id: ConnectionId,
    #[serde(flatten)]
    pub snapshot: PlayerSnapshot,
}

/// Events the relay sends to clients.
///
/// Serializes as `{"event": <name>, "data": <payload>}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent by the transport on accept so the client learns its own id.
    #[serde(rename = "connected")]
    Connected { id: ConnectionId },

    #[serde(rename = "currentPlayers")]
    CurrentPlayers(BTreeMap<ConnectionId, PlayerSnapshot>),

    #[serde(rename = "newPlayer")]
    NewPlayer(PlayerUpdate),

    #[serde(rename = "playerMoved")]
    PlayerMoved(PlayerUpdate),

    #[serde(rename = "playerDisconnected")]
    PlayerDisconnected(ConnectionId),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::CurrentPlayers(_) => "currentPlayers",
            Self::NewPlayer(_) => "newPlayer",
            Self::PlayerMoved(_) => "playerMoved",
            Self::PlayerDisconnected(_) => "playerDisconnected",
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
