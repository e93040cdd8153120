use serde::{Deserialize, Serialize};

use crate::events::ServerEvent;
use crate::ids::ConnectionId;

/// Who an outbound event is delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    Connection(ConnectionId),
    All,
}

/// A delivery decision made by the engine and carried out by the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub event: ServerEvent,
}

impl Outbound {
    pub fn to(id: ConnectionId, event: ServerEvent) -> Self {
        Self {
            to: Recipient::Connection(id),
            event,
        }
    }

    pub fn to_all(event: ServerEvent) -> Self {
        Self {
            to: Recipient::All,
            event,
        }
    }

    pub fn recipient(&self) -> Option<&ConnectionId> {
        match &self.to {
            Recipient::Connection(id) => Some(id),
            Recipient::All => None,
        }
    }
}

/// Who hears about a disconnect.
///
/// `Scene` notifies only the connections that shared the departed
/// connection's last scene. `All` notifies every remaining connection,
/// including ones that never saw the departed player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectScope {
    #[default]
    Scene,
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_accessor() {
        let id = ConnectionId::new();
        let direct = Outbound::to(id.clone(), ServerEvent::PlayerDisconnected(id.clone()));
        assert_eq!(direct.recipient(), Some(&id));

        let broadcast = Outbound::to_all(ServerEvent::PlayerDisconnected(id));
        assert_eq!(broadcast.recipient(), None);
        assert_eq!(broadcast.to, Recipient::All);
    }

    #[test]
    fn disconnect_scope_wire_names() {
        assert_eq!(serde_json::to_string(&DisconnectScope::Scene).unwrap(), "\"scene\"");
        let scope: DisconnectScope = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(scope, DisconnectScope::All);
        assert_eq!(DisconnectScope::default(), DisconnectScope::Scene);
    }
}
