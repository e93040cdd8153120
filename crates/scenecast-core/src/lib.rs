//! Protocol types shared between the relay engine and its transport.

pub mod error;
pub mod events;
pub mod ids;
pub mod outbound;
pub mod state;

pub use error::ProtocolError;
pub use events::{ClientEvent, PlayerSnapshot, PlayerUpdate, ServerEvent};
pub use ids::ConnectionId;
pub use outbound::{DisconnectScope, Outbound, Recipient};
pub use state::{MovementPatch, PlayerState, SceneName};
