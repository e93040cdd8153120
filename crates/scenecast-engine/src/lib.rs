//! Scene membership and fan-out engine.
//!
//! [`RelayEngine`] owns the [`Registry`] of live connections and turns each
//! inbound event into a list of [`Outbound`](scenecast_core::Outbound)
//! deliveries. It is synchronous and single-owner: the transport feeds it
//! one operation at a time and performs delivery itself.

pub mod engine;
pub mod registry;

pub use engine::RelayEngine;
pub use registry::{Connection, Registry};
