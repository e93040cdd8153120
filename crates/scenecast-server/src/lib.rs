//! WebSocket transport for the scenecast relay.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `client` | Per-connection outbound queues and the socket read/write loop |
//! | `relay` | Single task that owns the engine and delivers its decisions |
//! | `server` | Router, `/ws` upgrade, health and metrics endpoints |

pub mod client;
pub mod relay;
pub mod server;

pub use server::{start, AppState, ServerConfig, ServerHandle};
