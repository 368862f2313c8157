//! Voice assistant server
//!
//! Exposes the session over a persistent WebSocket (the event relay) plus a
//! small HTTP surface for status and history.

pub mod http;
pub mod metrics;
pub mod relay;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::init_metrics;
pub use relay::{ConnectionState, EventRelay};
pub use state::AppState;
