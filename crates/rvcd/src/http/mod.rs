//! The REST/WebSocket boundary (§4.11).

pub mod routes;
pub mod state;
pub mod ws;

pub use routes::build_router;
pub use state::AppState;
