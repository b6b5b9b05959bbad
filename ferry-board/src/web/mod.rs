//! Web layer for the ferry departure board.
//!
//! Serves board and resolution APIs, forwards control messages and events
//! for the cache coordinator, and proxies everything else to the upstream
//! site through it.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, SOURCE_HEADER, create_router};
pub use state::{AppState, ConfigSource};
