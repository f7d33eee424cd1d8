//! HTTP API module.
//!
//! Status transport endpoints, group operations, the publish entry point and
//! health.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::{AppState, ChannelSettings};
