//! Authentication module.
//!
//! Every status connection and every group operation runs behind
//! [`auth_middleware`]: identities are established from a bearer token before
//! any hub state is created.

mod claims;
mod config;
mod error;
mod middleware;

pub use claims::{Claims, Role};
pub use config::{AuthConfig, ConfigValidationError, DevUser};
pub use error::AuthError;
pub use middleware::{AuthState, CurrentUser, RequireService, auth_middleware};
