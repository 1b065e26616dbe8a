//! Line protocol runtime: wire messages, the serve loop and startup
//! configuration.

mod config;
pub mod protocol;
mod server;

pub use config::{ConfigError, LineConfig};
pub use protocol::{FrameDecoder, Input, Output};
pub use server::{serve, serve_http, LineServer};

/// Environment variable names read by [`LineConfig::from_env`].
pub mod env {
    pub use super::config::{
        ACCESS_KEY_ID_VAR, ARN_PATTERN_VAR, REGION_VAR, RESOURCE_ATTRIBUTES_VAR,
        SECRET_ACCESS_KEY_VAR, SHUTDOWN_MILLIS_VAR, STRIP_BASE_PATHS_VAR,
    };
}
