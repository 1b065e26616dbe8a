//! Routing of invocations to handlers by ARN, and the middleware applied
//! along the way.

mod middleware;
mod mux;

pub use middleware::{
    EarlyTimeout, Middleware, ResourceAttributes, RuntimeSession, StaticCredentials,
    WithResourceAttributes, WithRuntimeSession,
};
pub use mux::Mux;
