//! # Rotor - Line Protocol Function Runtime
//!
//! Rotor serves function handlers to a host process that speaks a simple
//! line protocol over stdin and stdout. The host writes one JSON input per
//! invocation and reads back exactly one JSON output line, in order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            Host process                             │
//! │               {"event":...,"context":...}  ──► stdin                │
//! │               {"value":...} / {"error":...} ◄── stdout              │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      LineServer (serve loop)                        │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                  Mux (first matching ARN)                   │   │
//! │  │  ┌─────────────┐  ┌──────────────┐  ┌──────────────────┐    │   │
//! │  │  │EarlyTimeout │─►│RuntimeSession│─►│ResourceAttributes│─►  │   │
//! │  │  └─────────────┘  └──────────────┘  └──────────────────┘    │   │
//! │  │  ┌──────────────────────┐   ┌────────────────────────┐      │   │
//! │  │  │ GatewayHandler (HTTP)│   │ Handler (raw events)   │      │   │
//! │  │  └──────────────────────┘   └────────────────────────┘      │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rotor::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let hello = http_fn(|_ctx: &Context, _req, res: &mut ResponseWriter| {
//!         res.text("Hello from Rotor!");
//!     });
//!
//!     LineServer::new(GatewayHandler::new(0, hello)).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Invocation Lifecycle
//!
//! 1. **Decode**: the next JSON value is read from the input stream
//! 2. **Handle**: the handler chain runs with a fresh [`Context`]
//! 3. **Encode**: the result or error is written as one output line
//!
//! Handler failures only affect their own output line. Malformed input ends
//! the stream after one final error line.

pub mod error;
pub mod function;
pub mod http;
pub mod routing;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::function::{
        handler_fn, http_fn, Context, GatewayHandler, Handler, HttpHandler, Invocation,
    };
    pub use crate::http::{ProxyRequest, ProxyResponse, ResponseWriter};
    pub use crate::routing::{
        EarlyTimeout, Middleware, Mux, WithResourceAttributes, WithRuntimeSession,
    };
    pub use crate::runtime::{LineConfig, LineServer};
    pub use async_trait::async_trait;
    pub use hyper::{Method, StatusCode};
}

// Re-export for convenience
pub use error::{Error, Result};
pub use function::{Context, GatewayHandler, Handler, HttpHandler};
pub use http::{ProxyRequest, ProxyResponse};
pub use routing::Mux;
pub use runtime::{LineConfig, LineServer};
