//! Invocation handlers: the event handler trait, its execution context and
//! the gateway adapter that serves HTTP handlers.

pub mod gateway;
pub mod handler;
pub mod invocation;

pub use gateway::{http_fn, GatewayHandler, HttpFn, HttpHandler};
pub use handler::{handler_fn, Context, Handler, HandlerFn};
pub use invocation::{Invocation, RemainingTime};
