//! ARN multiplexer.
//!
//! Routes invocations to handlers by matching the invoked function's ARN
//! against regular expressions, and wraps the selected handler in the
//! registered middleware.

use crate::error::{Error, Result};
use crate::function::{Context, Handler};
use crate::routing::Middleware;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A registered ARN pattern and its handler.
#[derive(Clone)]
struct Route {
    pattern: Regex,
    handler: Arc<dyn Handler>,
}

/// Multiplexes invocations to handlers based on the invoked function's ARN.
///
/// Patterns are tested in registration order and the first match wins.
/// Overlapping patterns therefore resolve to the earliest registration, but
/// callers should prefer mutually exclusive patterns.
#[derive(Clone, Default)]
pub struct Mux {
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Mux {
    /// Create an empty multiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for invocations whose ARN matches `pattern`.
    pub fn match_arn(mut self, pattern: Regex, handler: impl Handler + 'static) -> Self {
        self.routes.push(Route {
            pattern,
            handler: Arc::new(handler),
        });
        self
    }

    /// Add a middleware. The first one added sees the invocation first.
    pub fn use_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registered patterns, in matching order.
    pub fn patterns(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.pattern.as_str()).collect()
    }

    /// Wrap `endpoint` so that the first middleware is outermost.
    fn build_chain(&self, endpoint: Arc<dyn Handler>) -> Arc<dyn Handler> {
        self.middleware
            .iter()
            .rev()
            .fold(endpoint, |next, mw| mw.wrap(next))
    }

    /// Find the handler for `arn`.
    fn find(&self, arn: &str) -> Result<&Route> {
        self.routes
            .iter()
            .find(|r| r.pattern.is_match(arn))
            .ok_or_else(|| Error::NoRoute {
                patterns: self.patterns().into_iter().map(str::to_string).collect(),
                arn: arn.to_string(),
            })
    }
}

#[async_trait]
impl Handler for Mux {
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>> {
        let arn = ctx.invocation().ok_or(Error::NoInvocation)?.invoked_function_arn.as_str();
        let route = self.find(arn)?;
        debug!("ARN '{}' matched handler '{}'", arn, route.pattern);

        self.build_chain(route.handler.clone()).handle_event(ctx).await
    }
}
