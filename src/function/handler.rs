//! Event handler trait and the per-invocation execution context.

use crate::error::{Error, Result};
use crate::function::Invocation;
use crate::routing::{ResourceAttributes, RuntimeSession};
use async_trait::async_trait;
use serde_json::value::RawValue;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Execution context for a single invocation.
///
/// Built once per decoded input and passed by value down the middleware
/// chain. Middleware derive new contexts with the `with_*` methods; values
/// attached upstream are read downstream through the typed accessors.
#[derive(Debug, Clone, Default)]
pub struct Context {
    event: Option<Arc<RawValue>>,
    lambda_context: Arc<Value>,
    invocation: Option<Arc<Invocation>>,
    session: Option<Arc<RuntimeSession>>,
    attributes: Option<Arc<ResourceAttributes>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create the context for one input.
    ///
    /// Invocation metadata is decoded from `lambda_context` when it
    /// describes one.
    pub fn new(event: Option<Box<RawValue>>, lambda_context: Value) -> Self {
        let invocation = Invocation::from_context(&lambda_context).map(Arc::new);
        Self {
            event: event.map(Arc::from),
            lambda_context: Arc::new(lambda_context),
            invocation,
            ..Default::default()
        }
    }

    /// The raw event payload.
    pub fn event(&self) -> Result<&RawValue> {
        self.event.as_deref().ok_or(Error::MissingEvent)
    }

    /// The opaque context value the host sent along with the event.
    pub fn lambda_context(&self) -> &Value {
        &self.lambda_context
    }

    pub fn invocation(&self) -> Option<&Invocation> {
        self.invocation.as_deref()
    }

    pub fn with_invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = Some(Arc::new(invocation));
        self
    }

    /// Runtime session attached by the session middleware.
    pub fn runtime_session(&self) -> Option<&RuntimeSession> {
        self.session.as_deref()
    }

    pub fn with_runtime_session(mut self, session: Arc<RuntimeSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Resource attributes attached by the attributes middleware.
    pub fn resource_attributes(&self) -> Option<&ResourceAttributes> {
        self.attributes.as_deref()
    }

    /// Look up a single resource attribute.
    pub fn resource_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }

    pub fn with_resource_attributes(mut self, attributes: Arc<ResourceAttributes>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Derive a child context that is done once `timeout` elapses.
    ///
    /// An earlier deadline inherited from the parent is kept. Cancelling the
    /// parent also cancels the child.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self.cancel = self.cancel.child_token();
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token cancelled when the context is cancelled explicitly.
    ///
    /// A deadline set with [`Context::with_timeout`] alone does not fire the
    /// token; use [`Context::done`] or [`Context::is_done`] to observe it.
    /// The early timeout middleware cancels the token at its deadline.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the context was cancelled or its deadline has passed.
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Wait until the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

/// Handler for raw invocation events.
///
/// Returning `Ok(None)` produces an empty output line.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one invocation. The event payload is available via
    /// [`Context::event`].
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>> {
        (**self).handle_event(ctx).await
    }
}

/// Adapter turning an async closure into a [`Handler`].
pub struct HandlerFn<F> {
    f: F,
}

/// Use an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>>> + Send,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>>> + Send,
{
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>> {
        (self.f)(ctx).await
    }
}
