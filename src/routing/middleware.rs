//! Middleware wrapping handlers with cross-cutting context.
//!
//! Configuration is validated when a middleware is constructed, never per
//! invocation. A middleware that cannot be built returns a [`ConfigError`]
//! and the process should refuse to serve.

use crate::error::Result;
use crate::function::{Context, Handler};
use crate::runtime::env::{
    ACCESS_KEY_ID_VAR, REGION_VAR, RESOURCE_ATTRIBUTES_VAR, SECRET_ACCESS_KEY_VAR,
};
use crate::runtime::{ConfigError, LineConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Wraps a handler to produce a new handler.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler>;
}

impl<F> Middleware for F
where
    F: Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync,
{
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        self(next)
    }
}

/// Cancels the handler's context some time before the invocation times out,
/// giving handlers that long to shut down cleanly.
///
/// The context's cancellation token fires at that point too, so it can be
/// handed to code that only understands tokens.
#[derive(Debug, Clone, Copy)]
pub struct EarlyTimeout {
    shutdown: Duration,
}

impl EarlyTimeout {
    pub fn new(shutdown: Duration) -> Self {
        Self { shutdown }
    }

    pub fn from_millis(shutdown_millis: u64) -> Self {
        Self::new(Duration::from_millis(shutdown_millis))
    }

    pub fn from_config(config: &LineConfig) -> Self {
        Self::from_millis(config.shutdown_millis)
    }
}

impl Middleware for EarlyTimeout {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(EarlyTimeoutHandler {
            shutdown: self.shutdown,
            next,
        })
    }
}

struct EarlyTimeoutHandler {
    shutdown: Duration,
    next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for EarlyTimeoutHandler {
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>> {
        let Some(remaining) = ctx.invocation().and_then(|inv| inv.remaining_time()) else {
            return self.next.handle_event(ctx).await;
        };

        let budget = remaining.saturating_sub(self.shutdown);
        debug!("Handler budget {:?} of {:?} remaining", budget, remaining);

        let ctx = ctx.with_timeout(budget);
        let token = ctx.cancellation_token().clone();
        if let Some(deadline) = ctx.deadline() {
            let watched = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = watched.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => watched.cancel(),
                }
            });
        }

        let _cancel = token.drop_guard();
        self.next.handle_event(ctx).await
    }
}

/// Static credentials of a runtime session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCredentials {
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Region and credentials handlers use to reach other services, independent
/// of the credentials the host runs the function with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSession {
    pub region: String,
    pub credentials: StaticCredentials,
}

const SESSION_VARS: &[&str] = &[REGION_VAR, ACCESS_KEY_ID_VAR, SECRET_ACCESS_KEY_VAR];

impl RuntimeSession {
    /// Create a session. Every part is required.
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let (region, access_key_id, secret_access_key) =
            (region.into(), access_key_id.into(), secret_access_key.into());
        if region.is_empty() || access_key_id.is_empty() || secret_access_key.is_empty() {
            return Err(ConfigError::Missing {
                middleware: "RuntimeSession",
                vars: SESSION_VARS,
            });
        }

        Ok(Self {
            region,
            credentials: StaticCredentials {
                access_key_id,
                secret_access_key,
                session_token: None,
            },
        })
    }

    pub fn from_config(config: &LineConfig) -> std::result::Result<Self, ConfigError> {
        match (&config.region, &config.access_key_id, &config.secret_access_key) {
            (Some(region), Some(key), Some(secret)) => Self::new(region, key, secret),
            _ => Err(ConfigError::Missing {
                middleware: "RuntimeSession",
                vars: SESSION_VARS,
            }),
        }
    }
}

/// Attaches a [`RuntimeSession`] to every invocation's context.
#[derive(Debug, Clone)]
pub struct WithRuntimeSession {
    session: Arc<RuntimeSession>,
}

impl WithRuntimeSession {
    pub fn new(session: RuntimeSession) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn from_config(config: &LineConfig) -> std::result::Result<Self, ConfigError> {
        RuntimeSession::from_config(config).map(Self::new)
    }
}

impl Middleware for WithRuntimeSession {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        let session = self.session.clone();
        Arc::new(InjectHandler {
            next,
            inject: move |ctx: Context| ctx.with_runtime_session(session.clone()),
        })
    }
}

/// String attributes describing the resources a function was deployed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceAttributes(HashMap<String, String>);

impl ResourceAttributes {
    pub fn new(attributes: HashMap<String, String>) -> Self {
        Self(attributes)
    }

    /// Parse a JSON object of string values.
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::InvalidJson {
            var: RESOURCE_ATTRIBUTES_VAR,
            source,
        })
    }

    pub fn from_config(config: &LineConfig) -> std::result::Result<Self, ConfigError> {
        let json = config
            .resource_attributes
            .as_deref()
            .ok_or(ConfigError::Missing {
                middleware: "ResourceAttributes",
                vars: &[RESOURCE_ATTRIBUTES_VAR],
            })?;
        Self::from_json(json)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Attaches [`ResourceAttributes`] to every invocation's context.
#[derive(Debug, Clone)]
pub struct WithResourceAttributes {
    attributes: Arc<ResourceAttributes>,
}

impl WithResourceAttributes {
    pub fn new(attributes: ResourceAttributes) -> Self {
        Self {
            attributes: Arc::new(attributes),
        }
    }

    pub fn from_config(config: &LineConfig) -> std::result::Result<Self, ConfigError> {
        ResourceAttributes::from_config(config).map(Self::new)
    }
}

impl Middleware for WithResourceAttributes {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        let attributes = self.attributes.clone();
        Arc::new(InjectHandler {
            next,
            inject: move |ctx: Context| ctx.with_resource_attributes(attributes.clone()),
        })
    }
}

/// Rewrites the context before handing it to the next handler.
struct InjectHandler<F> {
    next: Arc<dyn Handler>,
    inject: F,
}

#[async_trait]
impl<F> Handler for InjectHandler<F>
where
    F: Fn(Context) -> Context + Send + Sync,
{
    async fn handle_event(&self, ctx: Context) -> Result<Option<Value>> {
        self.next.handle_event((self.inject)(ctx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::function::{handler_fn, Invocation};
    use serde_json::json;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn invoked(remaining_ms: u64) -> Context {
        Context::default().with_invocation(
            Invocation::new("arn:fn:app")
                .with_remaining_time(move || Duration::from_millis(remaining_ms)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_timeout_shortens_deadline() {
        let start = Instant::now();
        let handler = EarlyTimeout::from_millis(1000).wrap(Arc::new(handler_fn(
            |ctx: Context| async move {
                let deadline = ctx.deadline().expect("deadline set");
                ctx.done().await;
                Ok::<_, Error>(Some(json!(deadline.duration_since(Instant::now()).as_millis() as u64)))
            },
        )));

        let out = handler.handle_event(invoked(3000)).await.unwrap();
        assert_eq!(out, Some(json!(0)));
        assert!(Instant::now() - start >= Duration::from_millis(2000));
        assert!(Instant::now() - start < Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_timeout_saturates() {
        let handler = EarlyTimeout::from_millis(5000).wrap(Arc::new(handler_fn(
            |ctx: Context| async move { Ok::<_, Error>(Some(json!(ctx.is_done()))) },
        )));

        let out = handler.handle_event(invoked(3000)).await.unwrap();
        assert_eq!(out, Some(json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_timeout_fires_token_at_deadline() {
        let start = Instant::now();
        let handler = EarlyTimeout::from_millis(1000).wrap(Arc::new(handler_fn(
            |ctx: Context| async move {
                ctx.cancellation_token().cancelled().await;
                Ok::<_, Error>(Some(json!(ctx.is_done())))
            },
        )));

        let out = handler.handle_event(invoked(3000)).await.unwrap();
        assert_eq!(out, Some(json!(true)));
        assert!(Instant::now() - start >= Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_early_timeout_cancels_after_return() {
        let seen = Arc::new(std::sync::Mutex::new(None::<CancellationToken>));
        let captured = seen.clone();
        let handler = EarlyTimeout::from_millis(0).wrap(Arc::new(handler_fn(
            move |ctx: Context| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(ctx.cancellation_token().clone());
                    Ok::<_, Error>(None)
                }
            },
        )));

        handler.handle_event(invoked(60_000)).await.unwrap();
        let token = seen.lock().unwrap().take().unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_early_timeout_without_invocation_passes_through() {
        let handler = EarlyTimeout::from_millis(1000).wrap(Arc::new(handler_fn(
            |ctx: Context| async move { Ok::<_, Error>(Some(json!(ctx.deadline().is_none()))) },
        )));

        let out = handler.handle_event(Context::default()).await.unwrap();
        assert_eq!(out, Some(json!(true)));
    }

    #[test]
    fn test_session_requires_every_part() {
        let err = RuntimeSession::new("eu-west-1", "", "secret").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot use the RuntimeSession middleware without all of the following environment \
             variables: LINE_AWS_REGION, LINE_AWS_ACCESS_KEY_ID, LINE_AWS_SECRET_ACCESS_KEY"
        );

        let config = LineConfig::new().region("eu-west-1").access_key_id("AKID");
        assert!(WithRuntimeSession::from_config(&config).is_err());
    }

    #[test]
    fn test_session_debug_redacts_secret() {
        let session = RuntimeSession::new("eu-west-1", "AKID", "hunter2").unwrap();
        assert!(!format!("{:?}", session).contains("hunter2"));
    }

    #[test]
    fn test_attributes_config_errors() {
        let missing = WithResourceAttributes::from_config(&LineConfig::new()).unwrap_err();
        assert!(matches!(missing, ConfigError::Missing { .. }));

        let config = LineConfig::new().resource_attributes("{not json");
        let invalid = WithResourceAttributes::from_config(&config).unwrap_err();
        assert!(invalid.to_string().starts_with("failed to unmarshal LINE_RESOURCE_ATTRIBUTES"));

        let config = LineConfig::new().resource_attributes(r#"{"size": 3}"#);
        assert!(WithResourceAttributes::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_injected_values_reach_handler() {
        let config = LineConfig::new()
            .region("eu-west-1")
            .access_key_id("AKID")
            .secret_access_key("secret")
            .resource_attributes(r#"{"my-table-name":"users"}"#);

        let endpoint: Arc<dyn Handler> = Arc::new(handler_fn(|ctx: Context| async move {
            Ok::<_, Error>(Some(json!({
                "region": ctx.runtime_session().map(|s| s.region.clone()),
                "table": ctx.resource_attribute("my-table-name"),
                "other": ctx.resource_attribute("other"),
            })))
        }));

        let session = WithRuntimeSession::from_config(&config).unwrap();
        let attributes = WithResourceAttributes::from_config(&config).unwrap();
        let handler = session.wrap(attributes.wrap(endpoint));

        let out = handler.handle_event(Context::default()).await.unwrap();
        assert_eq!(
            out,
            Some(json!({"region": "eu-west-1", "table": "users", "other": null}))
        );
    }
}
