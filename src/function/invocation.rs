//! Invocation metadata decoded from the host's opaque context value.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Produces the invocation's remaining time budget at the moment it is called.
pub type RemainingTime = Arc<dyn Fn() -> Duration + Send + Sync>;

/// Information about the invoked function, as reported by the host.
#[derive(Clone, Default, Deserialize)]
pub struct Invocation {
    #[serde(default, alias = "functionName")]
    pub function_name: String,
    #[serde(default, alias = "functionVersion")]
    pub function_version: String,
    #[serde(default, alias = "invokedFunctionArn")]
    pub invoked_function_arn: String,
    #[serde(default, alias = "memoryLimitInMB", deserialize_with = "number_or_string")]
    pub memory_limit_in_mb: u32,
    #[serde(default, alias = "awsRequestId")]
    pub aws_request_id: String,
    #[serde(default, alias = "logGroupName")]
    pub log_group_name: String,
    #[serde(default, alias = "logStreamName")]
    pub log_stream_name: String,
    #[serde(skip)]
    remaining_time: Option<RemainingTime>,
}

/// Fields of the context value that carry the time budget.
#[derive(Deserialize)]
struct ContextValue {
    #[serde(flatten)]
    invocation: Invocation,
    #[serde(default, alias = "deadlineMs")]
    deadline_ms: Option<u64>,
    #[serde(default, alias = "remainingTimeInMillis")]
    remaining_time_in_millis: Option<u64>,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::String(s)) if s.trim().is_empty() => Ok(0),
        Some(NumberOrString::String(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Invocation {
    /// Create invocation metadata for the given function ARN.
    pub fn new(invoked_function_arn: impl Into<String>) -> Self {
        Self {
            invoked_function_arn: invoked_function_arn.into(),
            ..Default::default()
        }
    }

    /// Decode the host's opaque context value.
    ///
    /// Returns `None` when the value is not an object describing an invoked
    /// function ARN.
    pub fn from_context(value: &Value) -> Option<Self> {
        let ctx = ContextValue::deserialize(value).ok()?;
        if ctx.invocation.invoked_function_arn.is_empty() {
            return None;
        }

        let mut invocation = ctx.invocation;
        if let Some(deadline_ms) = ctx.deadline_ms {
            let deadline = UNIX_EPOCH + Duration::from_millis(deadline_ms);
            invocation.remaining_time = Some(Arc::new(move || {
                deadline
                    .duration_since(SystemTime::now())
                    .unwrap_or_default()
            }));
        } else if let Some(remaining) = ctx.remaining_time_in_millis {
            let deadline = Instant::now() + Duration::from_millis(remaining);
            invocation.remaining_time = Some(Arc::new(move || {
                deadline.saturating_duration_since(Instant::now())
            }));
        }

        Some(invocation)
    }

    /// Set the function producing the remaining time budget.
    pub fn with_remaining_time<F>(mut self, remaining: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        self.remaining_time = Some(Arc::new(remaining));
        self
    }

    /// Remaining time budget, if the host reported one.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.remaining_time.as_ref().map(|f| f())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("function_name", &self.function_name)
            .field("function_version", &self.function_version)
            .field("invoked_function_arn", &self.invoked_function_arn)
            .field("memory_limit_in_mb", &self.memory_limit_in_mb)
            .field("aws_request_id", &self.aws_request_id)
            .field("log_group_name", &self.log_group_name)
            .field("log_stream_name", &self.log_stream_name)
            .field("remaining_time", &self.remaining_time())
            .finish()
    }
}
