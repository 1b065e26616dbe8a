//! Error types for rotor.

use crate::runtime::ConfigError;
use thiserror::Error;

/// Main error type for rotor.
///
/// The display strings end up verbatim in the `error` field of the output
/// line, so the host sees exactly what went wrong for each invocation.
#[derive(Error, Debug)]
pub enum Error {
    /// The input stream held malformed JSON. Fatal for the stream.
    #[error("failed to decode input: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("decoded input has no event key")]
    MissingEvent,

    /// The event payload did not match the proxy event schema.
    #[error("failed to unmarshal '{payload}' as proxy event: {source}")]
    ProxyEvent {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    /// The proxy event could not be turned into an HTTP request.
    #[error("failed to turn event into http request: {0}")]
    Request(String),

    #[error("no invocation metadata available to match a handler against")]
    NoInvocation,

    /// None of the registered ARN patterns matched.
    #[error(
        "none of the handlers ({}) matched the invoked function's ARN '{arn}'",
        .patterns.join(", ")
    )]
    NoRoute { patterns: Vec<String>, arn: String },

    /// Failure reported by a user handler.
    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to encode output: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a handler-reported failure.
    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Handler(err.into())
    }

    /// Whether the serve loop has to give up on the stream after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Encode(_) | Error::Io(_))
    }
}

/// Result type alias for rotor.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_route_lists_every_pattern() {
        let err = Error::NoRoute {
            patterns: vec!["-gateway$".to_string(), "-worker$".to_string()],
            arn: "arn:aws:lambda:eu-west-1:123:function:app-cron".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "none of the handlers (-gateway$, -worker$) matched the invoked function's ARN \
             'arn:aws:lambda:eu-west-1:123:function:app-cron'"
        );
    }

    #[test]
    fn test_handler_error_display_is_message() {
        let err = Error::handler("table not found");
        assert_eq!(err.to_string(), "table not found");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_error_converts_transparently() {
        fn load() -> Result<()> {
            Err::<(), _>(ConfigError::InvalidValue {
                var: "ROTOR_SHUTDOWN_MILLIS",
                value: "soon".to_string(),
                reason: "invalid digit found in string".to_string(),
            })?;
            Ok(())
        }

        let err = load().unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "invalid value 'soon' for ROTOR_SHUTDOWN_MILLIS: invalid digit found in string"
        );
    }

    #[test]
    fn test_decode_error_is_fatal() {
        let source = serde_json::from_str::<serde_json::Value>("{aaa}").unwrap_err();
        let err = Error::Decode(source);
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("failed to decode input: "));
    }
}
