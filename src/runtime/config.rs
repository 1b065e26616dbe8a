//! Process configuration, read once before serving.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REGION_VAR: &str = "LINE_AWS_REGION";
pub const ACCESS_KEY_ID_VAR: &str = "LINE_AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "LINE_AWS_SECRET_ACCESS_KEY";
pub const RESOURCE_ATTRIBUTES_VAR: &str = "LINE_RESOURCE_ATTRIBUTES";
pub const SHUTDOWN_MILLIS_VAR: &str = "ROTOR_SHUTDOWN_MILLIS";
pub const STRIP_BASE_PATHS_VAR: &str = "ROTOR_STRIP_BASE_PATHS";
pub const ARN_PATTERN_VAR: &str = "ROTOR_ARN_PATTERN";

/// Startup configuration failure. Serving must not begin after one.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "cannot use the {middleware} middleware without all of the following environment variables: {}",
        .vars.join(", ")
    )]
    Missing {
        middleware: &'static str,
        vars: &'static [&'static str],
    },

    #[error("failed to unmarshal {var}, is it valid JSON? {source}")]
    InvalidJson {
        var: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid ARN pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Configuration for the line protocol server and its middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Region for the runtime session.
    pub region: Option<String>,
    /// Access key id for the runtime session.
    pub access_key_id: Option<String>,
    /// Secret access key for the runtime session.
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    /// JSON object of string resource attributes.
    pub resource_attributes: Option<String>,
    /// Time handlers get to shut down before the invocation times out.
    pub shutdown_millis: u64,
    /// Leading path segments removed from proxied request paths.
    pub strip_base_paths: usize,
    /// Regular expression matched against the invoked function's ARN.
    pub arn_pattern: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            region: None,
            access_key_id: None,
            secret_access_key: None,
            resource_attributes: None,
            shutdown_millis: 5000,
            strip_base_paths: 0,
            arn_pattern: ".*".to_string(),
        }
    }
}

impl LineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            region: get(REGION_VAR),
            access_key_id: get(ACCESS_KEY_ID_VAR),
            secret_access_key: get(SECRET_ACCESS_KEY_VAR),
            resource_attributes: get(RESOURCE_ATTRIBUTES_VAR),
            shutdown_millis: parse_var(SHUTDOWN_MILLIS_VAR, get(SHUTDOWN_MILLIS_VAR))?
                .unwrap_or(defaults.shutdown_millis),
            strip_base_paths: parse_var(STRIP_BASE_PATHS_VAR, get(STRIP_BASE_PATHS_VAR))?
                .unwrap_or(defaults.strip_base_paths),
            arn_pattern: get(ARN_PATTERN_VAR).unwrap_or(defaults.arn_pattern),
        })
    }

    /// Set the session region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the session access key id.
    pub fn access_key_id(mut self, key: impl Into<String>) -> Self {
        self.access_key_id = Some(key.into());
        self
    }

    /// Set the session secret access key.
    pub fn secret_access_key(mut self, secret: impl Into<String>) -> Self {
        self.secret_access_key = Some(secret.into());
        self
    }

    /// Set the raw JSON resource attributes.
    pub fn resource_attributes(mut self, json: impl Into<String>) -> Self {
        self.resource_attributes = Some(json.into());
        self
    }

    pub fn shutdown_millis(mut self, millis: u64) -> Self {
        self.shutdown_millis = millis;
        self
    }

    pub fn strip_base_paths(mut self, n: usize) -> Self {
        self.strip_base_paths = n;
        self
    }

    pub fn arn_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.arn_pattern = pattern.into();
        self
    }

    /// Whether any of the runtime session settings is present.
    pub fn has_session(&self) -> bool {
        self.region.is_some() || self.access_key_id.is_some() || self.secret_access_key.is_some()
    }

    /// Compile the ARN pattern.
    pub fn arn_regex(&self) -> Result<regex::Regex, ConfigError> {
        regex::Regex::new(&self.arn_pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: self.arn_pattern.clone(),
            source,
        })
    }
}

fn parse_var<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
