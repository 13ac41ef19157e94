//! Configuration loading via `ortho-config`.

use std::fmt;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::logging::redact_token;
use crate::transport::{ReqwestSender, RetryPolicy, RetryingTransport};

/// Default Webflow API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.webflow.com";

/// Shortest token accepted before any request is attempted.
const MIN_TOKEN_CHARS: usize = 10;

/// Webflow connection settings derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "WEBFLOW")]
pub struct WebflowConfig {
    /// Bearer token for the Webflow Data API. This value is required.
    pub api_token: String,
    /// API origin. Defaults to [`DEFAULT_BASE_URL`]; override for mocks.
    #[ortho_config(default = DEFAULT_BASE_URL.to_owned())]
    pub base_url: String,
    /// Retries after the first attempt.
    #[ortho_config(default = 3)]
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    #[ortho_config(default = 1000)]
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    #[ortho_config(default = 30_000)]
    pub max_delay_ms: u64,
    /// Per-attempt request timeout in seconds.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
}

impl fmt::Debug for WebflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebflowConfig")
            .field("api_token", &redact_token(&self.api_token))
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to [webflow] in weir.toml",
            self.env_var, self.toml_key
        )
    }
}

const API_TOKEN: FieldMetadata =
    FieldMetadata::new("Webflow API token", "WEBFLOW_API_TOKEN", "api_token");
const BASE_URL: FieldMetadata =
    FieldMetadata::new("Webflow API base URL", "WEBFLOW_BASE_URL", "base_url");
const MAX_DELAY: FieldMetadata =
    FieldMetadata::new("maximum backoff delay", "WEBFLOW_MAX_DELAY_MS", "max_delay_ms");
const REQUEST_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "request timeout",
    "WEBFLOW_REQUEST_TIMEOUT_SECS",
    "request_timeout_secs",
);

impl WebflowConfig {
    /// Builds a configuration with the documented defaults and `api_token`.
    #[must_use]
    pub fn with_token(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            max_retries: crate::transport::DEFAULT_MAX_RETRIES,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            request_timeout_secs: 30,
        }
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("weir")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the token is empty and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let token = self.api_token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                API_TOKEN.description,
                API_TOKEN.hint()
            )));
        }
        if token.chars().count() < MIN_TOKEN_CHARS {
            return Err(invalid(
                &API_TOKEN,
                &format!("must be at least {MIN_TOKEN_CHARS} characters"),
            ));
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(invalid(&BASE_URL, "must start with http:// or https://"));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(
                &MAX_DELAY,
                &format!("must not be below base_delay_ms ({})", self.base_delay_ms),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid(&REQUEST_TIMEOUT, "must be greater than zero"));
        }
        Ok(())
    }

    /// Retry policy described by this configuration.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    /// Per-attempt request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validates the configuration and builds the authenticated HTTP sender.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the HTTP client
    /// cannot be built.
    pub fn sender(&self) -> Result<ReqwestSender, ConfigError> {
        self.validate()?;
        ReqwestSender::new(
            self.base_url.as_str(),
            self.api_token.trim(),
            self.request_timeout(),
        )
        .map_err(|err| ConfigError::Client(err.to_string()))
    }

    /// Builds the production transport: [`Self::sender`] wrapped in the
    /// configured retry policy.
    ///
    /// # Errors
    ///
    /// See [`Self::sender`].
    pub fn transport(&self) -> Result<RetryingTransport<ReqwestSender>, ConfigError> {
        Ok(RetryingTransport::new(self.sender()?, self.retry_policy()))
    }
}

fn invalid(metadata: &FieldMetadata, problem: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "{} {problem}: {}",
        metadata.description,
        metadata.hint()
    ))
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A configured value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
