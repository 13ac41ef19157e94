//! Tracing setup and log-safe formatting helpers.

use std::borrow::Cow;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "weir=info";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `RUST_LOG` or the default directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Installs a formatting subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence; otherwise [`DEFAULT_DIRECTIVE`] applies.
///
/// # Errors
///
/// Returns [`LoggingError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init() -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(DEFAULT_DIRECTIVE).map_err(|err| LoggingError::Filter(err.to_string()))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))
}

/// Returns a placeholder suitable for logging in place of a secret.
#[must_use]
pub const fn redact_token(token: &str) -> &'static str {
    if token.is_empty() { "<empty>" } else { "<redacted>" }
}

/// Shortens `value` to at most `max_chars` characters, marking the cut.
#[must_use]
pub fn truncate_for_logging(value: &str, max_chars: usize) -> Cow<'_, str> {
    value
        .char_indices()
        .nth(max_chars)
        .map_or(Cow::Borrowed(value), |(cut, _)| {
            let kept: String = value.chars().take(max_chars).collect();
            Cow::Owned(format!(
                "{kept}... ({} more bytes)",
                value.len().saturating_sub(cut)
            ))
        })
}
