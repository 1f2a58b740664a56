//! Error types and failure classification for the data-sources crate.
//!
//! This module provides:
//! - [`DataSourceError`]: The main error enum for all resolution operations
//! - [`FailureKind`]: Classification by kind, used by the orchestrator and
//!   the HTTP boundary to decide how a failure is surfaced

mod kind;

pub use kind::FailureKind;

use thiserror::Error;

/// Errors that can occur while querying an upstream data source.
///
/// Each variant is classified into a [`FailureKind`] via [`kind`](Self::kind).
/// Adapters map every internal failure mode (network, parse, missing
/// credential, empty result) into one of these variants; nothing else
/// escapes an adapter.
#[derive(Error, Debug)]
pub enum DataSourceError {
    /// A required credential is not configured. The adapter fails
    /// immediately without attempting network I/O.
    #[error("{provider}: credential not configured")]
    MissingCredential {
        /// The provider missing its key/secret
        provider: String,
    },

    /// The upstream call exceeded its time budget.
    #[error("{provider}: request timed out")]
    Timeout { provider: String },

    /// Network-level failure: connection refused/reset, DNS, non-2xx
    /// transport problems.
    #[error("{provider}: {message}")]
    Transport { provider: String, message: String },

    /// The provider signaled a rate limit through its own convention.
    /// Kept distinguishable so the caller can answer 429 instead of 404.
    #[error("{provider}: rate limited")]
    RateLimited { provider: String },

    /// The provider answered successfully but signaled a business error
    /// (bad status code in the payload, error sentinel, rejected request).
    #[error("{provider}: {message}")]
    Upstream { provider: String, message: String },

    /// The provider has no data for this symbol. The message is
    /// user-facing and localized where the upstream audience is.
    #[error("{message}")]
    NotFound { provider: String, message: String },

    /// The response shape did not match expectations. Never produces a
    /// partial asset record.
    #[error("{provider}: unexpected response: {message}")]
    Parse { provider: String, message: String },

    /// The input matched no known symbol shape or alias table. Raised
    /// before any network call.
    #[error("无法识别的代码格式: {input}")]
    Unrecognized { input: String },
}

impl DataSourceError {
    /// Returns the failure classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use assetfolio_data_sources::errors::{DataSourceError, FailureKind};
    ///
    /// let error = DataSourceError::RateLimited { provider: "Alpha Vantage".to_string() };
    /// assert_eq!(error.kind(), FailureKind::RateLimit);
    ///
    /// let error = DataSourceError::Unrecognized { input: "!!".to_string() };
    /// assert_eq!(error.kind(), FailureKind::Classification);
    /// ```
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingCredential { .. } => FailureKind::Config,
            Self::Timeout { .. } | Self::Transport { .. } => FailureKind::Transport,
            Self::RateLimited { .. } => FailureKind::RateLimit,
            Self::Upstream { .. } => FailureKind::Upstream,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Parse { .. } => FailureKind::Parse,
            Self::Unrecognized { .. } => FailureKind::Classification,
        }
    }

    /// Map a reqwest error into the transport/timeout taxonomy.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else {
            Self::Transport {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_config() {
        let error = DataSourceError::MissingCredential {
            provider: "Tushare基金".to_string(),
        };
        assert_eq!(error.kind(), FailureKind::Config);
    }

    #[test]
    fn test_timeout_is_transport() {
        let error = DataSourceError::Timeout {
            provider: "Yahoo Finance".to_string(),
        };
        assert_eq!(error.kind(), FailureKind::Transport);
    }

    #[test]
    fn test_rate_limited_is_distinct_from_not_found() {
        let limited = DataSourceError::RateLimited {
            provider: "Alpha Vantage".to_string(),
        };
        let missing = DataSourceError::NotFound {
            provider: "Alpha Vantage".to_string(),
            message: "No quote data".to_string(),
        };
        assert_ne!(limited.kind(), missing.kind());
    }

    #[test]
    fn test_parse_error_kind() {
        let error = DataSourceError::Parse {
            provider: "JuheGold".to_string(),
            message: "missing result array".to_string(),
        };
        assert_eq!(error.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_unrecognized_short_circuits_as_classification() {
        let error = DataSourceError::Unrecognized {
            input: "Pt950".to_string(),
        };
        assert_eq!(error.kind(), FailureKind::Classification);
        assert_eq!(format!("{}", error), "无法识别的代码格式: Pt950");
    }

    #[test]
    fn test_not_found_display_is_message_only() {
        let error = DataSourceError::NotFound {
            provider: "Crypto-Exchange".to_string(),
            message: "未找到加密货币: FOO".to_string(),
        };
        assert_eq!(format!("{}", error), "未找到加密货币: FOO");
    }
}
