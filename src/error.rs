// src/error.rs

//! Unified error handling for the bidsweep application.

use std::fmt;

use thiserror::Error;

/// Shorthand used by every fallible function in the crate.
pub type Result<T> = std::result::Result<T, AppError>;

/// All failure modes of the application, one variant per concern.
#[derive(Error, Debug)]
pub enum AppError {
    /// Filesystem read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request to a portal or mirror failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stored records or report would not (de)serialize
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file would not parse
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// URL would not parse
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector would not parse
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration or input failed a sanity check
    #[error("Validation error: {0}")]
    Validation(String),

    /// Browser session failure (navigation, interaction, content retrieval)
    #[error("Browser error in {context}: {message}")]
    Browser { context: String, message: String },

    /// Bounded wait for page/content readiness expired
    #[error("Timed out after {waited_ms} ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },
}

impl AppError {
    /// Selector that failed to parse, with the parser's message.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Browsing failure, tagged with the operation that was running.
    pub fn browser(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Browser {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Readiness wait that expired before the content appeared.
    pub fn timeout(what: impl Into<String>, waited_ms: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            waited_ms,
        }
    }

    /// Whether this error is a hard browsing-layer failure that aborts the
    /// crawl, as opposed to a per-fragment or configuration issue.
    pub fn is_browsing_failure(&self) -> bool {
        matches!(
            self,
            AppError::Browser { .. } | AppError::Timeout { .. } | AppError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_error_formats_context() {
        let err = AppError::browser("navigate", "tab crashed");
        assert_eq!(err.to_string(), "Browser error in navigate: tab crashed");
        assert!(err.is_browsing_failure());
    }

    #[test]
    fn timeout_is_browsing_failure() {
        let err = AppError::timeout("results table", 15_000);
        assert!(err.is_browsing_failure());
        assert!(err.to_string().contains("15000 ms"));
    }

    #[test]
    fn config_error_is_not_browsing_failure() {
        assert!(!AppError::config("missing source").is_browsing_failure());
    }
}
