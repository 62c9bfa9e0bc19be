// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the configuration crate.
//!
//! This module defines the error types that can occur when refreshing sources,
//! configuring feature flags, or validating a resolved configuration. All errors
//! use `thiserror` for proper error handling and conversion.
//!
//! Lookup misses are deliberately absent from this taxonomy: typed getters
//! return `None` for missing or unparsable values.

use crate::domain::validation::ValidationResult;
use thiserror::Error;

/// The main error type for configuration operations.
///
/// It is marked as `#[non_exhaustive]` to allow for future additions without
/// breaking backwards compatibility.
///
/// # Examples
///
/// ```
/// use dynacfg::domain::errors::ConfigError;
///
/// fn set_percentage(pct: u8) -> Result<(), ConfigError> {
///     if pct > 100 {
///         return Err(ConfigError::invalid_argument(format!(
///             "Rollout percentage must be between 0 and 100, but was: {}",
///             pct
///         )));
///     }
///     Ok(())
/// }
///
/// assert!(set_percentage(101).is_err());
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The requested configuration key was not found in any source.
    #[error("Configuration key not found: {key}")]
    ConfigKeyNotFound {
        /// The key that was not found
        key: String,
    },

    /// An error occurred in a configuration source.
    #[error("Configuration source '{source_name}' error: {message}")]
    SourceError {
        /// The name of the source that encountered the error
        source_name: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to parse a configuration file or value.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// One or more sources of a composite failed to refresh.
    ///
    /// Sources that refreshed successfully keep their new state, so callers
    /// must treat this as "some sources are stale" rather than "nothing changed".
    #[error(
        "Failed to refresh {} configuration source(s): {}",
        .failed_sources.len(),
        .failed_sources.join(", ")
    )]
    RefreshFailed {
        /// Names of the sources whose refresh failed, in resolution order
        failed_sources: Vec<String>,
        /// The individual failures, parallel to `failed_sources`
        errors: Vec<ConfigError>,
    },

    /// A caller supplied a value that can never be valid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected value
        message: String,
    },

    /// The resolved configuration did not satisfy its declared rules.
    #[error("{}", .0.format_errors())]
    ValidationFailed(ValidationResult),

    /// An I/O error occurred while reading configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Creates an `InvalidArgument` error from a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ConfigError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a `SourceError` without an underlying cause.
    pub fn source_error(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::SourceError {
            source_name: source_name.into(),
            message: message.into(),
            source: None,
        }
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
