// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregated outcome of validating a resolved configuration.

use crate::domain::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of validation failures; empty means the configuration is valid.
///
/// # Examples
///
/// ```
/// use dynacfg::domain::ValidationResult;
///
/// assert!(ValidationResult::valid().is_valid());
///
/// let result = ValidationResult::invalid(vec![
///     "Required property 'db.url' is missing".to_string(),
///     "Property 'pool.size' must be between 1 and 100, but was: 150".to_string(),
/// ]).unwrap();
/// assert_eq!(
///     result.format_errors(),
///     "2 configuration errors:\n  1. Required property 'db.url' is missing\n  2. Property 'pool.size' must be between 1 and 100, but was: 150"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<String>,
}

impl ValidationResult {
    /// The canonical passing result.
    pub fn valid() -> Self {
        Self { errors: Vec::new() }
    }

    /// A failing result. At least one error is required.
    pub fn invalid(errors: Vec<String>) -> Result<Self> {
        if errors.is_empty() {
            return Err(ConfigError::invalid_argument(
                "An invalid validation result needs at least one error",
            ));
        }
        Ok(Self { errors })
    }

    /// Builds a result from collected errors, valid when there are none.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self { errors }
    }

    /// Returns `true` when no rule failed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` when at least one rule failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The error messages in rule-declaration order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Renders the errors for operators.
    ///
    /// A single error is returned verbatim. Several errors are rendered as a
    /// count header followed by one numbered, indented line per error. A valid
    /// result renders as an empty string.
    pub fn format_errors(&self) -> String {
        match self.errors.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            errors => {
                let mut out = format!("{} configuration errors:", errors.len());
                for (i, error) in errors.iter().enumerate() {
                    out.push_str(&format!("\n  {}. {}", i + 1, error));
                }
                out
            }
        }
    }

    /// Converts a failing result into `ConfigError::ValidationFailed`.
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed(self))
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "valid")
        } else {
            write!(f, "{}", self.format_errors())
        }
    }
}
