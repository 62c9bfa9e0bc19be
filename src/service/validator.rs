// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule-based validation of a resolved configuration.
//!
//! Rules are plain functions over a [`ConfigSource`]. The validator runs all of
//! them and reports every failure at once, so an operator can fix the whole
//! configuration in one pass.

use crate::domain::{Result, ValidationResult};
use crate::ports::ConfigSource;
use std::fmt;
use std::sync::Arc;

/// A validation rule: an error message, or `None` if the rule passes.
pub type ValidationRule = Arc<dyn Fn(&dyn ConfigSource) -> Option<String> + Send + Sync>;

/// Built-in rule factories.
///
/// Every rule except `required` passes when the key is
/// absent; combine it with `required` to enforce presence.
pub mod rules {
    use super::ValidationRule;
    use crate::domain::{ConfigError, Result};
    use crate::ports::ConfigSource;
    use regex::Regex;
    use std::sync::Arc;

    /// Fails if `key` is absent or blank.
    pub fn required(key: impl Into<String>) -> ValidationRule {
        let key = key.into();
        let message = format!("Required property '{}' is missing", key);
        required_with_message(key, message)
    }

    /// Like [`required`], with a custom message.
    pub fn required_with_message(key: impl Into<String>, message: impl Into<String>) -> ValidationRule {
        let key = key.into();
        let message = message.into();
        Arc::new(move |source: &dyn ConfigSource| match source.get(&key) {
            Some(value) if !value.is_blank() => None,
            _ => Some(message.clone()),
        })
    }

    /// Fails if `key` is present and its whole value does not match `pattern`.
    ///
    /// An invalid regular expression is rejected with
    /// [`ConfigError::InvalidArgument`].
    pub fn pattern(key: impl Into<String>, pattern: &str) -> Result<ValidationRule> {
        let key = key.into();
        let message = format!("Property '{}' does not match required pattern: {}", key, pattern);
        let regex = compile_full_match(pattern)?;
        Ok(Arc::new(move |source: &dyn ConfigSource| {
            let value = source.get(&key)?;
            (!regex.is_match(value.as_str())).then(|| message.clone())
        }))
    }

    /// Like [`pattern`], with a custom message.
    pub fn pattern_with_message(
        key: impl Into<String>,
        pattern: &str,
        message: impl Into<String>,
    ) -> Result<ValidationRule> {
        let key = key.into();
        let message = message.into();
        let regex = compile_full_match(pattern)?;
        Ok(Arc::new(move |source: &dyn ConfigSource| {
            let value = source.get(&key)?;
            (!regex.is_match(value.as_str())).then(|| message.clone())
        }))
    }

    /// Fails if `key` holds an integer outside `[min, max]`.
    ///
    /// A value that does not parse as an integer counts as absent and passes;
    /// pair with [`pattern`] to reject it.
    pub fn range(key: impl Into<String>, min: i64, max: i64) -> ValidationRule {
        let key = key.into();
        Arc::new(move |source: &dyn ConfigSource| {
            let n = source.get_i64(&key)?;
            (!(min..=max).contains(&n)).then(|| {
                format!(
                    "Property '{}' must be between {} and {}, but was: {}",
                    key, min, max, n
                )
            })
        })
    }

    /// Fails if `key` is present and not exactly equal to one of `allowed`.
    pub fn one_of<I, S>(key: impl Into<String>, allowed: I) -> ValidationRule
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        let allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
        Arc::new(move |source: &dyn ConfigSource| {
            let value = source.get(&key)?;
            if allowed.iter().any(|a| a == value.as_str()) {
                None
            } else {
                Some(format!(
                    "Property '{}' must be one of [{}], but was: {}",
                    key,
                    allowed.join(", "),
                    value
                ))
            }
        })
    }

    fn compile_full_match(pattern: &str) -> Result<Regex> {
        Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            ConfigError::invalid_argument(format!("Invalid pattern '{}': {}", pattern, e))
        })
    }
}

/// An ordered list of validation rules.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::KeyValueStore;
/// use dynacfg::service::RuleValidator;
///
/// # fn main() -> dynacfg::domain::Result<()> {
/// let source = KeyValueStore::new("app", 1);
/// source.put("pool.size", "150")?;
///
/// let validator = RuleValidator::builder()
///     .required("pool.size")
///     .range("pool.size", 1, 100)
///     .build();
///
/// let result = validator.validate(&source);
/// assert_eq!(
///     result.errors(),
///     ["Property 'pool.size' must be between 1 and 100, but was: 150"]
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct RuleValidator {
    rules: Vec<ValidationRule>,
}

impl RuleValidator {
    /// Creates a validator from prepared rules.
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// Creates a builder.
    pub fn builder() -> RuleValidatorBuilder {
        RuleValidatorBuilder::default()
    }

    /// Runs every rule against `source` and collects all failures in
    /// declaration order.
    pub fn validate(&self, source: &dyn ConfigSource) -> ValidationResult {
        let errors: Vec<String> = self.rules.iter().filter_map(|rule| rule(source)).collect();
        if errors.is_empty() {
            tracing::debug!("Configuration passed {} validation rules", self.rules.len());
        } else {
            tracing::debug!(
                "Configuration failed {} of {} validation rules",
                errors.len(),
                self.rules.len()
            );
        }
        ValidationResult::from_errors(errors)
    }

    /// Like [`validate`](Self::validate), returning
    /// [`ConfigError::ValidationFailed`](crate::domain::ConfigError::ValidationFailed)
    /// when any rule fails.
    pub fn validate_or_fail(&self, source: &dyn ConfigSource) -> Result<()> {
        self.validate(source).into_result()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl fmt::Debug for RuleValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleValidator")
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Builder for a [`RuleValidator`]. Rules run in the order they are added.
#[derive(Default)]
pub struct RuleValidatorBuilder {
    rules: Vec<ValidationRule>,
}

impl RuleValidatorBuilder {
    /// Adds [`rules::required`].
    pub fn required(self, key: impl Into<String>) -> Self {
        self.with_rule(rules::required(key))
    }

    /// Adds [`rules::required_with_message`].
    pub fn required_with_message(self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.with_rule(rules::required_with_message(key, message))
    }

    /// Adds [`rules::pattern`]. Fails on an invalid regular expression.
    pub fn pattern(self, key: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(self.with_rule(rules::pattern(key, pattern)?))
    }

    /// Adds [`rules::pattern_with_message`]. Fails on an invalid regular expression.
    pub fn pattern_with_message(
        self,
        key: impl Into<String>,
        pattern: &str,
        message: impl Into<String>,
    ) -> Result<Self> {
        Ok(self.with_rule(rules::pattern_with_message(key, pattern, message)?))
    }

    /// Adds [`rules::range`].
    pub fn range(self, key: impl Into<String>, min: i64, max: i64) -> Self {
        self.with_rule(rules::range(key, min, max))
    }

    /// Adds [`rules::one_of`].
    pub fn one_of<I, S>(self, key: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_rule(rules::one_of(key, allowed))
    }

    /// Adds a custom rule.
    pub fn rule<F>(self, rule: F) -> Self
    where
        F: Fn(&dyn ConfigSource) -> Option<String> + Send + Sync + 'static,
    {
        self.with_rule(Arc::new(rule))
    }

    /// Adds a prepared rule.
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Builds the validator.
    pub fn build(self) -> RuleValidator {
        RuleValidator::new(self.rules)
    }
}
