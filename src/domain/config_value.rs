// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration value type with on-demand typed parsing.
//!
//! Values are always stored as strings. Conversions happen at the point of use
//! and report a miss as `None` instead of an error, so callers supply defaults
//! with `unwrap_or`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A configuration value stored as a string.
///
/// # Examples
///
/// ```
/// use dynacfg::domain::config_value::ConfigValue;
///
/// let value = ConfigValue::new("42".to_string());
/// assert_eq!(value.as_str(), "42");
/// assert_eq!(value.as_i32(), Some(42));
/// assert_eq!(value.as_bool(), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValue(String);

impl ConfigValue {
    /// Creates a new `ConfigValue` from a `String`.
    pub fn new(value: String) -> Self {
        ConfigValue(value)
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns an owned copy of the value.
    pub fn as_string(&self) -> String {
        self.0.clone()
    }

    /// Returns `true` if the value is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Converts the value to a boolean.
    ///
    /// Recognizes the following values (case-insensitive):
    /// - `true`: "true", "yes", "1", "on"
    /// - `false`: "false", "no", "0", "off"
    ///
    /// # Examples
    ///
    /// ```
    /// use dynacfg::domain::config_value::ConfigValue;
    ///
    /// assert_eq!(ConfigValue::from("yes").as_bool(), Some(true));
    /// assert_eq!(ConfigValue::from("OFF").as_bool(), Some(false));
    /// assert_eq!(ConfigValue::from("maybe").as_bool(), None);
    /// ```
    pub fn as_bool(&self) -> Option<bool> {
        match self.0.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }

    /// Converts the value to an `i32`.
    pub fn as_i32(&self) -> Option<i32> {
        self.parse()
    }

    /// Converts the value to an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.parse()
    }

    /// Converts the value to an `f64`.
    ///
    /// Non-finite spellings such as `NaN` or `inf` are treated as misses.
    pub fn as_f64(&self) -> Option<f64> {
        self.parse::<f64>().filter(|v| v.is_finite())
    }

    /// Parses the value into any type that implements `FromStr`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dynacfg::domain::config_value::ConfigValue;
    /// use std::net::IpAddr;
    ///
    /// let value = ConfigValue::from("127.0.0.1");
    /// let ip: Option<IpAddr> = value.parse();
    /// assert_eq!(ip.unwrap().to_string(), "127.0.0.1");
    /// ```
    pub fn parse<T: FromStr>(&self) -> Option<T> {
        self.0.parse::<T>().ok()
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue(s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue(s.to_string())
    }
}

impl From<ConfigValue> for String {
    fn from(value: ConfigValue) -> Self {
        value.0
    }
}

impl AsRef<str> for ConfigValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
