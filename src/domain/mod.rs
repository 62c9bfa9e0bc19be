// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing core value types.
//!
//! This module holds the types shared by every other layer: keys and values,
//! change events, feature flag records, validation results and errors. It has
//! no knowledge of where configuration comes from.

pub mod change;
pub mod config_key;
pub mod config_value;
pub mod errors;
pub mod flag;
pub mod validation;

// Re-export commonly used types
pub use change::{diff_snapshots, ChangeType, ConfigChangeEvent, ResolvedProperty, Snapshot};
pub use config_key::ConfigKey;
pub use config_value::ConfigValue;
pub use errors::{ConfigError, Result};
pub use flag::{EvaluationContext, FlagConfiguration, Variant, SUBJECT_ATTRIBUTE};
pub use validation::ValidationResult;
