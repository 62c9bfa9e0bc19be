// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dynamic configuration and feature flag evaluation.
//!
//! This crate composes configuration from several sources with priority
//! precedence, refreshes it on demand or on a schedule, tells listeners what
//! changed, evaluates feature flags with deterministic per-subject bucketing,
//! and validates the resolved configuration before an application starts.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: Core value types (`ConfigKey`, `ConfigValue`, change
//!   events, flag records, validation results, errors)
//! - **Ports**: Trait definitions that define interfaces (`ConfigSource`,
//!   `ConfigFetcher`, `ConfigParser`, `SecretDecryptor`)
//! - **Adapters**: Implementations for specific configuration sources
//!   (in-memory store, env vars, YAML, remote fetchers, decryption)
//! - **Service**: Composite resolution, change notification, scheduling,
//!   feature flags and validation
//!
//! # Feature Flags
//!
//! - `yaml`: Enable YAML file support (default)
//! - `env`: Enable environment variable support (default)
//! - `full`: Enable all features
//!
//! # Quick Start
//!
//! ```rust
//! use dynacfg::prelude::*;
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let provider = DynamicConfigProvider::builder()
//!     .with_env_prefix("MYAPP_")
//!     .with_values("defaults", 0, HashMap::from([
//!         ("pool.size".to_string(), "10".to_string()),
//!     ]))?
//!     .build()?;
//!
//! provider.validate(
//!     &RuleValidator::builder()
//!         .required("pool.size")
//!         .range("pool.size", 1, 100)
//!         .build(),
//! )?;
//!
//! provider.add_listener("pool.size", |event| {
//!     println!("pool size changed: {}", event);
//!     Ok(())
//! });
//! provider.enable_auto_refresh(Duration::from_secs(30))?;
//!
//! let flags = FeatureFlagEngine::new();
//! flags.set_rollout_percentage("new-checkout", 20)?;
//! let _on = flags.is_enabled_for("new-checkout", &EvaluationContext::for_subject("user-42"));
//!
//! provider.disable_auto_refresh();
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::adapters::{DecryptingSource, FetchingSource, KeyValueStore};
    pub use crate::domain::{
        ChangeType, ConfigChangeEvent, ConfigError, ConfigKey, ConfigValue, EvaluationContext,
        FlagConfiguration, Result, ValidationResult,
    };
    pub use crate::ports::{ConfigFetcher, ConfigParser, ConfigSource, SecretDecryptor};
    pub use crate::service::{
        CompositeSource, DynamicConfigProvider, FeatureFlagEngine, ListenerHandle, RuleValidator,
    };

    // Re-export adapters based on feature flags
    #[cfg(feature = "env")]
    pub use crate::adapters::EnvVarAdapter;
    #[cfg(feature = "yaml")]
    pub use crate::adapters::{YamlFileAdapter, YamlParser};
}
