// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer containing the orchestrating components.
//!
//! This module composes sources by priority, detects and dispatches changes,
//! schedules background refresh, evaluates feature flags and validates the
//! resolved configuration.

pub mod composite;
pub mod feature_flags;
pub mod notifier;
pub mod provider;
pub mod scheduler;
pub mod validator;

// Re-export commonly used types
pub use composite::{CompositeSource, CompositeSourceBuilder};
pub use feature_flags::{bucket_for, FeatureFlagEngine, FlagLoadReport, FlagMetadata};
pub use notifier::{ChangeNotifier, DispatchReport, ListenerHandle};
pub use provider::{DynamicConfigProvider, DynamicConfigProviderBuilder};
pub use scheduler::{RefreshScheduler, ScheduledTask};
pub use validator::{rules, RuleValidator, RuleValidatorBuilder, ValidationRule};
