// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer containing configuration source implementations.
//!
//! This module contains concrete implementations of the configuration source
//! traits defined in the ports layer. Each adapter implements the `ConfigSource`
//! trait to provide configuration from a specific source.

pub mod decrypting;
#[cfg(feature = "env")]
pub mod env_var;
pub mod fetching;
pub mod key_value_store;
#[cfg(feature = "yaml")]
pub mod yaml_file;

// Re-export adapters based on feature flags
pub use decrypting::DecryptingSource;
#[cfg(feature = "env")]
pub use env_var::EnvVarAdapter;
pub use fetching::FetchingSource;
pub use key_value_store::KeyValueStore;
#[cfg(feature = "yaml")]
pub use yaml_file::{YamlFileAdapter, YamlParser};
