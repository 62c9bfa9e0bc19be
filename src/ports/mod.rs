// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! This module contains the trait definitions (ports) that define the interfaces
//! between the core and the outside world: configuration sources, file parsers,
//! remote fetchers, secret decryption and change listeners.

pub mod decryptor;
pub mod fetcher;
pub mod listener;
pub mod parser;
pub mod source;

// Re-export commonly used types
pub use decryptor::SecretDecryptor;
pub use fetcher::{ConfigFetcher, FnFetcher};
pub use listener::{ChangeCallback, ListenerError, ListenerResult};
pub use parser::ConfigParser;
pub use source::ConfigSource;
