// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change listener callback types.
//!
//! Listeners receive every [`ConfigChangeEvent`] that matches their
//! registration. A listener reports failure by returning an error (or by
//! panicking); either way the failure is logged and delivery continues with the
//! next listener.

use crate::domain::ConfigChangeEvent;
use std::sync::Arc;

/// Error type a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by listeners.
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Type alias for change notification callbacks.
///
/// # Examples
///
/// ```rust
/// use dynacfg::ports::ChangeCallback;
/// use std::sync::Arc;
///
/// let callback: ChangeCallback = Arc::new(|event| {
///     println!("{} changed to {:?}", event.key(), event.new_value());
///     Ok(())
/// });
/// ```
pub type ChangeCallback = Arc<dyn Fn(&ConfigChangeEvent) -> ListenerResult + Send + Sync>;
