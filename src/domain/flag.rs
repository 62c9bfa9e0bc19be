// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature flag records and evaluation context.
//!
//! A [`FlagConfiguration`] is an immutable value. Every change produces a new
//! record which the engine swaps in whole, so readers never observe a mix of
//! old and new fields.

use crate::domain::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute name that carries the subject identifier used for bucketing.
pub const SUBJECT_ATTRIBUTE: &str = "userId";

/// Metadata key synthesized from [`FlagConfiguration::enabled`].
pub const METADATA_ENABLED: &str = "enabled";

/// Metadata key synthesized from [`FlagConfiguration::percentage`].
pub const METADATA_PERCENTAGE: &str = "percentage";

/// A named, weighted alternative a flag can resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant name returned by evaluation
    pub name: String,
    /// Share of buckets assigned to this variant
    pub weight: u32,
}

/// The full state of one feature flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagConfiguration {
    enabled: bool,
    percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variants: Option<Vec<Variant>>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl FlagConfiguration {
    /// Fully enabled: every subject sees the flag.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            percentage: 100,
            variants: None,
            metadata: HashMap::new(),
        }
    }

    /// Disabled: no subject sees the flag.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            percentage: 0,
            variants: None,
            metadata: HashMap::new(),
        }
    }

    /// Enabled for the subjects whose bucket is below `percentage`.
    pub fn rollout(percentage: u8) -> Result<Self> {
        check_percentage(percentage)?;
        Ok(Self {
            enabled: true,
            percentage,
            variants: None,
            metadata: HashMap::new(),
        })
    }

    /// Enabled for everyone, resolving to one of `variants` by bucket.
    ///
    /// Weights must sum to exactly 100 and names must be unique and non-empty.
    pub fn with_variants<I, S>(variants: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let variants: Vec<Variant> = variants
            .into_iter()
            .map(|(name, weight)| Variant {
                name: name.into(),
                weight,
            })
            .collect();
        check_variants(&variants)?;
        Ok(Self {
            enabled: true,
            percentage: 100,
            variants: Some(variants),
            metadata: HashMap::new(),
        })
    }

    /// Returns a copy of this record with `metadata` merged over the existing entries.
    pub fn merged_metadata(&self, metadata: HashMap<String, serde_json::Value>) -> Self {
        let mut next = self.clone();
        next.metadata.extend(metadata);
        next
    }

    /// Returns a copy of this record carrying over the metadata of `previous`.
    pub(crate) fn keeping_metadata_of(mut self, previous: Option<&FlagConfiguration>) -> Self {
        if let Some(previous) = previous {
            self.metadata = previous.metadata.clone();
        }
        self
    }

    /// Whether the flag can evaluate to enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Rollout percentage in `[0, 100]`.
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// The variant table, in evaluation order.
    pub fn variants(&self) -> Option<&[Variant]> {
        self.variants.as_deref()
    }

    /// User-supplied metadata.
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Metadata including the synthesized `enabled` and `percentage` entries.
    pub fn describe(&self) -> HashMap<String, serde_json::Value> {
        let mut out = self.metadata.clone();
        out.insert(METADATA_ENABLED.to_string(), self.enabled.into());
        out.insert(METADATA_PERCENTAGE.to_string(), self.percentage.into());
        out
    }

    /// Picks the variant whose cumulative weight first exceeds `bucket`.
    ///
    /// Returns `None` when there is no table or the bucket lies beyond the
    /// accumulated weights of a malformed table.
    pub fn variant_for_bucket(&self, bucket: u32) -> Option<&str> {
        let mut cumulative = 0u32;
        for variant in self.variants.as_deref()? {
            cumulative = cumulative.saturating_add(variant.weight);
            if bucket < cumulative {
                return Some(&variant.name);
            }
        }
        None
    }
}

fn check_percentage(percentage: u8) -> Result<()> {
    if percentage > 100 {
        return Err(ConfigError::invalid_argument(format!(
            "Rollout percentage must be between 0 and 100, but was: {}",
            percentage
        )));
    }
    Ok(())
}

fn check_variants(variants: &[Variant]) -> Result<()> {
    if variants.is_empty() {
        return Err(ConfigError::invalid_argument(
            "At least one variant is required",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for variant in variants {
        if variant.name.trim().is_empty() {
            return Err(ConfigError::invalid_argument("Variant names must not be empty"));
        }
        if !seen.insert(variant.name.as_str()) {
            return Err(ConfigError::invalid_argument(format!(
                "Duplicate variant name: {}",
                variant.name
            )));
        }
    }
    let total: u64 = variants.iter().map(|v| u64::from(v.weight)).sum();
    if total != 100 {
        return Err(ConfigError::invalid_argument(format!(
            "Variant weights must sum to 100, but was: {}",
            total
        )));
    }
    Ok(())
}

/// Immutable attributes supplied when a flag is evaluated.
///
/// # Examples
///
/// ```
/// use dynacfg::domain::EvaluationContext;
///
/// let ctx = EvaluationContext::for_subject("user-123").with_attribute("plan", "pro");
/// assert_eq!(ctx.subject_id(), Some("user-123"));
/// assert_eq!(ctx.attribute("plan"), Some("pro"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    attributes: HashMap<String, String>,
}

impl EvaluationContext {
    /// An empty context with no subject.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose subject identifier is `subject_id`.
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self::new().with_attribute(SUBJECT_ATTRIBUTE, subject_id)
    }

    /// Returns a copy with an extra attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The subject identifier, if one was supplied.
    pub fn subject_id(&self) -> Option<&str> {
        self.attribute(SUBJECT_ATTRIBUTE)
    }

    /// Looks up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All attributes.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EvaluationContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
