// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feature flag storage and evaluation.
//!
//! Flags are evaluated against an [`EvaluationContext`]. Partial rollouts and
//! variant tables assign each subject to a bucket in `[0, 100)` derived from a
//! hash of its `userId` attribute, so a subject always lands in the same
//! bucket and raising a rollout percentage only ever adds subjects.

use crate::domain::flag::{EvaluationContext, FlagConfiguration, SUBJECT_ATTRIBUTE};
use crate::domain::{ConfigError, Result};
use crate::ports::ConfigSource;
use arc_swap::ArcSwap;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

/// User metadata attached to a flag.
pub type FlagMetadata = HashMap<String, serde_json::Value>;

type FlagTable = HashMap<String, Arc<FlagConfiguration>>;

/// Number of buckets subjects are spread over.
pub const BUCKET_COUNT: u32 = 100;

/// Returns the bucket in `[0, 100)` for a subject identifier.
///
/// The bucket depends only on the identifier, so it is the same for every flag
/// and every call.
pub fn bucket_for(subject_id: &str) -> u32 {
    let mut hasher = DefaultHasher::new();
    subject_id.hash(&mut hasher);
    (hasher.finish() % u64::from(BUCKET_COUNT)) as u32
}

/// Outcome of [`FeatureFlagEngine::load_from_source`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagLoadReport {
    /// Flags installed, sorted by name
    pub loaded: Vec<String>,
    /// Flags skipped, with the reason
    pub rejected: BTreeMap<String, String>,
}

/// Thread-safe feature flag table.
///
/// Each flag's [`FlagConfiguration`] is replaced as a whole on every change and
/// the table itself is swapped atomically, so evaluation never sees a mix of an
/// old percentage and new variants. Evaluation never blocks.
///
/// # Evaluating without a subject
///
/// A partial rollout or a variant table needs a bucket. Without a `userId` in
/// the context the default engine draws a random bucket on every call, which
/// gives a different answer from call to call and is discouraged; it is kept
/// only for callers that have no subject to offer. An engine built with
/// [`strict`](Self::strict) instead treats such evaluations as disabled and
/// returns the caller's default variant.
///
/// # Examples
///
/// ```rust
/// use dynacfg::domain::EvaluationContext;
/// use dynacfg::service::FeatureFlagEngine;
///
/// # fn main() -> dynacfg::domain::Result<()> {
/// let flags = FeatureFlagEngine::new();
/// flags.enable("dark-mode");
/// flags.set_rollout_percentage("beta", 50)?;
/// flags.set_variants("color", [("red", 40), ("blue", 60)])?;
///
/// let user = EvaluationContext::for_subject("user-123");
/// assert!(flags.is_enabled("dark-mode"));
/// let beta = flags.is_enabled_for("beta", &user);
/// assert_eq!(flags.is_enabled_for("beta", &user), beta);
///
/// let color = flags.get_variant_for("color", "control", &user);
/// assert!(color == "red" || color == "blue");
/// assert_eq!(flags.get_variant_for("missing", "control", &user), "control");
/// # Ok(())
/// # }
/// ```
pub struct FeatureFlagEngine {
    flags: ArcSwap<FlagTable>,
    strict: bool,
}

impl FeatureFlagEngine {
    /// Creates an engine that falls back to a random bucket when no subject is
    /// known.
    pub fn new() -> Self {
        Self {
            flags: ArcSwap::from_pointee(HashMap::new()),
            strict: false,
        }
    }

    /// Creates an engine that requires a subject for partial rollouts and
    /// variant tables.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::new()
        }
    }

    /// Returns `true` if this engine requires a subject identifier.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn install<F>(&self, flag: &str, build: F)
    where
        F: Fn(Option<&FlagConfiguration>) -> FlagConfiguration,
    {
        self.flags.rcu(|current| {
            let mut next = HashMap::clone(current);
            let config = build(current.get(flag).map(Arc::as_ref));
            next.insert(flag.to_string(), Arc::new(config));
            next
        });
    }

    /// Enables `flag` for every subject.
    pub fn enable(&self, flag: &str) {
        self.install(flag, |previous| {
            FlagConfiguration::enabled().keeping_metadata_of(previous)
        });
        tracing::debug!("Flag '{}' enabled", flag);
    }

    /// Disables `flag` for every subject.
    pub fn disable(&self, flag: &str) {
        self.install(flag, |previous| {
            FlagConfiguration::disabled().keeping_metadata_of(previous)
        });
        tracing::debug!("Flag '{}' disabled", flag);
    }

    /// Enables `flag` for `percentage` percent of subjects.
    ///
    /// A percentage above 100 is rejected and leaves the flag unchanged.
    pub fn set_rollout_percentage(&self, flag: &str, percentage: u8) -> Result<()> {
        let config = FlagConfiguration::rollout(percentage)?;
        self.install(flag, |previous| config.clone().keeping_metadata_of(previous));
        tracing::debug!("Flag '{}' rolled out to {}%", flag, percentage);
        Ok(())
    }

    /// Enables `flag` for everyone and resolves it to one of `variants`.
    ///
    /// Weights must sum to exactly 100. A rejected table leaves the flag
    /// unchanged.
    pub fn set_variants<I, S>(&self, flag: &str, variants: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let config = FlagConfiguration::with_variants(variants)?;
        self.install(flag, |previous| config.clone().keeping_metadata_of(previous));
        tracing::debug!("Flag '{}' variants updated", flag);
        Ok(())
    }

    /// Merges `metadata` into the flag without changing how it evaluates.
    ///
    /// An unconfigured flag becomes a disabled flag carrying the metadata.
    pub fn set_metadata(&self, flag: &str, metadata: FlagMetadata) {
        self.install(flag, |previous| {
            previous
                .cloned()
                .unwrap_or_else(FlagConfiguration::disabled)
                .merged_metadata(metadata.clone())
        });
    }

    /// Forgets `flag`. Returns `false` if it was not configured.
    pub fn remove(&self, flag: &str) -> bool {
        let mut removed = false;
        self.flags.rcu(|current| {
            let mut next = HashMap::clone(current);
            removed = next.remove(flag).is_some();
            next
        });
        removed
    }

    /// Forgets every flag.
    pub fn clear(&self) {
        self.flags.store(Arc::new(HashMap::new()));
    }

    /// Number of configured flags.
    pub fn len(&self) -> usize {
        self.flags.load().len()
    }

    /// Returns `true` if no flag is configured.
    pub fn is_empty(&self) -> bool {
        self.flags.load().is_empty()
    }

    /// The current configuration of `flag`.
    pub fn flag_configuration(&self, flag: &str) -> Option<Arc<FlagConfiguration>> {
        self.flags.load().get(flag).cloned()
    }

    /// Names of all configured flags, sorted.
    pub fn get_all_flags(&self) -> BTreeSet<String> {
        self.flags.load().keys().cloned().collect()
    }

    /// User metadata of `flag` plus the synthesized `enabled` and `percentage`
    /// entries. Empty for an unconfigured flag.
    pub fn get_flag_metadata(&self, flag: &str) -> FlagMetadata {
        self.flag_configuration(flag)
            .map(|config| config.describe())
            .unwrap_or_default()
    }

    /// Evaluates `flag` without a subject.
    ///
    /// Only meaningful for flags that are fully on or off; see the type-level
    /// notes on evaluating without a subject.
    pub fn is_enabled(&self, flag: &str) -> bool {
        self.is_enabled_for(flag, &EvaluationContext::new())
    }

    /// Evaluates `flag` for the subject in `context`.
    pub fn is_enabled_for(&self, flag: &str, context: &EvaluationContext) -> bool {
        let Some(config) = self.flag_configuration(flag) else {
            return false;
        };
        if !config.is_enabled() {
            return false;
        }
        let percentage = u32::from(config.percentage());
        if percentage >= BUCKET_COUNT {
            return true;
        }
        if percentage == 0 {
            return false;
        }
        self.bucket(flag, context)
            .map(|bucket| bucket < percentage)
            .unwrap_or(false)
    }

    /// Resolves the variant of `flag` without a subject.
    pub fn get_variant(&self, flag: &str, default: &str) -> String {
        self.get_variant_for(flag, default, &EvaluationContext::new())
    }

    /// Resolves the variant of `flag` for the subject in `context`.
    ///
    /// Returns `default` when the flag is unconfigured, disabled or has no
    /// variant table.
    pub fn get_variant_for(&self, flag: &str, default: &str, context: &EvaluationContext) -> String {
        let Some(config) = self.flag_configuration(flag) else {
            return default.to_string();
        };
        if !config.is_enabled() || config.variants().is_none() {
            return default.to_string();
        }
        self.bucket(flag, context)
            .and_then(|bucket| config.variant_for_bucket(bucket))
            .unwrap_or(default)
            .to_string()
    }

    fn bucket(&self, flag: &str, context: &EvaluationContext) -> Option<u32> {
        if let Some(subject) = context.subject_id() {
            return Some(bucket_for(subject));
        }
        if self.strict {
            tracing::debug!(
                "Flag '{}' needs a '{}' attribute; treating as disabled",
                flag,
                SUBJECT_ATTRIBUTE
            );
            return None;
        }
        tracing::warn!(
            "Flag '{}' evaluated without a '{}' attribute; using a random bucket",
            flag,
            SUBJECT_ATTRIBUTE
        );
        Some(rand::thread_rng().gen_range(0..BUCKET_COUNT))
    }

    /// Installs flags described by the properties below `prefix`.
    ///
    /// Recognized keys, for a flag named `<flag>`:
    ///
    /// - `<prefix>.<flag>.enabled`: boolean; `false` disables the flag outright
    /// - `<prefix>.<flag>.percentage`: rollout percentage in `[0, 100]`
    /// - `<prefix>.<flag>.variants.<name>`: variant weight; variants are ordered
    ///   by name
    ///
    /// Flags whose settings fail validation are skipped, logged and listed in
    /// the report; the others are installed together in one swap.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dynacfg::adapters::KeyValueStore;
    /// use dynacfg::service::FeatureFlagEngine;
    ///
    /// # fn main() -> dynacfg::domain::Result<()> {
    /// let source = KeyValueStore::new("flags", 1);
    /// source.put("features.search.enabled", "true")?;
    /// source.put("features.beta.percentage", "25")?;
    /// source.put("features.broken.percentage", "250")?;
    ///
    /// let flags = FeatureFlagEngine::new();
    /// let report = flags.load_from_source(&source, "features");
    /// assert_eq!(report.loaded, vec!["beta", "search"]);
    /// assert!(report.rejected.contains_key("broken"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_from_source(&self, source: &dyn ConfigSource, prefix: &str) -> FlagLoadReport {
        let mut settings: BTreeMap<String, FlagSettings> = BTreeMap::new();
        for (key, value) in source.get_properties(prefix) {
            // Variant names may collide with the setting suffixes, so the
            // variants segment is matched first.
            if let Some((flag, variant)) = key.split_once(".variants.") {
                settings
                    .entry(flag.to_string())
                    .or_default()
                    .variants
                    .insert(variant.to_string(), value);
            } else if let Some(flag) = key.strip_suffix(".enabled") {
                settings.entry(flag.to_string()).or_default().enabled = Some(value);
            } else if let Some(flag) = key.strip_suffix(".percentage") {
                settings.entry(flag.to_string()).or_default().percentage = Some(value);
            }
        }

        let mut report = FlagLoadReport::default();
        let mut parsed = Vec::new();
        for (flag, setting) in settings {
            match setting.into_configuration() {
                Ok(config) => parsed.push((flag, config)),
                Err(e) => {
                    tracing::warn!("Skipping flag '{}' from '{}': {}", flag, source.name(), e);
                    report.rejected.insert(flag, e.to_string());
                }
            }
        }

        if !parsed.is_empty() {
            self.flags.rcu(|current| {
                let mut next = HashMap::clone(current);
                for (flag, config) in &parsed {
                    let config = config.clone().keeping_metadata_of(current.get(flag).map(Arc::as_ref));
                    next.insert(flag.clone(), Arc::new(config));
                }
                next
            });
        }

        report.loaded = parsed.into_iter().map(|(flag, _)| flag).collect();
        tracing::debug!(
            "Loaded {} flags from '{}' ({} rejected)",
            report.loaded.len(),
            source.name(),
            report.rejected.len()
        );
        report
    }
}

#[derive(Default)]
struct FlagSettings {
    enabled: Option<String>,
    percentage: Option<String>,
    variants: BTreeMap<String, String>,
}

impl FlagSettings {
    fn into_configuration(self) -> Result<FlagConfiguration> {
        let enabled = self
            .enabled
            .map(|raw| {
                crate::domain::ConfigValue::from(raw.as_str())
                    .as_bool()
                    .ok_or_else(|| {
                        ConfigError::invalid_argument(format!("'enabled' is not a boolean: {}", raw))
                    })
            })
            .transpose()?;

        if enabled == Some(false) {
            return Ok(FlagConfiguration::disabled());
        }

        if !self.variants.is_empty() {
            let variants = self
                .variants
                .into_iter()
                .map(|(name, raw)| {
                    raw.trim().parse::<u32>().map(|weight| (name.clone(), weight)).map_err(|_| {
                        ConfigError::invalid_argument(format!(
                            "Weight of variant '{}' is not a number: {}",
                            name, raw
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return FlagConfiguration::with_variants(variants);
        }

        if let Some(raw) = self.percentage {
            let percentage = raw.trim().parse::<u8>().map_err(|_| {
                ConfigError::invalid_argument(format!(
                    "Rollout percentage must be between 0 and 100, but was: {}",
                    raw
                ))
            })?;
            return FlagConfiguration::rollout(percentage);
        }

        Ok(FlagConfiguration::enabled())
    }
}

impl Default for FeatureFlagEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FeatureFlagEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureFlagEngine")
            .field("flags", &self.get_all_flags())
            .field("strict", &self.strict)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::KeyValueStore;
    use serde_json::json;

    fn user(id: &str) -> EvaluationContext {
        EvaluationContext::for_subject(id)
    }

    #[test]
    fn test_unconfigured_flag() {
        let flags = FeatureFlagEngine::new();
        assert!(!flags.is_enabled("nope"));
        assert!(!flags.is_enabled_for("nope", &user("u1")));
        assert_eq!(flags.get_variant("nope", "control"), "control");
        assert!(flags.get_flag_metadata("nope").is_empty());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_enable_disable() {
        let flags = FeatureFlagEngine::new();
        flags.enable("f");
        assert!(flags.is_enabled("f"));
        assert_eq!(flags.flag_configuration("f").unwrap().percentage(), 100);

        flags.disable("f");
        assert!(!flags.is_enabled_for("f", &user("u1")));
        assert_eq!(flags.flag_configuration("f").unwrap().percentage(), 0);
    }

    #[test]
    fn test_rollout_extremes_need_no_subject() {
        let flags = FeatureFlagEngine::strict();
        flags.set_rollout_percentage("all", 100).unwrap();
        flags.set_rollout_percentage("none", 0).unwrap();
        assert!(flags.is_enabled("all"));
        assert!(!flags.is_enabled("none"));
    }

    #[test]
    fn test_rollout_is_deterministic_per_subject() {
        let flags = FeatureFlagEngine::new();
        flags.set_rollout_percentage("beta", 50).unwrap();
        let ctx = user("user-123");
        let first = flags.is_enabled_for("beta", &ctx);
        for _ in 0..100 {
            assert_eq!(flags.is_enabled_for("beta", &ctx), first);
        }
        assert_eq!(first, bucket_for("user-123") < 50);
    }

    #[test]
    fn test_rollout_spreads_subjects() {
        let flags = FeatureFlagEngine::new();
        flags.set_rollout_percentage("beta", 50).unwrap();
        let enabled = (0..10_000)
            .filter(|i| flags.is_enabled_for("beta", &user(&format!("user-{}", i))))
            .count();
        assert!((4_000..6_000).contains(&enabled), "enabled = {}", enabled);
    }

    #[test]
    fn test_invalid_rollout_rejected_without_change() {
        let flags = FeatureFlagEngine::new();
        flags.enable("f");
        assert!(matches!(
            flags.set_rollout_percentage("f", 101),
            Err(ConfigError::InvalidArgument { .. })
        ));
        assert_eq!(flags.flag_configuration("f").unwrap().percentage(), 100);
    }

    #[test]
    fn test_variants() {
        let flags = FeatureFlagEngine::new();
        flags.set_variants("color", [("red", 40), ("blue", 60)]).unwrap();

        let ctx = user("u1");
        let first = flags.get_variant_for("color", "control", &ctx);
        assert!(first == "red" || first == "blue");
        for _ in 0..50 {
            assert_eq!(flags.get_variant_for("color", "control", &ctx), first);
        }

        let expected = if bucket_for("u1") < 40 { "red" } else { "blue" };
        assert_eq!(first, expected);
        assert!(flags.is_enabled_for("color", &ctx));
    }

    #[test]
    fn test_bad_variants_leave_prior_state() {
        let flags = FeatureFlagEngine::new();
        flags.set_variants("color", [("red", 50), ("blue", 50)]).unwrap();
        let before = flags.flag_configuration("color").unwrap();

        assert!(flags.set_variants("color", [("red", 50), ("blue", 49)]).is_err());
        assert!(flags.set_variants("color", Vec::<(String, u32)>::new()).is_err());
        assert_eq!(flags.flag_configuration("color").unwrap(), before);
    }

    #[test]
    fn test_disabled_or_plain_flag_returns_default_variant() {
        let flags = FeatureFlagEngine::new();
        flags.set_variants("color", [("red", 100)]).unwrap();
        flags.disable("color");
        assert_eq!(flags.get_variant_for("color", "control", &user("u1")), "control");

        flags.enable("plain");
        assert_eq!(flags.get_variant_for("plain", "control", &user("u1")), "control");
    }

    #[test]
    fn test_strict_mode_without_subject() {
        let flags = FeatureFlagEngine::strict();
        assert!(flags.is_strict());
        flags.set_rollout_percentage("beta", 99).unwrap();
        flags.set_variants("color", [("red", 100)]).unwrap();

        assert!(!flags.is_enabled("beta"));
        assert_eq!(flags.get_variant("color", "control"), "control");
        assert_eq!(flags.get_variant_for("color", "control", &user("u1")), "red");
    }

    #[test]
    fn test_lenient_mode_without_subject_stays_in_range() {
        let flags = FeatureFlagEngine::new();
        flags.set_variants("color", [("red", 100)]).unwrap();
        for _ in 0..20 {
            assert_eq!(flags.get_variant("color", "control"), "red");
        }
    }

    #[test]
    fn test_metadata_survives_transitions() {
        let flags = FeatureFlagEngine::new();
        flags.set_metadata("f", HashMap::from([("owner".to_string(), json!("team-a"))]));
        assert!(!flags.is_enabled("f"));

        flags.set_rollout_percentage("f", 30).unwrap();
        flags.set_metadata("f", HashMap::from([("ticket".to_string(), json!(42))]));

        let metadata = flags.get_flag_metadata("f");
        assert_eq!(metadata["owner"], json!("team-a"));
        assert_eq!(metadata["ticket"], json!(42));
        assert_eq!(metadata["enabled"], json!(true));
        assert_eq!(metadata["percentage"], json!(30));
    }

    #[test]
    fn test_remove_and_clear() {
        let flags = FeatureFlagEngine::new();
        flags.enable("a");
        flags.enable("b");
        assert_eq!(
            flags.get_all_flags().into_iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        assert!(flags.remove("a"));
        assert!(!flags.remove("a"));
        assert!(!flags.is_enabled("a"));
        assert_eq!(flags.len(), 1);

        flags.clear();
        assert!(flags.is_empty());
    }

    #[test]
    fn test_load_from_source() {
        let source = KeyValueStore::new("flags", 1);
        source.put("features.search.enabled", "true").unwrap();
        source.put("features.beta.percentage", "25").unwrap();
        source.put("features.checkout.v2.variants.old", "70").unwrap();
        source.put("features.checkout.v2.variants.new", "30").unwrap();
        source.put("features.off.enabled", "false").unwrap();
        source.put("features.off.percentage", "50").unwrap();
        source.put("features.bad.variants.a", "10").unwrap();
        source.put("features.worse.enabled", "maybe").unwrap();
        source.put("other.thing.enabled", "true").unwrap();

        let flags = FeatureFlagEngine::new();
        let report = flags.load_from_source(&source, "features");

        assert_eq!(report.loaded, vec!["beta", "checkout.v2", "off", "search"]);
        assert_eq!(
            report.rejected.keys().collect::<Vec<_>>(),
            vec!["bad", "worse"]
        );
        assert!(flags.is_enabled("search"));
        assert!(!flags.is_enabled_for("off", &user("u1")));
        assert_eq!(flags.flag_configuration("beta").unwrap().percentage(), 25);

        // Variants are ordered by name: "new" covers buckets 0..30.
        let expected = if bucket_for("u1") < 30 { "new" } else { "old" };
        assert_eq!(flags.get_variant_for("checkout.v2", "none", &user("u1")), expected);
        assert!(!flags.get_all_flags().contains("thing"));
    }
}
