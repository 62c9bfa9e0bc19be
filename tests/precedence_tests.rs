// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration source precedence.

mod common;

use common::{EnvGuard, MockConfigSource};
use dynacfg::prelude::*;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn ordered(sources: Vec<Arc<MockConfigSource>>) -> CompositeSource {
    CompositeSource::new(
        sources
            .into_iter()
            .map(|s| s as Arc<dyn ConfigSource>)
            .collect(),
    )
}

#[test]
fn test_first_source_with_key_wins() {
    let a = Arc::new(MockConfigSource::new("a", 1));
    let b = Arc::new(MockConfigSource::new("b", 2).with_value("k", "x"));
    let composite = ordered(vec![a, b]);
    assert_eq!(composite.get_string("k").as_deref(), Some("x"));

    let a = Arc::new(MockConfigSource::new("a", 1).with_value("k", "y"));
    let b = Arc::new(MockConfigSource::new("b", 2).with_value("k", "x"));
    let composite = ordered(vec![a, b]);
    assert_eq!(composite.get_string("k").as_deref(), Some("y"));
}

#[test]
fn test_builder_uses_source_priority() {
    let composite = CompositeSource::builder()
        .with_source(Arc::new(MockConfigSource::new("low", 1).with_value("k", "low")))
        .with_source(Arc::new(MockConfigSource::new("high", 3).with_value("k", "high")))
        .with_source(Arc::new(
            MockConfigSource::new("medium", 2)
                .with_value("k", "medium")
                .with_value("only.medium", "m"),
        ))
        .build();

    assert_eq!(composite.get_string("k").as_deref(), Some("high"));
    assert_eq!(composite.get_string("only.medium").as_deref(), Some("m"));
    assert_eq!(composite.snapshot()["k"].source, "high");
}

#[test]
fn test_empty_composite() {
    let provider = DynamicConfigProvider::builder().build().unwrap();
    assert_eq!(provider.get_string("anything"), None);
    assert!(!provider.contains_key("anything"));
    assert!(provider.all_keys().is_empty());
    assert!(matches!(
        provider.require("anything"),
        Err(ConfigError::ConfigKeyNotFound { .. })
    ));
}

#[test]
#[cfg(all(feature = "env", feature = "yaml"))]
fn test_precedence_env_over_yaml() {
    let mut env_guard = EnvGuard::new();

    let mut yaml_file = NamedTempFile::new().unwrap();
    writeln!(yaml_file, "test:\n  key: yaml_value\n  other: from_yaml").unwrap();

    env_guard.set("DYNACFGPREC1_TEST_KEY", "env_value");

    let provider = DynamicConfigProvider::builder()
        .with_yaml_file(yaml_file.path())
        .unwrap()
        .with_env_prefix("DYNACFGPREC1_")
        .build()
        .unwrap();

    // Environment variable should win (priority 2 > 1)
    assert_eq!(provider.get_string("test.key").as_deref(), Some("env_value"));
    assert_eq!(provider.get_string("test.other").as_deref(), Some("from_yaml"));

    let snapshot = provider.snapshot();
    assert_eq!(snapshot["test.key"].source, "env");
    assert_eq!(snapshot["test.other"].source, "yaml-file");
}

#[test]
#[cfg(feature = "yaml")]
fn test_yaml_over_defaults() {
    let mut yaml_file = NamedTempFile::new().unwrap();
    writeln!(yaml_file, "server:\n  port: 9090").unwrap();

    let provider = DynamicConfigProvider::builder()
        .with_values(
            "defaults",
            0,
            HashMap::from([
                ("server.port".to_string(), "8080".to_string()),
                ("server.host".to_string(), "0.0.0.0".to_string()),
            ]),
        )
        .unwrap()
        .with_yaml_file(yaml_file.path())
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(provider.get_i32("server.port"), Some(9090));
    assert_eq!(provider.get_string("server.host").as_deref(), Some("0.0.0.0"));

    let server = provider.get_properties("server");
    assert_eq!(server.len(), 2);
    assert_eq!(server.get("port").map(String::as_str), Some("9090"));
}

#[test]
fn test_typed_lookup_falls_through_to_parsable_value() {
    let composite = ordered(vec![
        Arc::new(MockConfigSource::new("a", 1).with_value("timeout", "soon")),
        Arc::new(MockConfigSource::new("b", 1).with_value("timeout", "30")),
    ]);

    assert_eq!(composite.get_string("timeout").as_deref(), Some("soon"));
    assert_eq!(composite.get_i64("timeout"), Some(30));
    assert_eq!(composite.get_f64("timeout"), Some(30.0));
}

#[test]
fn test_contains_key_is_or_across_sources() {
    let composite = ordered(vec![
        Arc::new(MockConfigSource::new("a", 1).with_value("only.a", "1")),
        Arc::new(MockConfigSource::new("b", 1).with_value("only.b", "1")),
    ]);
    assert!(composite.contains_key("only.a"));
    assert!(composite.contains_key("only.b"));
    assert!(!composite.contains_key("neither"));
}

#[test]
fn test_decrypting_source_inside_composite() {
    struct Reverse;

    impl SecretDecryptor for Reverse {
        fn decrypt(&self, ciphertext: &str) -> Result<String> {
            Ok(ciphertext.chars().rev().collect())
        }
    }

    let vault = Arc::new(KeyValueStore::new("vault", 5));
    vault.put("db.password", "ENC(2retnuh)").unwrap();
    let defaults = Arc::new(KeyValueStore::new("defaults", 0));
    defaults.put("db.password", "changeme").unwrap();

    let composite = CompositeSource::builder()
        .with_source(defaults)
        .with_source(Arc::new(DecryptingSource::new(vault, Arc::new(Reverse))))
        .build();

    assert_eq!(composite.get_string("db.password").as_deref(), Some("hunter2"));
    assert_eq!(composite.snapshot()["db.password"].source, "vault");
}
