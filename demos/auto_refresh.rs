// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automatic refresh example.
//!
//! This example demonstrates:
//! - Layering defaults, a YAML file and environment variables
//! - Validating the configuration before the application starts
//! - Refreshing in the background and reacting to changes
//! - Rolling out a feature flag driven by configuration
//!
//! To run this example:
//! ```bash
//! cargo run --example auto_refresh
//! ```

#[cfg(feature = "yaml")]
use dynacfg::prelude::*;
#[cfg(feature = "yaml")]
use std::collections::HashMap;
#[cfg(feature = "yaml")]
use std::sync::Arc;
#[cfg(feature = "yaml")]
use std::thread;
#[cfg(feature = "yaml")]
use std::time::Duration;

#[cfg(feature = "yaml")]
fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    println!("=== dynacfg: Automatic Refresh Example ===\n");

    let temp_file = tempfile::NamedTempFile::new()?;
    std::fs::write(
        temp_file.path(),
        "pool:\n  size: 10\nfeatures:\n  checkout:\n    percentage: 0\n",
    )?;

    let provider = Arc::new(
        DynamicConfigProvider::builder()
            .with_values(
                "defaults",
                0,
                HashMap::from([
                    ("pool.size".to_string(), "5".to_string()),
                    ("log.level".to_string(), "info".to_string()),
                ]),
            )?
            .with_yaml_file(temp_file.path())?
            .build()?,
    );

    provider.validate(
        &RuleValidator::builder()
            .required("pool.size")
            .range("pool.size", 1, 100)
            .one_of("log.level", ["debug", "info", "warn", "error"])
            .build(),
    )?;

    let flags = Arc::new(FeatureFlagEngine::strict());
    flags.load_from_source(provider.as_ref(), "features");

    provider.add_listener("pool.size", |event| {
        println!(
            "Pool size {:?} -> {:?} ({})",
            event.old_value(),
            event.new_value(),
            event.source()
        );
        Ok(())
    });

    let engine = Arc::clone(&flags);
    let reader = Arc::downgrade(&provider);
    provider.add_global_listener(move |event| {
        if event.key().starts_with("features.") {
            if let Some(provider) = reader.upgrade() {
                let report = engine.load_from_source(provider.as_ref(), "features");
                println!("Reloaded flags: {:?}", report.loaded);
            }
        }
        Ok(())
    });

    provider.enable_auto_refresh(Duration::from_millis(200))?;

    let users: Vec<_> = (1..=10)
        .map(|i| EvaluationContext::for_subject(format!("user-{}", i)))
        .collect();
    let report = |label: &str| {
        let enabled = users
            .iter()
            .filter(|ctx| flags.is_enabled_for("checkout", ctx))
            .count();
        println!("{}: checkout enabled for {}/{} users", label, enabled, users.len());
    };
    report("Initial");

    println!("\n=== Updating the configuration file ===");
    std::fs::write(
        temp_file.path(),
        "pool:\n  size: 25\nfeatures:\n  checkout:\n    percentage: 50\n",
    )?;
    thread::sleep(Duration::from_secs(1));

    println!("Pool size is now {:?}", provider.get_i32("pool.size"));
    report("After refresh");

    provider.disable_auto_refresh();
    println!("\n=== Example Complete ===");
    Ok(())
}

#[cfg(not(feature = "yaml"))]
fn main() {
    println!("This example requires the 'yaml' feature.");
    println!("Run with: cargo run --example auto_refresh --features yaml");
}
