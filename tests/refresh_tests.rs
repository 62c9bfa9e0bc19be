// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for refresh cycles and change notification.

mod common;

use common::MockConfigSource;
use dynacfg::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn provider_over(sources: Vec<Arc<MockConfigSource>>) -> DynamicConfigProvider {
    let mut builder = DynamicConfigProvider::builder();
    for source in sources {
        builder = builder.with_source(source);
    }
    builder.build().unwrap()
}

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_refresh_without_changes_produces_no_events() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("pool.size", "10"));
    let provider = provider_over(vec![source.clone()]);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    provider.add_global_listener(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(provider.refresh().unwrap().is_empty());
    assert!(provider.refresh().unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(source.refresh_count(), 2);
}

#[test]
fn test_update_add_and_remove_are_reported_once() {
    let source = Arc::new(
        MockConfigSource::new("app", 1)
            .with_value("pool.size", "10")
            .with_value("legacy.flag", "on"),
    );
    let provider = provider_over(vec![source.clone()]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    provider.add_global_listener(move |event| {
        seen_clone
            .lock()
            .unwrap()
            .push((event.key().to_string(), event.change_type()));
        Ok(())
    });

    source.stage("pool.size", "20");
    source.stage("cache.ttl", "60");
    source.stage_removal("legacy.flag");

    let events = provider.refresh().unwrap();
    assert_eq!(events.len(), 3);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("cache.ttl".to_string(), ChangeType::Added),
            ("legacy.flag".to_string(), ChangeType::Removed),
            ("pool.size".to_string(), ChangeType::Updated),
        ]
    );

    let update = events.iter().find(|e| e.key() == "pool.size").unwrap();
    assert_eq!(update.old_value(), Some("10"));
    assert_eq!(update.new_value(), Some("20"));
    assert_eq!(update.source(), "app");

    let removal = events.iter().find(|e| e.key() == "legacy.flag").unwrap();
    assert_eq!(removal.old_value(), Some("on"));
    assert_eq!(removal.new_value(), None);

    // Nothing further changed
    assert!(provider.refresh().unwrap().is_empty());
}

#[test]
fn test_key_listener_only_sees_its_key() {
    let source = Arc::new(
        MockConfigSource::new("app", 1)
            .with_value("pool.size", "10")
            .with_value("cache.ttl", "30"),
    );
    let provider = provider_over(vec![source.clone()]);

    let values = Arc::new(Mutex::new(Vec::new()));
    let values_clone = Arc::clone(&values);
    let handle = provider.add_listener("pool.size", move |event| {
        values_clone
            .lock()
            .unwrap()
            .push(event.new_value().map(str::to_string));
        Ok(())
    });

    source.stage("pool.size", "20");
    source.stage("cache.ttl", "60");
    provider.refresh().unwrap();
    assert_eq!(*values.lock().unwrap(), vec![Some("20".to_string())]);

    assert!(provider.remove_listener(handle));
    assert!(!provider.remove_listener(handle));

    source.stage("pool.size", "30");
    provider.refresh().unwrap();
    assert_eq!(values.lock().unwrap().len(), 1);
}

#[test]
fn test_shadowed_change_is_not_reported() {
    let high = Arc::new(MockConfigSource::new("high", 2).with_value("k", "top"));
    let low = Arc::new(MockConfigSource::new("low", 1).with_value("k", "bottom"));
    let provider = provider_over(vec![high.clone(), low.clone()]);

    low.stage("k", "bottom-2");
    assert!(provider.refresh().unwrap().is_empty());
    assert_eq!(provider.get_string("k").as_deref(), Some("top"));

    // Once the higher source drops the key, the lower value surfaces
    high.stage_removal("k");
    let events = provider.refresh().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].change_type(), ChangeType::Updated);
    assert_eq!(events[0].old_value(), Some("top"));
    assert_eq!(events[0].new_value(), Some("bottom-2"));
    assert_eq!(events[0].source(), "low");
}

#[test]
fn test_partial_failure_keeps_stale_values_and_dispatches() {
    let healthy = Arc::new(MockConfigSource::new("healthy", 2).with_value("a", "1"));
    let broken = Arc::new(MockConfigSource::new("broken", 1).with_value("b", "1"));
    let provider = provider_over(vec![healthy.clone(), broken.clone()]);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    provider.add_global_listener(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    healthy.stage("a", "2");
    broken.stage("b", "2");
    broken.set_failing(true);

    match provider.refresh() {
        Err(ConfigError::RefreshFailed { failed_sources, .. }) => {
            assert_eq!(failed_sources, vec!["broken".to_string()]);
        }
        other => panic!("expected RefreshFailed, got {:?}", other),
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.get_string("a").as_deref(), Some("2"));
    assert_eq!(provider.get_string("b").as_deref(), Some("1"));

    // The outage ends and the staged value comes through
    broken.set_failing(false);
    let events = provider.refresh().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key(), "b");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failing_listener_does_not_block_others() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "1"));
    let provider = provider_over(vec![source.clone()]);

    let calls = Arc::new(AtomicUsize::new(0));
    provider.add_listener("k", |_| Err("listener rejected the change".into()));
    provider.add_listener("k", |_| panic!("listener blew up"));
    let calls_clone = Arc::clone(&calls);
    provider.add_global_listener(move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    source.stage("k", "2");
    let events = provider.refresh().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.get_string("k").as_deref(), Some("2"));

    // The provider keeps working after a listener panic
    source.stage("k", "3");
    assert_eq!(provider.refresh().unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_listener_can_read_new_values() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "1"));
    let provider = Arc::new(provider_over(vec![source.clone()]));

    let observed = Arc::new(Mutex::new(None));
    let observed_clone = Arc::clone(&observed);
    let reader = Arc::downgrade(&provider);
    provider.add_listener("k", move |_| {
        if let Some(provider) = reader.upgrade() {
            *observed_clone.lock().unwrap() = provider.get_string("k");
        }
        Ok(())
    });

    source.stage("k", "2");
    provider.refresh().unwrap();
    assert_eq!(observed.lock().unwrap().as_deref(), Some("2"));
}

#[test]
#[cfg(feature = "yaml")]
fn test_yaml_file_change_is_picked_up() {
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "pool:\n  size: 10").unwrap();

    let provider = DynamicConfigProvider::builder()
        .with_yaml_file(file.path())
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(provider.get_i32("pool.size"), Some(10));

    std::fs::write(file.path(), "pool:\n  size: 25\n  name: primary\n").unwrap();
    let mut events = provider.refresh().unwrap();
    events.sort_by(|a, b| a.key().cmp(b.key()));

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].key(), "pool.name");
    assert_eq!(events[0].change_type(), ChangeType::Added);
    assert_eq!(events[1].key(), "pool.size");
    assert_eq!(events[1].change_type(), ChangeType::Updated);
    assert_eq!(events[1].source(), "yaml-file");
    assert_eq!(provider.get_i32("pool.size"), Some(25));

    // A broken file keeps the last good values
    std::fs::write(file.path(), "pool: [unclosed\n").unwrap();
    assert!(provider.refresh().is_err());
    assert_eq!(provider.get_i32("pool.size"), Some(25));
}

#[test]
fn test_auto_refresh_delivers_changes() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "1"));
    let provider = provider_over(vec![source.clone()]);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    provider.add_listener("k", move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    provider
        .enable_auto_refresh(Duration::from_millis(20))
        .unwrap();
    assert!(provider.is_auto_refresh_enabled());

    source.stage("k", "2");
    assert!(wait_until(Duration::from_secs(5), || {
        calls.load(Ordering::SeqCst) == 1
    }));
    assert_eq!(provider.get_string("k").as_deref(), Some("2"));

    assert!(provider.disable_auto_refresh());
    assert!(!provider.is_auto_refresh_enabled());
    assert!(!provider.disable_auto_refresh());

    let refreshes = source.refresh_count();
    source.stage("k", "3");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(source.refresh_count(), refreshes);
    assert_eq!(provider.get_string("k").as_deref(), Some("2"));
}

#[test]
fn test_auto_refresh_rejects_zero_interval() {
    let provider = provider_over(vec![]);
    assert!(matches!(
        provider.enable_auto_refresh(Duration::ZERO),
        Err(ConfigError::InvalidArgument { .. })
    ));
    assert!(!provider.is_auto_refresh_enabled());
}

#[test]
fn test_auto_refresh_survives_failing_source() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "1"));
    source.set_failing(true);
    let provider = provider_over(vec![source.clone()]);

    provider
        .enable_auto_refresh(Duration::from_millis(10))
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || source.refresh_count() >= 3));
    assert!(provider.is_auto_refresh_enabled());

    source.stage("k", "2");
    source.set_failing(false);
    assert!(wait_until(Duration::from_secs(5), || {
        provider.get_string("k").as_deref() == Some("2")
    }));
    provider.disable_auto_refresh();
}

#[test]
fn test_listener_refreshing_its_provider_does_not_hang() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "1"));
    let provider = Arc::new(provider_over(vec![source.clone()]));

    let nested = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&nested);
    let reader = Arc::downgrade(&provider);
    provider.add_global_listener(move |_| {
        if let Some(provider) = reader.upgrade() {
            sink.lock().unwrap().push(provider.refresh().map(|events| events.len()));
        }
        Ok(())
    });

    source.stage("k", "2");
    let (done, finished) = std::sync::mpsc::channel();
    let worker = Arc::clone(&provider);
    std::thread::spawn(move || {
        let _ = done.send(worker.refresh().map(|events| events.len()));
    });

    let outer = finished
        .recv_timeout(Duration::from_secs(5))
        .expect("refresh did not return");
    assert_eq!(outer.unwrap(), 1);

    let nested = nested.lock().unwrap();
    assert_eq!(nested.len(), 1);
    assert!(matches!(nested[0], Err(ConfigError::InvalidArgument { .. })));

    // The provider is still usable afterwards.
    assert!(provider.refresh().unwrap().is_empty());
}

#[test]
fn test_listener_refreshing_on_scheduler_thread_keeps_auto_refresh_alive() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "1"));
    let provider = Arc::new(provider_over(vec![source.clone()]));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let reader = Arc::downgrade(&provider);
    provider.add_listener("k", move |event| {
        sink.lock().unwrap().push(event.new_value().map(str::to_string));
        if let Some(provider) = reader.upgrade() {
            let _ = ConfigSource::refresh(provider.as_ref());
        }
        Ok(())
    });

    provider
        .enable_auto_refresh(Duration::from_millis(10))
        .unwrap();
    source.stage("k", "2");
    assert!(wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 1));

    source.stage("k", "3");
    assert!(wait_until(Duration::from_secs(5), || seen.lock().unwrap().len() == 2));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("2".to_string()), Some("3".to_string())]
    );

    let (done, finished) = std::sync::mpsc::channel();
    let worker = Arc::clone(&provider);
    std::thread::spawn(move || {
        let _ = done.send(worker.disable_auto_refresh());
    });
    assert!(finished.recv_timeout(Duration::from_secs(5)).unwrap());
}

#[test]
fn test_refresh_cycles_never_overlap() {
    let source = Arc::new(MockConfigSource::new("app", 1).with_value("k", "0"));
    source.set_refresh_delay(Duration::from_millis(30));
    let provider = Arc::new(provider_over(vec![source.clone()]));

    let in_cycle = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (active, highest) = (Arc::clone(&in_cycle), Arc::clone(&peak));
    provider.add_global_listener(move |_| {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        highest.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    });

    provider
        .enable_auto_refresh(Duration::from_millis(5))
        .unwrap();

    let workers: Vec<_> = (0..3)
        .map(|t| {
            let provider = Arc::clone(&provider);
            let source = Arc::clone(&source);
            std::thread::spawn(move || {
                for i in 0..3 {
                    source.stage("k", format!("{}-{}", t, i));
                    provider.refresh().unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    provider.disable_auto_refresh();

    assert!(source.refresh_count() >= 9);
    assert_eq!(source.peak_concurrent_refreshes(), 1);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}
