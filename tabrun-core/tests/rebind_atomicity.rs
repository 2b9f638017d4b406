//! Rebinding a live sink while records are being emitted.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tabrun_core::logging::{build_subscriber, LoggingConfig, SinkConfig, SinkFormat, SinkRotation};
use tabrun_core::PathAllocator;
use tempfile::TempDir;

fn records(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn simple_file_config(path: &Path) -> LoggingConfig {
    LoggingConfig {
        sinks: vec![SinkConfig::file("file", path).with_format(SinkFormat::Simple)],
    }
}

#[test]
fn rotated_sink_run_log_is_the_recorded_file() {
    let dir = TempDir::new().unwrap();
    let mut sink = SinkConfig::file("file", &dir.path().join("process.log"))
        .with_format(SinkFormat::Simple);
    sink.rotation = SinkRotation::Daily;
    let (subscriber, registry) = build_subscriber(&LoggingConfig { sinks: vec![sink] }).unwrap();
    let ctx = PathAllocator::new()
        .allocate_run(&dir.path().join("runs"), "rf")
        .unwrap();

    let ctx = tracing::subscriber::with_default(subscriber, || {
        let ctx = ctx.bind_log_sink(&registry, "file", "run.log").unwrap();
        tracing::info!("after");
        ctx
    });

    let log_file = ctx.log_file.clone().unwrap();
    assert_eq!(log_file, ctx.log_dir.join("run.log"));
    assert!(records(&log_file).iter().any(|r| r.contains("after")));
}

#[test]
fn records_before_and_after_rebind_land_on_their_side() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("process.log");
    let (subscriber, registry) = build_subscriber(&simple_file_config(&old)).unwrap();
    let ctx = PathAllocator::new()
        .allocate_run(&dir.path().join("runs"), "rf")
        .unwrap();

    let ctx = tracing::subscriber::with_default(subscriber, || {
        for i in 0..50 {
            tracing::info!("pre-{i}");
        }
        let ctx = ctx.bind_log_sink(&registry, "file", "run.log").unwrap();
        for i in 0..50 {
            tracing::info!("post-{i}");
        }
        ctx
    });

    let old_records = records(&old);
    let new_records = records(ctx.log_file.as_ref().unwrap());

    assert_eq!(
        old_records.iter().filter(|r| r.contains("pre-")).count(),
        50
    );
    assert!(old_records.iter().all(|r| !r.contains("post-")));
    assert_eq!(
        new_records.iter().filter(|r| r.contains("post-")).count(),
        50
    );
    assert!(new_records.iter().all(|r| !r.contains("pre-")));
}

#[test]
fn concurrent_emitters_lose_and_duplicate_nothing() {
    let dir = TempDir::new().unwrap();
    let old = dir.path().join("process.log");
    let new = dir.path().join("logs").join("run.log");
    let (subscriber, registry) = build_subscriber(&simple_file_config(&old)).unwrap();
    let dispatch = tracing::Dispatch::new(subscriber);

    let stop = Arc::new(AtomicBool::new(false));
    let emitters: Vec<_> = (0..4)
        .map(|worker| {
            let dispatch = dispatch.clone();
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    let mut sent = 0usize;
                    while !stop.load(Ordering::SeqCst) || sent < 200 {
                        tracing::info!("record w{worker}-{sent}");
                        sent += 1;
                    }
                    sent
                })
            })
        })
        .collect();

    std::thread::sleep(std::time::Duration::from_millis(5));
    tracing::dispatcher::with_default(&dispatch, || {
        registry.rebind_file_target("file", &new).unwrap();
    });
    stop.store(true, Ordering::SeqCst);

    let sent: Vec<usize> = emitters.into_iter().map(|h| h.join().unwrap()).collect();
    registry.flush_all();

    let mut seen = HashSet::new();
    for line in records(&old).into_iter().chain(records(&new)) {
        if let Some(id) = line.strip_prefix("INFO: record ") {
            assert!(seen.insert(id.to_string()), "duplicated record {id}");
        }
    }
    let expected: usize = sent.iter().sum();
    assert_eq!(seen.len(), expected);
}

#[test]
fn rebinding_into_two_runs_in_sequence() {
    let dir = TempDir::new().unwrap();
    let (subscriber, registry) =
        build_subscriber(&simple_file_config(&dir.path().join("p.log"))).unwrap();
    let allocator = PathAllocator::new();
    let root = dir.path().join("runs");

    tracing::subscriber::with_default(subscriber, || {
        let first = allocator
            .allocate_run(&root, "")
            .unwrap()
            .bind_log_sink(&registry, "file", "run.log")
            .unwrap();
        tracing::info!("first run");

        let second = allocator
            .allocate_run(&root, "second")
            .unwrap()
            .bind_log_sink(&registry, "file", "run.log")
            .unwrap();
        tracing::info!("second run");

        let first_log = records(first.log_file.as_ref().unwrap());
        let second_log = records(second.log_file.as_ref().unwrap());
        assert!(first_log.iter().any(|r| r.contains("first run")));
        assert!(!first_log.iter().any(|r| r.contains("second run")));
        assert!(second_log.iter().any(|r| r.contains("second run")));
    });
}
