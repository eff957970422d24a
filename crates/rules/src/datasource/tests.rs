//! Tests for the datasource module.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::property::Property;
use crate::schema::{DegradeRule, FlowRule, RuleKind, RuleSet};

const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

struct Fixture {
    _dir: TempDir,
    layout: RuleLayout,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("create tempdir");
    let layout = ensure_layout(&dir.path().join("sentinel-rules")).expect("layout");
    Fixture { _dir: dir, layout }
}

fn bind(fx: &Fixture, kind: RuleKind) -> (Arc<FileWatcher>, WritableSource) {
    let property = Arc::new(Property::new(kind.to_string(), RuleSet::empty(kind)));
    bind_file(fx.layout.descriptor(kind).clone(), property, MAX_FILE_SIZE)
}

/// Counts notifications after the initial subscribe-time delivery.
fn publish_counter(watcher: &FileWatcher) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    watcher.property().add_subscriber("counter", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    count.store(0, Ordering::SeqCst);
    count
}

// ── layout ──────────────────────────────────────────────────

#[test]
fn ensure_layout_creates_root_and_empty_files() {
    let fx = fixture();
    assert!(fx.layout.root().is_dir());
    for descriptor in fx.layout.descriptors() {
        assert_eq!(fs::read(descriptor.path()).unwrap(), b"");
        assert_eq!(
            descriptor.path().file_name().unwrap().to_str().unwrap(),
            descriptor.kind().file_name()
        );
        assert_eq!(descriptor.codec().kind(), descriptor.kind());
    }
}

#[test]
fn ensure_layout_is_idempotent_and_never_truncates() {
    let fx = fixture();
    let flow = fx.layout.descriptor(RuleKind::Flow).path().to_path_buf();
    fs::write(&flow, r#"[{"resource":"keep","count":1}]"#).unwrap();

    let again = ensure_layout(fx.layout.root()).unwrap();
    assert_eq!(again.descriptor(RuleKind::Flow).path(), flow);
    assert_eq!(
        fs::read_to_string(&flow).unwrap(),
        r#"[{"resource":"keep","count":1}]"#
    );
}

#[test]
fn ensure_layout_fails_when_root_is_a_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("not-a-dir");
    fs::write(&root, "x").unwrap();
    let err = ensure_layout(&root).unwrap_err();
    assert!(matches!(err, RuleError::Layout { .. }));
}

#[test]
fn ensure_layout_fails_when_rule_path_is_a_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("system-rule.json")).unwrap();
    let err = ensure_layout(dir.path()).unwrap_err();
    match err {
        RuleError::Layout { path, .. } => assert!(path.ends_with("system-rule.json")),
        other => panic!("unexpected error: {other}"),
    }
}

// ── pull path ───────────────────────────────────────────────

#[test]
fn first_poll_of_empty_file_accepts_empty_set() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::System);
    let outcome = watcher.poll_once();
    assert_eq!(
        outcome,
        PollOutcome::Reloaded {
            rules: 0,
            notified: false
        }
    );
    assert!(watcher.property().current().is_empty());
    assert_eq!(watcher.accepted_fingerprint(), Some(Fingerprint::of(b"")));
    assert_eq!(watcher.poll_once(), PollOutcome::Unchanged);
}

#[test]
fn external_edit_is_published_once() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();
    let publishes = publish_counter(&watcher);

    fs::write(watcher.descriptor().path(), r#"[{"resource":"foo","count":10}]"#).unwrap();
    assert!(watcher.poll_once().is_reloaded());
    assert_eq!(
        *watcher.property().current(),
        RuleSet::Flow(vec![FlowRule::qps("foo", 10.0)])
    );

    let version = watcher.property().version();
    for _ in 0..3 {
        assert_eq!(watcher.poll_once(), PollOutcome::Unchanged);
    }
    assert_eq!(watcher.property().version(), version);
    assert_eq!(publishes.load(Ordering::SeqCst), 1);
}

#[test]
fn malformed_edit_keeps_previous_rules_and_retries() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::Flow);
    let path = watcher.descriptor().path().to_path_buf();
    fs::write(&path, r#"[{"resource":"foo","count":10}]"#).unwrap();
    watcher.poll_once();
    let before = watcher.property().current();
    let accepted = watcher.accepted_fingerprint();

    fs::write(&path, r#"[{"resource":"foo","#).unwrap();
    match watcher.poll_once() {
        PollOutcome::Rejected { error } => assert!(error.contains("flow")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(watcher.property().current(), before);
    assert_eq!(watcher.accepted_fingerprint(), accepted);

    // Same bad bytes are decoded again rather than remembered as seen.
    assert!(matches!(watcher.poll_once(), PollOutcome::Rejected { .. }));

    fs::write(&path, r#"[{"resource":"bar","count":3}]"#).unwrap();
    assert!(watcher.poll_once().is_reloaded());
    assert_eq!(
        watcher.property().current().as_flow().unwrap()[0].resource,
        "bar"
    );
}

#[test]
fn truncating_to_zero_bytes_clears_rules() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::Flow);
    let path = watcher.descriptor().path().to_path_buf();
    fs::write(&path, r#"[{"resource":"foo","count":10}]"#).unwrap();
    watcher.poll_once();

    fs::write(&path, "").unwrap();
    assert_eq!(
        watcher.poll_once(),
        PollOutcome::Reloaded {
            rules: 0,
            notified: true
        }
    );
    assert!(watcher.property().current().is_empty());
}

#[test]
fn missing_file_is_a_transient_read_failure() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::Authority);
    let path = watcher.descriptor().path().to_path_buf();
    fs::write(&path, r#"[{"resource":"api","limitApp":"a"}]"#).unwrap();
    watcher.poll_once();

    fs::remove_file(&path).unwrap();
    assert!(matches!(watcher.poll_once(), PollOutcome::ReadFailed { .. }));
    assert_eq!(watcher.property().current().len(), 1);

    fs::write(&path, "[]").unwrap();
    assert!(watcher.poll_once().is_reloaded());
    assert!(watcher.property().current().is_empty());
}

#[test]
fn oversized_file_is_refused() {
    let fx = fixture();
    let descriptor = fx.layout.descriptor(RuleKind::Flow).clone();
    let property = Arc::new(Property::new("flow", RuleSet::empty(RuleKind::Flow)));
    let (watcher, _) = bind_file(descriptor, property, 16);

    fs::write(watcher.descriptor().path(), r#"[{"resource":"foo","count":10}]"#).unwrap();
    match watcher.poll_once() {
        PollOutcome::ReadFailed { error } => assert!(error.contains("16 bytes")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

// ── push path ───────────────────────────────────────────────

#[test]
fn write_updates_memory_and_disk() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Degrade);
    watcher.poll_once();

    let rules = RuleSet::Degrade(vec![
        DegradeRule::exception_count("a", 5.0, 10),
        DegradeRule::exception_count("b", 1.0, 20),
    ]);
    writer.write(rules.clone()).unwrap();

    assert_eq!(*watcher.property().current(), rules);
    let on_disk = fs::read(writer.descriptor().path()).unwrap();
    assert_eq!(writer.descriptor().codec().decode(&on_disk).unwrap(), rules);
    assert!(!writer.descriptor().tmp_path().exists());
}

#[test]
fn write_is_not_reloaded_by_watcher() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();
    let publishes = publish_counter(&watcher);

    writer
        .write(RuleSet::Flow(vec![FlowRule::qps("pushed", 50.0)]))
        .unwrap();
    assert_eq!(publishes.load(Ordering::SeqCst), 1);

    for _ in 0..5 {
        assert_eq!(watcher.poll_once(), PollOutcome::Unchanged);
    }
    assert_eq!(publishes.load(Ordering::SeqCst), 1);
}

#[test]
fn write_with_unencodable_rules_changes_nothing() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Flow);
    let path = writer.descriptor().path().to_path_buf();
    fs::write(&path, r#"[{"resource":"foo","count":10}]"#).unwrap();
    watcher.poll_once();
    let version = watcher.property().version();
    let before_disk = fs::read(&path).unwrap();

    let err = writer
        .write(RuleSet::Flow(vec![FlowRule::qps("bad", f64::NAN)]))
        .unwrap_err();
    assert!(matches!(err, RuleError::Encode { kind: RuleKind::Flow, .. }));
    assert_eq!(watcher.property().version(), version);
    assert_eq!(watcher.property().current().as_flow().unwrap()[0].resource, "foo");
    assert_eq!(fs::read(&path).unwrap(), before_disk);
}

#[test]
fn write_rejects_rules_of_another_kind() {
    let fx = fixture();
    let (_, writer) = bind(&fx, RuleKind::System);
    let err = writer.write(RuleSet::empty(RuleKind::Flow)).unwrap_err();
    assert!(matches!(
        err,
        RuleError::KindMismatch {
            expected: RuleKind::System,
            actual: RuleKind::Flow
        }
    ));
}

#[test]
fn failed_write_leaves_property_untouched() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();

    // A directory where the temporary file should go makes the write fail.
    fs::create_dir(writer.descriptor().tmp_path()).unwrap();
    let err = writer
        .write(RuleSet::Flow(vec![FlowRule::qps("foo", 1.0)]))
        .unwrap_err();
    assert!(matches!(err, RuleError::Io(_)));
    assert!(watcher.property().current().is_empty());
    assert_eq!(watcher.property().version(), 0);
}

#[test]
fn external_edit_after_write_is_picked_up() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();
    writer
        .write(RuleSet::Flow(vec![FlowRule::qps("pushed", 1.0)]))
        .unwrap();

    fs::write(writer.descriptor().path(), r#"[{"resource":"edited","count":2}]"#).unwrap();
    assert!(watcher.poll_once().is_reloaded());
    assert_eq!(
        watcher.property().current().as_flow().unwrap()[0].resource,
        "edited"
    );
}

#[test]
fn writing_the_live_rules_leaves_the_file_alone() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();
    let rules = RuleSet::Flow(vec![FlowRule::qps("pushed", 3.0)]);
    writer.write(rules.clone()).unwrap();
    let version = watcher.property().version();

    // Not yet polled: memory still holds `rules`, so an equal write is a no-op.
    fs::write(writer.descriptor().path(), "[ ]").unwrap();
    writer.write(rules).unwrap();

    assert_eq!(watcher.property().version(), version);
    assert_eq!(fs::read_to_string(writer.descriptor().path()).unwrap(), "[ ]");
}

#[test]
fn cancelled_write_touches_nothing() {
    let fx = fixture();
    let (watcher, writer) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();

    let ticket = WriteTicket::new();
    assert!(ticket.cancel());
    let err = writer
        .write_ticketed(RuleSet::Flow(vec![FlowRule::qps("late", 1.0)]), &ticket)
        .unwrap_err();
    assert!(matches!(err, RuleError::Cancelled { kind: RuleKind::Flow }));
    assert!(watcher.property().current().is_empty());
    assert_eq!(fs::read(writer.descriptor().path()).unwrap(), b"");
    assert_eq!(watcher.poll_once(), PollOutcome::Unchanged);
}

#[test]
fn ticket_is_decided_once() {
    let committed = WriteTicket::new();
    assert!(committed.commit());
    assert!(!committed.cancel());
    assert!(committed.commit());

    let cancelled = WriteTicket::new();
    assert!(cancelled.cancel());
    assert!(!cancelled.commit());
    assert!(cancelled.cancel());
}

// ── background loop ─────────────────────────────────────────

#[tokio::test]
async fn stalled_tick_times_out_and_is_not_stacked() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();
    // Publishing a non-empty set stalls the blocking poll inside the slot.
    watcher.property().add_subscriber("slow-engine", |rules: &RuleSet| {
        if !rules.is_empty() {
            std::thread::sleep(Duration::from_millis(300));
        }
        Ok(())
    });
    fs::write(watcher.descriptor().path(), r#"[{"resource":"foo","count":10}]"#).unwrap();

    let short = Duration::from_millis(50);
    assert_eq!(watcher.tick(short).await, PollOutcome::TimedOut);
    assert_eq!(watcher.tick(short).await, PollOutcome::Busy);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match watcher.tick(Duration::from_secs(5)).await {
            PollOutcome::Busy => {
                assert!(tokio::time::Instant::now() < deadline, "stalled tick never finished");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            outcome => {
                assert_eq!(outcome, PollOutcome::Unchanged);
                break;
            }
        }
    }
    assert_eq!(watcher.property().current().len(), 1);
}

#[tokio::test]
async fn spawned_watcher_picks_up_edits_and_stops() {
    let fx = fixture();
    let (watcher, _) = bind(&fx, RuleKind::Flow);
    watcher.poll_once();

    let handle = watcher.spawn(Duration::from_millis(20), Duration::from_secs(5));
    assert_eq!(handle.kind(), RuleKind::Flow);
    fs::write(watcher.descriptor().path(), r#"[{"resource":"foo","count":10}]"#).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while watcher.property().current().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "edit was not picked up");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.stop().await;

    // After stopping, edits no longer reach memory.
    fs::write(watcher.descriptor().path(), "[]").unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(watcher.property().current().len(), 1);
}
