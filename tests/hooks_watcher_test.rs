//! End-to-end delivery through the public API: producer writes, watcher
//! dispatches.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hookbridge::{
    EventKind, HookError, HookEvent, HooksWatcher, SourceKind, WatcherConfig, write_event,
};
use serde_json::json;
use tempfile::TempDir;

const POLL: Duration = Duration::from_millis(20);

fn watcher_in(base: &TempDir, session_id: &str, source: SourceKind) -> HooksWatcher {
    HooksWatcher::builder(session_id)
        .base_dir(base.path())
        .poll_interval(POLL)
        .rescan_interval(Duration::from_millis(200))
        .source(source)
        .build()
        .unwrap()
}

fn recorder(watcher: &HooksWatcher) -> Arc<Mutex<Vec<HookEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    watcher.on_event(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

/// Poll until `done` holds or the deadline passes.
async fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..150 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    done()
}

fn remaining_json_files(watcher: &HooksWatcher) -> usize {
    fs::read_dir(watcher.hooks_dir())
        .unwrap()
        .flatten()
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count()
}

#[tokio::test]
async fn test_default_base_dir_round_trip() {
    // Unique id keeps parallel runs apart under the shared default base.
    let session_id = format!("it-{}-{}", std::process::id(), chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));
    let watcher = HooksWatcher::new(WatcherConfig::new(&session_id)).unwrap();
    assert_eq!(
        watcher.hooks_dir(),
        std::path::absolute(hookbridge::hooks::default_base_dir().join(&session_id)).unwrap()
    );

    let seen = recorder(&watcher);
    watcher.start().unwrap();

    write_event(
        watcher.hooks_dir(),
        HookEvent::new(EventKind::SessionStart).with_session(&session_id),
    )
    .unwrap();
    write_event(
        watcher.hooks_dir(),
        HookEvent::new(EventKind::PromptSubmit).with_data("prompt", "hello"),
    )
    .unwrap();
    write_event(
        watcher.hooks_dir(),
        HookEvent::new(EventKind::ToolComplete)
            .with_data("tool", "read")
            .with_data("exit_code", 0),
    )
    .unwrap();

    assert!(wait_until(|| seen.lock().unwrap().len() >= 3).await);

    {
        let seen = seen.lock().unwrap();
        let kinds: Vec<_> = seen.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::SessionStart,
                EventKind::PromptSubmit,
                EventKind::ToolComplete
            ]
        );
        assert!(seen.iter().all(|e| e.session_id == session_id));
        assert_eq!(seen[1].data["prompt"], "hello");
        assert_eq!(seen[2].data["tool"], "read");
        assert_eq!(seen[2].data["exit_code"], 0);
    }
    assert_eq!(remaining_json_files(&watcher), 0);

    watcher.stop();
    watcher.cleanup().unwrap();
    assert!(!watcher.hooks_dir().exists());
}

#[tokio::test]
async fn test_each_event_delivered_exactly_once() {
    let base = TempDir::new().unwrap();
    let watcher = watcher_in(&base, "burst", SourceKind::Poll);
    let seen = recorder(&watcher);
    watcher.start().unwrap();

    const N: usize = 50;
    let dir = watcher.hooks_dir().to_path_buf();
    let writer = tokio::task::spawn_blocking(move || {
        for i in 0..N {
            write_event(&dir, HookEvent::new(EventKind::Heartbeat).with_data("seq", i)).unwrap();
        }
    });
    writer.await.unwrap();

    assert!(wait_until(|| seen.lock().unwrap().len() >= N).await);
    // A few more passes must not redeliver anything.
    tokio::time::sleep(POLL * 5).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), N);
    let seqs: Vec<u64> = seen.iter().map(|e| e.data["seq"].as_u64().unwrap()).collect();
    assert_eq!(seqs, (0..N as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_only_json_files_are_consumed() {
    let base = TempDir::new().unwrap();
    let watcher = watcher_in(&base, "filter", SourceKind::Poll);
    let seen = recorder(&watcher);

    let dir = watcher.hooks_dir();
    fs::write(dir.join("notes.txt"), "not an event").unwrap();
    fs::write(dir.join(".partial.tmp"), r#"{"type":"heartbeat"}"#).unwrap();
    fs::write(dir.join("broken.json"), "{").unwrap();
    write_event(dir, HookEvent::new(EventKind::Error).with_data("message", "boom")).unwrap();

    watcher.start().unwrap();
    assert!(wait_until(|| seen.lock().unwrap().len() == 1 && !dir.join("broken.json").exists()).await);
    tokio::time::sleep(POLL * 3).await;

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(seen.lock().unwrap()[0].data["message"], "boom");
    assert!(dir.join("notes.txt").exists());
    assert!(dir.join(".partial.tmp").exists());
    assert!(dir.join("broken.json.invalid").exists());
    assert_eq!(remaining_json_files(&watcher), 0);
}

#[tokio::test]
async fn test_fan_out_and_panic_isolation() {
    let base = TempDir::new().unwrap();
    let watcher = watcher_in(&base, "fanout", SourceKind::Poll);

    let order = Arc::new(Mutex::new(Vec::new()));
    for id in 0..3 {
        let order = Arc::clone(&order);
        watcher.on_event(move |event| {
            order.lock().unwrap().push(id);
            if id == 1 && event.kind == EventKind::Error {
                panic!("handler {id} failed");
            }
        });
    }

    watcher.start().unwrap();
    write_event(watcher.hooks_dir(), HookEvent::new(EventKind::Error)).unwrap();
    write_event(watcher.hooks_dir(), HookEvent::new(EventKind::Heartbeat)).unwrap();

    assert!(wait_until(|| order.lock().unwrap().len() >= 6).await);
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 0, 1, 2]);
    assert!(watcher.is_running());
}

#[tokio::test]
async fn test_native_and_poll_deliver_the_same_events() {
    let base = TempDir::new().unwrap();

    let mut received = Vec::new();
    for (session, source) in [("native", SourceKind::Native), ("poll", SourceKind::Poll)] {
        let watcher = watcher_in(&base, session, source);
        let seen = recorder(&watcher);
        watcher.start().unwrap();

        for kind in [EventKind::ToolStart, EventKind::ToolComplete, EventKind::SessionStop] {
            write_event(watcher.hooks_dir(), HookEvent::new(kind).with_data("tool", "edit")).unwrap();
        }

        assert!(wait_until(|| seen.lock().unwrap().len() >= 3).await, "{session} stalled");
        watcher.stop();

        let kinds: Vec<_> = seen.lock().unwrap().iter().map(|e| e.kind.clone()).collect();
        received.push(kinds);
    }

    assert_eq!(received[0], received[1]);
}

#[tokio::test]
async fn test_events_written_before_start_are_delivered() {
    let base = TempDir::new().unwrap();
    let watcher = watcher_in(&base, "early", SourceKind::Auto);
    write_event(watcher.hooks_dir(), HookEvent::new(EventKind::SessionStart)).unwrap();

    let mut events = watcher.subscribe();
    watcher.start().unwrap();

    let event = tokio::time::timeout(Duration::from_secs(3), events.recv())
        .await
        .expect("no event within timeout")
        .unwrap();
    assert_eq!(event.kind, EventKind::SessionStart);
    assert_eq!(event.session_id, "early");
}

#[tokio::test]
async fn test_unknown_kinds_are_forwarded() {
    let base = TempDir::new().unwrap();
    let watcher = watcher_in(&base, "future", SourceKind::Poll);
    let seen = recorder(&watcher);
    watcher.start().unwrap();

    fs::write(
        watcher.hooks_dir().join("1_subagent_stop.json"),
        json!({"type": "subagent_stop", "data": {"agent": "explorer"}}).to_string(),
    )
    .unwrap();

    assert!(wait_until(|| !seen.lock().unwrap().is_empty()).await);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].kind, EventKind::from("subagent_stop"));
    assert!(!seen[0].kind.is_known());
    assert!(seen[0].has_timestamp());
}

#[tokio::test]
async fn test_stop_halts_delivery_and_cleanup_removes_directory() {
    let base = TempDir::new().unwrap();
    let watcher = watcher_in(&base, "halt", SourceKind::Poll);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    watcher.on_event(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    watcher.start().unwrap();
    write_event(watcher.hooks_dir(), HookEvent::new(EventKind::Heartbeat)).unwrap();
    assert!(wait_until(|| count.load(Ordering::SeqCst) == 1).await);

    watcher.stop();
    assert!(!watcher.is_running());
    tokio::time::sleep(POLL * 3).await;

    write_event(watcher.hooks_dir(), HookEvent::new(EventKind::Heartbeat)).unwrap();
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(remaining_json_files(&watcher), 1);

    watcher.cleanup().unwrap();
    assert!(!watcher.hooks_dir().exists());
    // Cleaning up twice is fine.
    watcher.cleanup().unwrap();

    let err = write_event(watcher.hooks_dir(), HookEvent::new(EventKind::Heartbeat)).unwrap_err();
    assert!(matches!(err, HookError::Io { .. }));
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let base = TempDir::new().unwrap();
    let first = watcher_in(&base, "a", SourceKind::Poll);
    let second = watcher_in(&base, "b", SourceKind::Poll);
    let seen_a = recorder(&first);
    let seen_b = recorder(&second);
    first.start().unwrap();
    second.start().unwrap();

    write_event(first.hooks_dir(), HookEvent::new(EventKind::PromptSubmit)).unwrap();
    for _ in 0..2 {
        write_event(second.hooks_dir(), HookEvent::new(EventKind::Heartbeat)).unwrap();
    }

    assert!(wait_until(|| seen_a.lock().unwrap().len() == 1 && seen_b.lock().unwrap().len() == 2).await);
    let sessions: HashSet<_> = seen_b.lock().unwrap().iter().map(|e| e.session_id.clone()).collect();
    assert_eq!(sessions, HashSet::from(["b".to_string()]));
    assert_eq!(seen_a.lock().unwrap()[0].session_id, "a");
}
