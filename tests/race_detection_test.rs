// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Race Detection Tests for schoolhub
//!
//! These tests hammer the shared managers from many tasks on a multi-threaded
//! runtime and then check that the invariants still hold. They are designed to
//! detect data races when run with ThreadSanitizer (TSAN).
//!
//! # Running with ThreadSanitizer
//!
//! ```bash
//! # On Linux with nightly Rust:
//! RUSTFLAGS="-Z sanitizer=thread" cargo +nightly test --target x86_64-unknown-linux-gnu --test race_detection_test
//! ```
//!
//! # Test Categories
//!
//! - Session activity under contention
//! - Logout racing activity
//! - Toast queue show/dismiss contention
//! - Security log concurrent appends

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use schoolhub::notifications::{MemorySurface, SurfaceEvent};
use schoolhub::security::{Account, Credentials, Principal, Role, SessionConfig, SessionManager};
use schoolhub::storage::{keys, KeyValueStore, MemoryStore};
use schoolhub::{
    ManualClock, NotificationKind, NotificationQueue, SecurityEventKind, SecurityLog, Session,
    SessionState,
};

// Test configuration
const CONCURRENCY_LEVEL: usize = 100;
const ITERATIONS_PER_TASK: usize = 50;
const TEST_TIMEOUT_SECS: u64 = 30;

fn logged_in_manager() -> (SessionManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(store.clone(), SessionConfig::default());
    let account = Account::new(Principal::new("STU002", "Emma Wilson", Role::Student), "student123");
    manager
        .login(&Credentials::new("STU002", "student123", Role::Student), &account)
        .expect("login succeeds");
    (manager, store)
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    let result = timeout(Duration::from_secs(TEST_TIMEOUT_SECS), async {
        for handle in handles {
            handle.await.expect("Task panicked");
        }
    })
    .await;

    assert!(result.is_ok(), "Test timed out");
}

// =============================================================================
// SESSION TESTS
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_concurrent_activity() {
    let (manager, store) = logged_in_manager();
    let mut handles = vec![];

    for i in 0..CONCURRENCY_LEVEL {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..ITERATIONS_PER_TASK {
                match i % 3 {
                    0 => {
                        manager.record_activity();
                    }
                    1 => {
                        let _ = manager.current();
                    }
                    _ => {
                        let _ = manager.state();
                    }
                }
            }
        }));
    }

    join_all(handles).await;

    let raw = store.get(keys::SESSION).unwrap().expect("session persisted");
    let record = Session::decode(&raw).unwrap();
    let timeout_ms = (manager.config().timeout_secs as i64) * 1000;
    assert_eq!(record.expires_at, record.last_activity + timeout_ms);
    assert_eq!(manager.current(), Some(record));
    assert_eq!(manager.state(), SessionState::Active);
    assert!(manager.timer_armed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_logout_racing_activity() {
    let (manager, store) = logged_in_manager();
    let mut handles = vec![];

    for i in 0..CONCURRENCY_LEVEL {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..ITERATIONS_PER_TASK {
                if i == CONCURRENCY_LEVEL / 2 && j == ITERATIONS_PER_TASK / 2 {
                    manager.logout();
                } else {
                    manager.record_activity();
                }
            }
        }));
    }

    join_all(handles).await;

    assert_eq!(manager.state(), SessionState::NoSession);
    assert!(!manager.timer_armed());
    assert!(store.get(keys::SESSION).unwrap().is_none());

    let logouts = manager
        .security_log()
        .read_all()
        .into_iter()
        .filter(|e| e.event == SecurityEventKind::Logout)
        .count();
    assert_eq!(logouts, 1);
}

// =============================================================================
// NOTIFICATION TESTS
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_notifications_concurrent_show_and_dismiss() {
    let surface = Arc::new(MemorySurface::new());
    let queue = NotificationQueue::new(surface.clone(), 5);
    let mut handles = vec![];

    for i in 0..CONCURRENCY_LEVEL {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..ITERATIONS_PER_TASK / 5 {
                let id = queue.show(format!("task {} #{}", i, j), NotificationKind::Info, None);
                if j % 2 == 0 {
                    queue.dismiss(id);
                }
                assert!(queue.len() <= 5);
            }
        }));
    }

    join_all(handles).await;
    queue.clear();

    let mut presented = 0;
    let mut retracted: HashMap<_, usize> = HashMap::new();
    for event in surface.events() {
        match event {
            SurfaceEvent::Presented(..) => presented += 1,
            SurfaceEvent::Retracted(id, _) => *retracted.entry(id).or_default() += 1,
        }
    }

    assert_eq!(presented, CONCURRENCY_LEVEL * (ITERATIONS_PER_TASK / 5));
    assert_eq!(retracted.len(), presented);
    assert!(retracted.values().all(|count| *count == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_surface_sees_present_before_retract() {
    let surface = Arc::new(MemorySurface::new());
    let queue = NotificationQueue::new(surface.clone(), 5);
    let mut handles = vec![];

    // Zero-length toasts make the timer race the present call.
    for i in 0..CONCURRENCY_LEVEL {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..ITERATIONS_PER_TASK / 5 {
                let duration = if j % 2 == 0 { Some(Duration::ZERO) } else { None };
                queue.show(format!("task {} #{}", i, j), NotificationKind::Info, duration);
            }
        }));
    }

    join_all(handles).await;
    queue.clear();

    let mut presented: HashMap<_, usize> = HashMap::new();
    let mut retracted: HashMap<_, usize> = HashMap::new();
    for event in surface.events() {
        match event {
            SurfaceEvent::Presented(id, _) => *presented.entry(id).or_default() += 1,
            SurfaceEvent::Retracted(id, _) => {
                assert!(
                    presented.contains_key(&id),
                    "{} retracted before it was presented",
                    id
                );
                *retracted.entry(id).or_default() += 1;
            }
        }
    }

    assert_eq!(presented.len(), CONCURRENCY_LEVEL * (ITERATIONS_PER_TASK / 5));
    assert!(presented.values().all(|count| *count == 1));
    assert!(retracted.values().all(|count| *count == 1));
    assert_eq!(retracted.len(), presented.len());
    assert!(queue.is_empty());
}

// =============================================================================
// SECURITY LOG TESTS
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_security_log_concurrent_records() {
    let log = SecurityLog::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::at_millis(0)),
        100,
    );
    let mut handles = vec![];

    for i in 0..CONCURRENCY_LEVEL {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                log.record(
                    SecurityEventKind::LoginFailed,
                    &format!("user{}", i),
                    Default::default(),
                );
            }
        }));
    }

    join_all(handles).await;

    assert_eq!(log.read_all().len(), 100);
}
