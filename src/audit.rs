// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Security event log.
//!
//! Every auth-relevant action (successful login, failed login, logout) leaves
//! an immutable entry in the key-value store. The log is a bounded ring
//! buffer: appending past capacity drops the oldest entries, so the newest
//! `capacity` entries always survive.
//!
//! Stored format (oldest first):
//! `[{"timestamp":"2024-01-15T10:23:45Z","event":"login_success","userId":"STU001",...}]`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::security::locks::resilient_lock;
use crate::storage::{self, keys, KeyValueStore, Stored};

/// Entries kept before the oldest are evicted.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    LoginSuccess,
    LoginFailed,
    Logout,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::Logout => "LOGOUT",
        }
    }
}

impl std::fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One security log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event: SecurityEventKind,
    /// Subject: the principal id, or the attempted login id for failures.
    pub user_id: String,
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl SecurityEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        event: SecurityEventKind,
        user_id: impl Into<String>,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp,
            event,
            user_id: user_id.into(),
            context,
        }
    }

    /// Format as a log line.
    pub fn to_log_line(&self) -> String {
        format!(
            "{} | {:>13} | user={}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.event.as_str(),
            self.user_id
        )
    }
}

/// Context fields stamped on every entry: who is running the portal and where.
pub fn default_context() -> Map<String, Value> {
    let mut context = Map::new();
    context.insert(
        "userAgent".to_string(),
        Value::from(format!("schoolhub/{}", env!("CARGO_PKG_VERSION"))),
    );
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    context.insert("host".to_string(), Value::from(host));
    context
}

/// Append-only bounded log persisted in the key-value store.
#[derive(Clone)]
pub struct SecurityLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    /// Serializes the read-modify-write of the stored array.
    write_lock: Arc<Mutex<()>>,
}

impl SecurityLog {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            store,
            clock,
            capacity: capacity.max(1),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add `entry` at the end, then drop from the front until within capacity.
    pub fn append(&self, entry: SecurityEvent) {
        let _guard = resilient_lock(&self.write_lock);

        let mut entries = self.load();
        tracing::info!("SECURITY_EVENT | {}", entry.to_log_line());
        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        storage::write_json(self.store.as_ref(), keys::SECURITY_LOG, &entries);
    }

    /// Build an entry stamped with the current time and append it.
    pub fn record(&self, event: SecurityEventKind, user_id: &str, context: Map<String, Value>) {
        self.append(SecurityEvent::new(self.clock.now(), event, user_id, context));
    }

    /// Full log, oldest first.
    pub fn read_all(&self) -> Vec<SecurityEvent> {
        self.load()
    }

    fn load(&self) -> Vec<SecurityEvent> {
        match storage::read_json(self.store.as_ref(), keys::SECURITY_LOG) {
            Stored::Present(entries) => entries,
            Stored::Missing => Vec::new(),
            Stored::Corrupt(detail) => {
                tracing::warn!("SECURITY_LOG_CORRUPT | treating as empty | error={}", detail);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;

    fn log_with_capacity(capacity: usize) -> (SecurityLog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let log = SecurityLog::new(
            store.clone(),
            Arc::new(ManualClock::at_millis(1_700_000_000_000)),
            capacity,
        );
        (log, store)
    }

    #[test]
    fn test_append_keeps_order() {
        let (log, _) = log_with_capacity(DEFAULT_LOG_CAPACITY);
        log.record(SecurityEventKind::LoginFailed, "STU001", Map::new());
        log.record(SecurityEventKind::LoginSuccess, "STU001", Map::new());
        log.record(SecurityEventKind::Logout, "STU001", Map::new());

        let kinds: Vec<_> = log.read_all().iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                SecurityEventKind::LoginFailed,
                SecurityEventKind::LoginSuccess,
                SecurityEventKind::Logout
            ]
        );
    }

    #[test]
    fn test_capacity_keeps_newest() {
        let (log, _) = log_with_capacity(DEFAULT_LOG_CAPACITY);
        for i in 0..150 {
            log.record(SecurityEventKind::LoginFailed, &format!("user{}", i), Map::new());
        }

        let entries = log.read_all();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries.first().unwrap().user_id, "user50");
        assert_eq!(entries.last().unwrap().user_id, "user149");
    }

    #[test]
    fn test_corrupt_log_is_replaced() {
        let (log, store) = log_with_capacity(10);
        store.set(keys::SECURITY_LOG, "{{{").unwrap();
        assert!(log.read_all().is_empty());

        log.record(SecurityEventKind::Logout, "TEACH001", Map::new());
        assert_eq!(log.read_all().len(), 1);
    }

    #[test]
    fn test_entry_json_shape() {
        let (log, store) = log_with_capacity(10);
        log.record(SecurityEventKind::LoginSuccess, "STU001", default_context());

        let raw = store.get(keys::SECURITY_LOG).unwrap().unwrap();
        let json: Value = serde_json::from_str(&raw).unwrap();
        let entry = &json[0];
        assert_eq!(entry["event"], "login_success");
        assert_eq!(entry["userId"], "STU001");
        assert!(entry["userAgent"].as_str().unwrap().starts_with("schoolhub/"));
        assert!(entry.get("host").is_some());
    }

    #[test]
    fn test_log_line_format() {
        let entry = SecurityEvent::new(
            DateTime::from_timestamp(0, 0).unwrap(),
            SecurityEventKind::Logout,
            "STU002",
            Map::new(),
        );
        assert_eq!(entry.to_log_line(), "1970-01-01 00:00:00 |        LOGOUT | user=STU002");
    }
}
