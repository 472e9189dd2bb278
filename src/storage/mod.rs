// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent key-value storage.
//!
//! Everything the portal remembers between runs goes through a synchronous
//! string-keyed store: the session record, the security log, the theme, the
//! notification sound, the first-visit flag and the seeded demo accounts. Values are plain strings,
//! usually JSON.
//!
//! Callers treat a failing store as missing data: errors are logged and the
//! operation resolves to a logged-out or empty state instead of bubbling up.

pub mod file;
pub mod memory;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Store keys.
pub mod keys {
    pub const SESSION: &str = "schoolHub_session";
    pub const SECURITY_LOG: &str = "schoolHub_security_logs";
    pub const THEME: &str = "theme";
    pub const FIRST_VISIT: &str = "hasVisited";
    pub const NOTIFICATION_SOUND: &str = "notificationSound";
    pub const DEMO_USERS: &str = "schoolHub_demo_users";
    pub const DEMO_INITIALIZED: &str = "schoolHub_demo_initialized";
}

/// A synchronous string-keyed store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Outcome of reading a JSON value from the store.
#[derive(Debug)]
pub enum Stored<T> {
    Missing,
    Corrupt(String),
    Present(T),
}

/// Read and decode a JSON value. Store errors count as `Missing`.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Stored<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Stored::Missing,
        Err(e) => {
            tracing::warn!("STORE_READ_FAILED | key={} error={:#}", key, e);
            return Stored::Missing;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Stored::Present(value),
        Err(e) => Stored::Corrupt(e.to_string()),
    }
}

/// Encode and write a JSON value, logging instead of failing.
pub fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::error!("STORE_ENCODE_FAILED | key={} error={}", key, e);
            return false;
        }
    };

    match store.set(key, &encoded) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("STORE_WRITE_FAILED | key={} error={:#}", key, e);
            false
        }
    }
}

/// Remove a key, logging instead of failing.
pub fn remove_quietly(store: &dyn KeyValueStore, key: &str) {
    if let Err(e) = store.remove(key) {
        tracing::warn!("STORE_REMOVE_FAILED | key={} error={:#}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_json_distinguishes_missing_and_corrupt() {
        let store = MemoryStore::new();
        assert!(matches!(read_json::<Vec<u32>>(&store, "k"), Stored::Missing));

        store.set("k", "{not json").unwrap();
        assert!(matches!(read_json::<Vec<u32>>(&store, "k"), Stored::Corrupt(_)));

        assert!(write_json(&store, "k", &vec![1u32, 2]));
        match read_json::<Vec<u32>>(&store, "k") {
            Stored::Present(v) => assert_eq!(v, vec![1, 2]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
