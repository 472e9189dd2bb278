// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Poison-tolerant lock helpers.
//!
//! Session, notification and timer state all sit behind `std::sync` locks.
//! A panic inside an observer callback or a toast surface must not take the
//! whole portal down with it, so every acquisition goes through these helpers:
//! a poisoned lock is logged and its guard recovered.
//!
//! ```no_run
//! use std::sync::RwLock;
//! use schoolhub::security::locks::{resilient_read, resilient_write};
//!
//! let slot = RwLock::new(Some("STU001".to_string()));
//! *resilient_write(&slot) = None;
//! assert!(resilient_read(&slot).is_none());
//! ```

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering the guard if the lock was poisoned.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "security::locks",
            event = "LOCK_POISONED_READ",
            "RwLock poisoned during read; recovering possibly stale state"
        );
        poisoned.into_inner()
    })
}

/// Acquire a write lock, recovering the guard if the lock was poisoned.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "security::locks",
            event = "LOCK_POISONED_WRITE",
            "RwLock poisoned during write; recovering possibly stale state"
        );
        poisoned.into_inner()
    })
}

/// Acquire a mutex, recovering the guard if the mutex was poisoned.
///
/// Used for the timer registry and the notification queue, where every
/// access mutates.
#[inline]
pub fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "security::locks",
            event = "LOCK_POISONED_MUTEX",
            "Mutex poisoned; recovering possibly stale state"
        );
        poisoned.into_inner()
    })
}
