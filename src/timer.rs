// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cancellable one-shot timers keyed by the entity that owns them.
//!
//! Each key has at most one pending timer. Scheduling over an existing key
//! aborts the old task, and cancelling aborts it outright. Aborting alone is
//! not enough on a multi-threaded runtime (the old task may already be past
//! its sleep), so every schedule hands out a [`TimerToken`] carrying a
//! generation number. When a task fires it must [`TimerRegistry::retire`] its
//! token first; only the current generation is accepted, and anything stale
//! is told to do nothing.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::security::locks::resilient_lock;

/// Identifies one scheduled firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerToken<K> {
    key: K,
    generation: u64,
}

impl<K> TimerToken<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Registry of pending timers.
pub struct TimerRegistry<K> {
    pending: Mutex<HashMap<K, Pending>>,
    generation: AtomicU64,
}

impl<K> TimerRegistry<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `task` after `delay`, replacing any timer pending for `key`.
    ///
    /// Returns `None` when called outside a tokio runtime. The previous timer
    /// for `key` is cancelled either way.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F) -> Option<TimerToken<K>>
    where
        F: FnOnce(TimerToken<K>) + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!("TIMER_SKIPPED | key={:?} reason=no_runtime", key);
                self.cancel(&key);
                return None;
            }
        };

        // Held across the spawn so a zero-delay task cannot retire before
        // its entry exists.
        let mut pending = resilient_lock(&self.pending);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = TimerToken {
            key: key.clone(),
            generation,
        };
        let fired = token.clone();

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task(fired);
        });

        if let Some(previous) = pending.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }

        Some(token)
    }

    /// Claim a fired timer. True only if `token` is still the current timer
    /// for its key, in which case the entry is removed.
    pub fn retire(&self, token: &TimerToken<K>) -> bool {
        let mut pending = resilient_lock(&self.pending);
        match pending.get(&token.key) {
            Some(entry) if entry.generation == token.generation => {
                pending.remove(&token.key);
                true
            }
            _ => {
                tracing::debug!(
                    "TIMER_STALE | key={:?} generation={}",
                    token.key,
                    token.generation
                );
                false
            }
        }
    }

    /// Cancel the timer pending for `key`. Returns whether one existed.
    pub fn cancel(&self, key: &K) -> bool {
        match resilient_lock(&self.pending).remove(key) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, entry) in resilient_lock(&self.pending).drain() {
            entry.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        resilient_lock(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        resilient_lock(&self.pending).len()
    }
}

impl<K> Default for TimerRegistry<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for TimerRegistry<K> {
    fn drop(&mut self) {
        let pending = match self.pending.get_mut() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, entry) in pending.drain() {
            entry.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_registry() -> (Arc<TimerRegistry<&'static str>>, Arc<AtomicUsize>) {
        (Arc::new(TimerRegistry::new()), Arc::new(AtomicUsize::new(0)))
    }

    fn fire_into(
        registry: &Arc<TimerRegistry<&'static str>>,
        count: &Arc<AtomicUsize>,
    ) -> impl FnOnce(TimerToken<&'static str>) + Send + 'static {
        let registry = Arc::downgrade(registry);
        let count = Arc::clone(count);
        move |token| {
            if let Some(registry) = registry.upgrade() {
                if registry.retire(&token) {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    #[test]
    fn test_schedule_without_runtime_is_skipped() {
        let registry: TimerRegistry<&str> = TimerRegistry::new();
        assert!(registry.schedule("k", Duration::from_secs(1), |_| {}).is_none());
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once() {
        let (registry, count) = counting_registry();
        registry.schedule("k", Duration::from_secs(5), fire_into(&registry, &count));
        assert!(registry.is_pending(&"k"));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!registry.is_pending(&"k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_previous() {
        let (registry, count) = counting_registry();
        registry.schedule("k", Duration::from_secs(5), fire_into(&registry, &count));
        tokio::time::sleep(Duration::from_secs(3)).await;
        registry.schedule("k", Duration::from_secs(5), fire_into(&registry, &count));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (registry, count) = counting_registry();
        registry.schedule("k", Duration::from_secs(1), fire_into(&registry, &count));
        assert!(registry.cancel(&"k"));
        assert!(!registry.cancel(&"k"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_token_is_refused() {
        let registry: TimerRegistry<&str> = TimerRegistry::new();
        let first = registry
            .schedule("k", Duration::from_secs(60), |_| {})
            .unwrap();
        let second = registry
            .schedule("k", Duration::from_secs(60), |_| {})
            .unwrap();

        assert!(second.generation() > first.generation());
        assert!(!registry.retire(&first));
        assert!(registry.retire(&second));
        assert!(!registry.retire(&second));
    }
}
