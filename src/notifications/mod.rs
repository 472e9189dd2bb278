// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Toast notification queue.
//!
//! A bounded, insertion-ordered set of transient messages. Each toast leaves
//! the live set exactly once: dismissed by the user, expired by its timer,
//! evicted to make room, or cleared. Whichever path wins cancels the others,
//! and the [`ToastSurface`] sees one `present` and one `retract` per id.

pub mod presets;
pub mod surface;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::security::locks::resilient_lock;
use crate::timer::{TimerRegistry, TimerToken};

pub use surface::{
    MemorySurface, NullSurface, RemovalReason, SurfaceEvent, TerminalSurface, ToastSurface,
};

/// Live toasts allowed at once.
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
    Default,
}

impl NotificationKind {
    /// How long a toast of this kind stays up when the caller gives no duration.
    pub fn default_duration(&self) -> Duration {
        match self {
            NotificationKind::Error => Duration::from_millis(5000),
            NotificationKind::Warning => Duration::from_millis(4500),
            NotificationKind::Success | NotificationKind::Info | NotificationKind::Default => {
                Duration::from_millis(4000)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
            NotificationKind::Default => "default",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique, increasing toast id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
    pub duration: Duration,
}

struct Shared {
    /// Held across every surface call so the surface sees changes in queue
    /// order. Lock order: surface_order, then live, then timers. Surfaces
    /// must not call back into the queue.
    surface_order: Mutex<()>,
    /// Live toasts, oldest first.
    live: Mutex<VecDeque<Notification>>,
    timers: TimerRegistry<NotificationId>,
    next_id: AtomicU64,
    capacity: usize,
    surface: Arc<dyn ToastSurface>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn take(live: &mut VecDeque<Notification>, id: NotificationId) -> Option<Notification> {
        let position = live.iter().position(|n| n.id == id)?;
        live.remove(position)
    }

    fn on_timer(&self, token: TimerToken<NotificationId>) {
        let _order = resilient_lock(&self.surface_order);
        let removed = {
            let mut live = resilient_lock(&self.live);
            if !self.timers.retire(&token) {
                return;
            }
            Self::take(&mut live, *token.key())
        };

        if let Some(notification) = removed {
            tracing::debug!("TOAST_EXPIRED | id={}", notification.id);
            self.surface.retract(&notification, RemovalReason::Expired);
        }
    }
}

/// Bounded toast queue. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct NotificationQueue {
    shared: Arc<Shared>,
}

impl NotificationQueue {
    pub fn new(surface: Arc<dyn ToastSurface>, capacity: usize) -> Self {
        Self::with_clock(surface, Arc::new(SystemClock), capacity)
    }

    pub fn with_clock(surface: Arc<dyn ToastSurface>, clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                surface_order: Mutex::new(()),
                live: Mutex::new(VecDeque::new()),
                timers: TimerRegistry::new(),
                next_id: AtomicU64::new(0),
                capacity: capacity.max(1),
                surface,
                clock,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Show a toast. `None` picks the kind's default duration.
    ///
    /// At capacity the oldest toast is evicted first. The id is returned
    /// immediately and the queue order is fixed by call order. The surface
    /// always sees `present` for a toast before any `retract` of it.
    pub fn show(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Option<Duration>,
    ) -> NotificationId {
        let shared = &self.shared;
        let id = NotificationId(shared.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let notification = Notification {
            id,
            message: message.into(),
            kind,
            created_at: shared.clock.now(),
            duration: duration.unwrap_or_else(|| kind.default_duration()),
        };

        let _order = resilient_lock(&shared.surface_order);
        let evicted = {
            let mut live = resilient_lock(&shared.live);
            let mut evicted = Vec::new();
            while live.len() >= shared.capacity {
                match live.pop_front() {
                    Some(oldest) => {
                        shared.timers.cancel(&oldest.id);
                        evicted.push(oldest);
                    }
                    None => break,
                }
            }
            live.push_back(notification.clone());
            // A timer that fires now waits on surface_order until present runs.
            self.arm(&notification);
            evicted
        };

        for oldest in &evicted {
            tracing::debug!("TOAST_EVICTED | id={}", oldest.id);
            shared.surface.retract(oldest, RemovalReason::Evicted);
        }

        tracing::debug!(
            "TOAST_SHOWN | id={} kind={} duration_ms={}",
            id,
            kind,
            notification.duration.as_millis()
        );
        shared.surface.present(&notification);

        id
    }

    fn arm(&self, notification: &Notification) {
        let weak = Arc::downgrade(&self.shared);
        self.shared
            .timers
            .schedule(notification.id, notification.duration, move |token| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer(token);
                }
            });
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, NotificationKind::Success, None)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, NotificationKind::Error, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, NotificationKind::Warning, None)
    }

    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.show(message, NotificationKind::Info, None)
    }

    /// Remove a toast. Absent ids are ignored and return `false`.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let _order = resilient_lock(&self.shared.surface_order);
        let removed = {
            let mut live = resilient_lock(&self.shared.live);
            let removed = Shared::take(&mut live, id);
            self.shared.timers.cancel(&id);
            removed
        };

        match removed {
            Some(notification) => {
                tracing::debug!("TOAST_DISMISSED | id={}", id);
                self.shared
                    .surface
                    .retract(&notification, RemovalReason::Dismissed);
                true
            }
            None => false,
        }
    }

    /// Dismiss every live toast.
    pub fn clear(&self) {
        let _order = resilient_lock(&self.shared.surface_order);
        let drained: Vec<Notification> = {
            let mut live = resilient_lock(&self.shared.live);
            self.shared.timers.cancel_all();
            live.drain(..).collect()
        };

        for notification in &drained {
            self.shared
                .surface
                .retract(notification, RemovalReason::Cleared);
        }
    }

    /// Live toasts, oldest first.
    pub fn live(&self) -> Vec<Notification> {
        resilient_lock(&self.shared.live).iter().cloned().collect()
    }

    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        resilient_lock(&self.shared.live)
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        resilient_lock(&self.shared.live).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (NotificationQueue, Arc<MemorySurface>) {
        let surface = Arc::new(MemorySurface::new());
        let queue = NotificationQueue::new(surface.clone(), DEFAULT_MAX_NOTIFICATIONS);
        (queue, surface)
    }

    fn messages(queue: &NotificationQueue) -> Vec<String> {
        queue.live().into_iter().map(|n| n.message).collect()
    }

    #[test]
    fn test_sixth_toast_evicts_oldest() {
        let (queue, surface) = queue();
        let ids: Vec<_> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|m| queue.show(*m, NotificationKind::Info, None))
            .collect();

        assert_eq!(messages(&queue), vec!["B", "C", "D", "E", "F"]);
        assert_eq!(
            surface.retractions(),
            vec![(ids[0], RemovalReason::Evicted)]
        );
    }

    #[test]
    fn test_ids_are_increasing() {
        let (queue, _) = queue();
        let first = queue.info("one");
        let second = queue.info("two");
        assert!(second > first);
        assert_eq!(first.to_string(), "notification_1");
    }

    #[test]
    fn test_double_dismiss_is_noop() {
        let (queue, surface) = queue();
        let id = queue.success("saved");

        assert!(queue.dismiss(id));
        assert!(!queue.dismiss(id));
        assert!(queue.is_empty());
        assert_eq!(surface.retractions(), vec![(id, RemovalReason::Dismissed)]);
    }

    #[test]
    fn test_dismiss_unknown_id() {
        let (queue, surface) = queue();
        assert!(!queue.dismiss(NotificationId(42)));
        assert!(surface.events().is_empty());
    }

    #[test]
    fn test_clear_retracts_everything() {
        let (queue, surface) = queue();
        queue.info("a");
        queue.warning("b");
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(surface.retractions().len(), 2);
        assert!(surface
            .retractions()
            .iter()
            .all(|(_, reason)| *reason == RemovalReason::Cleared));
    }

    #[test]
    fn test_default_durations() {
        let (queue, _) = queue();
        let error = queue.error("boom");
        let warning = queue.warning("careful");
        let custom = queue.show("long", NotificationKind::Info, Some(Duration::from_secs(6)));

        assert_eq!(queue.get(error).unwrap().duration, Duration::from_millis(5000));
        assert_eq!(queue.get(warning).unwrap().duration, Duration::from_millis(4500));
        assert_eq!(queue.get(custom).unwrap().duration, Duration::from_secs(6));
        assert_eq!(
            NotificationKind::Default.default_duration(),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn test_capacity_floor() {
        let queue = NotificationQueue::new(Arc::new(NullSurface), 0);
        queue.info("a");
        queue.info("b");
        assert_eq!(queue.capacity(), 1);
        assert_eq!(messages(&queue), vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_duration() {
        let (queue, surface) = queue();
        let id = queue.success("done");

        tokio::time::sleep(Duration::from_millis(3999)).await;
        assert_eq!(queue.len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(queue.is_empty());
        assert_eq!(surface.retractions(), vec![(id, RemovalReason::Expired)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissed_toast_timer_does_nothing() {
        let (queue, surface) = queue();
        let id = queue.info("bye");
        assert!(queue.dismiss(id));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(surface.retractions(), vec![(id, RemovalReason::Dismissed)]);
    }
}
