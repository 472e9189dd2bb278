// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Where toasts are shown.

use colored::Colorize;
use std::sync::Mutex;

use super::{Notification, NotificationId, NotificationKind};
use crate::security::locks::resilient_lock;

/// Why a toast left the live set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Dismissed,
    Expired,
    Evicted,
    Cleared,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovalReason::Dismissed => write!(f, "dismissed"),
            RemovalReason::Expired => write!(f, "expired"),
            RemovalReason::Evicted => write!(f, "evicted"),
            RemovalReason::Cleared => write!(f, "cleared"),
        }
    }
}

/// Owns the visual side of each toast.
///
/// The queue calls `present` once when a toast is shown and `retract` once
/// when it leaves, never while holding the live-set lock. Calls are
/// serialized, and `present` for a toast comes before its `retract`.
pub trait ToastSurface: Send + Sync {
    fn present(&self, notification: &Notification);
    fn retract(&self, notification: &Notification, reason: RemovalReason);
}

/// Prints toasts to stdout, ringing the terminal bell when sound is on.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    quiet: bool,
    bell: bool,
}

impl TerminalSurface {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, bell: false }
    }

    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }
}

impl ToastSurface for TerminalSurface {
    fn present(&self, notification: &Notification) {
        if self.quiet {
            return;
        }
        let line = match notification.kind {
            NotificationKind::Success => format!("[✓] {}", notification.message).green(),
            NotificationKind::Error => format!("[✗] {}", notification.message).red().bold(),
            NotificationKind::Warning => format!("[!] {}", notification.message).yellow(),
            NotificationKind::Info => format!("[i] {}", notification.message).cyan(),
            NotificationKind::Default => format!("[*] {}", notification.message).normal(),
        };
        if self.bell {
            println!("\x07{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn retract(&self, notification: &Notification, reason: RemovalReason) {
        tracing::trace!("TOAST_RETRACTED | id={} reason={}", notification.id, reason);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl ToastSurface for NullSurface {
    fn present(&self, _notification: &Notification) {}
    fn retract(&self, _notification: &Notification, _reason: RemovalReason) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Presented(NotificationId, String),
    Retracted(NotificationId, RemovalReason),
}

/// Records what it was asked to show. Headless shells and tests use it.
#[derive(Debug, Default)]
pub struct MemorySurface {
    events: Mutex<Vec<SurfaceEvent>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        resilient_lock(&self.events).clone()
    }

    /// Messages presented so far, in order.
    pub fn presented(&self) -> Vec<String> {
        resilient_lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Presented(_, message) => Some(message.clone()),
                SurfaceEvent::Retracted(..) => None,
            })
            .collect()
    }

    pub fn retractions(&self) -> Vec<(NotificationId, RemovalReason)> {
        resilient_lock(&self.events)
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Retracted(id, reason) => Some((*id, *reason)),
                SurfaceEvent::Presented(..) => None,
            })
            .collect()
    }
}

impl ToastSurface for MemorySurface {
    fn present(&self, notification: &Notification) {
        resilient_lock(&self.events).push(SurfaceEvent::Presented(
            notification.id,
            notification.message.clone(),
        ));
    }

    fn retract(&self, notification: &Notification, reason: RemovalReason) {
        resilient_lock(&self.events).push(SurfaceEvent::Retracted(notification.id, reason));
    }
}
