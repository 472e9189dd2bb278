// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! schoolhub - session and notification core of a school portal
//!
//! Students and teachers log in with demo accounts; sessions expire after
//! 30 minutes without activity; every login, failed login and logout lands
//! in a bounded security log; toasts report what happened.
//!
//! # Core Modules
//!
//! - [`security`] - Credentials, permissions and the session manager
//! - [`notifications`] - Bounded toast queue with timed removal
//! - [`audit`] - Security event log (ring buffer of 100 entries)
//! - [`storage`] - Key-value store (in-memory or JSON file)
//! - [`directory`] - Demo student and teacher accounts
//! - [`preferences`] - Theme and first-visit flag
//! - [`app`] - The shell wiring it all together
//! - [`error`] - Session errors and CLI error formatting

pub mod app;
pub mod audit;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod notifications;
pub mod preferences;
pub mod security;
pub mod storage;
pub mod timer;

pub use app::SchoolHub;

pub use audit::{SecurityEvent, SecurityEventKind, SecurityLog, DEFAULT_LOG_CAPACITY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, save_config, AppConfig};
pub use directory::DemoDirectory;
pub use error::{format_error, SessionError};
pub use notifications::{
    Notification, NotificationId, NotificationKind, NotificationQueue, RemovalReason,
    ToastSurface, DEFAULT_MAX_NOTIFICATIONS,
};
pub use preferences::{Preferences, Theme};
pub use security::{
    Account, Credentials, ExpiryEvent, Permission, Principal, Role, Session, SessionConfig,
    SessionManager, SessionState,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
