// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authentication and session controls.
//!
//! - **Session timeout**: 30 minutes of inactivity ends the session
//! - **Renewal on activity**: every interaction pushes the deadline out
//! - **Audit trail**: logins, failed logins and logouts go to the security log
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use schoolhub::security::{Credentials, Role, SessionConfig, SessionManager};
//! use schoolhub::storage::MemoryStore;
//! use schoolhub::directory::DemoDirectory;
//!
//! let store = Arc::new(MemoryStore::new());
//! let directory = DemoDirectory::new(store.clone());
//! directory.seed_if_needed();
//!
//! let manager = SessionManager::new(store, SessionConfig::default());
//! let credentials = Credentials::new("STU001", "student123", Role::Student);
//! let session = manager
//!     .login_against(&credentials, &directory.accounts(Role::Student))
//!     .expect("demo credentials are valid");
//! assert_eq!(session.principal.id, "STU001");
//! ```

pub mod credentials;
pub mod locks;
pub mod session_manager;

pub use credentials::{
    password_strength, Account, Credentials, PasswordRequirements, PasswordStrength, Permission,
    Principal, Role, StrengthLevel,
};
pub use locks::{resilient_lock, resilient_read, resilient_write};
pub use session_manager::{
    ExpiryEvent, Session, SessionConfig, SessionEvent, SessionManager, SessionState,
    DEFAULT_EXPIRATION_MESSAGE, DEFAULT_SESSION_TIMEOUT_SECS,
};
