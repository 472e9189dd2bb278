// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session Manager
//!
//! Tracks the logged-in principal, its expiry deadline and the
//! renewal-on-activity rule.
//!
//! ## Lifecycle
//!
//! ```text
//! NoSession --login--> Active --activity--> Active (deadline pushed out)
//! Active --logout--> NoSession
//! Active --timer fires--> Expired --> NoSession
//! ```
//!
//! The persisted record always satisfies `expiresAt == lastActivity + timeout`.
//! Every activity call re-arms the expiry timer, so a session only expires
//! after a full timeout with no activity at all. Corrupt or stale records are
//! treated as "logged out", never as a failure.
//!
//! Timers run on the ambient tokio runtime. Without one, nothing is armed and
//! expiry is noticed on the next `restore_session` or `record_activity`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::audit::{default_context, SecurityEventKind, SecurityLog, DEFAULT_LOG_CAPACITY};
use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::security::credentials::{Account, Credentials, Permission, Principal};
use crate::security::locks::{resilient_read, resilient_write};
use crate::storage::{self, keys, KeyValueStore};
use crate::timer::{TimerRegistry, TimerToken};

/// Inactivity timeout: 30 minutes.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;

pub const DEFAULT_EXPIRATION_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Session state as seen by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Nobody is logged in
    NoSession,
    /// Logged in and within the deadline
    Active,
    /// Deadline passed but the expiry has not been processed yet
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NoSession => write!(f, "NO_SESSION"),
            SessionState::Active => write!(f, "ACTIVE"),
            SessionState::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Session lifecycle events, formatted for the tracing audit trail.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Created { user_id: String, expires_at: i64 },
    Restored { user_id: String, remaining_secs: i64 },
    Refreshed { user_id: String, expires_at: i64 },
    Expired { user_id: String, idle_secs: i64 },
    Terminated { user_id: String, reason: &'static str },
}

impl SessionEvent {
    pub fn to_audit_string(&self) -> String {
        match self {
            SessionEvent::Created { user_id, expires_at } => {
                format!("SESSION_CREATED | user={} expires_at={}", user_id, expires_at)
            }
            SessionEvent::Restored { user_id, remaining_secs } => {
                format!("SESSION_RESTORED | user={} remaining={}s", user_id, remaining_secs)
            }
            SessionEvent::Refreshed { user_id, expires_at } => {
                format!("SESSION_REFRESHED | user={} expires_at={}", user_id, expires_at)
            }
            SessionEvent::Expired { user_id, idle_secs } => {
                format!("SESSION_EXPIRED | user={} idle={}s", user_id, idle_secs)
            }
            SessionEvent::Terminated { user_id, reason } => {
                format!("SESSION_TERMINATED | user={} reason={}", user_id, reason)
            }
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity timeout in seconds
    pub timeout_secs: u64,
    /// Message handed to expiry observers
    pub expiration_message: String,
    /// Security log capacity
    pub log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            expiration_message: DEFAULT_EXPIRATION_MESSAGE.to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Default configuration with a different timeout (at least one second).
    pub fn custom(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            tracing::warn!("SESSION_TIMEOUT: 0s requested, using 1s");
        }
        Self {
            timeout_secs: timeout_secs.max(1),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn timeout_millis(&self) -> i64 {
        (self.timeout_secs as i64).saturating_mul(1000)
    }
}

/// A logged-in session. This is also the persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub principal: Principal,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub last_activity: i64,
    /// Epoch milliseconds, always `last_activity + timeout`
    pub expires_at: i64,
}

impl Session {
    fn start(principal: Principal, now: i64, timeout_ms: i64) -> Self {
        Self {
            principal,
            created_at: now,
            last_activity: now,
            expires_at: now + timeout_ms,
        }
    }

    fn touch(&mut self, now: i64, timeout_ms: i64) {
        self.last_activity = now;
        self.expires_at = now + timeout_ms;
    }

    /// Parse a persisted record.
    pub fn decode(raw: &str) -> Result<Self, SessionError> {
        serde_json::from_str(raw).map_err(|e| SessionError::CorruptSessionRecord(e.to_string()))
    }

    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.expires_at > now_millis
    }

    pub fn remaining_millis(&self, now_millis: i64) -> i64 {
        (self.expires_at - now_millis).max(0)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }
}

/// Raised once when a session times out.
#[derive(Debug, Clone)]
pub struct ExpiryEvent {
    pub principal: Principal,
    pub expired_at: DateTime<Utc>,
    pub message: String,
}

type ExpiryObserver = Arc<dyn Fn(&ExpiryEvent) + Send + Sync>;

struct Shared {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    log: SecurityLog,
    /// The current session. Lock order: slot, then timers.
    slot: RwLock<Option<Session>>,
    timers: TimerRegistry<String>,
    observers: RwLock<Vec<ExpiryObserver>>,
}

impl Shared {
    fn load_record(&self) -> Result<Option<Session>, SessionError> {
        match self.store.get(keys::SESSION) {
            Ok(Some(raw)) => Session::decode(&raw).map(Some),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!("SESSION_READ_FAILED | error={:#}", e);
                Ok(None)
            }
        }
    }

    /// Drop local state, persisted record and timer.
    fn clear_locked(&self, slot: &mut Option<Session>) {
        *slot = None;
        self.timers.cancel_all();
        storage::remove_quietly(self.store.as_ref(), keys::SESSION);
    }

    fn expire_locked(&self, slot: &mut Option<Session>) -> Option<ExpiryEvent> {
        let session = slot.take()?;
        self.clear_locked(slot);

        let now = self.clock.now();
        let event = SessionEvent::Expired {
            user_id: session.principal.id.clone(),
            idle_secs: (now.timestamp_millis() - session.last_activity) / 1000,
        };
        tracing::info!("{}", event.to_audit_string());

        Some(ExpiryEvent {
            principal: session.principal,
            expired_at: now,
            message: self.config.expiration_message.clone(),
        })
    }

    /// The persisted record, when another process holding the same session
    /// has pushed its deadline past `current`'s.
    fn extended_elsewhere(&self, current: Option<&Session>) -> Option<Session> {
        let current = current?;
        let record = self.load_record().ok().flatten()?;
        let extended = record.principal.id == current.principal.id
            && record.expires_at > current.expires_at
            && record.is_valid_at(self.clock.now_millis());
        extended.then_some(record)
    }

    fn notify(&self, event: &ExpiryEvent) {
        let observers: Vec<ExpiryObserver> = resilient_read(&self.observers).clone();
        for observer in observers {
            observer(event);
        }
    }

    fn reject(&self, credentials: &Credentials) {
        tracing::warn!(
            "LOGIN_FAILED | login_id={} role={}",
            credentials.login_id,
            credentials.role
        );
        self.log.record(
            SecurityEventKind::LoginFailed,
            &credentials.login_id,
            default_context(),
        );
    }
}

/// Timer callback. The persisted record is re-read first, so activity
/// recorded by another process defers expiry instead of being lost.
fn on_timer(shared: &Arc<Shared>, token: TimerToken<String>) {
    let event = {
        let mut slot = resilient_write(&shared.slot);
        if !shared.timers.retire(&token) {
            return;
        }
        if let Some(extended) = shared.extended_elsewhere(slot.as_ref()) {
            let event = SessionEvent::Refreshed {
                user_id: extended.principal.id.clone(),
                expires_at: extended.expires_at,
            };
            tracing::info!("{} | source=store", event.to_audit_string());
            *slot = Some(extended.clone());
            arm(shared, &extended);
            return;
        }
        shared.expire_locked(&mut slot)
    };
    if let Some(event) = event {
        shared.notify(&event);
    }
}

/// (Re)arm the expiry timer for `session`'s remaining time.
fn arm(shared: &Arc<Shared>, session: &Session) {
    let remaining = session.remaining_millis(shared.clock.now_millis());
    let delay = Duration::from_millis(remaining as u64);
    let weak = Arc::downgrade(shared);

    shared.timers.cancel_all();
    shared
        .timers
        .schedule(session.principal.id.clone(), delay, move |token| {
            if let Some(shared) = weak.upgrade() {
                on_timer(&shared, token);
            }
        });
}

/// Owns the current session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, config: SessionConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let log = SecurityLog::new(store.clone(), clock.clone(), config.log_capacity);
        Self {
            shared: Arc::new(Shared {
                store,
                clock,
                config,
                log,
                slot: RwLock::new(None),
                timers: TimerRegistry::new(),
                observers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Log `candidate` in if the credentials match it.
    ///
    /// On failure the attempt is logged under the supplied login id and any
    /// existing session is left as it was.
    pub fn login(
        &self,
        credentials: &Credentials,
        candidate: &Account,
    ) -> Result<Session, SessionError> {
        if !candidate.matches(credentials) {
            self.shared.reject(credentials);
            return Err(SessionError::InvalidCredentials);
        }

        let now = self.shared.clock.now_millis();
        let session = Session::start(
            candidate.principal.clone(),
            now,
            self.shared.config.timeout_millis(),
        );

        {
            let mut slot = resilient_write(&self.shared.slot);
            if !storage::write_json(self.shared.store.as_ref(), keys::SESSION, &session) {
                tracing::warn!(
                    "SESSION_NOT_PERSISTED | user={} | session lives in this process only",
                    session.principal.id
                );
            }
            *slot = Some(session.clone());
            arm(&self.shared, &session);
        }

        let event = SessionEvent::Created {
            user_id: session.principal.id.clone(),
            expires_at: session.expires_at,
        };
        tracing::info!("{}", event.to_audit_string());
        self.shared.log.record(
            SecurityEventKind::LoginSuccess,
            &session.principal.id,
            default_context(),
        );

        Ok(session)
    }

    /// Log in against the first candidate the credentials match.
    ///
    /// An unknown account and a wrong password fail the same way.
    pub fn login_against<'a, I>(
        &self,
        credentials: &Credentials,
        candidates: I,
    ) -> Result<Session, SessionError>
    where
        I: IntoIterator<Item = &'a Account>,
    {
        match candidates.into_iter().find(|a| a.matches(credentials)) {
            Some(account) => self.login(credentials, account),
            None => {
                self.shared.reject(credentials);
                Err(SessionError::InvalidCredentials)
            }
        }
    }

    /// Adopt the persisted session if it is still valid.
    pub fn restore_session(&self) -> Option<Session> {
        let mut slot = resilient_write(&self.shared.slot);
        let now = self.shared.clock.now_millis();

        match self.shared.load_record() {
            Ok(Some(session)) if session.is_valid_at(now) => {
                let event = SessionEvent::Restored {
                    user_id: session.principal.id.clone(),
                    remaining_secs: session.remaining_millis(now) / 1000,
                };
                tracing::info!("{}", event.to_audit_string());

                *slot = Some(session.clone());
                arm(&self.shared, &session);
                Some(session)
            }
            Ok(Some(stale)) => {
                tracing::info!(
                    "SESSION_STALE | user={} expired_at={}",
                    stale.principal.id,
                    stale.expires_at
                );
                self.shared.clear_locked(&mut slot);
                None
            }
            Ok(None) => {
                *slot = None;
                self.shared.timers.cancel_all();
                None
            }
            Err(e) => {
                tracing::warn!("SESSION_DISCARDED | {}", e);
                self.shared.clear_locked(&mut slot);
                None
            }
        }
    }

    /// Push the deadline out to `now + timeout`.
    ///
    /// No-op without a session. One read and one write of the persisted
    /// record, both under the session lock. Returns the refreshed session.
    pub fn record_activity(&self) -> Option<Session> {
        let (refreshed, expired) = {
            let mut slot = resilient_write(&self.shared.slot);
            if slot.is_none() {
                return None;
            }

            let now = self.shared.clock.now_millis();
            match self.shared.load_record() {
                Ok(Some(mut record)) if record.is_valid_at(now) => {
                    record.touch(now, self.shared.config.timeout_millis());
                    if !storage::write_json(self.shared.store.as_ref(), keys::SESSION, &record) {
                        tracing::warn!("SESSION_NOT_PERSISTED | user={}", record.principal.id);
                    }

                    let event = SessionEvent::Refreshed {
                        user_id: record.principal.id.clone(),
                        expires_at: record.expires_at,
                    };
                    tracing::debug!("{}", event.to_audit_string());

                    *slot = Some(record.clone());
                    arm(&self.shared, &record);
                    (Some(record), None)
                }
                Ok(Some(_)) => (None, self.shared.expire_locked(&mut slot)),
                Ok(None) => {
                    tracing::warn!("SESSION_RECORD_MISSING | ending local session");
                    self.shared.clear_locked(&mut slot);
                    (None, None)
                }
                Err(e) => {
                    tracing::warn!("SESSION_DISCARDED | {}", e);
                    self.shared.clear_locked(&mut slot);
                    (None, None)
                }
            }
        };

        if let Some(event) = expired {
            self.shared.notify(&event);
        }
        refreshed
    }

    /// End the session. Returns whether one was active.
    pub fn logout(&self) -> bool {
        let mut slot = resilient_write(&self.shared.slot);
        let active = slot.as_ref().map(|s| s.principal.id.clone());

        if let Some(user_id) = &active {
            self.shared
                .log
                .record(SecurityEventKind::Logout, user_id, default_context());
            let event = SessionEvent::Terminated {
                user_id: user_id.clone(),
                reason: "logout",
            };
            tracing::info!("{}", event.to_audit_string());
        }

        self.shared.clear_locked(&mut slot);
        active.is_some()
    }

    /// Forget the session without logging anything.
    pub fn discard(&self) {
        let mut slot = resilient_write(&self.shared.slot);
        self.shared.clear_locked(&mut slot);
    }

    /// Register an observer for expiry events.
    ///
    /// Each expiry reaches every observer once.
    pub fn on_expiry<F>(&self, observer: F)
    where
        F: Fn(&ExpiryEvent) + Send + Sync + 'static,
    {
        resilient_write(&self.shared.observers).push(Arc::new(observer));
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Option<Session> {
        resilient_read(&self.shared.slot).clone()
    }

    pub fn state(&self) -> SessionState {
        let now = self.shared.clock.now_millis();
        match resilient_read(&self.shared.slot).as_ref() {
            None => SessionState::NoSession,
            Some(session) if session.is_valid_at(now) => SessionState::Active,
            Some(_) => SessionState::Expired,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// The current session, or `NoActiveSession`.
    pub fn require_session(&self) -> Result<Session, SessionError> {
        let now = self.shared.clock.now_millis();
        resilient_read(&self.shared.slot)
            .as_ref()
            .filter(|s| s.is_valid_at(now))
            .cloned()
            .ok_or(SessionError::NoActiveSession)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.require_session()
            .map(|s| s.principal.has_permission(permission))
            .unwrap_or(false)
    }

    /// Remaining time before expiry, zero without a session.
    pub fn time_remaining(&self) -> Duration {
        let now = self.shared.clock.now_millis();
        resilient_read(&self.shared.slot)
            .as_ref()
            .map(|s| Duration::from_millis(s.remaining_millis(now) as u64))
            .unwrap_or_default()
    }

    /// Whether an expiry timer is currently pending.
    pub fn timer_armed(&self) -> bool {
        self.shared.timers.pending_count() > 0
    }

    pub fn security_log(&self) -> &SecurityLog {
        &self.shared.log
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}

// ============================================================================
// TESTS
// ============================================================================
