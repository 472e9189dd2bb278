// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The portal shell: wires sessions, toasts, preferences and demo accounts
//! together and turns session events into toasts.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::directory::DemoDirectory;
use crate::error::SessionError;
use crate::notifications::{presets, NotificationQueue, ToastSurface};
use crate::preferences::{Preferences, Theme};
use crate::security::{Credentials, Session, SessionManager};
use crate::storage::KeyValueStore;

pub struct SchoolHub {
    config: AppConfig,
    sessions: SessionManager,
    notifications: NotificationQueue,
    preferences: Preferences,
    directory: DemoDirectory,
}

impl SchoolHub {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        surface: Arc<dyn ToastSurface>,
    ) -> Self {
        Self::with_clock(config, store, surface, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        surface: Arc<dyn ToastSurface>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions =
            SessionManager::with_clock(store.clone(), clock.clone(), config.session_config());
        let notifications = NotificationQueue::with_clock(surface, clock, config.max_notifications);

        let toasts = notifications.clone();
        sessions.on_expiry(move |event| {
            presets::session_expired(&toasts, &event.message);
        });

        Self {
            config,
            sessions,
            notifications,
            preferences: Preferences::new(store.clone()),
            directory: DemoDirectory::new(store),
        }
    }

    /// Seed demo accounts, greet first-time visitors, restore any session.
    pub fn start(&self) -> Option<Session> {
        self.directory.seed_if_needed();
        if self.preferences.take_first_visit() {
            presets::welcome(&self.notifications);
        }
        self.sessions.restore_session()
    }

    /// Log in against the demo accounts of the credentials' role.
    pub fn login(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        let candidates = self.directory.accounts(credentials.role);
        match self.sessions.login_against(credentials, &candidates) {
            Ok(session) => {
                presets::login_success(&self.notifications);
                Ok(session)
            }
            Err(e) => {
                presets::login_failed(&self.notifications);
                Err(e)
            }
        }
    }

    pub fn logout(&self) -> bool {
        let was_active = self.sessions.logout();
        if was_active {
            presets::logout(&self.notifications);
        }
        was_active
    }

    /// Any user interaction. Keeps the session alive.
    pub fn activity(&self) -> Option<Session> {
        self.sessions.record_activity()
    }

    pub fn theme(&self) -> Theme {
        self.preferences.theme()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.preferences.set_theme(theme);
        presets::theme_changed(&self.notifications, theme);
    }

    pub fn toggle_theme(&self) -> Theme {
        let theme = self.preferences.toggle_theme();
        presets::theme_changed(&self.notifications, theme);
        theme
    }

    pub fn set_notification_sound(&self, enabled: bool) {
        self.preferences.set_notification_sound(enabled);
        presets::sound_changed(&self.notifications, enabled);
    }

    /// Flip the notification sound preference and return the new value.
    pub fn toggle_notification_sound(&self) -> bool {
        let enabled = self.preferences.toggle_notification_sound();
        presets::sound_changed(&self.notifications, enabled);
        enabled
    }

    /// Dismiss every toast, then confirm with a fresh one.
    pub fn clear_notifications(&self) {
        self.notifications.clear();
        presets::notifications_cleared(&self.notifications);
    }

    /// Update the logged-in user's stored profile.
    pub fn update_profile(&self, changes: &Map<String, Value>) -> Result<bool, SessionError> {
        let session = self.sessions.require_session()?;
        let updated = self
            .directory
            .update_profile(&session.principal.id, changes);
        if updated {
            presets::profile::updated(&self.notifications);
        }
        Ok(updated)
    }

    /// Back to a freshly seeded demo: no session, empty log, default accounts.
    pub fn reset_demo_data(&self) {
        self.sessions.discard();
        self.directory.reset();
        presets::demo_reset(&self.notifications);
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn directory(&self) -> &DemoDirectory {
        &self.directory
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notifications::presets::{LOGIN_FAILED, LOGIN_SUCCESS, LOGOUT, WELCOME};
    use crate::notifications::MemorySurface;
    use crate::security::Role;
    use crate::storage::MemoryStore;

    fn hub() -> (SchoolHub, Arc<MemorySurface>, Arc<ManualClock>) {
        let surface = Arc::new(MemorySurface::new());
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let hub = SchoolHub::with_clock(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            surface.clone(),
            clock.clone(),
        );
        (hub, surface, clock)
    }

    #[test]
    fn test_start_welcomes_first_visit_only() {
        let (hub, surface, _) = hub();
        assert!(hub.start().is_none());
        assert!(hub.start().is_none());
        assert_eq!(surface.presented(), vec![WELCOME]);
    }

    #[test]
    fn test_login_and_logout_toasts() {
        let (hub, surface, _) = hub();
        hub.start();

        let bad = Credentials::new("STU001", "wrong", Role::Student);
        assert_eq!(hub.login(&bad).unwrap_err(), SessionError::InvalidCredentials);

        let good = Credentials::new("STU001", "student123", Role::Student);
        assert_eq!(hub.login(&good).unwrap().principal.id, "STU001");
        assert!(hub.logout());
        assert!(!hub.logout());

        assert_eq!(
            surface.presented(),
            vec![WELCOME, LOGIN_FAILED, LOGIN_SUCCESS, LOGOUT]
        );
    }

    #[test]
    fn test_role_mismatch_fails() {
        let (hub, _, _) = hub();
        hub.start();
        let teacher_as_student = Credentials::new("TEACH001", "teacher123", Role::Student);
        assert!(hub.login(&teacher_as_student).is_err());
    }

    #[test]
    fn test_expiry_raises_warning_toast() {
        let (hub, surface, clock) = hub();
        hub.start();
        hub.login(&Credentials::new("TEACH002", "teacher123", Role::Teacher))
            .unwrap();

        clock.advance(chrono::Duration::minutes(45));
        assert!(hub.activity().is_none());
        assert_eq!(
            surface.presented().last().map(String::as_str),
            Some(hub.config().expiration_message.as_str())
        );
    }

    #[test]
    fn test_update_profile_requires_session() {
        let (hub, _, _) = hub();
        hub.start();
        let mut changes = Map::new();
        changes.insert("phone".into(), Value::from("+1000"));

        assert_eq!(
            hub.update_profile(&changes).unwrap_err(),
            SessionError::NoActiveSession
        );

        hub.login(&Credentials::new("STU002", "student123", Role::Student))
            .unwrap();
        assert!(hub.update_profile(&changes).unwrap());
        let emma = hub.directory().find(Role::Student, "STU002").unwrap();
        assert_eq!(emma.principal.attributes["phone"], "+1000");
    }

    #[test]
    fn test_reset_logs_out_silently() {
        let (hub, _, _) = hub();
        hub.start();
        hub.login(&Credentials::new("STU001", "student123", Role::Student))
            .unwrap();

        hub.reset_demo_data();
        assert!(hub.sessions().current().is_none());
        assert!(hub.sessions().security_log().read_all().is_empty());
        assert!(hub.start().is_none());
    }

    #[test]
    fn test_toggle_theme() {
        let (hub, surface, _) = hub();
        assert_eq!(hub.toggle_theme(), Theme::Dark);
        assert_eq!(hub.theme(), Theme::Dark);
        assert_eq!(surface.presented(), vec!["Dark mode enabled"]);
    }

    #[test]
    fn test_toggle_notification_sound() {
        let (hub, surface, _) = hub();
        assert!(hub.preferences().notification_sound());
        assert!(!hub.toggle_notification_sound());
        assert!(!hub.preferences().notification_sound());
        assert_eq!(surface.presented(), vec!["Notification sounds disabled."]);
    }

    #[test]
    fn test_clear_notifications_leaves_confirmation() {
        let (hub, surface, _) = hub();
        hub.start();
        hub.login(&Credentials::new("STU001", "student123", Role::Student))
            .unwrap();

        hub.clear_notifications();
        let live: Vec<_> = hub
            .notifications()
            .live()
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(live, vec![presets::NOTIFICATIONS_CLEARED]);
        assert_eq!(surface.retractions().len(), 2);
    }
}
