// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Theme, notification sound and first-visit preferences.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::storage::{self, keys, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
        }
    }
}

/// Per-store user preferences.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored theme. Missing or unrecognised values read as light.
    pub fn theme(&self) -> Theme {
        match self.store.get(keys::THEME) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|e| {
                tracing::debug!("THEME_IGNORED | {}", e);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(e) => {
                tracing::warn!("STORE_READ_FAILED | key={} error={:#}", keys::THEME, e);
                Theme::default()
            }
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        if let Err(e) = self.store.set(keys::THEME, theme.as_str()) {
            tracing::warn!("STORE_WRITE_FAILED | key={} error={:#}", keys::THEME, e);
        }
    }

    /// Flip the theme and return the new one.
    pub fn toggle_theme(&self) -> Theme {
        let next = self.theme().toggled();
        self.set_theme(next);
        next
    }

    /// Whether toasts ring the terminal bell. On unless stored as `"false"`.
    pub fn notification_sound(&self) -> bool {
        match self.store.get(keys::NOTIFICATION_SOUND) {
            Ok(Some(raw)) => raw != "false",
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(
                    "STORE_READ_FAILED | key={} error={:#}",
                    keys::NOTIFICATION_SOUND,
                    e
                );
                true
            }
        }
    }

    pub fn set_notification_sound(&self, enabled: bool) {
        let value = if enabled { "true" } else { "false" };
        if let Err(e) = self.store.set(keys::NOTIFICATION_SOUND, value) {
            tracing::warn!(
                "STORE_WRITE_FAILED | key={} error={:#}",
                keys::NOTIFICATION_SOUND,
                e
            );
        }
    }

    /// Flip the sound flag and return the new value.
    pub fn toggle_notification_sound(&self) -> bool {
        let next = !self.notification_sound();
        self.set_notification_sound(next);
        next
    }

    /// True the first time it is called against a store, false after.
    pub fn take_first_visit(&self) -> bool {
        let visited = matches!(self.store.get(keys::FIRST_VISIT), Ok(Some(_)));
        if visited {
            return false;
        }
        if let Err(e) = self.store.set(keys::FIRST_VISIT, "true") {
            tracing::warn!("STORE_WRITE_FAILED | key={} error={:#}", keys::FIRST_VISIT, e);
        }
        true
    }

    /// Forget the first-visit flag.
    pub fn reset_first_visit(&self) {
        storage::remove_quietly(self.store.as_ref(), keys::FIRST_VISIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn prefs() -> (Preferences, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Preferences::new(store.clone()), store)
    }

    #[test]
    fn test_theme_defaults_to_light() {
        let (prefs, store) = prefs();
        assert_eq!(prefs.theme(), Theme::Light);

        store.set(keys::THEME, "solarized").unwrap();
        assert_eq!(prefs.theme(), Theme::Light);
    }

    #[test]
    fn test_toggle_persists() {
        let (prefs, store) = prefs();
        assert_eq!(prefs.toggle_theme(), Theme::Dark);
        assert_eq!(store.get(keys::THEME).unwrap().as_deref(), Some("dark"));
        assert_eq!(prefs.toggle_theme(), Theme::Light);
    }

    #[test]
    fn test_notification_sound_defaults_on() {
        let (prefs, store) = prefs();
        assert!(prefs.notification_sound());

        store.set(keys::NOTIFICATION_SOUND, "yes").unwrap();
        assert!(prefs.notification_sound());

        assert!(!prefs.toggle_notification_sound());
        assert_eq!(
            store.get(keys::NOTIFICATION_SOUND).unwrap().as_deref(),
            Some("false")
        );
        assert!(prefs.toggle_notification_sound());
        assert_eq!(
            store.get(keys::NOTIFICATION_SOUND).unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_first_visit_once() {
        let (prefs, _) = prefs();
        assert!(prefs.take_first_visit());
        assert!(!prefs.take_first_visit());

        prefs.reset_first_visit();
        assert!(prefs.take_first_visit());
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("blue".parse::<Theme>().is_err());
    }
}
