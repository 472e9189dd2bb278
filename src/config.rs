// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Portal configuration, read from `~/.schoolhub/config.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audit::DEFAULT_LOG_CAPACITY;
use crate::notifications::DEFAULT_MAX_NOTIFICATIONS;
use crate::security::{SessionConfig, DEFAULT_EXPIRATION_MESSAGE, DEFAULT_SESSION_TIMEOUT_SECS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inactivity timeout in seconds (default: 1800)
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Live toasts allowed at once (default: 5)
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
    /// Security log entries kept (default: 100)
    #[serde(default = "default_security_log_capacity")]
    pub security_log_capacity: usize,
    /// Shown when a session times out
    #[serde(default = "default_expiration_message")]
    pub expiration_message: String,
    /// Store file; `~/.schoolhub/storage.json` when unset
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT_SECS
}

fn default_max_notifications() -> usize {
    DEFAULT_MAX_NOTIFICATIONS
}

fn default_security_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

fn default_expiration_message() -> String {
    DEFAULT_EXPIRATION_MESSAGE.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            max_notifications: default_max_notifications(),
            security_log_capacity: default_security_log_capacity(),
            expiration_message: default_expiration_message(),
            storage_path: None,
        }
    }
}

impl AppConfig {
    /// Session settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            expiration_message: self.expiration_message.clone(),
            log_capacity: self.security_log_capacity,
            ..SessionConfig::custom(self.session_timeout_secs)
        }
    }
}

/// `~/.schoolhub`, created on first use.
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let config_dir = home.join(".schoolhub");
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    }
    Ok(config_dir)
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&get_config_dir()?.join("config.json"))
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &get_config_dir()?.join("config.json"))
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
