// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canned portal messages.
//!
//! Shell events (login, logout, theme, sound) sit at the top level. Messages
//! raised by portal pages are grouped by page: [`assignment`], [`grades`],
//! [`attendance`], [`announcements`], [`chat`], [`system`] and [`profile`].

use std::time::Duration;

use super::{NotificationId, NotificationKind, NotificationQueue};
use crate::preferences::Theme;

pub const LOGIN_SUCCESS: &str = "Welcome to SchoolHub! Login successful.";
pub const LOGIN_FAILED: &str = "Invalid credentials. Please check your login details.";
pub const LOGOUT: &str = "You have been logged out successfully.";
pub const WELCOME: &str = "Welcome to SchoolHub! Explore all the features available to you.";
pub const DEMO_RESET: &str = "Demo data has been reset to defaults.";
pub const NOTIFICATIONS_CLEARED: &str = "All notifications cleared.";

/// The first-visit welcome stays up longer than a normal info toast.
pub const WELCOME_DURATION: Duration = Duration::from_millis(6000);

pub fn login_success(queue: &NotificationQueue) -> NotificationId {
    queue.success(LOGIN_SUCCESS)
}

pub fn login_failed(queue: &NotificationQueue) -> NotificationId {
    queue.error(LOGIN_FAILED)
}

pub fn logout(queue: &NotificationQueue) -> NotificationId {
    queue.info(LOGOUT)
}

pub fn session_expired(queue: &NotificationQueue, message: &str) -> NotificationId {
    queue.warning(message)
}

pub fn theme_changed(queue: &NotificationQueue, theme: Theme) -> NotificationId {
    let text = match theme {
        Theme::Dark => "Dark mode enabled",
        Theme::Light => "Light mode enabled",
    };
    queue.info(text)
}

pub fn sound_changed(queue: &NotificationQueue, enabled: bool) -> NotificationId {
    let state = if enabled { "enabled" } else { "disabled" };
    queue.info(format!("Notification sounds {}.", state))
}

/// Shown right after the queue is emptied, so it is the only live toast.
pub fn notifications_cleared(queue: &NotificationQueue) -> NotificationId {
    queue.info(NOTIFICATIONS_CLEARED)
}

pub fn welcome(queue: &NotificationQueue) -> NotificationId {
    queue.show(WELCOME, NotificationKind::Info, Some(WELCOME_DURATION))
}

pub fn demo_reset(queue: &NotificationQueue) -> NotificationId {
    queue.info(DEMO_RESET)
}

pub mod assignment {
    use super::{NotificationId, NotificationQueue};

    pub fn submitted(queue: &NotificationQueue, title: &str) -> NotificationId {
        queue.success(format!("Assignment \"{}\" submitted successfully!", title))
    }

    pub fn saved(queue: &NotificationQueue, title: &str) -> NotificationId {
        queue.info(format!("Assignment \"{}\" saved as draft.", title))
    }

    pub fn deadline(queue: &NotificationQueue, title: &str, days: u32) -> NotificationId {
        queue.warning(format!("Assignment \"{}\" is due in {} day(s)!", title, days))
    }

    pub fn overdue(queue: &NotificationQueue, title: &str) -> NotificationId {
        queue.error(format!("Assignment \"{}\" is overdue!", title))
    }
}

pub mod grades {
    use super::{NotificationId, NotificationQueue};

    pub fn updated(queue: &NotificationQueue, subject: &str, grade: &str) -> NotificationId {
        queue.success(format!("New grade for {}: {}", subject, grade))
    }

    pub fn improved(queue: &NotificationQueue, subject: &str) -> NotificationId {
        queue.success(format!("Your grade in {} has improved!", subject))
    }
}

pub mod attendance {
    use super::{NotificationId, NotificationQueue};

    pub fn marked(queue: &NotificationQueue) -> NotificationId {
        queue.success("Attendance marked successfully.")
    }

    pub fn absent(queue: &NotificationQueue) -> NotificationId {
        queue.warning("You were marked absent for today.")
    }

    pub fn low(queue: &NotificationQueue, percentage: u8) -> NotificationId {
        queue.warning(format!(
            "Your attendance is {}%. Please improve your attendance.",
            percentage
        ))
    }
}

pub mod announcements {
    use super::{NotificationId, NotificationQueue};

    pub fn new(queue: &NotificationQueue, title: &str) -> NotificationId {
        queue.info(format!("New announcement: {}", title))
    }

    pub fn important(queue: &NotificationQueue, title: &str) -> NotificationId {
        queue.warning(format!("Important announcement: {}", title))
    }
}

pub mod chat {
    use super::{NotificationId, NotificationQueue};

    pub fn message_sent(queue: &NotificationQueue) -> NotificationId {
        queue.success("Message sent successfully.")
    }

    pub fn message_received(queue: &NotificationQueue, from: &str) -> NotificationId {
        queue.info(format!("New message from {}", from))
    }

    pub fn connection_error(queue: &NotificationQueue) -> NotificationId {
        queue.error("Failed to send message. Please check your connection.")
    }
}

pub mod system {
    use super::{NotificationId, NotificationQueue};

    pub fn save_success(queue: &NotificationQueue) -> NotificationId {
        queue.success("Changes saved successfully.")
    }

    pub fn save_error(queue: &NotificationQueue) -> NotificationId {
        queue.error("Failed to save changes. Please try again.")
    }

    pub fn load_error(queue: &NotificationQueue) -> NotificationId {
        queue.error("Failed to load data. Please refresh the page.")
    }

    pub fn connection_lost(queue: &NotificationQueue) -> NotificationId {
        queue.error("Connection lost. Attempting to reconnect...")
    }

    pub fn connection_restored(queue: &NotificationQueue) -> NotificationId {
        queue.success("Connection restored.")
    }

    pub fn maintenance(queue: &NotificationQueue) -> NotificationId {
        queue.warning("System maintenance scheduled. Some features may be temporarily unavailable.")
    }
}

pub mod profile {
    use super::{NotificationId, NotificationQueue};

    pub const UPDATED: &str = "Profile updated successfully.";

    pub fn updated(queue: &NotificationQueue) -> NotificationId {
        queue.success(UPDATED)
    }

    pub fn password_changed(queue: &NotificationQueue) -> NotificationId {
        queue.success("Password changed successfully.")
    }

    pub fn image_uploaded(queue: &NotificationQueue) -> NotificationId {
        queue.success("Profile picture updated.")
    }

    pub fn update_error(queue: &NotificationQueue) -> NotificationId {
        queue.error("Failed to update profile. Please try again.")
    }
}
