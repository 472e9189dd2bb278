// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session errors and consistent CLI error formatting.

use std::fmt;

/// Failures surfaced by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Login id/email and password did not match any account.
    InvalidCredentials,
    /// The persisted session record could not be decoded.
    CorruptSessionRecord(String),
    /// The operation needs a logged-in principal and there is none.
    NoActiveSession,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::CorruptSessionRecord(detail) => {
                write!(f, "Stored session record is unreadable: {}", detail)
            }
            Self::NoActiveSession => write!(f, "No active session"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Formats an error message with title, causes, fixes and a help hint.
///
/// ```
/// use schoolhub::error::format_error;
///
/// let message = format_error(
///     "Invalid credentials",
///     &["Wrong password", "Account belongs to a different role"],
///     &["List demo accounts: schoolhub credentials"],
/// );
/// assert!(message.contains("Try these fixes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}\n\n", title);

    if !causes.is_empty() {
        output.push_str("Possible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
        output.push('\n');
    }

    if !fixes.is_empty() {
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
        output.push('\n');
    }

    output.push_str("Need help? schoolhub --help");
    output
}

/// Render a session error the way the CLI prints it.
pub fn describe(error: &SessionError) -> String {
    match error {
        SessionError::InvalidCredentials => format_error(
            "Invalid credentials. Please check your login details.",
            &[
                "Login id or email is misspelled",
                "Password is wrong",
                "Account belongs to the other role (student/teacher)",
            ],
            &[
                "List demo accounts: schoolhub credentials",
                "Pick the role explicitly: schoolhub login <ID> --password <PW> --role teacher",
            ],
        ),
        SessionError::NoActiveSession => format_error(
            "You are not logged in.",
            &["Session expired after inactivity", "You logged out"],
            &["Log in again: schoolhub login <ID> --password <PW>"],
        ),
        SessionError::CorruptSessionRecord(detail) => format_error(
            &format!("Stored session was unreadable and has been cleared ({})", detail),
            &[],
            &["Log in again: schoolhub login <ID> --password <PW>"],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error("Test Error", &["Cause 1", "Cause 2"], &["Fix 1"]);

        assert!(error.contains("[✗] Test Error"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  - Cause 2"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.ends_with("Need help? schoolhub --help"));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let error = format_error("Empty test", &[], &[]);
        assert!(!error.contains("Possible causes:"));
        assert!(!error.contains("Try these fixes:"));
    }

    #[test]
    fn test_session_error_display() {
        assert_eq!(SessionError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(SessionError::NoActiveSession.to_string(), "No active session");
        assert!(describe(&SessionError::InvalidCredentials).contains("schoolhub credentials"));
    }
}
