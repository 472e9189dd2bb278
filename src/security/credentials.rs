// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Principals, demo accounts, login credentials and role permissions.
//!
//! Passwords here are demo fixtures compared in the clear. This is a known
//! simplification of the sample portal, not a credential store.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use subtle::ConstantTimeEq;

/// Kind of portal user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    /// Everything this role may do.
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Student => &[
                ViewProfile,
                EditOwnProfile,
                ViewTimetable,
                ViewAssignments,
                SubmitAssignments,
                ViewGrades,
                ViewAttendance,
                ViewAnnouncements,
                ChatWithTeachers,
            ],
            Role::Teacher => &[
                ViewProfile,
                EditOwnProfile,
                ViewTimetable,
                EditTimetable,
                CreateAssignments,
                GradeAssignments,
                MarkAttendance,
                ViewStudentInfo,
                CreateAnnouncements,
                ChatWithStudents,
                ViewClassAnalytics,
            ],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("unknown role '{}' (expected student or teacher)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewProfile,
    EditOwnProfile,
    ViewTimetable,
    EditTimetable,
    ViewAssignments,
    SubmitAssignments,
    CreateAssignments,
    GradeAssignments,
    ViewGrades,
    ViewAttendance,
    MarkAttendance,
    ViewStudentInfo,
    ViewAnnouncements,
    CreateAnnouncements,
    ChatWithTeachers,
    ChatWithStudents,
    ViewClassAnalytics,
}

/// The authenticated identity attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub role: Role,
    /// Display attributes (grade, class, department, ...), opaque to the core.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Principal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            role,
            attributes: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.permissions().contains(&permission)
    }

    /// True if `login_id` names this principal by id or email.
    pub fn answers_to(&self, login_id: &str) -> bool {
        self.id == login_id || self.email.as_deref() == Some(login_id)
    }
}

/// A principal together with its demo password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub principal: Principal,
    pub password: String,
}

impl Account {
    pub fn new(principal: Principal, password: impl Into<String>) -> Self {
        Self {
            principal,
            password: password.into(),
        }
    }

    /// Id-or-email plus password check.
    pub fn matches(&self, credentials: &Credentials) -> bool {
        let password_ok: bool = self
            .password
            .as_bytes()
            .ct_eq(credentials.password.as_bytes())
            .into();
        self.principal.answers_to(&credentials.login_id) && password_ok
    }
}

/// What the login form submits.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login_id: String,
    pub password: String,
    pub role: Role,
}

impl Credentials {
    pub fn new(login_id: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            login_id: login_id.into(),
            password: password.into(),
            role,
        }
    }
}

// =============================================================================
// PASSWORD STRENGTH
// =============================================================================

static SPECIAL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("special character regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLevel {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordRequirements {
    pub min_length: bool,
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_numbers: bool,
    pub has_special_chars: bool,
}

impl PasswordRequirements {
    fn met(&self) -> u8 {
        [
            self.min_length,
            self.has_uppercase,
            self.has_lowercase,
            self.has_numbers,
            self.has_special_chars,
        ]
        .iter()
        .filter(|met| **met)
        .count() as u8
    }
}

/// Result of the informal strength check shown on the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub score: u8,
    pub requirements: PasswordRequirements,
    pub strength: StrengthLevel,
    pub is_valid: bool,
}

pub fn password_strength(password: &str) -> PasswordStrength {
    let requirements = PasswordRequirements {
        min_length: password.chars().count() >= 8,
        has_uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        has_lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        has_numbers: password.chars().any(|c| c.is_ascii_digit()),
        has_special_chars: SPECIAL_CHARS.is_match(password),
    };
    let score = requirements.met();
    let strength = match score {
        0..=1 => StrengthLevel::Weak,
        2..=3 => StrengthLevel::Medium,
        _ => StrengthLevel::Strong,
    };

    PasswordStrength {
        score,
        requirements,
        strength,
        is_valid: score >= 3,
    }
}
