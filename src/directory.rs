// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Demo account directory.
//!
//! Seeds the sample students and teachers into the store once and serves them
//! as login candidates. Stored shape:
//! `{"students":[{"id":"STU001",...,"password":"student123"}],"teachers":[...]}`

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::security::credentials::{Account, Principal, Role};
use crate::storage::{self, keys, KeyValueStore, Stored};

/// One stored demo user. Role comes from the list it sits in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoUser {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    password: String,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl DemoUser {
    fn into_account(self, role: Role) -> Account {
        let principal = Principal {
            id: self.id,
            name: self.name,
            email: self.email,
            role,
            attributes: self.attributes,
        };
        Account::new(principal, self.password)
    }

    fn merge(&mut self, changes: &Map<String, Value>) {
        for (key, value) in changes {
            match (key.as_str(), value) {
                ("id", _) | ("type", _) => {}
                ("name", Value::String(name)) => self.name = name.clone(),
                ("email", Value::String(email)) => self.email = Some(email.clone()),
                ("email", Value::Null) => self.email = None,
                ("password", Value::String(password)) => self.password = password.clone(),
                ("name", _) | ("password", _) | ("email", _) => {
                    tracing::debug!("PROFILE_FIELD_IGNORED | user={} field={}", self.id, key);
                }
                _ => {
                    self.attributes.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DemoUsers {
    #[serde(default)]
    students: Vec<DemoUser>,
    #[serde(default)]
    teachers: Vec<DemoUser>,
}

impl DemoUsers {
    fn list(&self, role: Role) -> &[DemoUser] {
        match role {
            Role::Student => &self.students,
            Role::Teacher => &self.teachers,
        }
    }
}

fn user(record: Value) -> Option<DemoUser> {
    serde_json::from_value(record).ok()
}

fn sample_users() -> DemoUsers {
    let students = [
        json!({
            "id": "STU001",
            "name": "Alex Johnson",
            "email": "alex.johnson@school.edu",
            "password": "student123",
            "grade": "10",
            "class": "10A",
            "phone": "+1234567890",
            "address": "123 Student St, City, State",
            "parentContact": "parent@email.com",
            "enrollmentDate": "2023-09-01",
            "subjects": ["Mathematics", "Physics", "Chemistry", "English", "History"]
        }),
        json!({
            "id": "STU002",
            "name": "Emma Wilson",
            "email": "emma.wilson@school.edu",
            "password": "student123",
            "grade": "11",
            "class": "11B",
            "phone": "+1234567891",
            "address": "456 Scholar Ave, City, State",
            "parentContact": "emma.parent@email.com",
            "enrollmentDate": "2022-09-01",
            "subjects": ["Mathematics", "Biology", "Chemistry", "English", "History"]
        }),
    ];
    let teachers = [
        json!({
            "id": "TEACH001",
            "name": "Dr. Sarah Wilson",
            "email": "sarah.wilson@school.edu",
            "password": "teacher123",
            "subjects": ["Mathematics", "Physics"],
            "classes": ["10A", "10B", "11A"],
            "department": "Science",
            "qualification": "Ph.D. in Mathematics",
            "experience": "8 years",
            "phone": "+1234567892",
            "office": "Room 301"
        }),
        json!({
            "id": "TEACH002",
            "name": "Prof. Michael Chen",
            "email": "michael.chen@school.edu",
            "password": "teacher123",
            "subjects": ["Chemistry", "Biology"],
            "classes": ["10A", "11B", "12A"],
            "department": "Science",
            "qualification": "M.S. in Chemistry",
            "experience": "12 years",
            "phone": "+1234567893",
            "office": "Room 205"
        }),
    ];

    DemoUsers {
        students: students.into_iter().filter_map(user).collect(),
        teachers: teachers.into_iter().filter_map(user).collect(),
    }
}

/// Sample accounts backed by the key-value store.
#[derive(Clone)]
pub struct DemoDirectory {
    store: Arc<dyn KeyValueStore>,
}

impl DemoDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Write the sample accounts unless already done. Returns whether it seeded.
    pub fn seed_if_needed(&self) -> bool {
        if matches!(self.store.get(keys::DEMO_INITIALIZED), Ok(Some(_))) {
            return false;
        }

        let users = sample_users();
        tracing::info!(
            "DEMO_SEEDED | students={} teachers={}",
            users.students.len(),
            users.teachers.len()
        );
        storage::write_json(self.store.as_ref(), keys::DEMO_USERS, &users);
        if let Err(e) = self.store.set(keys::DEMO_INITIALIZED, "true") {
            tracing::warn!("STORE_WRITE_FAILED | key={} error={:#}", keys::DEMO_INITIALIZED, e);
        }
        true
    }

    fn load(&self) -> DemoUsers {
        match storage::read_json(self.store.as_ref(), keys::DEMO_USERS) {
            Stored::Present(users) => users,
            Stored::Missing => DemoUsers::default(),
            Stored::Corrupt(detail) => {
                tracing::warn!("DEMO_USERS_CORRUPT | treating as empty | error={}", detail);
                DemoUsers::default()
            }
        }
    }

    /// Every account of `role`, in seed order.
    pub fn accounts(&self, role: Role) -> Vec<Account> {
        self.load()
            .list(role)
            .iter()
            .cloned()
            .map(|u| u.into_account(role))
            .collect()
    }

    /// Every account, students first.
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut all = self.accounts(Role::Student);
        all.extend(self.accounts(Role::Teacher));
        all
    }

    /// Look up by id or email within one role.
    pub fn find(&self, role: Role, login_id: &str) -> Option<Account> {
        self.accounts(role)
            .into_iter()
            .find(|a| a.principal.answers_to(login_id))
    }

    /// Merge `changes` into the stored user with `user_id`.
    ///
    /// `id` and `type` are never changed. Returns false if no user matched.
    pub fn update_profile(&self, user_id: &str, changes: &Map<String, Value>) -> bool {
        let mut users = self.load();
        let target = users
            .students
            .iter_mut()
            .chain(users.teachers.iter_mut())
            .find(|u| u.id == user_id);

        match target {
            Some(user) => {
                user.merge(changes);
                tracing::info!("PROFILE_UPDATED | user={} fields={}", user_id, changes.len());
                storage::write_json(self.store.as_ref(), keys::DEMO_USERS, &users)
            }
            None => false,
        }
    }

    /// Wipe demo users, the session record and the security log, then reseed.
    pub fn reset(&self) {
        for key in [
            keys::DEMO_INITIALIZED,
            keys::DEMO_USERS,
            keys::SESSION,
            keys::SECURITY_LOG,
        ] {
            storage::remove_quietly(self.store.as_ref(), key);
        }
        tracing::info!("DEMO_RESET | cleared demo users, session and security log");
        self.seed_if_needed();
    }
}
