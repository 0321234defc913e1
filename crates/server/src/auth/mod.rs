//! # Credential Checks
//!
//! `/login` verifies a username and password against a [`CredentialStore`]. The
//! server ships a static table read from the `users` section of the config.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::warn;

/// One row of the credential table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserEntry {
    pub password: String,
    pub role: String,
}

/// Why a login was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    UnknownUser,
    InvalidPassword,
}

impl LoginFailure {
    pub fn message(&self) -> &'static str {
        match self {
            LoginFailure::UnknownUser => "User not found",
            LoginFailure::InvalidPassword => "Invalid password",
        }
    }
}

/// Looks up users and checks their passwords.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Returns the user's role when the credentials match.
    async fn verify(&self, username: &str, password: &str) -> Result<String, LoginFailure>;
}

/// A fixed username → (password, role) table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    users: HashMap<String, UserEntry>,
}

impl StaticCredentialStore {
    /// Users without a password are left out, so an unset `${VAR}` never
    /// becomes an empty password that anyone can match.
    pub fn new(users: HashMap<String, UserEntry>) -> Self {
        let users = users
            .into_iter()
            .filter(|(name, entry)| {
                let keep = !entry.password.is_empty();
                if !keep {
                    warn!("User '{name}' has no password and is disabled.");
                }
                keep
            })
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn verify(&self, username: &str, password: &str) -> Result<String, LoginFailure> {
        let user = self.users.get(username).ok_or(LoginFailure::UnknownUser)?;
        if user.password != password {
            return Err(LoginFailure::InvalidPassword);
        }
        Ok(user.role.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StaticCredentialStore {
        let mut users = HashMap::new();
        users.insert(
            "admin".to_string(),
            UserEntry {
                password: "admin123".into(),
                role: "admin".into(),
            },
        );
        users.insert(
            "guest".to_string(),
            UserEntry {
                password: String::new(),
                role: "user".into(),
            },
        );
        StaticCredentialStore::new(users)
    }

    #[tokio::test]
    async fn test_verify() {
        let store = store();
        assert_eq!(store.verify("admin", "admin123").await, Ok("admin".into()));
        assert_eq!(
            store.verify("admin", "nope").await,
            Err(LoginFailure::InvalidPassword)
        );
        assert_eq!(
            store.verify("ghost", "admin123").await,
            Err(LoginFailure::UnknownUser)
        );
        assert_eq!(store.verify("guest", "").await, Err(LoginFailure::UnknownUser));
        assert_eq!(store.len(), 1);
    }
}
