//! User account and session models.
//!
//! # Invariants
//! - Users are unique by `id`, `username` and `email`.
//! - `password` is stored as provided; hashing is the caller's concern.
//! - A session is live while `update_at` is within the caller's expiry window.

use super::{new_id, now_millis, require_non_empty, IdType, JsonMap, ValidationError};
use serde::{Deserialize, Serialize};

/// Account entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Never serialized outward.
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(skip_serializing, default)]
    pub mfa_secret: String,
    #[serde(default)]
    pub auth_service: String,
    #[serde(default)]
    pub auth_data: String,
    #[serde(default)]
    pub props: JsonMap,
    pub create_at: i64,
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_guest: bool,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(IdType::User),
            username: username.into(),
            email: email.into(),
            password: String::new(),
            mfa_secret: String::new(),
            auth_service: String::new(),
            auth_data: String::new(),
            props: JsonMap::new(),
            create_at: now,
            update_at: now,
            delete_at: 0,
            is_bot: false,
            is_guest: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("user", "id", &self.id)?;
        require_non_empty("user", "username", &self.username)?;
        require_non_empty("user", "email", &self.email)?;
        Ok(())
    }
}

/// Authentication token bound to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub auth_service: String,
    #[serde(default)]
    pub props: JsonMap,
    pub create_at: i64,
    pub update_at: i64,
}

impl Session {
    /// Creates a session with fresh id and token for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(IdType::Session),
            token: new_id(IdType::Token),
            user_id: user_id.into(),
            auth_service: String::new(),
            props: JsonMap::new(),
            create_at: now,
            update_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("session", "id", &self.id)?;
        require_non_empty("session", "token", &self.token)?;
        require_non_empty("session", "user_id", &self.user_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, User};

    #[test]
    fn password_is_not_serialized() {
        let mut user = User::new("alice", "alice@example.com");
        user.password = "secret-hash".to_string();
        let json = serde_json::to_string(&user).expect("user should serialize");
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"username\":\"alice\""));
    }

    #[test]
    fn new_session_has_distinct_id_and_token() {
        let session = Session::new("u1");
        assert!(session.id.starts_with('s'));
        assert!(session.token.starts_with('k'));
        session.validate().expect("fresh session should be valid");
    }
}
