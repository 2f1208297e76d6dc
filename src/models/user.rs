//! User, credentials, and session models.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// User profile as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    /// Backend role name ("user", "admin", ...)
    #[serde(default)]
    pub rol: String,
    #[serde(default)]
    pub status: String,
}

impl User {
    /// Name shown in the account menu; falls back to the email.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name.trim(), self.surname.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Credentials for `POST /auth/signin`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Access token issued at sign-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Response body of `POST /auth/signin`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    #[serde(default)]
    pub ok: bool,
    pub user: User,
    pub access: AccessGrant,
}

/// An authenticated session. Token and user always travel together.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub auth_token: String,
    pub display_name: String,
    pub email: String,
    /// Full profile snapshot, persisted alongside the token
    pub user: User,
}

impl Session {
    pub fn new(user: User, auth_token: String) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.display_name(),
            email: user.email.clone(),
            auth_token,
            user,
        }
    }
}
