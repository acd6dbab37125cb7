//! Types for authentication and user management

use serde::{Deserialize, Serialize};

/// A backend user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: i64,

    /// Login name
    pub username: String,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Egyptian mobile number
    #[serde(default)]
    pub phone: Option<String>,

    /// Dashboard access
    #[serde(default)]
    pub is_staff: bool,

    #[serde(default)]
    pub is_superuser: bool,
}

/// Second step of a password reset
#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    /// Token from the reset link
    pub token: String,
    pub email: String,
    pub password: String,
}

/// Login credentials
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// Account registration form
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

/// Token-issue response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Token-refresh response; `refresh` is set when the server rotates it
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Registration response: the new account plus its tokens
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredUser {
    #[serde(flatten)]
    pub user: User,
    pub access: String,
    pub refresh: String,
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login or registration stored a new session
    SignedIn { username: String },
    /// The access token was replaced
    TokenRefreshed,
    /// The user logged out
    SignedOut,
    /// The session is gone or never existed; send the user to `redirect_to`
    LoginRequired { redirect_to: String },
}
