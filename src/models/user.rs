//! User-related models

use serde::{Deserialize, Serialize};

/// An authenticated user, built from the backend's user record or, as a
/// fallback, from the identity provider's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(default)]
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default, rename = "emailVerified")]
    pub email_verified: bool,
}

/// `{token, user}` returned by register/login/google.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthenticatedUser,
}
