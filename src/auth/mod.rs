//! Authentication for the Snippy backend
//!
//! Email/password sign-in runs through the backend, which answers with
//! a bearer token plus a sign-in credential for the hosted identity
//! provider. Google sign-in runs the OAuth2 device code flow instead.
//! Either way the bearer token lands in the token store and the
//! provider session is persisted via the config file.

pub mod flows;
pub mod google;
pub mod provider;
pub mod store;

pub use flows::{forgot_password, login, logout, register, status};
pub use provider::{HostedIdentityProvider, Identity, IdentityProvider};
pub use store::{FileTokenStore, TokenStore};

/// Google OAuth client configuration for the device flow
pub struct GoogleAuthConfig {
    /// OAuth2 client ID (limited-input device client)
    pub client_id: &'static str,
    /// Client secret; not treated as confidential for device clients
    pub client_secret: &'static str,
}

impl GoogleAuthConfig {
    /// Device client registered for the Snippy CLI
    pub fn device() -> Self {
        Self {
            client_id: "740987283799-5c7hbd2f0kfm9vfa41u3rdpjn0sg8u2t.apps.googleusercontent.com",
            client_secret: "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",
        }
    }
}

impl Default for GoogleAuthConfig {
    fn default() -> Self {
        Self::device()
    }
}
