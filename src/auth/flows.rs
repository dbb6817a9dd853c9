//! Sign-in and session commands
//!
//! Each flow maintains the pairing the backend expects: a bearer token
//! for API calls plus a provider session for refreshes. Register and
//! login obtain both from one backend round trip; Google sign-in
//! establishes the provider session first and then tells the backend.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::api::client::{ApiRequest, SnippyClient};
use crate::config::Config;
use crate::models::AuthResponse;

use super::google;
use super::provider::{decode_jwt_claims, Identity};
use super::store::{FileTokenStore, TokenStore};

/// Install a backend-issued session: provider first, then the bearer.
/// A rejected credential leaves the store untouched.
async fn adopt_session(client: &SnippyClient, resp: &AuthResponse) -> Result<()> {
    client
        .identity_provider()
        .sign_in_with_credential(&resp.token)
        .await
        .context("Backend sign-in succeeded but the provider rejected its credential")?;
    client.token_store().set_token(&resp.token)?;
    Ok(())
}

/// Sign in against a backend auth endpoint and adopt the session.
async fn backend_sign_in(
    client: &SnippyClient,
    path: &str,
    body: serde_json::Value,
) -> Result<AuthResponse> {
    let resp: AuthResponse = client.post_json(path, &body).await?;
    adopt_session(client, &resp).await?;
    Ok(resp)
}

fn display_name(resp: &AuthResponse) -> String {
    resp.user
        .name
        .clone()
        .or_else(|| resp.user.email.clone())
        .unwrap_or_else(|| resp.user.uid.clone())
}

fn identity_label(identity: &Identity) -> String {
    identity
        .display_name
        .clone()
        .or_else(|| identity.email.clone())
        .unwrap_or_else(|| identity.uid.clone())
}

/// `register` command: create an account and sign in.
pub async fn register(name: String, email: String, password: String) -> Result<()> {
    let client = SnippyClient::new()?;
    let resp = backend_sign_in(
        &client,
        "/auth/register",
        json!({ "name": name, "email": email, "password": password }),
    )
    .await?;

    println!("Account created. Signed in as {}.", display_name(&resp));
    Ok(())
}

/// `login` command: email/password against the backend, or the Google
/// device flow with --google.
pub async fn login(email: Option<String>, password: Option<String>, google: bool) -> Result<()> {
    if google {
        return login_google().await;
    }

    let email = email.context("--email is required unless --google is given")?;
    let password = password.context("--password is required unless --google is given")?;

    let client = SnippyClient::new()?;
    let resp = backend_sign_in(
        &client,
        "/auth/login",
        json!({ "email": email, "password": password }),
    )
    .await?;

    println!("Logged in as {}.", display_name(&resp));
    Ok(())
}

/// Google sign-in: device flow, provider session, then tell the
/// backend. The backend call is best effort; the provider session
/// already authenticates API calls.
async fn login_google() -> Result<()> {
    let credential = google::acquire_credential().await?;

    let client = SnippyClient::new()?;
    let (identity, bearer) = client
        .identity_provider()
        .sign_in_federated(&credential)
        .await?;
    client.token_store().set_token(&bearer)?;

    match client
        .execute(&ApiRequest::post("/auth/google", json!({ "token": bearer })))
        .await
    {
        Ok(_) => println!("Logged in with Google as {}.", identity_label(&identity)),
        Err(e) => {
            tracing::warn!("Backend Google registration failed: {}", e);
            println!(
                "Logged in with Google as {} (backend registration failed; some features may be limited).",
                identity_label(&identity)
            );
        }
    }
    Ok(())
}

/// `logout` command: drop the provider session, tell the backend, and
/// clear the stored bearer.
pub async fn logout() -> Result<()> {
    let client = SnippyClient::new()?;
    logout_with(&client).await
}

/// Local state is cleared even when the backend call fails; a lapsed
/// session server-side must never leave a live token on disk.
pub(crate) async fn logout_with(client: &SnippyClient) -> Result<()> {
    client.identity_provider().sign_out()?;

    if let Err(e) = client.post_empty("/auth/logout").await {
        if e.is_unauthorized() {
            tracing::debug!("Backend session already invalid: {}", e);
        } else {
            tracing::warn!("Backend logout failed: {}", e);
        }
    }

    client.token_store().clear_token()?;
    println!("Logged out.");
    Ok(())
}

/// `forgot-password` command: provider reset email plus backend
/// notification, in that order.
pub async fn forgot_password(email: String) -> Result<()> {
    let email = email.trim().to_string();
    if email.is_empty() {
        bail!("email must not be empty");
    }

    let client = SnippyClient::new()?;
    client.identity_provider().send_password_reset(&email).await?;
    client
        .execute(&ApiRequest::post(
            "/auth/forgot-password",
            json!({ "email": email }),
        ))
        .await?;

    println!("Password reset email sent to {}.", email);
    Ok(())
}

/// Read the exp claim of a stored JWT bearer for display. Not a
/// validity check; the backend decides that.
fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_jwt_claims(token)?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// `status` command: local session state, no network.
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    let store = FileTokenStore::open(Config::token_path()?)?;
    let token = store.token();

    match &token {
        Some(token) => match token_expiry(token) {
            Some(expires_at) => {
                let state = if expires_at <= Utc::now() {
                    "expired"
                } else {
                    "valid"
                };
                println!(
                    "Bearer token: {} (expires {})",
                    state,
                    expires_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
            None => println!("Bearer token: present"),
        },
        None => println!("Bearer token: none"),
    }

    match &config.identity {
        Some(identity) => {
            println!(
                "Identity:     {}",
                identity.email.as_deref().unwrap_or(&identity.uid)
            );
            println!("Refresh tok:  present");
        }
        None => {
            println!("Identity:     none");
            println!("Refresh tok:  none");
        }
    }
    println!("Theme:        {}", config.current_theme());
    println!("Backend:      {}", config.api_base());

    if token.is_none() && config.identity.is_none() {
        println!("\nRun 'snippy login' to authenticate.");
    }
    Ok(())
}
