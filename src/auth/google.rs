//! OAuth2 device code flow for Google sign-in
//!
//! A terminal cannot host the provider's sign-in popup, so federated
//! sign-in runs the device code flow instead: print a verification URL
//! and user code, poll the token endpoint until the user approves, and
//! hand the resulting OpenID Connect id_token to the identity provider
//! adapter.

use anyhow::{Context, Result};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, Client, ClientId, ClientSecret, DeviceAuthorizationUrl, ExtraTokenFields, Scope,
    StandardDeviceAuthorizationResponse, StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use super::provider::FederatedCredential;
use super::GoogleAuthConfig;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEVICE_URL: &str = "https://oauth2.googleapis.com/device/code";

/// Extra fields of Google's token endpoint: the OpenID Connect
/// id_token arrives next to the plain OAuth2 access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenFields {
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type GoogleClient = Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Build the OAuth2 client from a GoogleAuthConfig
fn build_client(auth_config: &GoogleAuthConfig) -> Result<GoogleClient> {
    let auth_url = AuthUrl::new(AUTH_URL.to_string())?;
    let token_url = TokenUrl::new(TOKEN_URL.to_string())?;
    let device_url = DeviceAuthorizationUrl::new(DEVICE_URL.to_string())?;

    Ok(GoogleClient::new(
        ClientId::new(auth_config.client_id.to_string()),
        Some(ClientSecret::new(auth_config.client_secret.to_string())),
        auth_url,
        Some(token_url),
    )
    .set_device_authorization_url(device_url))
}

/// Run the device code flow and return the Google id_token.
pub async fn acquire_credential() -> Result<FederatedCredential> {
    let auth_config = GoogleAuthConfig::default();
    let client = build_client(&auth_config)?;

    tracing::info!("Initiating Google device code flow...");

    let device_auth: StandardDeviceAuthorizationResponse = client
        .exchange_device_code()?
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .request_async(oauth2::reqwest::async_http_client)
        .await
        .context("Failed to request device code")?;

    println!();
    println!(
        "To sign in with Google, visit: {}",
        device_auth.verification_uri().as_str()
    );
    println!(
        "Enter code:                    {}",
        device_auth.user_code().secret()
    );
    println!();

    tracing::info!("Waiting for authorization...");

    let token_response = client
        .exchange_device_access_token(&device_auth)
        .request_async(oauth2::reqwest::async_http_client, tokio::time::sleep, None)
        .await
        .context("Failed to exchange device code for tokens")?;

    let id_token = token_response
        .extra_fields()
        .id_token
        .clone()
        .context("Google token response carried no id_token")?;

    Ok(FederatedCredential { id_token })
}
