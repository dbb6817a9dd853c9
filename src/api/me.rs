//! Current-user endpoint (/auth/me)

use anyhow::Result;
use serde::Deserialize;

use crate::models::AuthenticatedUser;

use super::client::SnippyClient;

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: AuthenticatedUser,
}

/// Fetch and display the current user record.
pub async fn whoami() -> Result<()> {
    let client = SnippyClient::new()?;

    let user = match client.get_json::<MeResponse>("/auth/me").await {
        Ok(me) => me.user,
        Err(e) => {
            // The provider identity still names the account when the
            // backend is unreachable or the session lapsed.
            match client.identity_provider().current_identity() {
                Some(identity) => {
                    tracing::warn!("Falling back to provider identity: {}", e);
                    AuthenticatedUser::from(&identity)
                }
                None => return Err(e.into()),
            }
        }
    };

    println!();
    println!("Name:     {}", user.name.as_deref().unwrap_or("(none)"));
    println!("Email:    {}", user.email.as_deref().unwrap_or("(none)"));
    println!("Verified: {}", if user.email_verified { "yes" } else { "no" });
    if let Some(photo) = &user.photo_url {
        println!("Photo:    {}", photo);
    }
    println!("UID:      {}", user.uid);

    Ok(())
}
