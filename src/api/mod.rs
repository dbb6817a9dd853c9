//! API client module for the Snippy backend

pub mod client;
pub mod error;
mod links;
mod me;

use anyhow::Result;
use std::path::PathBuf;

/// Create a shortened link
pub async fn shorten(
    url: String,
    slug: Option<String>,
    description: Option<String>,
    expires: Option<String>,
    one_time: bool,
) -> Result<()> {
    links::shorten(url, slug, description, expires, one_time).await
}

/// List the caller's links
pub async fn links() -> Result<()> {
    links::links().await
}

/// Show one link's analytics breakdown
pub async fn stats(slug: String) -> Result<()> {
    links::stats(slug).await
}

/// Mark a link inactive
pub async fn deactivate(slug: String) -> Result<()> {
    links::deactivate(slug).await
}

/// Delete a link
pub async fn delete(slug: String) -> Result<()> {
    links::delete(slug).await
}

/// Download a link's QR code image
pub async fn qr(slug: String, output: Option<PathBuf>) -> Result<()> {
    links::qr(slug, output).await
}

/// Show current user info
pub async fn whoami() -> Result<()> {
    me::whoami().await
}
