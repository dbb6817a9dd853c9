//! URL endpoints: shorten, list, analytics, deactivate, delete, QR

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

use crate::models::{Enveloped, LinkStats, ShortLink, ShortenRequest};

use super::client::SnippyClient;
use super::error::ApiError;

/// Validate shorten inputs. Rejected values never reach the backend.
fn build_shorten_request(
    original_url: &str,
    custom_slug: Option<String>,
    description: Option<String>,
    expires_at: Option<String>,
    one_time_use: bool,
) -> Result<ShortenRequest, ApiError> {
    let trimmed = original_url.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("URL must not be empty".into()));
    }
    let parsed =
        Url::parse(trimmed).map_err(|e| ApiError::Validation(format!("invalid URL: {}", e)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ApiError::Validation(format!(
            "unsupported URL scheme \"{}\"",
            parsed.scheme()
        )));
    }

    let expires_at = expires_at.map(|raw| parse_expiry(&raw)).transpose()?;

    Ok(ShortenRequest {
        original_url: trimmed.to_string(),
        custom_slug: custom_slug.filter(|s| !s.is_empty()),
        description: description.filter(|s| !s.is_empty()),
        expires_at,
        one_time_use,
    })
}

/// Accept an RFC 3339 timestamp or a bare date, taken as the end of
/// that day in UTC.
fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Some(end_of_day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(23, 59, 59))
    {
        return Ok(DateTime::from_naive_utc_and_offset(end_of_day, Utc));
    }
    Err(ApiError::Validation(format!(
        "expiry must be RFC 3339 or YYYY-MM-DD, got \"{}\"",
        raw
    )))
}

fn require_slug(slug: &str) -> Result<&str, ApiError> {
    let slug = slug.trim();
    if slug.is_empty() {
        return Err(ApiError::Validation("slug must not be empty".into()));
    }
    Ok(slug)
}

/// Create a short link and return the backend's record of it.
pub async fn shorten_data(
    client: &SnippyClient,
    request: &ShortenRequest,
) -> Result<ShortLink, ApiError> {
    let body = serde_json::to_value(request)?;
    let reply: Enveloped<ShortLink> = client.post_json("/shorten", &body).await?;
    Ok(reply.data)
}

/// List the caller's links.
pub async fn links_data(client: &SnippyClient) -> Result<Vec<ShortLink>, ApiError> {
    let reply: Enveloped<Vec<ShortLink>> = client.get_json("/user/urls").await?;
    Ok(reply.data)
}

/// Fetch one link plus its analytics breakdown.
pub async fn stats_data(client: &SnippyClient, slug: &str) -> Result<LinkStats, ApiError> {
    let reply: Enveloped<LinkStats> = client.get_json(&format!("/user/url/{}", slug)).await?;
    Ok(reply.data)
}

/// Mark a link inactive.
pub async fn deactivate_data(client: &SnippyClient, slug: &str) -> Result<(), ApiError> {
    client
        .post_empty(&format!("/url/{}/deactivate", slug))
        .await
}

/// Delete a link.
pub async fn delete_data(client: &SnippyClient, slug: &str) -> Result<(), ApiError> {
    client.delete(&format!("/url/{}", slug)).await
}

/// Fetch the QR code image for a link.
pub async fn qr_data(client: &SnippyClient, slug: &str) -> Result<Vec<u8>, ApiError> {
    client.get_bytes(&format!("/url/{}/qr", slug)).await
}

/// `shorten` command: validate inputs, create the link, print it.
pub async fn shorten(
    url: String,
    slug: Option<String>,
    description: Option<String>,
    expires: Option<String>,
    one_time: bool,
) -> Result<()> {
    let request = build_shorten_request(&url, slug, description, expires, one_time)?;
    let client = SnippyClient::new()?;
    let link = shorten_data(&client, &request).await?;

    println!();
    println!("Short URL: {}", link.short_url);
    println!("Slug:      {}", link.slug);
    println!("Original:  {}", link.original_url);
    if let Some(expires_at) = link.expires_at {
        println!("Expires:   {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
    if link.one_time_use {
        println!("One-time:  yes");
    }
    Ok(())
}

/// `links` command: list the caller's links (prints to stdout).
pub async fn links() -> Result<()> {
    let client = SnippyClient::new()?;
    let links = links_data(&client).await?;

    println!("\nYour links:");
    println!("{:-<72}", "");

    if links.is_empty() {
        println!("  (no links yet -- create one with 'snippy shorten')");
        return Ok(());
    }

    for link in &links {
        println!(
            "{:<12} {:<32} {:>6} clicks  {:<8} {}",
            link.slug,
            link.short_url,
            link.total_clicks,
            link.status(),
            link.original_url
        );
    }
    Ok(())
}

/// `stats` command: one link's analytics breakdown.
pub async fn stats(slug: String) -> Result<()> {
    let slug = require_slug(&slug)?.to_string();
    let client = SnippyClient::new()?;
    let stats = stats_data(&client, &slug).await?;

    let link = &stats.url;
    println!();
    println!("Link:        {}", link.short_url);
    println!("Original:    {}", link.original_url);
    println!("Status:      {}", link.status());
    println!("Clicks:      {}", stats.analytics.total_clicks);
    if let Some(expires_at) = link.expires_at {
        println!("Expires:     {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(description) = &link.description {
        println!("Description: {}", description);
    }

    print_breakdown("Clicks by date", &stats.analytics.clicks_by_date);
    print_breakdown("Browsers", &stats.analytics.browsers);
    print_breakdown("Platforms", &stats.analytics.platforms);
    print_breakdown("Countries", &stats.analytics.countries);
    print_breakdown("Referrers", &stats.analytics.referrers);
    Ok(())
}

fn print_breakdown(title: &str, rows: &BTreeMap<String, u64>) {
    if rows.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for (label, count) in rows {
        println!("  {:<24} {}", label, count);
    }
}

/// `deactivate` command: mark a link inactive.
pub async fn deactivate(slug: String) -> Result<()> {
    let slug = require_slug(&slug)?.to_string();
    let client = SnippyClient::new()?;
    deactivate_data(&client, &slug).await?;
    println!("Link '{}' deactivated.", slug);
    Ok(())
}

/// `delete` command: remove a link permanently.
pub async fn delete(slug: String) -> Result<()> {
    let slug = require_slug(&slug)?.to_string();
    let client = SnippyClient::new()?;
    delete_data(&client, &slug).await?;
    println!("Link '{}' deleted.", slug);
    Ok(())
}

/// `qr` command: download the QR code image for a link.
pub async fn qr(slug: String, output: Option<PathBuf>) -> Result<()> {
    let slug = require_slug(&slug)?.to_string();
    let client = SnippyClient::new()?;
    let image = qr_data(&client, &slug).await?;

    let path = output.unwrap_or_else(|| PathBuf::from(format!("qr-{}.png", slug)));
    std::fs::write(&path, &image).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("QR code saved to {} ({} bytes).", path.display(), image.len());
    Ok(())
}
