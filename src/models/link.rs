//! Shortened-link models
//!
//! All fields are backend-owned; the client only reads them. Click counts
//! in particular are never computed locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A shortened link as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub slug: String,
    pub original_url: String,
    pub short_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Derived by the backend from `expires_at`; absent on freshly created links.
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub one_time_use: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_clicks: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl ShortLink {
    /// Display status derived from the active/expired flags.
    pub fn status(&self) -> &'static str {
        if self.expired {
            "Expired"
        } else if self.active {
            "Active"
        } else {
            "Inactive"
        }
    }
}

/// Payload for `POST /shorten`. Optional fields are omitted from the JSON
/// body entirely, matching what the backend expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenRequest {
    pub original_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub one_time_use: bool,
}

/// Per-link click analytics, aggregated by the backend.
///
/// `BTreeMap` keeps dates and labels in a stable order for display;
/// `clicksByDate` keys are ISO dates so lexicographic order is
/// chronological.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAnalytics {
    #[serde(default)]
    pub clicks_by_date: BTreeMap<String, u64>,
    #[serde(default)]
    pub browsers: BTreeMap<String, u64>,
    #[serde(default)]
    pub platforms: BTreeMap<String, u64>,
    #[serde(default)]
    pub countries: BTreeMap<String, u64>,
    #[serde(default)]
    pub referrers: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_clicks: u64,
}

/// `GET /user/url/:slug` payload: the link plus its analytics breakdown.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkStats {
    pub url: ShortLink,
    pub analytics: LinkAnalytics,
}

/// Envelope used by the URL endpoints: `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Enveloped<T> {
    pub data: T,
}
