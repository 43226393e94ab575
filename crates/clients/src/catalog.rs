use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use marquee_common::types::{MediaItem, MediaKind};

/// Errors from the content source. Callers treat both as "source
/// unreachable"; the distinction only matters for logs.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("content source unreachable: {0}")]
    Http(String),

    #[error("unexpected content source response: {0}")]
    Decode(String),
}

/// The catalog of releases the bot announces from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch one page of the filtered release listing.
    async fn fetch_filtered(&self, filter: &str, page: u32) -> Result<Vec<MediaItem>, SourceError>;

    /// Fetch detail fields (score, poster, synopsis, season count, ids) for
    /// an item and return an enriched copy. The input item is untouched.
    async fn enrich(&self, item: &MediaItem) -> Result<MediaItem, SourceError>;
}

/// One entry of the listing endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingEntry {
    url: String,
    title: String,
    #[serde(rename = "type")]
    kind: MediaKind,
    /// Display text, e.g. "Opened December 25, 2024" or "Premieres Mar 3".
    release_date: Option<String>,
    season_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    results: Vec<ListingEntry>,
}

/// Detail endpoint payload; everything is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleDetail {
    score: Option<f64>,
    poster_url: Option<String>,
    synopsis: Option<String>,
    tmdb_id: Option<i64>,
    season_count: Option<i64>,
    request_id: Option<i64>,
}

/// HTTP client for the content source's JSON API.
pub struct CatalogClient {
    http: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentSource for CatalogClient {
    async fn fetch_filtered(&self, filter: &str, page: u32) -> Result<Vec<MediaItem>, SourceError> {
        let url = format!("{}/api/listing", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("filter", filter), ("page", &page.to_string())])
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let listing: ListingPage = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        tracing::debug!(filter, page, count = listing.results.len(), "Fetched listing page");

        let items = listing
            .results
            .into_iter()
            .map(|entry| {
                let mut item = MediaItem::new(
                    entry.url,
                    entry.title,
                    entry.kind,
                    entry.release_date.unwrap_or_default(),
                );
                item.season_count = entry.season_count;
                item
            })
            .collect();
        Ok(items)
    }

    async fn enrich(&self, item: &MediaItem) -> Result<MediaItem, SourceError> {
        let url = format!("{}/api/title", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("url", item.url.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let detail: TitleDetail = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        let mut enriched = item.clone();
        enriched.score = detail.score;
        enriched.poster_url = detail.poster_url;
        enriched.synopsis = detail.synopsis;
        enriched.tmdb_id = detail.tmdb_id;
        enriched.request_id = detail.request_id;
        // The detail page knows more seasons than the listing tile does.
        enriched.season_count = detail.season_count.or(item.season_count);
        Ok(enriched)
    }
}
