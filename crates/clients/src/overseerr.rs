use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use marquee_common::types::{Availability, MediaKind};

#[derive(Debug, Error)]
pub enum RequestServiceError {
    #[error("no matching title on the request service")]
    NotFound,

    #[error("request service unreachable: {0}")]
    Unreachable(String),

    #[error("request service returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// One search result, already narrowed to an exact title match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub id: i64,
    pub year: Option<i32>,
    pub kind: MediaKind,
}

/// Details of a known title, as far as the orchestrator cares.
#[derive(Debug, Clone)]
pub struct MediaDetails {
    pub season_count: Option<i64>,
    pub tmdb_id: Option<i64>,
    pub availability: Availability,
}

/// The media-request service the bot files requests against.
#[async_trait]
pub trait RequestService: Send + Sync {
    /// Exact-title search (case-insensitive). An empty result means the
    /// service does not know the title.
    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchHit>, RequestServiceError>;

    async fn get_details(
        &self,
        id: i64,
        kind: MediaKind,
    ) -> Result<MediaDetails, RequestServiceError>;

    async fn request_movie(&self, id: i64) -> Result<(), RequestServiceError>;

    /// Request specific seasons of a series. Never called with an empty
    /// list; requesting everything at once is deliberately unsupported.
    async fn request_series(&self, id: i64, seasons: &[i64]) -> Result<(), RequestServiceError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResult {
    id: i64,
    media_type: String,
    /// Movies carry `title`; series carry `name`.
    title: Option<String>,
    name: Option<String>,
    /// Movies carry `releaseDate`; series carry `firstAirDate`.
    release_date: Option<String>,
    first_air_date: Option<String>,
}

impl SearchResult {
    fn kind(&self) -> Option<MediaKind> {
        match self.media_type.as_str() {
            "movie" => Some(MediaKind::Movie),
            "tv" => Some(MediaKind::Series),
            _ => None,
        }
    }

    fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }

    fn year(&self) -> Option<i32> {
        let date = self.release_date.as_deref().or(self.first_air_date.as_deref())?;
        date.get(..4)?.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitleResponse {
    id: i64,
    number_of_seasons: Option<i64>,
    media_info: Option<MediaInfo>,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    status: Option<i64>,
}

/// Map the service's numeric media status to an availability.
///
/// Partially available (4) means some seasons are in the library, so for a
/// series there is still something left to request; for a movie there is not.
fn availability_from_status(status: Option<i64>, kind: MediaKind) -> Availability {
    match (status, kind) {
        (Some(5), _) => Availability::Available,
        (Some(4), MediaKind::Movie) => Availability::Available,
        (Some(4), MediaKind::Series) => Availability::Unavailable,
        (Some(3), _) => Availability::Requested,
        (Some(2), _) => Availability::Pending,
        _ => Availability::Unavailable,
    }
}

/// Client for an Overseerr-compatible request service (v1 API).
pub struct OverseerrClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OverseerrClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn check(&self, response: Response) -> Result<Response, RequestServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(RequestServiceError::NotFound);
        }
        let message = response.text().await.unwrap_or_default();
        Err(RequestServiceError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RequestService for OverseerrClient {
    async fn search_by_title(&self, title: &str) -> Result<Vec<SearchHit>, RequestServiceError> {
        let url = format!("{}/api/v1/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[("query", title), ("page", "1")])
            .send()
            .await
            .map_err(|e| RequestServiceError::Unreachable(e.to_string()))?;
        let response = self.check(response).await?;

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| RequestServiceError::Unreachable(e.to_string()))?;

        let wanted = title.to_lowercase();
        let hits: Vec<SearchHit> = search
            .results
            .iter()
            .filter(|r| {
                r.display_title()
                    .is_some_and(|t| t.to_lowercase() == wanted)
            })
            .filter_map(|r| {
                Some(SearchHit {
                    id: r.id,
                    year: r.year(),
                    kind: r.kind()?,
                })
            })
            .collect();

        tracing::debug!(title, hits = hits.len(), "Searched request service");
        Ok(hits)
    }

    async fn get_details(
        &self,
        id: i64,
        kind: MediaKind,
    ) -> Result<MediaDetails, RequestServiceError> {
        let path = match kind {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        };
        let url = format!("{}/api/v1/{}/{}", self.base_url, path, id);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| RequestServiceError::Unreachable(e.to_string()))?;
        let response = self.check(response).await?;

        let detail: TitleResponse = response
            .json()
            .await
            .map_err(|e| RequestServiceError::Unreachable(e.to_string()))?;

        let status = detail.media_info.as_ref().and_then(|m| m.status);
        Ok(MediaDetails {
            season_count: detail.number_of_seasons,
            tmdb_id: Some(detail.id),
            availability: availability_from_status(status, kind),
        })
    }

    async fn request_movie(&self, id: i64) -> Result<(), RequestServiceError> {
        let url = format!("{}/api/v1/request", self.base_url);
        let payload = json!({ "mediaType": "movie", "mediaId": id });
        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RequestServiceError::Unreachable(e.to_string()))?;
        self.check(response).await?;
        tracing::info!(id, "Movie request filed");
        Ok(())
    }

    async fn request_series(&self, id: i64, seasons: &[i64]) -> Result<(), RequestServiceError> {
        let url = format!("{}/api/v1/request", self.base_url);
        let payload = json!({ "mediaType": "tv", "mediaId": id, "seasons": seasons });
        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RequestServiceError::Unreachable(e.to_string()))?;
        self.check(response).await?;
        tracing::info!(id, ?seasons, "Series request filed");
        Ok(())
    }
}
