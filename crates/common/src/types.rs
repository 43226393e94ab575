use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of catalog entry the content source lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Series => write!(f, "series"),
        }
    }
}

/// Availability of a title on the media-request service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Fully downloaded and watchable.
    Available,
    /// Requested and approved; being fetched.
    Requested,
    /// Requested, awaiting approval.
    Pending,
    /// Not in the library and not requested.
    Unavailable,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Requested => write!(f, "requested"),
            Availability::Pending => write!(f, "pending"),
            Availability::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// A media item as fetched from the content source.
///
/// The listing endpoint fills the identity fields; `release_text` stays
/// whatever display string the source rendered ("Opened December 25, 2024",
/// "Premieres Mar 3"). Detail fields are populated later by enrichment and
/// stay `None` until then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable source URL; the item's identifier everywhere in the system.
    pub url: String,
    pub title: String,
    pub kind: MediaKind,
    /// Free-form release date text as shown by the source.
    pub release_text: String,
    /// Year of the parsed release date, once the release filter has run.
    pub release_year: Option<i32>,
    /// Number of seasons the source knows about (series only).
    pub season_count: Option<i64>,
    pub tmdb_id: Option<i64>,
    /// Id of the title on the media-request service, when already known.
    pub request_id: Option<i64>,
    pub availability: Option<Availability>,
    pub score: Option<f64>,
    pub poster_url: Option<String>,
    pub synopsis: Option<String>,
}

impl MediaItem {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        kind: MediaKind,
        release_text: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            kind,
            release_text: release_text.into(),
            release_year: None,
            season_count: None,
            tmdb_id: None,
            request_id: None,
            availability: None,
            score: None,
            poster_url: None,
            synopsis: None,
        }
    }
}

/// One row of the notification ledger: a single announcement that was sent.
///
/// A movie has exactly one row; a series may have one row per season ever
/// announced (`season` is NULL for movies).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: String,
    pub item_url: String,
    pub title: String,
    pub kind: MediaKind,
    pub season: Option<i64>,
    /// Chat message id of the announcement, used for reaction correlation.
    pub message_id: Option<i64>,
    pub notified_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Rebuild a minimal [`MediaItem`] from a ledger row.
    ///
    /// Ledger rows keep only what is needed to drive a request after a
    /// restart; enrichment fields are gone and stay `None`.
    pub fn to_media_item(&self) -> MediaItem {
        let mut item = MediaItem::new(self.item_url.clone(), self.title.clone(), self.kind, "");
        item.season_count = self.season;
        item
    }
}

/// Parameters for recording a sent announcement in the ledger.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub item_url: String,
    pub title: String,
    pub kind: MediaKind,
    pub season: Option<i64>,
    pub message_id: Option<i64>,
}

/// Ledger totals, broken down by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub total: i64,
    pub movies: i64,
    pub series: i64,
}
