//! Notification ledger.
//!
//! Durable, append-only record of every announcement ever sent. The ledger
//! is the only dedup authority in the system: an item is announced at most
//! once per season, enforced by a unique index over
//! `(item_url, COALESCE(season, 0))` so the guarantee holds across restarts
//! and concurrent writers. Rows are never updated or deleted.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use marquee_common::error::AppError;
use marquee_common::types::{LedgerCounts, NewNotification, NotificationRecord};

const RECORD_COLUMNS: &str = "id, item_url, title, kind, season, message_id, notified_at";

#[derive(Clone)]
pub struct NotificationLedger {
    pool: SqlitePool,
}

impl NotificationLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a sent announcement.
    ///
    /// Returns `true` if a row was inserted, `false` if the (item, season)
    /// pair was already recorded. `INSERT OR IGNORE` makes the check and the
    /// insert one atomic statement, so two racing writers cannot both win.
    pub async fn record(&self, params: &NewNotification) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO notifications (id, item_url, title, kind, season, message_id, notified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&params.item_url)
        .bind(&params.title)
        .bind(params.kind)
        .bind(params.season)
        .bind(params.message_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if !inserted {
            tracing::debug!(
                item_url = %params.item_url,
                season = ?params.season,
                "Duplicate announcement suppressed"
            );
        }
        Ok(inserted)
    }

    /// Whether the item was ever announced. With `season = None` any prior
    /// record counts; with `Some(n)` only that season's record counts.
    pub async fn has_notified(&self, item_url: &str, season: Option<i64>) -> Result<bool, AppError> {
        let (count,): (i64,) = match season {
            Some(season) => {
                sqlx::query_as(
                    "SELECT COUNT(*) FROM notifications WHERE item_url = ? AND COALESCE(season, 0) = ?",
                )
                .bind(item_url)
                .bind(season)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE item_url = ?")
                    .bind(item_url)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count > 0)
    }

    /// Highest season ever announced for an item, `None` if no record has a
    /// season (movies, or never announced).
    pub async fn highest_notified_season(&self, item_url: &str) -> Result<Option<i64>, AppError> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(season) FROM notifications WHERE item_url = ?")
                .bind(item_url)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    /// Which of the given item URLs already have any ledger record. One
    /// query for the whole listing, not one per item.
    pub async fn notified_items(&self, urls: &[String]) -> Result<HashSet<String>, AppError> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = vec!["?"; urls.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT item_url FROM notifications WHERE item_url IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, (String,)>(&sql);
        for url in urls {
            query = query.bind(url);
        }

        let known = query.fetch_all(&self.pool).await?;
        Ok(known.into_iter().map(|(url,)| url).collect())
    }

    /// Most recent announcements, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<NotificationRecord>, AppError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM notifications ORDER BY notified_at DESC, id DESC LIMIT ?"
        );
        let records = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Look up the announcement behind a chat message id.
    pub async fn find_by_message_id(
        &self,
        message_id: i64,
    ) -> Result<Option<NotificationRecord>, AppError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM notifications WHERE message_id = ? LIMIT 1");
        let record = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// All announcements that have a chat message id, keyed by it. Used for
    /// the startup report; reaction correlation resolves lazily instead.
    pub async fn tracked_messages(&self) -> Result<HashMap<i64, NotificationRecord>, AppError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM notifications WHERE message_id IS NOT NULL");
        let records = sqlx::query_as::<_, NotificationRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|record| record.message_id.map(|id| (id, record)))
            .collect())
    }

    /// Ledger totals for the stats command.
    pub async fn counts(&self) -> Result<LedgerCounts, AppError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.pool)
            .await?;
        let (movies,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE kind = 'movie'")
                .fetch_one(&self.pool)
                .await?;
        let (series,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE kind = 'series'")
                .fetch_one(&self.pool)
                .await?;
        Ok(LedgerCounts {
            total,
            movies,
            series,
        })
    }
}
