//! Message correlator.
//!
//! Maps a chat message id back to the media item it announced. Items
//! announced since startup sit in an in-memory cache with their full
//! enrichment; anything older falls back to the ledger, which yields a
//! degraded item (identity fields only) that is still enough to drive a
//! request. The cache is never warmed eagerly and degraded lookups are not
//! cached, so a later enriched announcement of the same item wins.

use std::collections::HashMap;

use tokio::sync::RwLock;

use marquee_common::error::AppError;
use marquee_common::types::MediaItem;

use crate::ledger::NotificationLedger;

pub struct MessageCorrelator {
    ledger: NotificationLedger,
    cache: RwLock<HashMap<i64, MediaItem>>,
}

impl MessageCorrelator {
    pub fn new(ledger: NotificationLedger) -> Self {
        Self {
            ledger,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Remember the item behind a just-sent announcement message.
    pub async fn cache_sent(&self, message_id: i64, item: MediaItem) {
        self.cache.write().await.insert(message_id, item);
    }

    /// Resolve a message id to its announced item.
    ///
    /// Cache first, ledger second; `None` for messages the bot never sent
    /// (or sent without managing to record a message id).
    pub async fn resolve(&self, message_id: i64) -> Result<Option<MediaItem>, AppError> {
        if let Some(item) = self.cache.read().await.get(&message_id) {
            return Ok(Some(item.clone()));
        }

        let Some(record) = self.ledger.find_by_message_id(message_id).await? else {
            return Ok(None);
        };
        tracing::debug!(
            message_id,
            item_url = %record.item_url,
            "Correlated reaction through the ledger"
        );
        Ok(Some(record.to_media_item()))
    }
}
