//! Fetch-and-announce cycle.
//!
//! One cycle: pull the filtered listing from the content source, keep what
//! the release filter says is new, enrich each survivor, send it, record it
//! in the ledger, prime the correlator cache. Sends go out one at a time
//! with a fixed delay in between; the outbound channel throttles bursts and
//! there is no hurry.
//!
//! A content-source outage aborts the cycle with zero announced rather than
//! erroring: the next scheduled cycle will simply try again. Per-item
//! failures (enrichment, delivery) skip that item and carry on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use marquee_clients::catalog::ContentSource;
use marquee_common::types::{MediaKind, NewNotification};

use crate::correlator::MessageCorrelator;
use crate::ledger::NotificationLedger;
use crate::messenger::Messenger;
use crate::release;
use crate::retry::send_with_retry;

/// Announce-cycle settings lifted from configuration.
#[derive(Debug, Clone)]
pub struct AnnounceSettings {
    /// Listing filter expression passed through to the source.
    pub filter: String,
    /// How many listing pages to fetch per cycle.
    pub pages: u32,
    /// Pause between consecutive announcements.
    pub send_delay: Duration,
}

pub struct Announcer {
    source: Arc<dyn ContentSource>,
    messenger: Arc<dyn Messenger>,
    ledger: NotificationLedger,
    correlator: Arc<MessageCorrelator>,
    settings: AnnounceSettings,
}

impl Announcer {
    pub fn new(
        source: Arc<dyn ContentSource>,
        messenger: Arc<dyn Messenger>,
        ledger: NotificationLedger,
        correlator: Arc<MessageCorrelator>,
        settings: AnnounceSettings,
    ) -> Self {
        Self {
            source,
            messenger,
            ledger,
            correlator,
            settings,
        }
    }

    /// Run one cycle. Returns how many announcements went out.
    pub async fn send_new_releases(&self) -> anyhow::Result<u32> {
        let mut fetched = Vec::new();
        for page in 1..=self.settings.pages {
            match self.source.fetch_filtered(&self.settings.filter, page).await {
                Ok(items) => fetched.extend(items),
                Err(err) => {
                    tracing::error!(page, error = %err, "Content source fetch failed, aborting cycle");
                    return Ok(0);
                }
            }
        }

        let urls: Vec<String> = fetched.iter().map(|item| item.url.clone()).collect();
        let known = self.ledger.notified_items(&urls).await?;
        let today = Local::now().date_naive();
        let fresh = release::filter_new(fetched, |url| known.contains(url), today);

        if fresh.is_empty() {
            tracing::info!("No new releases this cycle");
            return Ok(0);
        }
        tracing::info!(count = fresh.len(), "Announcing new releases");

        let mut announced = 0u32;
        for item in fresh {
            let item = match self.source.enrich(&item).await {
                Ok(enriched) => enriched,
                Err(err) => {
                    // Not recorded, so the next cycle picks it up again.
                    tracing::warn!(title = %item.title, error = %err, "Enrichment failed, skipping item");
                    continue;
                }
            };

            let message_id = match send_with_retry(|| self.messenger.send_release(&item)).await {
                Ok(id) => id,
                Err(err) => {
                    tracing::error!(title = %item.title, error = %err, "Announcement delivery failed");
                    continue;
                }
            };

            let season = match item.kind {
                MediaKind::Series => item.season_count,
                MediaKind::Movie => None,
            };
            let inserted = self
                .ledger
                .record(&NewNotification {
                    item_url: item.url.clone(),
                    title: item.title.clone(),
                    kind: item.kind,
                    season,
                    message_id: Some(message_id),
                })
                .await?;
            if !inserted {
                tracing::warn!(item_url = %item.url, "Announcement raced an existing ledger row");
            }

            tracing::info!(title = %item.title, message_id, "Announced");
            self.correlator.cache_sent(message_id, item).await;
            announced += 1;

            tokio::time::sleep(self.settings.send_delay).await;
        }

        Ok(announced)
    }
}
