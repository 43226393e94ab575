//! Request orchestrator.
//!
//! Turns a correlated reaction into a request against the media-request
//! service: resolve the service's id for the item, check what the service
//! already has, request what is missing, report the outcome back to the
//! chat. Availability is re-read on every trigger, so a second reaction on
//! an already-requested item short-circuits without a duplicate request; no
//! lock is involved.

use std::sync::Arc;

use marquee_clients::overseerr::{RequestService, RequestServiceError, SearchHit};
use marquee_common::types::{Availability, MediaItem, MediaKind};

use crate::messenger::Messenger;
use crate::retry::send_with_retry;

/// Terminal state of one triggered request flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The service already has it; nothing was requested.
    AlreadyAvailable,
    /// Someone already requested it; nothing was requested.
    AlreadyPending,
    /// A request was filed. For series, the season that was requested.
    Requested { season: Option<i64> },
    /// The service does not know the title at all.
    NotFound,
    /// The service failed mid-flow. A repeat reaction starts over.
    Failed,
}

pub struct RequestOrchestrator {
    requests: Arc<dyn RequestService>,
    messenger: Arc<dyn Messenger>,
}

impl RequestOrchestrator {
    pub fn new(requests: Arc<dyn RequestService>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            requests,
            messenger,
        }
    }

    /// Drive one triggered item through the whole flow.
    ///
    /// Never returns an error: every failure is folded into the outcome and
    /// reported to the chat, and a later reaction simply runs the flow again.
    pub async fn run(&self, item: &MediaItem, requested_by: Option<&str>) -> RequestOutcome {
        let request_id = match self.resolve_request_id(item).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::info!(title = %item.title, "Title not known to the request service");
                self.report(format!(
                    "Couldn't find \"{}\" on the request server.",
                    item.title
                ))
                .await;
                return RequestOutcome::NotFound;
            }
            Err(err) => {
                tracing::warn!(title = %item.title, error = %err, "Request service lookup failed");
                self.report(format!(
                    "Couldn't reach the request server for \"{}\", try again later.",
                    item.title
                ))
                .await;
                return RequestOutcome::Failed;
            }
        };

        let details = match self.requests.get_details(request_id, item.kind).await {
            Ok(details) => details,
            Err(err) => {
                tracing::warn!(request_id, error = %err, "Status check failed");
                self.report(format!(
                    "Couldn't reach the request server for \"{}\", try again later.",
                    item.title
                ))
                .await;
                return RequestOutcome::Failed;
            }
        };

        match details.availability {
            Availability::Available => {
                self.report(format!("\"{}\" is already available.", item.title))
                    .await;
                return RequestOutcome::AlreadyAvailable;
            }
            Availability::Requested | Availability::Pending => {
                self.report(format!(
                    "\"{}\" has already been requested and is on its way.",
                    item.title
                ))
                .await;
                return RequestOutcome::AlreadyPending;
            }
            Availability::Unavailable => {}
        }

        let season = match item.kind {
            MediaKind::Movie => None,
            MediaKind::Series => {
                // Latest season only, never the whole series. The listing
                // usually knows the count; the service's own details are the
                // fallback.
                match item.season_count.or(details.season_count) {
                    Some(season) => Some(season),
                    None => {
                        tracing::warn!(title = %item.title, "No season count available to request");
                        self.report(format!(
                            "Couldn't work out which season of \"{}\" to request.",
                            item.title
                        ))
                        .await;
                        return RequestOutcome::Failed;
                    }
                }
            }
        };

        let outcome = match season {
            Some(season) => self.requests.request_series(request_id, &[season]).await,
            None => self.requests.request_movie(request_id).await,
        };

        match outcome {
            Ok(()) => {
                let credit = requested_by
                    .map(|name| format!(" for {name}"))
                    .unwrap_or_default();
                let text = match season {
                    Some(season) => {
                        format!("Requested season {} of \"{}\"{credit}.", season, item.title)
                    }
                    None => format!("Requested \"{}\"{credit}.", item.title),
                };
                tracing::info!(request_id, title = %item.title, ?season, "Request filed");
                self.report(text).await;
                RequestOutcome::Requested { season }
            }
            Err(err) => {
                tracing::warn!(request_id, title = %item.title, error = %err, "Request failed");
                self.report(format!(
                    "Request for \"{}\" failed, try again later.",
                    item.title
                ))
                .await;
                RequestOutcome::Failed
            }
        }
    }

    /// Resolve the request service's id for an item: use the one enrichment
    /// provided, else search by exact title, preferring a hit of the same
    /// kind whose year matches the parsed release year.
    async fn resolve_request_id(
        &self,
        item: &MediaItem,
    ) -> Result<Option<i64>, RequestServiceError> {
        if let Some(id) = item.request_id {
            return Ok(Some(id));
        }

        let hits = match self.requests.search_by_title(&item.title).await {
            Ok(hits) => hits,
            Err(RequestServiceError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };

        let candidates: Vec<&SearchHit> = hits.iter().filter(|h| h.kind == item.kind).collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let chosen = item
            .release_year
            .and_then(|year| candidates.iter().find(|h| h.year == Some(year)))
            .unwrap_or(&candidates[0]);
        Ok(Some(chosen.id))
    }

    /// Deliver a report, retrying like any other send. A report that still
    /// fails is logged and dropped; it never changes the outcome.
    async fn report(&self, text: String) {
        if let Err(err) = send_with_retry(|| self.messenger.send_text(&text)).await {
            tracing::warn!(error = %err, "Failed to deliver request report");
        }
    }
}
