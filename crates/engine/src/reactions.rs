//! Reaction handling.
//!
//! A reaction on one of the bot's announcement messages is the request
//! trigger. The handler checks the emoji, correlates the message back to
//! its media item, and hands the item to the orchestrator. Reactions on
//! unrelated messages resolve to nothing and are dropped without a word.

use std::sync::Arc;

use marquee_common::error::AppError;

use crate::correlator::MessageCorrelator;
use crate::orchestrator::RequestOrchestrator;

pub struct ReactionHandler {
    correlator: Arc<MessageCorrelator>,
    orchestrator: RequestOrchestrator,
    trigger_emoji: String,
}

impl ReactionHandler {
    pub fn new(
        correlator: Arc<MessageCorrelator>,
        orchestrator: RequestOrchestrator,
        trigger_emoji: String,
    ) -> Self {
        Self {
            correlator,
            orchestrator,
            trigger_emoji,
        }
    }

    /// Handle one added reaction. Non-trigger emoji and unknown message ids
    /// return quietly; a correlated trigger runs the whole request flow.
    pub async fn handle_reaction(
        &self,
        message_id: i64,
        emoji: &str,
        user_id: Option<i64>,
        username: Option<&str>,
    ) -> Result<(), AppError> {
        if !same_emoji(emoji, &self.trigger_emoji) {
            return Ok(());
        }

        let Some(item) = self.correlator.resolve(message_id).await? else {
            tracing::debug!(message_id, "Reaction on an untracked message, ignoring");
            return Ok(());
        };

        tracing::info!(
            message_id,
            title = %item.title,
            ?user_id,
            username = username.unwrap_or("-"),
            "Request triggered by reaction"
        );
        self.orchestrator.run(&item, username).await;
        Ok(())
    }
}

/// Compare emoji ignoring the U+FE0F presentation selector; chat clients
/// disagree on whether the heart carries one.
fn same_emoji(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.chars().filter(|&c| c != '\u{fe0f}').collect::<String>();
    strip(a) == strip(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use sqlx::SqlitePool;

    use marquee_clients::overseerr::{
        MediaDetails, RequestService, RequestServiceError, SearchHit,
    };
    use marquee_common::types::{MediaItem, MediaKind, NewNotification};

    use crate::ledger::NotificationLedger;
    use crate::messenger::Messenger;
    use crate::retry::SendError;

    /// Counts every request-service call, whatever it is.
    #[derive(Default)]
    struct CountingService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RequestService for CountingService {
        async fn search_by_title(
            &self,
            _title: &str,
        ) -> Result<Vec<SearchHit>, RequestServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn get_details(
            &self,
            _id: i64,
            _kind: MediaKind,
        ) -> Result<MediaDetails, RequestServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RequestServiceError::Unreachable("not expected".into()))
        }

        async fn request_movie(&self, _id: i64) -> Result<(), RequestServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn request_series(
            &self,
            _id: i64,
            _seasons: &[i64],
        ) -> Result<(), RequestServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingMessenger {
        sends: AtomicUsize,
    }

    #[async_trait]
    impl Messenger for CountingMessenger {
        async fn send_release(&self, _item: &MediaItem) -> Result<i64, SendError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }

        async fn send_text(&self, _text: &str) -> Result<i64, SendError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        }
    }

    fn make_handler(
        pool: &SqlitePool,
        service: Arc<CountingService>,
        messenger: Arc<CountingMessenger>,
    ) -> ReactionHandler {
        let ledger = NotificationLedger::new(pool.clone());
        let correlator = Arc::new(MessageCorrelator::new(ledger));
        let orchestrator = RequestOrchestrator::new(service, messenger);
        ReactionHandler::new(correlator, orchestrator, "\u{2764}".to_string())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_unknown_message_id_triggers_nothing(pool: SqlitePool) {
        let service = Arc::new(CountingService::default());
        let messenger = Arc::new(CountingMessenger::default());
        let handler = make_handler(&pool, service.clone(), messenger.clone());

        // Nothing cached, nothing in the ledger: the reaction is dropped.
        handler
            .handle_reaction(999, "\u{2764}", Some(7), Some("ada"))
            .await
            .unwrap();

        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(messenger.sends.load(Ordering::SeqCst), 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_non_trigger_emoji_triggers_nothing(pool: SqlitePool) {
        let service = Arc::new(CountingService::default());
        let messenger = Arc::new(CountingMessenger::default());
        let handler = make_handler(&pool, service.clone(), messenger.clone());

        NotificationLedger::new(pool.clone())
            .record(&NewNotification {
                item_url: "https://s/wake-up".to_string(),
                title: "Wake Up".to_string(),
                kind: MediaKind::Movie,
                season: None,
                message_id: Some(42),
            })
            .await
            .unwrap();

        // Tracked message, wrong emoji.
        handler
            .handle_reaction(42, "\u{1f44d}", None, None)
            .await
            .unwrap();

        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(messenger.sends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_emoji_match_ignores_presentation_selector() {
        assert!(same_emoji("\u{2764}\u{fe0f}", "\u{2764}"));
        assert!(same_emoji("\u{2764}", "\u{2764}\u{fe0f}"));
        assert!(same_emoji("\u{1f44d}", "\u{1f44d}"));
        assert!(!same_emoji("\u{1f44d}", "\u{2764}"));
    }
}
