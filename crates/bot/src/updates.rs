//! Long-poll update loop.
//!
//! Routes reaction changes to the reaction handler and operator commands
//! (`/stats`, `/recent`) to the ledger. Updates from any chat other than the
//! announcement chat are dropped up front: message ids are only unique per
//! chat, so a reaction elsewhere could collide with a tracked id. Poll
//! failures back off and retry; a bad individual update is logged and
//! skipped, never fatal.

use std::sync::Arc;
use std::time::Duration;

use marquee_engine::ledger::NotificationLedger;
use marquee_engine::messenger::Messenger;
use marquee_engine::reactions::ReactionHandler;
use marquee_engine::retry::send_with_retry;

use crate::format;
use crate::telegram::{Message, MessageReactionUpdated, ReactionType, TelegramBot, Update};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const RECENT_LIMIT: i64 = 10;

pub struct UpdateDispatcher {
    bot: Arc<TelegramBot>,
    reactions: ReactionHandler,
    ledger: NotificationLedger,
}

impl UpdateDispatcher {
    pub fn new(bot: Arc<TelegramBot>, reactions: ReactionHandler, ledger: NotificationLedger) -> Self {
        Self {
            bot,
            reactions,
            ledger,
        }
    }

    /// Run the long-poll loop. Only returns if the task is cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut offset = None;
        tracing::info!("Update dispatcher started");

        loop {
            let updates = match self.bot.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed, backing off");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                // Acknowledge the update even if handling it fails; replays
                // on the next poll would re-trigger request flows.
                offset = Some(update.update_id + 1);
                if let Err(e) = self.dispatch(update).await {
                    tracing::warn!(error = %e, "Failed to handle update");
                }
            }
        }
    }

    async fn dispatch(&self, update: Update) -> anyhow::Result<()> {
        if let Some(reaction) = update.message_reaction {
            if reaction.chat.id != self.bot.chat_id() {
                tracing::debug!(
                    chat_id = reaction.chat.id,
                    "Reaction outside the announcement chat, ignoring"
                );
                return Ok(());
            }
            self.handle_reaction_update(reaction).await?;
        } else if let Some(message) = update.message {
            if message.chat.id != self.bot.chat_id() {
                tracing::debug!(
                    chat_id = message.chat.id,
                    "Command outside the announcement chat, ignoring"
                );
                return Ok(());
            }
            self.handle_command(message).await?;
        }
        Ok(())
    }

    async fn handle_reaction_update(
        &self,
        reaction: MessageReactionUpdated,
    ) -> anyhow::Result<()> {
        let user_id = reaction.user.as_ref().map(|u| u.id);
        let username = reaction
            .user
            .as_ref()
            .and_then(|u| u.username.as_deref().or(u.first_name.as_deref()));

        for emoji in added_emoji(&reaction.old_reaction, &reaction.new_reaction) {
            self.reactions
                .handle_reaction(reaction.message_id, emoji, user_id, username)
                .await?;
        }
        Ok(())
    }

    async fn handle_command(&self, message: Message) -> anyhow::Result<()> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        // "/stats@marquee_bot arg" -> "/stats"
        let command = text.trim().split_whitespace().next().unwrap_or("");
        let command = command.split('@').next().unwrap_or(command);

        match command {
            "/stats" => {
                let counts = self.ledger.counts().await?;
                self.reply(&format::stats_reply(&counts)).await;
            }
            "/recent" => {
                let records = self.ledger.recent(RECENT_LIMIT).await?;
                self.reply(&format::recent_reply(&records)).await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn reply(&self, text: &str) {
        if let Err(e) = send_with_retry(|| self.bot.send_text(text)).await {
            tracing::warn!(error = %e, "Failed to send command reply");
        }
    }
}

/// Emoji present in the new reaction list but not the old one.
fn added_emoji<'a>(old: &[ReactionType], new: &'a [ReactionType]) -> Vec<&'a str> {
    new.iter()
        .filter(|reaction| !old.contains(reaction))
        .filter_map(|reaction| match reaction {
            ReactionType::Emoji { emoji } => Some(emoji.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reqwest::Client;
    use sqlx::SqlitePool;

    use crate::telegram::Chat;
    use marquee_clients::overseerr::{
        MediaDetails, RequestService, RequestServiceError, SearchHit,
    };
    use marquee_common::types::{MediaItem, MediaKind, NewNotification};
    use marquee_engine::correlator::MessageCorrelator;
    use marquee_engine::ledger::NotificationLedger;
    use marquee_engine::orchestrator::RequestOrchestrator;
    use marquee_engine::retry::SendError;

    const ANNOUNCE_CHAT: i64 = -100123;

    fn emoji(e: &str) -> ReactionType {
        ReactionType::Emoji {
            emoji: e.to_string(),
        }
    }

    #[derive(Default)]
    struct CountingService {
        searches: AtomicUsize,
    }

    #[async_trait]
    impl RequestService for CountingService {
        async fn search_by_title(
            &self,
            _title: &str,
        ) -> Result<Vec<SearchHit>, RequestServiceError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn get_details(
            &self,
            _id: i64,
            _kind: MediaKind,
        ) -> Result<MediaDetails, RequestServiceError> {
            Err(RequestServiceError::Unreachable("not expected".into()))
        }

        async fn request_movie(&self, _id: i64) -> Result<(), RequestServiceError> {
            Ok(())
        }

        async fn request_series(
            &self,
            _id: i64,
            _seasons: &[i64],
        ) -> Result<(), RequestServiceError> {
            Ok(())
        }
    }

    struct SilentMessenger;

    #[async_trait]
    impl Messenger for SilentMessenger {
        async fn send_release(&self, _item: &MediaItem) -> Result<i64, SendError> {
            Ok(1)
        }

        async fn send_text(&self, _text: &str) -> Result<i64, SendError> {
            Ok(2)
        }
    }

    fn make_dispatcher(pool: &SqlitePool, service: Arc<CountingService>) -> UpdateDispatcher {
        let ledger = NotificationLedger::new(pool.clone());
        let correlator = Arc::new(MessageCorrelator::new(ledger.clone()));
        let messenger: Arc<dyn Messenger> = Arc::new(SilentMessenger);
        let orchestrator = RequestOrchestrator::new(service, messenger);
        let reactions = ReactionHandler::new(correlator, orchestrator, "\u{2764}".to_string());
        let bot = Arc::new(TelegramBot::new(
            Client::new(),
            "token",
            ANNOUNCE_CHAT,
            "\u{2764}".to_string(),
        ));
        UpdateDispatcher::new(bot, reactions, ledger)
    }

    fn heart_reaction(chat_id: i64, message_id: i64) -> Update {
        Update {
            update_id: 1,
            message: None,
            message_reaction: Some(MessageReactionUpdated {
                chat: Chat { id: chat_id },
                message_id,
                user: None,
                old_reaction: vec![],
                new_reaction: vec![emoji("\u{2764}")],
            }),
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_reaction_in_foreign_chat_never_reaches_the_orchestrator(pool: SqlitePool) {
        let service = Arc::new(CountingService::default());
        let dispatcher = make_dispatcher(&pool, service.clone());

        // Message 42 was announced in the configured chat.
        dispatcher
            .ledger
            .record(&NewNotification {
                item_url: "https://s/wake-up".to_string(),
                title: "Wake Up".to_string(),
                kind: MediaKind::Movie,
                season: None,
                message_id: Some(42),
            })
            .await
            .unwrap();

        // Same message id, different chat: dropped before correlation.
        dispatcher
            .dispatch(heart_reaction(-100999, 42))
            .await
            .unwrap();
        assert_eq!(service.searches.load(Ordering::SeqCst), 0);

        // The real chat still goes through.
        dispatcher
            .dispatch(heart_reaction(ANNOUNCE_CHAT, 42))
            .await
            .unwrap();
        assert_eq!(service.searches.load(Ordering::SeqCst), 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_command_in_foreign_chat_is_dropped(pool: SqlitePool) {
        let service = Arc::new(CountingService::default());
        let dispatcher = make_dispatcher(&pool, service);

        // If the gate were missing this would try to reply over the
        // network and burn through real retry backoff; gated, it returns
        // immediately.
        let update = Update {
            update_id: 2,
            message: Some(Message {
                message_id: 9,
                from: None,
                chat: Chat { id: -100999 },
                text: Some("/stats".to_string()),
            }),
            message_reaction: None,
        };
        tokio::time::timeout(Duration::from_millis(250), dispatcher.dispatch(update))
            .await
            .expect("foreign-chat command should be dropped without any send")
            .unwrap();
    }

    #[test]
    fn test_added_emoji_diffs_old_against_new() {
        let old = vec![emoji("\u{1f44d}")];
        let new = vec![emoji("\u{1f44d}"), emoji("\u{2764}")];
        assert_eq!(added_emoji(&old, &new), vec!["\u{2764}"]);
    }

    #[test]
    fn test_removed_reaction_adds_nothing() {
        let old = vec![emoji("\u{2764}")];
        assert!(added_emoji(&old, &[]).is_empty());
    }

    #[test]
    fn test_custom_emoji_is_ignored() {
        let new = vec![
            ReactionType::CustomEmoji {
                custom_emoji_id: "5368742036629364794".to_string(),
            },
            emoji("\u{2764}"),
        ];
        assert_eq!(added_emoji(&[], &new), vec!["\u{2764}"]);
    }
}
