//! Outbound channel contract.
//!
//! The engine decides what gets sent and when; a [`Messenger`] owns the how
//! (transport, markup). Implementations map their provider's failures onto
//! [`SendError`](crate::retry::SendError) and never retry internally; retry
//! policy belongs to [`crate::retry`].

use async_trait::async_trait;

use marquee_common::types::MediaItem;

use crate::retry::SendError;

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a formatted release announcement. Returns the channel's message
    /// id, which the correlator tracks for reactions.
    async fn send_release(&self, item: &MediaItem) -> Result<i64, SendError>;

    /// Send a plain-text status report.
    async fn send_text(&self, text: &str) -> Result<i64, SendError>;
}
