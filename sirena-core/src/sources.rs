//! Content sources: where monitors read posts from.

use async_trait::async_trait;
use sirena_sdk::client::ClientError;
use sirena_sdk::objects::Post;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors that can occur while fetching a channel.
///
/// Monitors never propagate these; a failed fetch counts as "no new posts".
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport or markup failure in the underlying client
    #[error("content source error: {0}")]
    Client(#[from] ClientError),

    /// Channel name rejected by the source
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// A source of channel posts.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch posts of `channel` not older than `newer_than`, oldest first.
    ///
    /// `None` means "the most recent window, unconditionally". Phrases in
    /// `stop_list` are removed from post text.
    async fn fetch(
        &self,
        channel: &str,
        newer_than: Option<OffsetDateTime>,
        stop_list: &[String],
    ) -> Result<Vec<Post>, FetchError>;
}
