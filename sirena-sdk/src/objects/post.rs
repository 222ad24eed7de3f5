//! A single post scraped from a public channel.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Immutable post as returned by a content source.
///
/// Posts are ordered by `timestamp`; `id` is the channel-scoped identifier
/// (`channel/123`) taken from the page markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: CompactString,
    pub author: CompactString,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Post {
    pub fn new(
        id: impl Into<CompactString>,
        author: impl Into<CompactString>,
        text: impl Into<String>,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            text: text.into(),
            timestamp,
        }
    }
}
