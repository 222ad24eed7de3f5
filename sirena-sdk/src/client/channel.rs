//! Public channel web-preview scraper.
//!
//! Reads the server-rendered preview page (`{base}/s/{channel}`) and turns
//! every message bubble into a [`Post`].

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use url::Url;

use super::{ClientError, check_status, endpoint};
use crate::objects::Post;

const DEFAULT_BASE_URL: &str = "https://t.me/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Number of most recent posts kept from a single page.
const PAGE_LIMIT: usize = 20;

/// Typed HTTP client for channel preview pages.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    http: Client,
    base_url: Url,
    limit: usize,
}

impl ChannelClient {
    /// Create a client against the public preview host.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_base_url(Url::parse(DEFAULT_BASE_URL)?)
    }

    /// Create a client against an arbitrary preview host.
    pub fn with_base_url(base_url: Url) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            limit: PAGE_LIMIT,
        })
    }

    /// `GET /s/{channel}` – fetch posts not older than `newer_than`.
    ///
    /// Phrases in `stop_list` are removed from the post text before the
    /// post is built.
    pub async fn fetch(
        &self,
        channel: &str,
        newer_than: Option<OffsetDateTime>,
        stop_list: &[String],
    ) -> Result<Vec<Post>, ClientError> {
        let url = endpoint(&self.base_url, &format!("s/{channel}"))?;
        let resp = self.http.get(url).send().await?;
        let html = check_status(resp).await?.text().await?;

        let posts = parse_channel_page(&html, newer_than, stop_list, self.limit)?;
        debug!(channel, count = posts.len(), "Parsed channel page");
        Ok(posts)
    }
}

struct PageSelectors {
    message: Selector,
    author: Selector,
    text: Selector,
    time: Selector,
}

impl PageSelectors {
    fn new() -> Result<Self, ClientError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ClientError::Malformed(format!("selector {css}: {e}")))
        };
        Ok(Self {
            message: parse("div.tgme_widget_message")?,
            author: parse(".tgme_widget_message_author span")?,
            text: parse(".tgme_widget_message_bubble > .tgme_widget_message_text")?,
            time: parse(".tgme_widget_message_footer time[datetime]")?,
        })
    }
}

/// Parse a preview page into posts, oldest first.
///
/// Posts without text, and posts strictly older than `newer_than`, are
/// skipped. At most `limit` of the most recent posts are returned.
pub fn parse_channel_page(
    html: &str,
    newer_than: Option<OffsetDateTime>,
    stop_list: &[String],
    limit: usize,
) -> Result<Vec<Post>, ClientError> {
    let selectors = PageSelectors::new()?;
    let document = Html::parse_document(html);
    let mut posts = Vec::new();

    for message in document.select(&selectors.message) {
        let Some(id) = message.value().attr("data-post") else {
            continue;
        };

        let Some(text_node) = message.select(&selectors.text).next() else {
            continue;
        };
        let text = strip_stop_list(&joined_text(text_node), stop_list);
        if text.is_empty() {
            continue;
        }

        let author = message
            .select(&selectors.author)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let Some(raw_time) = message
            .select(&selectors.time)
            .next()
            .and_then(|el| el.value().attr("datetime"))
        else {
            warn!(post = id, "Post has no timestamp, skipping");
            continue;
        };
        let timestamp = match OffsetDateTime::parse(raw_time, &Rfc3339) {
            Ok(ts) => ts,
            Err(e) => {
                warn!(post = id, raw_time, error = %e, "Unparseable post timestamp, skipping");
                continue;
            }
        };

        if newer_than.is_some_and(|cursor| timestamp < cursor) {
            continue;
        }

        posts.push(Post::new(id, author, text, timestamp));
    }

    let excess = posts.len().saturating_sub(limit);
    posts.drain(..excess);
    Ok(posts)
}

/// Text nodes of an element, trimmed, empty ones dropped, joined by newline.
fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove every stop-list phrase from `text` and collapse blank lines.
pub fn strip_stop_list(text: &str, stop_list: &[String]) -> String {
    let mut filtered = text.to_string();
    for phrase in stop_list.iter().filter(|p| !p.is_empty()) {
        filtered = filtered.replace(phrase.as_str(), "");
    }
    filtered
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
