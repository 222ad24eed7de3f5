//! HTTP clients for the external collaborators.
//!
//! Gated behind the `client` cargo feature so crates that only need the
//! shared types do not pull in `reqwest`.

mod auth;
mod channel;
mod chat;
mod fcm;

pub use auth::{ServiceAccountAuth, ServiceAccountKey};
pub use channel::{ChannelClient, parse_channel_page, strip_stop_list};
pub use chat::{ChatClient, ChatMessage, ChatRole};
pub use fcm::{FcmClient, TokenRecord};

use reqwest::StatusCode;
use url::Url;

/// Errors produced by the collaborator clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A page or response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Service-account credentials could not be read or used.
    #[error("credentials error: {0}")]
    Credentials(String),
}

/// Join `path` onto `base`, treating `base` as a directory even when it
/// lacks a trailing slash (`https://api.example.com/v1` + `chat` →
/// `https://api.example.com/v1/chat`).
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, ClientError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let resp = check_status(resp).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("https://api.openai.com/v1").unwrap();
        assert_eq!(
            endpoint(&base, "chat/completions").unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        let base = Url::parse("https://t.me/").unwrap();
        assert_eq!(endpoint(&base, "/s/news").unwrap().as_str(), "https://t.me/s/news");
    }

    #[test]
    fn test_endpoint_allows_colon_in_last_segment() {
        let base = Url::parse("https://fcm.googleapis.com").unwrap();
        assert_eq!(
            endpoint(&base, "v1/projects/p1/messages:send").unwrap().as_str(),
            "https://fcm.googleapis.com/v1/projects/p1/messages:send"
        );
    }
}
