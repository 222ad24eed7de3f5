//! Bindings from the sdk clients to the pipeline's collaborator traits.

use crate::processors::{
    ClassificationRequest, Classifier, ClassifierError, NotificationSink, SinkError,
};
use crate::sources::{ContentSource, FetchError};
use async_trait::async_trait;
use sirena_sdk::client::{ChannelClient, ChatClient, ChatMessage, FcmClient};
use sirena_sdk::objects::{AnalysisVerdict, Post, PushMessage, VerdictPayload};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

#[async_trait]
impl ContentSource for ChannelClient {
    async fn fetch(
        &self,
        channel: &str,
        newer_than: Option<OffsetDateTime>,
        stop_list: &[String],
    ) -> Result<Vec<Post>, FetchError> {
        Ok(ChannelClient::fetch(self, channel, newer_than, stop_list).await?)
    }
}

/// Build the chat transcript for one classification request.
pub fn chat_messages(request: &ClassificationRequest) -> Result<Vec<ChatMessage>, ClassifierError> {
    let mut messages = Vec::with_capacity(request.context.len() + 2);
    messages.push(ChatMessage::system(request.system_prompt.clone()));
    messages.extend(
        request
            .context
            .iter()
            .map(|line| ChatMessage::user(line.to_string())),
    );
    messages.push(ChatMessage::assistant(format!(
        "Local time: {}",
        request.local_time.format(&Rfc3339)?
    )));
    Ok(messages)
}

#[async_trait]
impl Classifier for ChatClient {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<VerdictPayload, ClassifierError> {
        let messages = chat_messages(request)?;
        let content = self.complete(&messages).await?;
        debug!(target: "sirena::transcript", response = %content, "Classifier response");
        Ok(serde_json::from_str(content.trim())?)
    }
}

/// Firebase push sink with token expiry.
pub struct FirebaseSink {
    client: FcmClient,
    max_age: time::Duration,
}

impl FirebaseSink {
    pub fn new(client: FcmClient, max_age: time::Duration) -> Self {
        Self { client, max_age }
    }
}

#[async_trait]
impl NotificationSink for FirebaseSink {
    async fn list_active_tokens(&self) -> Result<Vec<String>, SinkError> {
        let records = self.client.list_token_records().await?;
        let cutoff = expiry_cutoff(OffsetDateTime::now_utc(), self.max_age);

        let mut tokens = Vec::with_capacity(records.len());
        let mut expired = 0usize;
        for record in records {
            if cutoff.is_some_and(|cutoff| record.registered_at < cutoff) {
                expired += 1;
                if let Err(e) = self.client.delete_record(&record).await {
                    warn!(uid = %record.uid, error = %e, "Failed to delete expired token");
                }
                continue;
            }
            tokens.push(record.token);
        }

        if expired > 0 {
            info!(expired, active = tokens.len(), "Purged expired device tokens");
        }
        Ok(tokens)
    }

    async fn send_batch(
        &self,
        tokens: &[String],
        verdict: &AnalysisVerdict,
    ) -> Result<Vec<Result<(), SinkError>>, SinkError> {
        let message = PushMessage::from(verdict);
        let results = self.client.send_each(tokens, &message).await;
        Ok(results
            .into_iter()
            .map(|r| r.map_err(SinkError::from))
            .collect())
    }
}

/// Tokens registered before this instant are expired. `None` when the
/// max age reaches past the representable range, so nothing expires.
fn expiry_cutoff(now: OffsetDateTime, max_age: time::Duration) -> Option<OffsetDateTime> {
    now.checked_sub(max_age)
}
