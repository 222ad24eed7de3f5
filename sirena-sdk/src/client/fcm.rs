//! Firebase Cloud Messaging sender and Firestore device-token store.

use futures_util::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::Url;

use super::auth::{ServiceAccountAuth, ServiceAccountKey};
use super::{ClientError, check_status, endpoint, parse_response};
use crate::objects::PushMessage;

const FCM_BASE_URL: &str = "https://fcm.googleapis.com/";
const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/";
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const TOKEN_COLLECTION: &str = "fcm_tokens";
const PAGE_SIZE: &str = "300";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A registered device token as stored in Firestore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Full Firestore document name, used for deletion.
    pub name: String,
    pub token: String,
    pub uid: String,
    pub registered_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

/// Firestore typed value; only the kinds the token documents use.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
    integer_value: Option<String>,
    double_value: Option<f64>,
}

impl Document {
    fn string_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.string_value.as_deref()
    }

    fn millis_field(&self, key: &str) -> Option<i64> {
        let value = self.fields.get(key)?;
        match (&value.integer_value, value.double_value) {
            (Some(int), _) => int.parse().ok(),
            (None, Some(float)) => Some(float as i64),
            (None, None) => None,
        }
    }

    fn into_record(self) -> Result<TokenRecord, ClientError> {
        let token = self
            .string_field("token")
            .ok_or_else(|| ClientError::Malformed(format!("{}: missing token", self.name)))?
            .to_string();
        let uid = self.string_field("uid").unwrap_or_default().to_string();
        let millis = self
            .millis_field("timestamp")
            .ok_or_else(|| ClientError::Malformed(format!("{}: missing timestamp", self.name)))?;
        let registered_at =
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
                .map_err(|e| ClientError::Malformed(format!("{}: {e}", self.name)))?;
        Ok(TokenRecord {
            name: self.name,
            token,
            uid,
            registered_at,
        })
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    data: &'a BTreeMap<String, String>,
    notification: FcmNotification<'a>,
    android: AndroidConfig,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct AndroidConfig {
    priority: &'static str,
}

/// Typed HTTP client for FCM v1 and the Firestore token collection.
#[derive(Debug, Clone)]
pub struct FcmClient {
    http: Client,
    auth: ServiceAccountAuth,
    fcm_base: Url,
    firestore_base: Url,
}

impl FcmClient {
    /// Create a client authenticated with the given service-account key.
    pub fn new(key: ServiceAccountKey) -> Result<Self, ClientError> {
        Self::with_base_urls(key, Url::parse(FCM_BASE_URL)?, Url::parse(FIRESTORE_BASE_URL)?)
    }

    /// Create a client against custom FCM and Firestore hosts.
    pub fn with_base_urls(
        key: ServiceAccountKey,
        fcm_base: Url,
        firestore_base: Url,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let auth = ServiceAccountAuth::new(http.clone(), key, &[MESSAGING_SCOPE, DATASTORE_SCOPE])?;
        Ok(Self {
            http,
            auth,
            fcm_base,
            firestore_base,
        })
    }

    fn collection_url(&self) -> Result<Url, ClientError> {
        endpoint(
            &self.firestore_base,
            &format!(
                "v1/projects/{}/databases/(default)/documents/{TOKEN_COLLECTION}",
                self.auth.project_id()
            ),
        )
    }

    /// List every document of the token collection, following pagination.
    pub async fn list_token_records(&self) -> Result<Vec<TokenRecord>, ClientError> {
        let url = self.collection_url()?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let bearer = self.auth.access_token().await?;
            let mut request = self
                .http
                .get(url.clone())
                .bearer_auth(bearer)
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListDocumentsResponse = parse_response(request.send().await?).await?;
            for document in page.documents {
                match document.into_record() {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(error = %e, "Skipping malformed token document"),
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(count = records.len(), "Listed device token records");
        Ok(records)
    }

    /// Delete a token document by its full name.
    pub async fn delete_record(&self, record: &TokenRecord) -> Result<(), ClientError> {
        let url = endpoint(&self.firestore_base, &format!("v1/{}", record.name))?;
        let bearer = self.auth.access_token().await?;
        let resp = self.http.delete(url).bearer_auth(bearer).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Send `message` to a single device.
    pub async fn send(&self, token: &str, message: &PushMessage) -> Result<(), ClientError> {
        let url = endpoint(
            &self.fcm_base,
            &format!("v1/projects/{}/messages:send", self.auth.project_id()),
        )?;
        let body = SendRequest {
            message: FcmMessage {
                token,
                data: &message.data,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
                android: AndroidConfig { priority: "HIGH" },
            },
        };
        let bearer = self.auth.access_token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Send `message` to every token concurrently.
    ///
    /// The result at index `i` belongs to `tokens[i]`.
    pub async fn send_each(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Vec<Result<(), ClientError>> {
        join_all(tokens.iter().map(|token| self.send(token, message))).await
    }
}
