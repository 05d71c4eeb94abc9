//! Mail provider message model and collaborator trait.
//!
//! The provider is used as a black box through [`Mailbox`]: a
//! search-and-list operation and a get-full-message operation. The
//! message model mirrors the provider's JSON payload - a message is
//! single-part or multi-part, and each part may carry a base64url-encoded
//! text body.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A message reference returned by a search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Provider-assigned message identifier.
    pub id: String,
}

/// Response envelope of a search-and-list call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Matching message references, newest first by provider
    /// convention. Absent when nothing matched.
    #[serde(default)]
    pub messages: Option<Vec<MessageRef>>,
    /// Provider's estimate of the total result size.
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// A full message as returned by the get-full-message operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Provider-assigned message identifier.
    pub id: String,
    /// Server receive time as epoch milliseconds (stringly typed on
    /// the wire).
    #[serde(default)]
    pub internal_date: Option<String>,
    /// The message payload.
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

impl Message {
    /// Returns the server receive time, if the provider sent one that
    /// parses.
    #[must_use]
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// A message payload: either a single-part body or a list of parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// MIME type of this payload.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Single-part body.
    #[serde(default)]
    pub body: Option<MessageBody>,
    /// Multi-part segments.
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

/// One segment of a multi-part payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// MIME type of this part.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Body of this part.
    #[serde(default)]
    pub body: Option<MessageBody>,
}

/// A body carrying base64url-encoded text data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    /// Base64url-encoded content; absent for container parts.
    #[serde(default)]
    pub data: Option<String>,
    /// Decoded size in bytes, as reported by the provider.
    #[serde(default)]
    pub size: Option<u64>,
}

/// The mail collaborator: search and fetch over an authorized mailbox.
///
/// [`crate::GmailMailbox`] is the production implementation; tests
/// substitute canned ones.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Searches the mailbox, returning at most `max_results` message
    /// references in provider order.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>>;

    /// Fetches the full message for a reference.
    async fn fetch_full(&self, id: &str) -> Result<Message>;
}
