//! OTP retrieval over the mail collaborator.
//!
//! [`OtpFetcher`] implements the read-only fetch contract: search the
//! mailbox for the OTP sender/subject, inspect the most recent matches
//! newest-first, and return the first extractable code. The
//! [`OtpSource`] trait is the seam the login driver polls through.
//!
//! # Example
//!
//! ```no_run
//! use otp_login::{FetcherConfig, GmailMailbox, OtpFetcher, OtpSource};
//!
//! # async fn example() -> otp_login::Result<()> {
//! let config = FetcherConfig::builder()
//!     .account("me")
//!     .search_query("from:support@example.com subject:login code")
//!     .build()?;
//!
//! let mailbox = GmailMailbox::from_config(&config).await?;
//! let fetcher = OtpFetcher::new(mailbox, &config)?;
//!
//! let otp = fetcher.fetch_latest().await?;
//! println!("Got OTP: {otp}");
//! # Ok(())
//! # }
//! ```

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::mail::{Mailbox, Message};
use crate::matcher::{Matcher, RegexMatcher};
use crate::parser::{self, ExtractResult};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Outcome of one polling attempt.
///
/// The fetch contract surfaces "no email yet" and "email without a
/// recognizable code" as errors; the polling loop treats both as the
/// same expected transient state. This type makes that branch explicit
/// so callers match on variants instead of catching failures.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A code was extracted.
    Found(String),
    /// No code is currently available; polling may continue.
    NotFoundYet,
    /// The fetch failed for an unexpected reason.
    Failed(Error),
}

impl From<Result<String>> for FetchOutcome {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(otp) => FetchOutcome::Found(otp),
            Err(Error::NoOtpEmail | Error::OtpNotFound) => FetchOutcome::NotFoundYet,
            Err(error) => FetchOutcome::Failed(error),
        }
    }
}

/// Source of OTP codes for the login driver.
///
/// [`OtpFetcher`] is the production implementation; tests substitute
/// scripted ones.
#[async_trait]
pub trait OtpSource: Send + Sync {
    /// Fetches the latest available OTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoOtpEmail`] when the search matches nothing
    /// and [`Error::OtpNotFound`] when no matched message contains a
    /// recognizable code. Callers polling for a code should treat any
    /// failure as "not currently available".
    async fn fetch_latest(&self) -> Result<String>;

    /// Performs one polling attempt, folding the error space into
    /// [`FetchOutcome`].
    async fn poll(&self) -> FetchOutcome {
        self.fetch_latest().await.into()
    }

    /// Fetches the latest OTP, treating absence as a valid state.
    ///
    /// Used before triggering a new send, where there may legitimately
    /// be no prior OTP mail at all.
    async fn try_fetch_latest(&self) -> Option<String> {
        match self.fetch_latest().await {
            Ok(otp) => Some(otp),
            Err(error) => {
                debug!(%error, "No prior OTP available");
                None
            }
        }
    }
}

/// Fetches OTP codes from an authorized mailbox.
///
/// Read-only: messages are searched and fetched, never modified.
pub struct OtpFetcher<M> {
    mailbox: M,
    matcher: Box<dyn Matcher>,
    search_query: String,
    max_results: u32,
}

impl<M: Mailbox> OtpFetcher<M> {
    /// Creates a fetcher using the configured extraction pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured pattern does not compile
    /// (already checked at config build time, so only reachable with a
    /// hand-constructed config).
    pub fn new(mailbox: M, config: &FetcherConfig) -> Result<Self> {
        let matcher =
            RegexMatcher::with_description(&config.otp_pattern, "configured OTP pattern").map_err(
                |source| Error::InvalidPattern {
                    pattern: config.otp_pattern.clone(),
                    source,
                },
            )?;
        Ok(Self::with_matcher(mailbox, config, Box::new(matcher)))
    }

    /// Creates a fetcher with a custom matcher.
    #[must_use]
    pub fn with_matcher(mailbox: M, config: &FetcherConfig, matcher: Box<dyn Matcher>) -> Self {
        Self {
            mailbox,
            matcher,
            search_query: config.search_query.clone(),
            max_results: config.max_results,
        }
    }

    /// Fetches the latest OTP from the mailbox.
    ///
    /// Searches with the configured query, fetches at most
    /// `max_results` full messages, orders them newest-first by server
    /// receive time (provider order where timestamps are missing), and
    /// returns the first code the matcher extracts.
    ///
    /// # Errors
    ///
    /// - [`Error::NoOtpEmail`] if the search matches no messages
    /// - [`Error::OtpNotFound`] if no matched message contains the pattern
    /// - transport errors from the mail collaborator
    #[instrument(
        name = "OtpFetcher::fetch_latest",
        skip(self),
        fields(matcher = %self.matcher.description())
    )]
    pub async fn fetch_latest(&self) -> Result<String> {
        let refs = self
            .mailbox
            .search(&self.search_query, self.max_results)
            .await?;

        if refs.is_empty() {
            return Err(Error::NoOtpEmail);
        }

        debug!(hits = refs.len(), "Fetching full messages");

        let mut messages = Vec::with_capacity(refs.len());
        for message_ref in &refs {
            messages.push(self.mailbox.fetch_full(&message_ref.id).await?);
        }

        // Provider order is only presumed newest-first; receive
        // timestamps are authoritative when present. The sort is
        // stable, so untimestamped messages keep their relative
        // provider position.
        messages.sort_by(|a, b| b.received_at().cmp(&a.received_at()));

        self.first_match(&messages).ok_or(Error::OtpNotFound)
    }

    /// Returns the first extractable code across the ordered messages.
    fn first_match(&self, messages: &[Message]) -> Option<String> {
        for message in messages {
            match parser::extract_match(message, self.matcher.as_ref()) {
                ExtractResult::Match(otp) => return Some(otp),
                ExtractResult::NoMatch | ExtractResult::Undecodable => {
                    // Skip and keep looking; undecodable bodies are
                    // logged in the parser
                }
            }
        }
        None
    }
}

#[async_trait]
impl<M: Mailbox> OtpSource for OtpFetcher<M> {
    async fn fetch_latest(&self) -> Result<String> {
        OtpFetcher::fetch_latest(self).await
    }
}

impl<M> std::fmt::Debug for OtpFetcher<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpFetcher")
            .field("search_query", &self.search_query)
            .field("max_results", &self.max_results)
            .field("matcher", &self.matcher.description())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{MessageBody, MessagePayload, MessageRef};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    /// Canned mailbox serving a fixed message list.
    struct FakeMailbox {
        messages: Vec<Message>,
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn search(&self, _query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
            Ok(self
                .messages
                .iter()
                .take(max_results as usize)
                .map(|m| MessageRef { id: m.id.clone() })
                .collect())
        }

        async fn fetch_full(&self, id: &str) -> Result<Message> {
            Ok(self
                .messages
                .iter()
                .find(|m| m.id == id)
                .expect("known id")
                .clone())
        }
    }

    fn message(id: &str, internal_date: Option<&str>, body: &str) -> Message {
        Message {
            id: id.into(),
            internal_date: internal_date.map(String::from),
            payload: Some(MessagePayload {
                mime_type: Some("text/html".into()),
                body: Some(MessageBody {
                    data: Some(URL_SAFE_NO_PAD.encode(body)),
                    size: Some(body.len() as u64),
                }),
                parts: None,
            }),
        }
    }

    fn otp_body(code: &str) -> String {
        format!(r#"<div style="font-weight: bold; text-align: center;">{code}</div>"#)
    }

    fn fetcher(messages: Vec<Message>) -> OtpFetcher<FakeMailbox> {
        let config = FetcherConfig::builder()
            .account("me")
            .search_query("from:support@example.com subject:OTP")
            .build()
            .unwrap();
        OtpFetcher::new(FakeMailbox { messages }, &config).unwrap()
    }

    #[tokio::test]
    async fn test_no_messages_is_no_otp_email() {
        let result = fetcher(vec![]).fetch_latest().await;
        assert!(matches!(result, Err(Error::NoOtpEmail)));
    }

    #[tokio::test]
    async fn test_no_pattern_is_otp_not_found() {
        let messages = vec![
            message("m1", None, "nothing here"),
            message("m2", None, "still nothing"),
        ];
        let result = fetcher(messages).fetch_latest().await;
        assert!(matches!(result, Err(Error::OtpNotFound)));
    }

    #[tokio::test]
    async fn test_first_match_wins_in_provider_order() {
        let messages = vec![
            message("m1", None, "no code in the newest mail"),
            message("m2", None, &otp_body("123456")),
            message("m3", None, &otp_body("999999")),
        ];
        let otp = fetcher(messages).fetch_latest().await.unwrap();
        assert_eq!(otp, "123456");
    }

    #[tokio::test]
    async fn test_receive_time_overrides_provider_order() {
        // Provider returns the older message first; the timestamp sort
        // must put the newer code ahead of it
        let messages = vec![
            message("old", Some("1000"), &otp_body("111111")),
            message("new", Some("2000"), &otp_body("222222")),
        ];
        let otp = fetcher(messages).fetch_latest().await.unwrap();
        assert_eq!(otp, "222222");
    }

    #[tokio::test]
    async fn test_at_most_max_results_inspected() {
        // Only the sixth message carries a code; the default budget of
        // five never reaches it
        let mut messages: Vec<Message> = (1..=5)
            .map(|i| message(&format!("m{i}"), None, "no code"))
            .collect();
        messages.push(message("m6", None, &otp_body("654321")));

        let result = fetcher(messages).fetch_latest().await;
        assert!(matches!(result, Err(Error::OtpNotFound)));
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let messages = vec![message("m1", None, &otp_body("048213"))];
        let fetcher = fetcher(messages);

        let first = fetcher.fetch_latest().await.unwrap();
        let second = fetcher.fetch_latest().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "048213");
    }

    #[tokio::test]
    async fn test_undecodable_message_is_skipped() {
        let undecodable = Message {
            id: "m1".into(),
            internal_date: None,
            payload: Some(MessagePayload::default()),
        };
        let messages = vec![undecodable, message("m2", None, &otp_body("123456"))];
        let otp = fetcher(messages).fetch_latest().await.unwrap();
        assert_eq!(otp, "123456");
    }

    #[tokio::test]
    async fn test_poll_outcome_mapping() {
        let empty = fetcher(vec![]);
        assert!(matches!(empty.poll().await, FetchOutcome::NotFoundYet));

        let hit = fetcher(vec![message("m1", None, &otp_body("123456"))]);
        assert!(matches!(
            hit.poll().await,
            FetchOutcome::Found(otp) if otp == "123456"
        ));
    }

    #[tokio::test]
    async fn test_try_fetch_latest_swallows_absence() {
        let empty = fetcher(vec![]);
        assert_eq!(empty.try_fetch_latest().await, None);

        let hit = fetcher(vec![message("m1", None, &otp_body("123456"))]);
        assert_eq!(hit.try_fetch_latest().await.as_deref(), Some("123456"));
    }
}
