//! REST implementation of the [`Mailbox`] collaborator.
//!
//! Two provider operations are used, both read-only: a search-and-list
//! over `users/{account}/messages` and a full-message get per id. The
//! bearer token comes from [`Authorizer`] on every call, so a mid-run
//! refresh is picked up transparently.

use crate::auth::Authorizer;
use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use crate::mail::{Mailbox, Message, MessageList, MessageRef};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

/// Mail API client over the provider's REST surface.
pub struct GmailMailbox {
    http: reqwest::Client,
    authorizer: Authorizer,
    account: String,
    api_base: String,
}

impl GmailMailbox {
    /// Creates a mailbox client from fetcher configuration.
    ///
    /// Loads the client secrets file; fails fast on a broken
    /// credential setup rather than at first poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file is missing or
    /// malformed, or the HTTP client cannot be constructed.
    pub async fn from_config(config: &FetcherConfig) -> Result<Self> {
        let authorizer = Authorizer::from_config(config).await?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect)
            .timeout(config.timeouts.request)
            .build()
            .map_err(|e| Error::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            authorizer,
            account: config.account().to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Issues an authorized GET and checks the status.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.authorizer.access_token().await?;

        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|source| Error::ApiRequest { operation, source })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized { status });
        }
        if !status.is_success() {
            return Err(Error::ApiStatus { operation, status });
        }

        response
            .json()
            .await
            .map_err(|source| Error::ApiDecode { operation, source })
    }
}

#[async_trait]
impl Mailbox for GmailMailbox {
    #[instrument(
        name = "GmailMailbox::search",
        skip(self),
        fields(account = %self.account)
    )]
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        let url = format!("{}/users/{}/messages", self.api_base, self.account);
        let max = max_results.to_string();

        let list: MessageList = self
            .get_json("search", &url, &[("q", query), ("maxResults", &max)])
            .await?;

        let refs = list.messages.unwrap_or_default();
        debug!(hits = refs.len(), "Search completed");
        Ok(refs)
    }

    #[instrument(
        name = "GmailMailbox::fetch_full",
        skip(self),
        fields(account = %self.account, id = %id)
    )]
    async fn fetch_full(&self, id: &str) -> Result<Message> {
        let url = format!("{}/users/{}/messages/{}", self.api_base, self.account, id);

        self.get_json("fetch_full", &url, &[("format", "full")])
            .await
    }
}

impl std::fmt::Debug for GmailMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailMailbox")
            .field("account", &self.account)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}
