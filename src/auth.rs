//! Credential plumbing for the mail collaborator.
//!
//! The interactive consent handshake is somebody else's job; this
//! module only consumes its artifacts: a local client-secrets file and
//! a cached token. An expired access token is refreshed against the
//! provider's token endpoint and the rotated token is written back to
//! the cache.
//!
//! Tokens and client secrets are held as [`SecretString`] so they
//! cannot leak through `Debug` output.

use crate::config::FetcherConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Read-only mailbox scope requested during the consent handshake.
pub const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Refresh this long before the recorded expiry, to absorb clock skew.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Maximum length for token endpoint error bodies kept in messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncates a token endpoint error body so token material cannot
/// flood logs.
fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client secrets
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk shape of the client secrets file. The consent tooling
/// writes the secrets under either an `installed` or a `web` key.
#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<SecretsEntry>,
    web: Option<SecretsEntry>,
}

#[derive(Deserialize)]
struct SecretsEntry {
    client_id: String,
    client_secret: String,
    token_uri: String,
}

/// OAuth client identity loaded from the local credentials file.
#[derive(Clone)]
pub struct ClientSecrets {
    /// OAuth client identifier.
    pub client_id: String,
    client_secret: SecretString,
    /// Token endpoint URL.
    pub token_uri: String,
}

impl ClientSecrets {
    /// Loads client secrets from a credentials file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// carries neither an `installed` nor a `web` section.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| Error::CredentialsRead {
                path: path.to_path_buf(),
                source,
            })?;

        let file: SecretsFile =
            serde_json::from_slice(&raw).map_err(|source| Error::CredentialsParse {
                path: path.to_path_buf(),
                source,
            })?;

        let entry = file
            .installed
            .or(file.web)
            .ok_or_else(|| Error::InvalidConfig {
                message: format!(
                    "credentials file {} has neither an 'installed' nor a 'web' section",
                    path.display()
                ),
            })?;

        Ok(Self {
            client_id: entry.client_id,
            client_secret: SecretString::from(entry.client_secret),
            token_uri: entry.token_uri,
        })
    }

    /// Returns the client secret for the token exchange.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token cache
// ─────────────────────────────────────────────────────────────────────────────

/// On-disk token record. Kept separate from [`StoredToken`] because
/// secret strings deliberately do not serialize.
#[derive(Serialize, Deserialize)]
struct TokenRecord {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

/// A cached credential for one account.
#[derive(Clone)]
pub struct StoredToken {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    /// Access token expiry, if the provider reported one.
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Creates a token from its parts.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: refresh_token.map(SecretString::from),
            expiry,
        }
    }

    /// Returns the bearer access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Returns `true` when the access token is expired or expires
    /// within the refresh leeway. A token without a recorded expiry is
    /// assumed live.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + ChronoDuration::seconds(EXPIRY_LEEWAY_SECS) >= expiry,
            None => false,
        }
    }

    fn to_record(&self) -> TokenRecord {
        TokenRecord {
            access_token: self.access_token.expose_secret().to_string(),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expiry: self.expiry,
        }
    }

    fn from_record(record: TokenRecord) -> Self {
        Self::new(record.access_token, record.refresh_token, record.expiry)
    }
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// File-backed token cache, one JSON file per account.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the token file path for an account.
    #[must_use]
    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{account}.json"))
    }

    /// Loads the cached token for an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoCachedToken`] if no token has been cached
    /// yet, or [`Error::TokenCacheParse`] if the file is malformed.
    pub async fn load(&self, account: &str) -> Result<StoredToken> {
        let path = self.path_for(account);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NoCachedToken { path });
            }
            Err(source) => {
                return Err(Error::TokenCacheRead { path, source });
            }
        };

        let record: TokenRecord =
            serde_json::from_slice(&raw).map_err(|source| Error::TokenCacheParse {
                path: path.clone(),
                source,
            })?;

        Ok(StoredToken::from_record(record))
    }

    /// Persists a token for an account, creating the cache directory
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save(&self, account: &str, token: &StoredToken) -> Result<()> {
        let path = self.path_for(account);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| Error::TokenCacheWrite {
                path: path.clone(),
                source,
            })?;

        let raw = serde_json::to_vec_pretty(&token.to_record()).map_err(|source| {
            Error::TokenCacheParse {
                path: path.clone(),
                source,
            }
        })?;

        tokio::fs::write(&path, raw)
            .await
            .map_err(|source| Error::TokenCacheWrite { path, source })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorizer
// ─────────────────────────────────────────────────────────────────────────────

/// Successful response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Produces ready-to-use bearer tokens for one account, refreshing and
/// re-persisting as needed.
pub struct Authorizer {
    secrets: ClientSecrets,
    store: TokenStore,
    account: String,
    http: reqwest::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl Authorizer {
    /// Creates an authorizer from fetcher configuration, loading the
    /// client secrets file.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file is missing or
    /// malformed, or the HTTP client cannot be constructed.
    pub async fn from_config(config: &FetcherConfig) -> Result<Self> {
        let secrets = ClientSecrets::load(&config.credentials_path).await?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect)
            .timeout(config.timeouts.request)
            .build()
            .map_err(|e| Error::InvalidConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            secrets,
            store: TokenStore::new(&config.token_cache_dir),
            account: config.account().to_string(),
            http,
            cached: Mutex::new(None),
        })
    }

    /// Returns a live access token, refreshing the cached one first if
    /// it is expired.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is cached, the token is expired
    /// with no refresh token, or the refresh is rejected.
    #[instrument(name = "Authorizer::access_token", skip(self), fields(account = %self.account))]
    pub async fn access_token(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;

        if cached.is_none() {
            *cached = Some(self.store.load(&self.account).await?);
        }

        let token = cached.as_ref().expect("token just loaded");
        if !token.is_expired(Utc::now()) {
            return Ok(SecretString::from(token.access_token().to_string()));
        }

        debug!("Access token expired, refreshing");
        let refreshed = self.refresh(token).await?;
        self.store.save(&self.account, &refreshed).await?;
        let access = SecretString::from(refreshed.access_token().to_string());
        *cached = Some(refreshed);
        Ok(access)
    }

    /// Exchanges the refresh token for a new access token.
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_ref()
            .ok_or(Error::TokenExpired)?
            .expose_secret()
            .to_string();

        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|source| Error::TokenRefresh { source })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefreshRejected {
                status,
                body: sanitize_error_body(&body),
            });
        }

        let fresh: TokenResponse = response
            .json()
            .await
            .map_err(|source| Error::TokenRefresh { source })?;

        let expiry = fresh
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        debug!(?expiry, "Access token refreshed");

        // Providers rotate the refresh token only sometimes; keep the
        // old one when no replacement arrives
        Ok(StoredToken::new(
            fresh.access_token,
            fresh.refresh_token.or(Some(refresh_token)),
            expiry,
        ))
    }
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("account", &self.account)
            .field("secrets", &self.secrets)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_installed_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"installed": {
                "client_id": "abc.apps.example.com",
                "client_secret": "s3cret",
                "token_uri": "https://oauth2.example.com/token"
            }}"#,
        )
        .unwrap();

        let secrets = ClientSecrets::load(&path).await.unwrap();
        assert_eq!(secrets.client_id, "abc.apps.example.com");
        assert_eq!(secrets.client_secret(), "s3cret");
        assert_eq!(secrets.token_uri, "https://oauth2.example.com/token");
    }

    #[tokio::test]
    async fn test_load_web_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"web": {
                "client_id": "web-client",
                "client_secret": "s3cret",
                "token_uri": "https://oauth2.example.com/token"
            }}"#,
        )
        .unwrap();

        let secrets = ClientSecrets::load(&path).await.unwrap();
        assert_eq!(secrets.client_id, "web-client");
    }

    #[tokio::test]
    async fn test_missing_credentials_file() {
        let result = ClientSecrets::load(Path::new("/nonexistent/credentials.json")).await;
        assert!(matches!(result, Err(Error::CredentialsRead { .. })));
    }

    #[tokio::test]
    async fn test_secrets_without_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"other": {}}"#).unwrap();

        let result = ClientSecrets::load(&path).await;
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_secrets_debug_redacted() {
        let secrets = ClientSecrets {
            client_id: "id".into(),
            client_secret: SecretString::from("super-secret".to_string()),
            token_uri: "https://oauth2.example.com/token".into(),
        };
        let debug_str = format!("{secrets:?}");
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_token_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let expiry = Utc::now() + ChronoDuration::hours(1);
        let token = StoredToken::new("access-1", Some("refresh-1".into()), Some(expiry));
        store.save("me", &token).await.unwrap();

        let loaded = store.load("me").await.unwrap();
        assert_eq!(loaded.access_token(), "access-1");
        assert_eq!(loaded.expiry, Some(expiry));
    }

    #[tokio::test]
    async fn test_token_store_missing_is_no_cached_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let result = store.load("me").await;
        assert!(matches!(result, Err(Error::NoCachedToken { .. })));
    }

    #[tokio::test]
    async fn test_token_store_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        std::fs::write(store.path_for("me"), "not json").unwrap();

        let result = store.load("me").await;
        assert!(matches!(result, Err(Error::TokenCacheParse { .. })));
    }

    #[test]
    fn test_token_expiry_leeway() {
        let now = Utc::now();

        // Well in the future: live
        let token = StoredToken::new("a", None, Some(now + ChronoDuration::hours(1)));
        assert!(!token.is_expired(now));

        // Inside the leeway window: treat as expired
        let token = StoredToken::new("a", None, Some(now + ChronoDuration::seconds(30)));
        assert!(token.is_expired(now));

        // Already past: expired
        let token = StoredToken::new("a", None, Some(now - ChronoDuration::seconds(1)));
        assert!(token.is_expired(now));

        // No recorded expiry: assumed live
        let token = StoredToken::new("a", None, None);
        assert!(!token.is_expired(now));
    }

    #[test]
    fn test_token_debug_redacted() {
        let token = StoredToken::new("access-secret", Some("refresh-secret".into()), None);
        let debug_str = format!("{token:?}");
        assert!(!debug_str.contains("access-secret"));
        assert!(!debug_str.contains("refresh-secret"));
    }

    #[test]
    fn test_sanitize_error_body_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_error_body(&long);
        assert!(sanitized.len() < 250);
        assert!(sanitized.ends_with("(truncated)"));

        assert_eq!(sanitize_error_body("short"), "short");
    }
}
