//! Error types for the otp-login crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by their retryability - see [`Error::is_retryable`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during OTP retrieval and login automation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid account identifier format.
    #[error("invalid account identifier: {account}")]
    InvalidAccount {
        /// The invalid account identifier.
        account: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid OTP extraction pattern.
    #[error("invalid OTP pattern: {pattern}")]
    InvalidPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization errors (fatal, NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to read the client secrets file.
    #[error("failed to read credentials file {path}")]
    CredentialsRead {
        /// Path to the credentials file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Client secrets file did not parse.
    #[error("malformed credentials file {path}")]
    CredentialsParse {
        /// Path to the credentials file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// No cached token exists for the account.
    #[error(
        "no cached token at {path}; complete the authorization handshake \
         once to populate the token cache"
    )]
    NoCachedToken {
        /// Expected token file path.
        path: PathBuf,
    },

    /// Failed to read an existing token cache file.
    #[error("failed to read token cache file {path}")]
    TokenCacheRead {
        /// Path to the token file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Cached token file did not parse.
    #[error("malformed token cache file {path}")]
    TokenCacheParse {
        /// Path to the token file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to persist a refreshed token.
    #[error("failed to write token cache file {path}")]
    TokenCacheWrite {
        /// Path to the token file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Access token expired and no refresh token is cached.
    #[error("access token expired and no refresh token is available")]
    TokenExpired,

    /// Token refresh request failed at the transport level.
    #[error("token refresh request failed")]
    TokenRefresh {
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// Token endpoint rejected the refresh.
    #[error("token refresh rejected ({status}): {body}")]
    TokenRefreshRejected {
        /// HTTP status returned by the token endpoint.
        status: reqwest::StatusCode,
        /// Sanitized response body.
        body: String,
    },

    /// Mail API rejected the credential.
    #[error("mail API rejected the credential ({status})")]
    Unauthorized {
        /// HTTP status returned by the mail API.
        status: reqwest::StatusCode,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Mail API transport errors (RETRYABLE - could be transient)
    // ─────────────────────────────────────────────────────────────────────────
    /// HTTP request to the mail API failed.
    #[error("mail API request failed during {operation}")]
    ApiRequest {
        /// The operation being performed.
        operation: &'static str,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// Mail API returned a non-success status.
    #[error("mail API returned {status} during {operation}")]
    ApiStatus {
        /// The operation being performed.
        operation: &'static str,
        /// HTTP status returned by the mail API.
        status: reqwest::StatusCode,
    },

    /// Mail API response did not decode.
    #[error("failed to decode mail API response during {operation}")]
    ApiDecode {
        /// The operation being performed.
        operation: &'static str,
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Search result errors (NOT retryable; the polling loop maps these
    // to FetchOutcome::NotFoundYet)
    // ─────────────────────────────────────────────────────────────────────────
    /// The search query matched no messages.
    #[error("no OTP email found")]
    NoOtpEmail,

    /// Messages matched the query but none contained the pattern.
    #[error("OTP not found in recent emails")]
    OtpNotFound,

    /// The polling loop exhausted its attempt budget.
    #[error("OTP not found after waiting for new OTP ({attempts} attempts)")]
    OtpWaitExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Browser errors (fatal, NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// No Chrome or Chromium executable was found.
    #[error("no Chrome/Chromium executable found; install one or set the path explicitly")]
    ChromeNotFound,

    /// Browser launch or configuration failed.
    #[error("failed to launch browser: {message}")]
    BrowserLaunch {
        /// Description of the launch failure.
        message: String,
    },

    /// Page navigation failed.
    #[error("navigation to {url} failed")]
    Navigation {
        /// The URL being navigated to.
        url: String,
        /// The underlying CDP error.
        #[source]
        source: chromiumoxide::error::CdpError,
    },

    /// A page interaction failed at the protocol level.
    #[error("browser {operation} failed")]
    Page {
        /// The page operation being performed.
        operation: &'static str,
        /// The underlying CDP error.
        #[source]
        source: chromiumoxide::error::CdpError,
    },

    /// An element lookup found nothing.
    #[error("element not found: {locator}")]
    ElementNotFound {
        /// Description of the locator that failed.
        locator: String,
    },

    /// Waiting for an element to appear timed out.
    #[error("element {locator} did not appear within {timeout:?}")]
    ElementWaitTimeout {
        /// Description of the locator being waited for.
        locator: String,
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// Use this to implement retry logic:
    ///
    /// ```ignore
    /// if error.is_retryable() {
    ///     // Backoff and retry
    /// } else {
    ///     // Fail permanently
    /// }
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            // RETRYABLE errors: mail API transport
            Error::ApiRequest { .. } | Error::ApiStatus { .. } | Error::TokenRefresh { .. } => {
                true
            }

            // NOT retryable: config, authorization, decode, search results, browser
            Error::InvalidAccount { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidPattern { .. }
            | Error::CredentialsRead { .. }
            | Error::CredentialsParse { .. }
            | Error::NoCachedToken { .. }
            | Error::TokenCacheRead { .. }
            | Error::TokenCacheParse { .. }
            | Error::TokenCacheWrite { .. }
            | Error::TokenExpired
            | Error::TokenRefreshRejected { .. }
            | Error::Unauthorized { .. }
            | Error::ApiDecode { .. }
            | Error::NoOtpEmail
            | Error::OtpNotFound
            | Error::OtpWaitExhausted { .. }
            | Error::ChromeNotFound
            | Error::BrowserLaunch { .. }
            | Error::Navigation { .. }
            | Error::Page { .. }
            | Error::ElementNotFound { .. }
            | Error::ElementWaitTimeout { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAccount { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidPattern { .. } => ErrorCategory::Configuration,

            Error::CredentialsRead { .. }
            | Error::CredentialsParse { .. }
            | Error::NoCachedToken { .. }
            | Error::TokenCacheRead { .. }
            | Error::TokenCacheParse { .. }
            | Error::TokenCacheWrite { .. }
            | Error::TokenExpired
            | Error::TokenRefresh { .. }
            | Error::TokenRefreshRejected { .. }
            | Error::Unauthorized { .. } => ErrorCategory::Authorization,

            Error::ApiRequest { .. } | Error::ApiStatus { .. } | Error::ApiDecode { .. } => {
                ErrorCategory::Api
            }

            Error::NoOtpEmail | Error::OtpNotFound | Error::OtpWaitExhausted { .. } => {
                ErrorCategory::NotFound
            }

            Error::ChromeNotFound
            | Error::BrowserLaunch { .. }
            | Error::Navigation { .. }
            | Error::Page { .. }
            | Error::ElementNotFound { .. }
            | Error::ElementWaitTimeout { .. } => ErrorCategory::Browser,
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Credential and token errors.
    Authorization,
    /// Mail API transport errors.
    Api,
    /// No matching content found.
    NotFound,
    /// Browser automation errors.
    Browser,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Authorization => write!(f, "authorization"),
            ErrorCategory::Api => write!(f, "api"),
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Browser => write!(f, "browser"),
        }
    }
}
