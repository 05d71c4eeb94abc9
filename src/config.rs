//! Configuration for the OTP fetcher and the login driver.
//!
//! Use the builders to create configurations with sensible defaults:
//!
//! ```
//! use otp_login::{DriverConfig, FetcherConfig};
//!
//! let fetcher = FetcherConfig::builder()
//!     .account("me")
//!     .search_query("from:support@example.com subject:login code")
//!     .build()
//!     .expect("valid config");
//!
//! let driver = DriverConfig::builder()
//!     .sign_in_url("https://example.com/sign-in")
//!     .build()
//!     .expect("valid config");
//! ```
//!
//! Everything the original flow hard-coded - the search query, the
//! extraction pattern, the sign-in URL, the selectors, the retry
//! budget - is injected here instead.

use crate::browser::Locator;
use crate::error::{Error, Result};
use crate::matcher::BOLD_CENTERED_PATTERN;
use email_address::EmailAddress;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Default mail API base URL.
pub(crate) const DEFAULT_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Account alias the mail API accepts for "the authorized mailbox".
const SELF_ACCOUNT: &str = "me";

/// Configuration for the OTP fetcher.
///
/// Create using [`FetcherConfig::builder()`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Mailbox account identifier (`"me"` or an email address).
    account: String,
    /// Path to the OAuth client secrets file.
    pub credentials_path: PathBuf,
    /// Directory holding cached tokens, one JSON file per account.
    pub token_cache_dir: PathBuf,
    /// Provider search query selecting the OTP sender and subject.
    pub search_query: String,
    /// Regex with one capture group extracting the code from a body.
    pub otp_pattern: String,
    /// Maximum number of recent matches to inspect.
    pub max_results: u32,
    /// Mail API base URL (overridable for tests and proxies).
    pub api_base: String,
    /// HTTP timeout configuration.
    pub timeouts: HttpTimeouts,
}

impl FetcherConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> FetcherConfigBuilder {
        FetcherConfigBuilder::default()
    }

    /// Returns the account identifier.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns the token cache file path for this account.
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.token_cache_dir.join(format!("{}.json", self.account))
    }
}

/// HTTP timeout configuration for mail API and token requests.
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    /// Timeout for establishing a connection.
    pub connect: Duration,
    /// Timeout for a whole request.
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

/// Validates a mailbox account identifier.
///
/// The provider's `"me"` alias is accepted verbatim; anything else must
/// be a syntactically valid email address.
fn validate_account(account: &str) -> Result<()> {
    if account == SELF_ACCOUNT || EmailAddress::is_valid(account) {
        Ok(())
    } else {
        Err(Error::InvalidAccount {
            account: account.to_string(),
        })
    }
}

/// Builder for [`FetcherConfig`].
#[derive(Debug, Default)]
pub struct FetcherConfigBuilder {
    account: Option<String>,
    credentials_path: Option<PathBuf>,
    token_cache_dir: Option<PathBuf>,
    search_query: Option<String>,
    otp_pattern: Option<String>,
    max_results: Option<u32>,
    api_base: Option<String>,
    timeouts: Option<HttpTimeouts>,
}

impl FetcherConfigBuilder {
    /// Sets the mailbox account identifier (required).
    ///
    /// Use `"me"` for the mailbox the cached token belongs to, or an
    /// explicit email address.
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Sets the path to the OAuth client secrets file.
    ///
    /// Default is `credentials.json` in the working directory.
    #[must_use]
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Sets the token cache directory.
    ///
    /// Default is `tokens` in the working directory.
    #[must_use]
    pub fn token_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_cache_dir = Some(dir.into());
        self
    }

    /// Sets the provider search query (required).
    ///
    /// This is the sender/subject filter, e.g.
    /// `from:support@example.com subject:login code`.
    #[must_use]
    pub fn search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    /// Sets the OTP extraction pattern.
    ///
    /// Must contain one capture group. Default is the bold-centered
    /// HTML fragment pattern ([`BOLD_CENTERED_PATTERN`]).
    #[must_use]
    pub fn otp_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.otp_pattern = Some(pattern.into());
        self
    }

    /// Sets how many recent matches to inspect. Default is 5.
    #[must_use]
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Overrides the mail API base URL.
    #[must_use]
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Sets HTTP timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: HttpTimeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, the account
    /// identifier is invalid, or the pattern does not compile.
    pub fn build(self) -> Result<FetcherConfig> {
        let account = self.account.ok_or_else(|| Error::InvalidConfig {
            message: "account is required".into(),
        })?;
        validate_account(&account)?;

        let search_query = self.search_query.ok_or_else(|| Error::InvalidConfig {
            message: "search_query is required".into(),
        })?;

        let otp_pattern = self
            .otp_pattern
            .unwrap_or_else(|| BOLD_CENTERED_PATTERN.to_string());
        // Compile once here so a bad pattern fails at build time, not
        // mid-poll
        Regex::new(&otp_pattern).map_err(|source| Error::InvalidPattern {
            pattern: otp_pattern.clone(),
            source,
        })?;

        Ok(FetcherConfig {
            account,
            credentials_path: self
                .credentials_path
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
            token_cache_dir: self
                .token_cache_dir
                .unwrap_or_else(|| PathBuf::from("tokens")),
            search_query,
            otp_pattern,
            max_results: self.max_results.unwrap_or(5),
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeouts: self.timeouts.unwrap_or_default(),
        })
    }
}

/// Polling configuration for the driver's await-new-OTP loop.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Upper bound on fetch attempts.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Selectors addressing the sign-in page elements.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// The account identifier field.
    pub identifier_field: Locator,
    /// The action that triggers the OTP send.
    pub continue_button: Locator,
    /// Marker that the segmented OTP widget has appeared.
    pub otp_input_marker: Locator,
    /// ARIA label prefix of the per-digit inputs; position is appended
    /// (`"OTP Input"` yields `OTP Input 1` .. `OTP Input 6`).
    pub otp_digit_label: String,
    /// The final submit action.
    pub submit_button: Locator,
}

impl SelectorConfig {
    /// Returns the locator for the digit input at 1-based `position`.
    #[must_use]
    pub fn otp_digit(&self, position: usize) -> Locator {
        Locator::AriaLabel(format!("{} {position}", self.otp_digit_label))
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            identifier_field: Locator::Placeholder("Email".into()),
            continue_button: Locator::ButtonText("Continue".into()),
            otp_input_marker: Locator::Css("input[aria-label^='OTP Input']".into()),
            otp_digit_label: "OTP Input".into(),
            submit_button: Locator::ButtonText("Login".into()),
        }
    }
}

/// Configuration for the login driver.
///
/// Create using [`DriverConfig::builder()`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// URL of the sign-in page.
    pub sign_in_url: String,
    /// Page element selectors.
    pub selectors: SelectorConfig,
    /// Retry budget for the await-new-OTP loop.
    pub polling: PollingConfig,
    /// Bound on waiting for the OTP widget to appear after the send
    /// is triggered.
    pub load_timeout: Duration,
}

impl DriverConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }
}

/// Builder for [`DriverConfig`].
#[derive(Debug, Default)]
pub struct DriverConfigBuilder {
    sign_in_url: Option<String>,
    selectors: Option<SelectorConfig>,
    polling: Option<PollingConfig>,
    load_timeout: Option<Duration>,
}

impl DriverConfigBuilder {
    /// Sets the sign-in page URL (required).
    #[must_use]
    pub fn sign_in_url(mut self, url: impl Into<String>) -> Self {
        self.sign_in_url = Some(url.into());
        self
    }

    /// Sets the page element selectors.
    #[must_use]
    pub fn selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = Some(selectors);
        self
    }

    /// Sets polling configuration.
    #[must_use]
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = Some(polling);
        self
    }

    /// Sets the upper bound on fetch attempts.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .max_attempts = max_attempts;
        self
    }

    /// Sets the delay between fetch attempts.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.polling
            .get_or_insert_with(PollingConfig::default)
            .retry_delay = delay;
        self
    }

    /// Sets the bound on waiting for the OTP widget.
    #[must_use]
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<DriverConfig> {
        let sign_in_url = self.sign_in_url.ok_or_else(|| Error::InvalidConfig {
            message: "sign_in_url is required".into(),
        })?;

        let polling = self.polling.unwrap_or_default();
        if polling.max_attempts == 0 {
            return Err(Error::InvalidConfig {
                message: "max_attempts must be > 0".into(),
            });
        }

        Ok(DriverConfig {
            sign_in_url,
            selectors: self.selectors.unwrap_or_default(),
            polling,
            load_timeout: self.load_timeout.unwrap_or(Duration::from_secs(30)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_builder_minimal() {
        let config = FetcherConfig::builder()
            .account("me")
            .search_query("from:support@example.com subject:OTP")
            .build()
            .unwrap();

        assert_eq!(config.account(), "me");
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.token_cache_dir, PathBuf::from("tokens"));
        assert_eq!(config.otp_pattern, BOLD_CENTERED_PATTERN);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_fetcher_builder_full() {
        let config = FetcherConfig::builder()
            .account("user@example.com")
            .credentials_path("/etc/otp/credentials.json")
            .token_cache_dir("/var/cache/otp")
            .search_query("from:noreply@example.com")
            .otp_pattern(r"code:\s*(\d{6})")
            .max_results(3)
            .api_base("http://localhost:8080/v1")
            .build()
            .unwrap();

        assert_eq!(config.account(), "user@example.com");
        assert_eq!(config.max_results, 3);
        assert_eq!(
            config.token_path(),
            PathBuf::from("/var/cache/otp/user@example.com.json")
        );
    }

    #[test]
    fn test_fetcher_builder_missing_account() {
        let result = FetcherConfig::builder().search_query("from:a@b.c").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_fetcher_builder_missing_query() {
        let result = FetcherConfig::builder().account("me").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_fetcher_builder_invalid_account() {
        let result = FetcherConfig::builder()
            .account("not an address")
            .search_query("from:a@b.c")
            .build();
        assert!(matches!(result, Err(Error::InvalidAccount { .. })));
    }

    #[test]
    fn test_fetcher_builder_invalid_pattern() {
        let result = FetcherConfig::builder()
            .account("me")
            .search_query("from:a@b.c")
            .otp_pattern(r"(\d{6}")
            .build();
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_driver_builder_defaults() {
        let config = DriverConfig::builder()
            .sign_in_url("https://example.com/sign-in")
            .build()
            .unwrap();

        assert_eq!(config.polling.max_attempts, 10);
        assert_eq!(config.polling.retry_delay, Duration::from_secs(1));
        assert_eq!(config.load_timeout, Duration::from_secs(30));
        assert_eq!(
            config.selectors.identifier_field,
            Locator::Placeholder("Email".into())
        );
    }

    #[test]
    fn test_driver_builder_missing_url() {
        let result = DriverConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_driver_builder_zero_attempts_rejected() {
        let result = DriverConfig::builder()
            .sign_in_url("https://example.com/sign-in")
            .max_attempts(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_driver_builder_polling_overrides() {
        let config = DriverConfig::builder()
            .sign_in_url("https://example.com/sign-in")
            .max_attempts(4)
            .retry_delay(Duration::from_millis(250))
            .build()
            .unwrap();

        assert_eq!(config.polling.max_attempts, 4);
        assert_eq!(config.polling.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_otp_digit_locator() {
        let selectors = SelectorConfig::default();
        assert_eq!(
            selectors.otp_digit(3),
            Locator::AriaLabel("OTP Input 3".into())
        );
    }
}
