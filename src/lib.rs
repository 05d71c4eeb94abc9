//! # otp-login
//!
//! Async automation of an email-OTP login: poll a mailbox for the
//! one-time-password mail, extract the code, and type it into the
//! sign-in form through a browser session.
//!
//! Two components, invoked sequentially:
//!
//! - [`OtpFetcher`] - searches an authorized mailbox for the OTP
//!   sender/subject, decodes message bodies, and extracts a 6-digit
//!   code by pattern match.
//! - [`LoginDriver`] - opens the sign-in page, triggers the OTP send,
//!   polls the fetcher until a *new* code appears (or a retry budget
//!   runs out), and submits it digit by digit.
//!
//! ## Quick Start
//!
//! ```no_run
//! use otp_login::{
//!     BrowserOptions, BrowserSession, DriverConfig, FetcherConfig, GmailMailbox, LoginDriver,
//!     OtpFetcher,
//! };
//!
//! # async fn example() -> otp_login::Result<()> {
//! // Mailbox side: where the OTP mail arrives
//! let fetcher_config = FetcherConfig::builder()
//!     .account("me")
//!     .search_query("from:support@example.com subject:login code")
//!     .build()?;
//! let mailbox = GmailMailbox::from_config(&fetcher_config).await?;
//! let fetcher = OtpFetcher::new(mailbox, &fetcher_config)?;
//!
//! // Browser side: the sign-in page
//! let session = BrowserSession::launch(&BrowserOptions::default()).await?;
//! let page = session.new_page().await?;
//!
//! let driver_config = DriverConfig::builder()
//!     .sign_in_url("https://example.com/sign-in")
//!     .build()?;
//! let mut driver = LoginDriver::new(page, fetcher, driver_config);
//!
//! let otp = driver.run("user@example.com").await?;
//! println!("Logged in with {otp}");
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Preconditions
//!
//! The interactive authorization handshake is out of scope: a client
//! secrets file and a cached token (see [`auth`]) must already exist.
//! Only the read-only mailbox scope ([`auth::READONLY_SCOPE`]) is
//! needed.
//!
//! ## Error Handling
//!
//! All errors implement `std::error::Error` and provide context. Use
//! [`Error::is_retryable`] to separate transient mail API failures
//! from fatal ones; the driver's polling loop already folds the
//! expected "no code yet" conditions into [`FetchOutcome`] variants.
//!
//! ## Cancellation
//!
//! The driver's polling loop sleeps asynchronously; wrap
//! [`LoginDriver::run`] in `tokio::time::timeout` or race it with
//! `tokio::select!` to abort a stuck poll.
//!
//! ## Observability
//!
//! The crate uses `tracing` for instrumentation. Major operations emit
//! spans with structured fields:
//!
//! - `OtpFetcher::fetch_latest` - one mailbox sweep
//! - `LoginDriver::run` / `LoginDriver::await_new_otp` - login phases
//! - `GmailMailbox::search` / `GmailMailbox::fetch_full` - API calls
//! - `Authorizer::access_token` - token loading and refresh

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod auth;
pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod gmail;
pub mod mail;
pub mod matcher;

// Internal modules
mod parser;

// Re-exports for ergonomic API
pub use auth::{Authorizer, ClientSecrets, StoredToken, TokenStore};
pub use browser::{BrowserOptions, BrowserSession, ChromiumPage, Locator, PageDriver};
pub use config::{
    DriverConfig, DriverConfigBuilder, FetcherConfig, FetcherConfigBuilder, HttpTimeouts,
    PollingConfig, SelectorConfig,
};
pub use driver::LoginDriver;
pub use error::{Error, ErrorCategory, Result};
pub use fetcher::{FetchOutcome, OtpFetcher, OtpSource};
pub use gmail::GmailMailbox;
pub use mail::{Mailbox, Message, MessageRef};
