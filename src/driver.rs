//! Login driver: the Start → AwaitNewOTP → Submit state machine.
//!
//! The driver owns one login attempt end to end: it opens the sign-in
//! page, triggers the OTP send, polls the mailbox until a *new* code
//! appears (one differing from whatever was last seen before the
//! trigger), and types the code into the segmented input.
//!
//! The polling loop sleeps asynchronously, so a caller can bound or
//! abort a stuck run by racing the returned future:
//!
//! ```no_run
//! # use otp_login::{LoginDriver, OtpSource, PageDriver};
//! # async fn example<P: PageDriver, S: OtpSource>(
//! #     mut driver: LoginDriver<P, S>,
//! # ) -> otp_login::Result<()> {
//! use std::time::Duration;
//!
//! let run = driver.run("user@example.com");
//! match tokio::time::timeout(Duration::from_secs(60), run).await {
//!     Ok(outcome) => {
//!         let otp = outcome?;
//!         println!("Logged in with {otp}");
//!     }
//!     Err(_) => println!("Login run aborted"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::browser::PageDriver;
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::fetcher::{FetchOutcome, OtpSource};
use tracing::{debug, info, instrument, warn};

/// Drives one automated login attempt.
///
/// Generic over the two collaborators: the browser page and the OTP
/// source. Failures in any phase abort the run; nothing is retried at
/// this level except the bounded OTP poll.
pub struct LoginDriver<P, S> {
    page: P,
    otp_source: S,
    config: DriverConfig,
}

impl<P: PageDriver, S: OtpSource> LoginDriver<P, S> {
    /// Creates a driver from its collaborators and configuration.
    pub fn new(page: P, otp_source: S, config: DriverConfig) -> Self {
        Self {
            page,
            otp_source,
            config,
        }
    }

    /// Runs the full login attempt and returns the accepted OTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OtpWaitExhausted`] when no fresh code appears
    /// within the attempt budget, or a browser error if any page
    /// interaction fails.
    #[instrument(name = "LoginDriver::run", skip(self))]
    pub async fn run(&mut self, identifier: &str) -> Result<String> {
        let last_otp = self.start(identifier).await?;
        let otp = self.await_new_otp(last_otp.as_deref()).await?;
        self.submit(&otp).await?;

        info!("Login submitted");
        Ok(otp)
    }

    /// Start phase: open the page, fill the identifier, capture the
    /// prior OTP, trigger the send, and wait for the OTP widget.
    ///
    /// The prior fetch is allowed to find nothing - a mailbox with no
    /// OTP mail yet is an expected state, not an error.
    async fn start(&mut self, identifier: &str) -> Result<Option<String>> {
        let selectors = self.config.selectors.clone();

        self.page.navigate(&self.config.sign_in_url).await?;
        self.page
            .fill(&selectors.identifier_field, identifier)
            .await?;

        // Snapshot before triggering the send, so a code already
        // sitting in the inbox is not mistaken for the fresh one
        let last_otp = self.otp_source.try_fetch_latest().await;
        debug!(had_prior = last_otp.is_some(), "Captured prior OTP state");

        self.page.click(&selectors.continue_button).await?;
        self.page
            .wait_for(&selectors.otp_input_marker, self.config.load_timeout)
            .await?;

        Ok(last_otp)
    }

    /// AwaitNewOTP phase: bounded poll for a code differing from
    /// `last_otp`.
    #[instrument(name = "LoginDriver::await_new_otp", skip(self, last_otp))]
    async fn await_new_otp(&self, last_otp: Option<&str>) -> Result<String> {
        let max_attempts = self.config.polling.max_attempts;
        let retry_delay = self.config.polling.retry_delay;

        let mut attempt = 0;
        while attempt < max_attempts {
            match self.otp_source.poll().await {
                FetchOutcome::Found(candidate) if last_otp != Some(candidate.as_str()) => {
                    info!(attempt = attempt + 1, "Accepted fresh OTP");
                    return Ok(candidate);
                }
                FetchOutcome::Found(_) => {
                    debug!(attempt = attempt + 1, "Fetched OTP is stale, retrying");
                }
                FetchOutcome::NotFoundYet => {
                    debug!(attempt = attempt + 1, "No OTP available yet, retrying");
                }
                FetchOutcome::Failed(error) => {
                    warn!(attempt = attempt + 1, %error, "OTP fetch failed, retrying");
                }
            }

            tokio::time::sleep(retry_delay).await;
            attempt += 1;
        }

        Err(Error::OtpWaitExhausted {
            attempts: max_attempts,
        })
    }

    /// Submit phase: type the code digit by digit into the segmented
    /// input, then trigger the login action.
    async fn submit(&mut self, otp: &str) -> Result<()> {
        let selectors = self.config.selectors.clone();

        for (index, digit) in otp.chars().enumerate() {
            let locator = selectors.otp_digit(index + 1);
            self.page.fill(&locator, &digit.to_string()).await?;
        }

        self.page.click(&selectors.submit_button).await
    }
}

impl<P, S> std::fmt::Debug for LoginDriver<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginDriver")
            .field("sign_in_url", &self.config.sign_in_url)
            .field("max_attempts", &self.config.polling.max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Locator;
    use crate::fetcher::OtpSource;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// OTP source fed a fixed sequence of fetch results.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<String>>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<String>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OtpSource for ScriptedSource {
        async fn fetch_latest(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(Error::NoOtpEmail))
        }
    }

    /// Page driver that records every interaction and always succeeds.
    #[derive(Default)]
    struct RecordingPage {
        actions: Vec<String>,
    }

    #[async_trait]
    impl PageDriver for RecordingPage {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.actions.push(format!("navigate {url}"));
            Ok(())
        }

        async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()> {
            self.actions.push(format!("fill {locator} = {text}"));
            Ok(())
        }

        async fn click(&mut self, locator: &Locator) -> Result<()> {
            self.actions.push(format!("click {locator}"));
            Ok(())
        }

        async fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> Result<()> {
            self.actions.push(format!("wait_for {locator}"));
            Ok(())
        }
    }

    fn config() -> DriverConfig {
        DriverConfig::builder()
            .sign_in_url("https://example.com/sign-in")
            .build()
            .unwrap()
    }

    fn driver(script: Vec<Result<String>>) -> LoginDriver<RecordingPage, ScriptedSource> {
        LoginDriver::new(RecordingPage::default(), ScriptedSource::new(script), config())
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepts_fresh_otp_after_failures_and_stale_reads() {
        // fail, stale, stale, fresh - accepted on the 4th attempt
        let driver = driver(vec![
            Err(Error::NoOtpEmail),
            Ok("111111".into()),
            Ok("111111".into()),
            Ok("654321".into()),
        ]);

        let otp = driver.await_new_otp(Some("111111")).await.unwrap();
        assert_eq!(otp, "654321");
        assert_eq!(driver.otp_source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempt_budget_on_stale_results() {
        let driver = driver((0..10).map(|_| Ok("111111".into())).collect());

        let result = driver.await_new_otp(Some("111111")).await;
        assert!(matches!(
            result,
            Err(Error::OtpWaitExhausted { attempts: 10 })
        ));
        assert_eq!(driver.otp_source.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_code_accepted_when_no_prior_otp() {
        // With no prior OTP established, the first successful fetch is
        // fresh by definition
        let driver = driver(vec![Ok("111111".into())]);

        let otp = driver.await_new_otp(None).await.unwrap();
        assert_eq!(otp, "111111");
        assert_eq!(driver.otp_source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_consume_attempts() {
        let driver = driver(vec![
            Err(Error::ApiStatus {
                operation: "search",
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            }),
            Ok("222222".into()),
        ]);

        let otp = driver.await_new_otp(None).await.unwrap();
        assert_eq!(otp, "222222");
        assert_eq!(driver.otp_source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_fills_each_digit_by_position() {
        let mut driver = driver(vec![]);

        driver.submit("048213").await.unwrap();

        let fills: Vec<&String> = driver
            .page
            .actions
            .iter()
            .filter(|a| a.starts_with("fill"))
            .collect();
        assert_eq!(fills.len(), 6);
        for (i, digit) in "048213".chars().enumerate() {
            assert_eq!(
                fills[i],
                &format!("fill [aria-label='OTP Input {}'] = {digit}", i + 1)
            );
        }
        assert_eq!(
            driver.page.actions.last().unwrap(),
            "click button 'Login'"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_swallows_missing_prior_otp() {
        let mut driver = driver(vec![Err(Error::NoOtpEmail)]);

        let last_otp = driver.start("user@example.com").await.unwrap();
        assert_eq!(last_otp, None);
        assert_eq!(
            driver.page.actions,
            vec![
                "navigate https://example.com/sign-in",
                "fill input[placeholder='Email'] = user@example.com",
                "click button 'Continue'",
                "wait_for input[aria-label^='OTP Input']",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_sequences_phases() {
        // Start consumes the first fetch (prior OTP), the poll loop
        // sees a stale read then the fresh code
        let mut driver = driver(vec![
            Ok("111111".into()),
            Ok("111111".into()),
            Ok("654321".into()),
        ]);

        let otp = driver.run("user@example.com").await.unwrap();
        assert_eq!(otp, "654321");
        assert_eq!(driver.otp_source.calls(), 3);

        // Phases in order: navigate, identifier fill, continue, wait,
        // six digit fills, submit
        assert_eq!(driver.page.actions.len(), 4 + 6 + 1);
        assert!(driver.page.actions[0].starts_with("navigate"));
        assert_eq!(
            driver.page.actions.last().unwrap(),
            "click button 'Login'"
        );
    }
}
