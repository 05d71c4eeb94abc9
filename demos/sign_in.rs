//! Full demo: automated sign-in with an email OTP.
//!
//! Opens the sign-in page, triggers the OTP send, polls the mailbox
//! until a fresh code arrives, and submits it.
//!
//! # Usage
//!
//! ```bash
//! export OTP_ACCOUNT="me"
//! export OTP_SEARCH_QUERY="from:support@example.com subject:login code"
//! export SIGN_IN_URL="https://example.com/sign-in"
//! export SIGN_IN_IDENTIFIER="you@example.com"
//! cargo run --example sign_in
//! ```
//!
//! Requires a Chrome/Chromium install, a client secrets file, and a
//! cached token. Set `RUST_LOG=otp_login=debug` to watch the phases.

use otp_login::{
    BrowserOptions, BrowserSession, DriverConfig, FetcherConfig, GmailMailbox, LoginDriver,
    OtpFetcher,
};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> otp_login::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let account = env::var("OTP_ACCOUNT").unwrap_or_else(|_| "me".to_string());
    let query = env::var("OTP_SEARCH_QUERY").expect("OTP_SEARCH_QUERY environment variable required");
    let sign_in_url = env::var("SIGN_IN_URL").expect("SIGN_IN_URL environment variable required");
    let identifier =
        env::var("SIGN_IN_IDENTIFIER").expect("SIGN_IN_IDENTIFIER environment variable required");

    // Mailbox side
    let fetcher_config = FetcherConfig::builder()
        .account(account)
        .search_query(query)
        .build()?;
    let mailbox = GmailMailbox::from_config(&fetcher_config).await?;
    let fetcher = OtpFetcher::new(mailbox, &fetcher_config)?;

    // Browser side
    println!("Launching browser...");
    let session = BrowserSession::launch(&BrowserOptions::default()).await?;
    let page = session.new_page().await?;

    let driver_config = DriverConfig::builder().sign_in_url(sign_in_url).build()?;
    let mut driver = LoginDriver::new(page, fetcher, driver_config);

    println!("Running login for {}...", identifier);
    match driver.run(&identifier).await {
        Ok(otp) => println!("Login submitted with OTP {}", otp),
        Err(e) => eprintln!("Login failed: {}", e),
    }

    session.close().await?;
    Ok(())
}
