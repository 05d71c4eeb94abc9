//! Basic demo: fetch the latest OTP code from a mailbox.
//!
//! # Usage
//!
//! ```bash
//! export OTP_ACCOUNT="me"
//! export OTP_SEARCH_QUERY="from:support@example.com subject:login code"
//! cargo run --example fetch_otp
//! ```
//!
//! A client secrets file (`credentials.json`) and a cached token
//! (`tokens/<account>.json`) must already exist - the consent flow is
//! not part of this crate.

use otp_login::{FetcherConfig, GmailMailbox, OtpFetcher};
use std::env;

#[tokio::main]
async fn main() -> otp_login::Result<()> {
    let account = env::var("OTP_ACCOUNT").unwrap_or_else(|_| "me".to_string());
    let query = env::var("OTP_SEARCH_QUERY").expect("OTP_SEARCH_QUERY environment variable required");

    println!("Searching mailbox '{}' for an OTP...", account);

    let config = FetcherConfig::builder()
        .account(account)
        .search_query(query)
        .build()?;

    let mailbox = GmailMailbox::from_config(&config).await?;
    let fetcher = OtpFetcher::new(mailbox, &config)?;

    match fetcher.fetch_latest().await {
        Ok(code) => println!("Got OTP code: {}", code),
        Err(e) => println!("No OTP available: {}", e),
    }

    Ok(())
}
