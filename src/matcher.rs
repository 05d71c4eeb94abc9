//! Email content matching for extracting OTP codes from message bodies.
//!
//! The [`Matcher`] trait abstracts the extraction step so the fetcher
//! can be pointed at different mail templates. [`OtpMatcher::bold_centered`]
//! carries the production pattern: a 6-digit code inside a bold,
//! centered `<div>`.
//!
//! # Example
//!
//! ```
//! use otp_login::matcher::{Matcher, OtpMatcher, RegexMatcher};
//!
//! let otp = OtpMatcher::bold_centered();
//! let body = r#"<div style="font-weight: bold; text-align: center;">123456</div>"#;
//! assert_eq!(otp.find_match(body).as_deref(), Some("123456"));
//!
//! // Custom template
//! let custom = RegexMatcher::new(r"your code is (\d{6})").unwrap();
//! assert_eq!(custom.find_match("your code is 654321").as_deref(), Some("654321"));
//! ```

use regex::Regex;
use std::borrow::Cow;

/// Pattern extracting a 6-digit code from the OTP mail's styled `<div>`.
///
/// The capture group is the code itself, so a match is exactly six
/// ASCII digits by construction.
pub const BOLD_CENTERED_PATTERN: &str = r#"font-weight: bold; text-align: center;">(\d{6})</div>"#;

/// Trait for matching and extracting content from email bodies.
///
/// Implement this trait to define custom extraction logic.
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns `Some(matched_value)` if found, `None` otherwise.
    /// Uses `Cow<str>` to avoid allocations when the match can be borrowed
    /// directly from the input text.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging and error messages.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group.
///
/// # Example
///
/// ```
/// use otp_login::matcher::{Matcher, RegexMatcher};
///
/// let matcher = RegexMatcher::new(r"code:\s*(\d+)").unwrap();
/// assert_eq!(matcher.find_match("Your code: 42"), Some("42".into()));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// The regex should contain at least one capture group. The first capture group
    /// will be extracted as the match result.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: format!("regex pattern: {pattern}"),
            regex,
        })
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: description.into(),
            regex,
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for OTP (One-Time Password) codes.
#[derive(Debug, Clone)]
pub struct OtpMatcher {
    inner: RegexMatcher,
}

impl OtpMatcher {
    /// Creates a matcher for the bold, centered `<div>` the OTP mail
    /// template wraps its code in ([`BOLD_CENTERED_PATTERN`]).
    #[must_use]
    pub fn bold_centered() -> Self {
        Self {
            inner: RegexMatcher::with_description(
                BOLD_CENTERED_PATTERN,
                "6-digit code in bold centered div",
            )
            .expect("valid regex"),
        }
    }

    /// Creates a matcher for bare 6-digit OTP codes.
    #[must_use]
    pub fn six_digit() -> Self {
        Self::n_digit(6)
    }

    /// Creates a matcher for bare N-digit OTP codes.
    ///
    /// Uses word boundaries to match exactly N digits.
    ///
    /// # Panics
    ///
    /// Panics if `digits` is 0.
    #[must_use]
    pub fn n_digit(digits: usize) -> Self {
        assert!(digits > 0, "digits must be > 0");
        let pattern = format!(r"\b(\d{{{digits}}})\b");
        Self {
            inner: RegexMatcher::with_description(&pattern, format!("{digits}-digit OTP code"))
                .expect("valid regex"),
        }
    }

    /// Creates a matcher for OTP codes with a custom regex.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn custom(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            inner: RegexMatcher::with_description(pattern, "custom OTP pattern")?,
        })
    }
}

impl Matcher for OtpMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}
