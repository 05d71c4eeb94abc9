//! Browser automation seam and its CDP-backed implementation.
//!
//! The login driver talks to the page through [`PageDriver`], which
//! covers exactly the primitives the flow needs: navigate and wait for
//! load, fill, click, and wait for an element to appear. Elements are
//! addressed with [`Locator`]s - raw CSS, placeholder text, ARIA label,
//! or visible button text.
//!
//! [`BrowserSession`] owns the browser process and its CDP event
//! handler task. Dropping the session releases both, so a panicking or
//! early-returning run cannot leak browser processes across attempts;
//! prefer the explicit [`BrowserSession::close`] for a clean shutdown.

use crate::error::{Error, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// How an element on the sign-in page is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Raw CSS selector.
    Css(String),
    /// Input with the given placeholder text.
    Placeholder(String),
    /// Element with the given ARIA label.
    AriaLabel(String),
    /// Button with the given visible text (whitespace-normalized).
    ButtonText(String),
}

impl Locator {
    /// Returns the CSS selector form, if this locator has one.
    ///
    /// `ButtonText` has no CSS equivalent and is resolved by scanning
    /// button text in the page.
    #[must_use]
    pub fn as_css(&self) -> Option<String> {
        match self {
            Locator::Css(css) => Some(css.clone()),
            Locator::Placeholder(text) => Some(format!("input[placeholder='{text}']")),
            Locator::AriaLabel(label) => Some(format!("[aria-label='{label}']")),
            Locator::ButtonText(_) => None,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "{css}"),
            Locator::Placeholder(text) => write!(f, "input[placeholder='{text}']"),
            Locator::AriaLabel(label) => write!(f, "[aria-label='{label}']"),
            Locator::ButtonText(text) => write!(f, "button '{text}'"),
        }
    }
}

/// The browser collaborator: the page-interaction primitives the login
/// flow relies on.
#[async_trait::async_trait]
pub trait PageDriver: Send {
    /// Navigates to a URL and waits for the page to finish loading.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Fills an input addressed by a CSS-able locator.
    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()>;

    /// Clicks an element.
    async fn click(&mut self, locator: &Locator) -> Result<()>;

    /// Waits for an element to appear, up to `timeout`.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;
}

/// Options for launching the browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window. Default true.
    pub headless: bool,
    /// Explicit Chrome/Chromium executable; auto-discovered if unset.
    pub chrome_path: Option<String>,
    /// Profile directory; a temporary one is used if unset.
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_data_dir: None,
        }
    }
}

/// A launched browser plus its CDP event-handler task.
///
/// Dropping the session aborts the handler and tears the browser
/// process down with it.
pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl BrowserSession {
    /// Launches a browser.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChromeNotFound`] if no executable could be
    /// located, or [`Error::BrowserLaunch`] if the launch fails.
    #[instrument(name = "BrowserSession::launch", skip_all, fields(headless = options.headless))]
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let chrome_path = match &options.chrome_path {
            Some(path) => path.clone(),
            None => find_chrome().ok_or(Error::ChromeNotFound)?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        if !options.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|message| Error::BrowserLaunch { message })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| Error::BrowserLaunch {
                    message: e.to_string(),
                })?;

        // The handler must be polled for the CDP connection to make
        // progress; it runs until the browser goes away
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        debug!("Browser launched");

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Opens a fresh page.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be created.
    pub async fn new_page(&self) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|source| Error::Page {
                operation: "new_page",
                source,
            })?;
        Ok(ChromiumPage { page })
    }

    /// Shuts the browser down cleanly.
    ///
    /// Dropping the session also releases everything, just less
    /// politely.
    ///
    /// # Errors
    ///
    /// Returns an error if the close command fails; the process is
    /// torn down regardless.
    pub async fn close(mut self) -> Result<()> {
        let result = self.browser.close().await.map_err(|source| Error::Page {
            operation: "close",
            source,
        });
        self.handler_task.abort();
        result.map(|_| ())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession").finish_non_exhaustive()
    }
}

/// [`PageDriver`] implementation over a CDP page.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
}

impl ChromiumPage {
    /// Evaluates a boolean-returning script in the page.
    async fn eval_bool(&self, operation: &'static str, js: &str) -> Result<bool> {
        let value: serde_json::Value = self
            .page
            .evaluate(js)
            .await
            .map_err(|source| Error::Page { operation, source })?
            .into_value()
            .unwrap_or(serde_json::Value::Bool(false));
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait::async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|source| Error::Navigation {
                url: url.to_string(),
                source,
            })?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|source| Error::Navigation {
                url: url.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()> {
        let Some(css) = locator.as_css() else {
            return Err(Error::InvalidConfig {
                message: format!("cannot fill {locator}: not an input locator"),
            });
        };

        let element =
            self.page
                .find_element(css)
                .await
                .map_err(|_| Error::ElementNotFound {
                    locator: locator.to_string(),
                })?;

        element
            .click()
            .await
            .map_err(|source| Error::Page {
                operation: "fill",
                source,
            })?
            .type_str(text)
            .await
            .map_err(|source| Error::Page {
                operation: "fill",
                source,
            })?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        match locator.as_css() {
            Some(css) => {
                let element =
                    self.page
                        .find_element(css)
                        .await
                        .map_err(|_| Error::ElementNotFound {
                            locator: locator.to_string(),
                        })?;
                element.click().await.map_err(|source| Error::Page {
                    operation: "click",
                    source,
                })?;
                Ok(())
            }
            None => {
                let Locator::ButtonText(text) = locator else {
                    unreachable!("only ButtonText lacks a CSS form");
                };
                let clicked = self
                    .eval_bool("click", &click_button_by_text_js(text))
                    .await?;
                if clicked {
                    Ok(())
                } else {
                    Err(Error::ElementNotFound {
                        locator: locator.to_string(),
                    })
                }
            }
        }
    }

    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let js = exists_js(locator);
        let deadline = Instant::now() + timeout;

        loop {
            if self.eval_bool("wait_for", &js).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(%locator, ?timeout, "Element did not appear");
                return Err(Error::ElementWaitTimeout {
                    locator: locator.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

impl std::fmt::Debug for ChromiumPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumPage").finish_non_exhaustive()
    }
}

/// Quotes a string as a JS literal.
fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Script that clicks the first button whose normalized text matches.
fn click_button_by_text_js(text: &str) -> String {
    format!(
        r#"(function() {{
  const wanted = {wanted};
  const norm = (s) => String(s || '').replace(/\s+/g, ' ').trim();
  const btn = Array.from(document.querySelectorAll('button'))
    .find((b) => norm(b.textContent) === wanted);
  if (!btn) return false;
  try {{ btn.click(); return true; }} catch (_) {{ return false; }}
}})()"#,
        wanted = js_string(text)
    )
}

/// Script that reports whether an element matching the locator exists.
fn exists_js(locator: &Locator) -> String {
    match locator.as_css() {
        Some(css) => format!("!!document.querySelector({})", js_string(&css)),
        None => {
            let Locator::ButtonText(text) = locator else {
                unreachable!("only ButtonText lacks a CSS form");
            };
            format!(
                r#"(function() {{
  const wanted = {wanted};
  const norm = (s) => String(s || '').replace(/\s+/g, ' ').trim();
  return Array.from(document.querySelectorAll('button'))
    .some((b) => norm(b.textContent) === wanted);
}})()"#,
                wanted = js_string(text)
            )
        }
    }
}

/// Finds a Chrome/Chromium executable on this machine.
fn find_chrome() -> Option<String> {
    for name in ["google-chrome", "google-chrome-stable", "chromium"] {
        if let Ok(output) = std::process::Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(path);
                }
            }
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ];
    candidates
        .iter()
        .find(|path| std::path::Path::new(path).exists())
        .map(|path| (*path).to_string())
}
