//! Chrome session driven over the DevTools protocol with `headless_chrome`.
//!
//! Elements of the top-level document are located through the crate's XPath
//! waits. The captcha lives in a cross-origin iframe the crate cannot query
//! into, so frame content is read with small scripts evaluated in the page
//! (site isolation is switched off at launch to make the frame reachable).

use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Network::{Cookie, CookieParam};
use headless_chrome::util::{Timeout, Wait};
use headless_chrome::{Browser, Element, LaunchOptionsBuilder, Tab};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long Chrome may sit without receiving a command before it is closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("timed out after {}s waiting for {locator}", .timeout.as_secs())]
    Timeout { locator: String, timeout: Duration },
    #[error("no such element: {0}")]
    NoSuchElement(String),
    #[error("unexpected script result: {0}")]
    Script(String),
    #[error(transparent)]
    Chrome(#[from] anyhow::Error),
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

/// Chrome launch options.
#[derive(Clone, Debug, Default)]
pub struct ChromeOptions {
    pub headless: bool,
    /// Chrome/Chromium binary; autodetected when unset
    pub binary: Option<PathBuf>,
}

impl ChromeOptions {
    /// Extra command-line switches passed to Chrome.
    fn args(&self) -> Vec<&'static str> {
        let mut args = vec![
            "--disable-site-isolation-trials",
            "--disable-features=IsolateOrigins,site-per-process",
            "--disable-web-security",
        ];
        if self.headless {
            args.extend(["--disable-gpu", "--disable-dev-shm-usage"]);
        }
        args
    }
}

/// A running Chrome with the one tab the check-in uses.
///
/// Dropping the session closes the browser.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
    timeout: Duration,
}

impl ChromeSession {
    /// Launches Chrome and opens a stealth-mode tab.
    ///
    /// `timeout` bounds every element wait.
    pub fn launch(options: &ChromeOptions, timeout: Duration) -> BrowserResult<Self> {
        let launch_opts = LaunchOptionsBuilder::default()
            .headless(options.headless)
            .sandbox(false)
            .path(options.binary.clone())
            .window_size(Some((1280, 900)))
            .idle_browser_timeout(IDLE_TIMEOUT)
            .args(options.args().into_iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid launch options: {}", e))?;

        let browser = Browser::new(launch_opts)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(timeout);
        tab.enable_stealth_mode()?;

        crate::log("Chrome session started");
        Ok(Self {
            _browser: browser,
            tab,
            timeout,
        })
    }

    pub fn goto(&self, url: &str) -> BrowserResult<()> {
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for an element of the top-level document.
    pub fn wait_for(&self, xpath: &str) -> BrowserResult<Element<'_>> {
        self.wait_for_with_timeout(xpath, self.timeout)
    }

    pub fn wait_for_with_timeout(&self, xpath: &str, timeout: Duration) -> BrowserResult<Element<'_>> {
        self.tab
            .wait_for_xpath_with_custom_timeout(xpath, timeout)
            .map_err(|e| wait_error(xpath, timeout, e))
    }

    pub fn type_into(&self, element: &Element<'_>, text: &str) -> BrowserResult<()> {
        element.click()?;
        element.type_into(text)?;
        Ok(())
    }

    pub fn click(&self, element: &Element<'_>) -> BrowserResult<()> {
        element.click()?;
        Ok(())
    }

    pub fn inner_text(&self, element: &Element<'_>) -> BrowserResult<String> {
        Ok(element.get_inner_text()?)
    }

    /// Dispatches a real mouse click at page coordinates.
    pub fn click_point(&self, x: f64, y: f64) -> BrowserResult<()> {
        self.tab.click_point(Point { x, y })?;
        Ok(())
    }

    /// Evaluates a script that returns a JSON-encoded string and decodes it.
    pub fn evaluate<T: DeserializeOwned>(&self, script: &str) -> BrowserResult<T> {
        let result = self.tab.evaluate(script, false)?;
        decode(result.value)
    }

    /// Polls `script` until it decodes to `Some`, or fails with a timeout
    /// naming `locator`.
    pub fn poll<T: DeserializeOwned>(&self, locator: &str, script: &str) -> BrowserResult<T> {
        let last_error = RefCell::new(None);
        let found = Wait::with_timeout(self.timeout).until(|| {
            match self.evaluate::<Option<T>>(script) {
                Ok(value) => value,
                Err(e) => {
                    last_error.replace(Some(e));
                    None
                }
            }
        });
        poll_outcome(found, last_error.into_inner(), locator, self.timeout)
    }

    pub fn cookies(&self) -> BrowserResult<Vec<Cookie>> {
        Ok(self.tab.get_cookies()?)
    }

    pub fn set_cookie(&self, cookie: CookieParam) -> BrowserResult<()> {
        self.tab.set_cookies(vec![cookie])?;
        Ok(())
    }

    /// Closes the browser.
    pub fn quit(self) {
        drop(self);
        crate::log("Chrome session closed");
    }
}

/// Maps a failed element wait to a typed error.
fn wait_error(locator: &str, timeout: Duration, error: anyhow::Error) -> BrowserError {
    if error.is::<Timeout>() {
        BrowserError::Timeout {
            locator: locator.to_string(),
            timeout,
        }
    } else {
        BrowserError::Chrome(error)
    }
}

/// Settles a finished poll. A Chrome failure seen while polling outranks the
/// timeout it caused; script results that never decoded count as not found.
fn poll_outcome<T>(
    found: Result<T, Timeout>,
    last_error: Option<BrowserError>,
    locator: &str,
    timeout: Duration,
) -> BrowserResult<T> {
    match (found, last_error) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(e @ BrowserError::Chrome(_))) => Err(e),
        (Err(_), _) => Err(BrowserError::Timeout {
            locator: locator.to_string(),
            timeout,
        }),
    }
}

/// Decodes the string a page script returned with `JSON.stringify`.
fn decode<T: DeserializeOwned>(value: Option<Value>) -> BrowserResult<T> {
    match value {
        Some(Value::String(json)) => {
            serde_json::from_str(&json).map_err(|e| BrowserError::Script(format!("{}: {}", e, json)))
        }
        other => Err(BrowserError::Script(format!("expected a JSON string, got {:?}", other))),
    }
}
