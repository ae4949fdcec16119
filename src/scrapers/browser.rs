use crate::error::ScrapeError;
use crate::scrapers::types::Timings;
use anyhow::Context;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Non-bot identity presented to the target site
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DISMISS_COOKIES_JS: &str = r#"
    (() => {
        const button = document.querySelector('button[id*="accept"], button[id*="cookie"], button[class*="cookie"]');
        if (button) { button.click(); return true; }
        return false;
    })()
"#;

/// The browser capabilities the extraction code relies on.
///
/// Implemented by [`ChromePage`] for real sessions; tests drive the
/// strategies through a scripted in-memory page.
pub trait PageDriver {
    /// Navigate and wait until the navigation settles, bounded by `timeout`.
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Wait until an element matching `selector` exists.
    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Click the `index`-th element matching `selector`.
    fn click(&self, selector: &str, index: usize) -> Result<(), ScrapeError>;

    /// Evaluate a JS expression in page context.
    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>, ScrapeError>;

    /// Current rendered HTML of the whole document.
    fn content(&self) -> Result<String, ScrapeError>;

    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn close(&self) -> Result<(), ScrapeError>;
}

/// One headless Chrome process with a single tab.
///
/// Dropping the page closes the tab (if `close` was not called) and then the
/// browser process, so teardown also happens when a script panics.
pub struct ChromePage {
    tab: Arc<Tab>,
    closed: Cell<bool>,
    _browser: Browser,
}

impl ChromePage {
    /// Launch headless Chrome and open a tab with the given user agent
    pub fn launch(user_agent: &str, default_timeout: Duration) -> Result<Self, ScrapeError> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .build()
            .context("Failed to build launch options")
            .map_err(ScrapeError::session)?;

        let browser = Browser::new(options)
            .context("Failed to launch Chrome browser")
            .map_err(ScrapeError::session)?;

        let tab = browser
            .new_tab()
            .context("Failed to open tab")
            .map_err(ScrapeError::session)?;

        tab.set_user_agent(user_agent, Some("ru-RU,ru;q=0.9,en;q=0.8"), None)
            .context("Failed to set user agent")
            .map_err(ScrapeError::session)?;
        tab.set_default_timeout(default_timeout);

        Ok(Self {
            tab,
            closed: Cell::new(false),
            _browser: browser,
        })
    }
}

impl PageDriver for ChromePage {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {url}"))
            .map_err(ScrapeError::session)?;
        self.tab
            .wait_until_navigated()
            .context("Navigation did not settle")
            .map_err(ScrapeError::session)?;
        Ok(())
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let started = Instant::now();
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| {
                debug!("wait for {} failed: {}", selector, e);
                ScrapeError::ElementNotFound {
                    selector: selector.to_string(),
                    waited_ms: started.elapsed().as_millis(),
                }
            })
    }

    fn click(&self, selector: &str, index: usize) -> Result<(), ScrapeError> {
        let not_found = || ScrapeError::ElementNotFound {
            selector: format!("{selector} [{index}]"),
            waited_ms: 0,
        };

        let elements = self.tab.find_elements(selector).map_err(|_| not_found())?;
        let element = elements.get(index).ok_or_else(not_found)?;
        element
            .click()
            .with_context(|| format!("Failed to click {selector} [{index}]"))
            .map_err(ScrapeError::session)?;
        Ok(())
    }

    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>, ScrapeError> {
        let result = self
            .tab
            .evaluate(expression, false)
            .context("Failed to evaluate script")
            .map_err(ScrapeError::session)?;
        Ok(result.value)
    }

    fn content(&self) -> Result<String, ScrapeError> {
        self.tab
            .get_content()
            .context("Failed to read page HTML")
            .map_err(ScrapeError::session)
    }

    fn close(&self) -> Result<(), ScrapeError> {
        if self.closed.replace(true) {
            return Ok(());
        }
        self.tab
            .close(true)
            .context("Failed to close tab")
            .map_err(ScrapeError::session)?;
        Ok(())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Tab teardown failed: {}", e);
        }
        debug!("Browser session torn down");
    }
}

/// Opens one browser session against the target page and runs an
/// extraction script inside it.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    target_url: String,
    user_agent: String,
    timings: Timings,
}

impl BrowserSession {
    pub fn new(target_url: impl Into<String>, user_agent: impl Into<String>, timings: Timings) -> Self {
        Self {
            target_url: target_url.into(),
            user_agent: user_agent.into(),
            timings,
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Launch a fresh Chrome session and run `script` against the loaded page.
    ///
    /// Blocking: call from a blocking worker thread.
    pub fn run<T, F>(&self, script: F) -> Result<T, ScrapeError>
    where
        F: FnOnce(&dyn PageDriver) -> Result<T, ScrapeError>,
    {
        let page = ChromePage::launch(&self.user_agent, self.timings.navigation_timeout)?;
        self.run_on(&page, script)
    }

    /// Navigate `page` to the target and run `script`; the page is closed on every path.
    pub fn run_on<T, F>(&self, page: &dyn PageDriver, script: F) -> Result<T, ScrapeError>
    where
        F: FnOnce(&dyn PageDriver) -> Result<T, ScrapeError>,
    {
        let result = self.navigate_and_run(page, script);

        if let Err(e) = page.close() {
            warn!("Failed to close browser session: {}", e);
        }

        result
    }

    fn navigate_and_run<T, F>(&self, page: &dyn PageDriver, script: F) -> Result<T, ScrapeError>
    where
        F: FnOnce(&dyn PageDriver) -> Result<T, ScrapeError>,
    {
        info!("Opening {}", self.target_url);
        page.navigate(&self.target_url, self.timings.navigation_timeout)?;

        // Let late XHRs and map tiles finish
        page.pause(self.timings.settle_delay);

        // Accept cookies if present
        match page.evaluate(DISMISS_COOKIES_JS) {
            Ok(Some(serde_json::Value::Bool(true))) => {
                debug!("Dismissed cookie banner");
                page.pause(self.timings.settle_delay);
            }
            Ok(_) => {}
            Err(e) => debug!("Cookie banner check failed: {}", e),
        }

        script(page)
    }
}
