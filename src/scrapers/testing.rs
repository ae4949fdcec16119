//! In-memory page used by tests in place of a real browser tab.

use crate::error::ScrapeError;
use crate::scrapers::browser::PageDriver;
use scraper::{Html, Selector};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

/// A page served from a list of HTML documents, plus optional popups that
/// open when the `index`-th marker is clicked.
///
/// Each `content()` call moves one document further; the last one sticks.
pub struct ScriptedPage {
    documents: Vec<String>,
    reads: Cell<usize>,
    marker_selector: Option<String>,
    close_selector: Option<String>,
    /// marker index -> (popup html, clicks needed before it renders)
    popups: HashMap<usize, (String, u32)>,
    clicks_per_marker: RefCell<HashMap<usize, u32>>,
    open_popup: RefCell<Option<String>>,
    navigations: RefCell<Vec<String>>,
    fail_navigation: bool,
    /// Close button and Escape leave the popup on screen
    sticky_popups: bool,
    /// Every click fails as if the browser connection dropped
    crashed: bool,
    closed: Cell<bool>,
    clicks: RefCell<Vec<(String, usize)>>,
}

impl ScriptedPage {
    pub fn new(html: &str) -> Self {
        Self::sequence(&[html])
    }

    /// Page whose markup changes between reads, e.g. cards rendering late.
    pub fn sequence(documents: &[&str]) -> Self {
        Self {
            documents: documents.iter().map(|d| (*d).to_string()).collect(),
            reads: Cell::new(0),
            marker_selector: None,
            close_selector: None,
            popups: HashMap::new(),
            clicks_per_marker: RefCell::new(HashMap::new()),
            open_popup: RefCell::new(None),
            navigations: RefCell::new(Vec::new()),
            fail_navigation: false,
            sticky_popups: false,
            crashed: false,
            closed: Cell::new(false),
            clicks: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// Clicking `marker_selector` / `close_selector` opens and closes popups.
    pub fn with_markers(mut self, marker_selector: &str, close_selector: &str) -> Self {
        self.marker_selector = Some(marker_selector.to_string());
        self.close_selector = Some(close_selector.to_string());
        self
    }

    pub fn with_popup(self, index: usize, html: &str) -> Self {
        self.with_slow_popup(index, html, 1)
    }

    /// Popup that renders only from the `clicks`-th click on the marker onwards.
    pub fn with_slow_popup(mut self, index: usize, html: &str, clicks: u32) -> Self {
        self.popups.insert(index, (html.to_string(), clicks));
        self
    }

    pub fn with_sticky_popups(mut self) -> Self {
        self.sticky_popups = true;
        self
    }

    pub fn crashed(mut self) -> Self {
        self.crashed = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.clicks.borrow().clone()
    }

    /// Number of `content()` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    fn current_html(&self) -> String {
        let last = self.documents.len().saturating_sub(1);
        let html = self
            .documents
            .get(self.reads.get().min(last))
            .map(String::as_str)
            .unwrap_or_default();

        match self.open_popup.borrow().as_ref() {
            Some(popup) => match html.rfind("</body>") {
                Some(pos) => format!("{}{}{}", &html[..pos], popup, &html[pos..]),
                None => format!("{html}{popup}"),
            },
            None => html.to_string(),
        }
    }

    fn count(&self, selector: &str) -> usize {
        let Ok(selector) = Selector::parse(selector) else {
            return 0;
        };
        Html::parse_document(&self.current_html()).select(&selector).count()
    }
}

impl PageDriver for ScriptedPage {
    fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.navigations.borrow_mut().push(url.to_string());
        if self.fail_navigation {
            return Err(ScrapeError::Session(format!("navigation to {url} timed out")));
        }
        Ok(())
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError> {
        if self.count(selector) > 0 {
            Ok(())
        } else {
            Err(ScrapeError::ElementNotFound {
                selector: selector.to_string(),
                waited_ms: timeout.as_millis(),
            })
        }
    }

    fn click(&self, selector: &str, index: usize) -> Result<(), ScrapeError> {
        if self.crashed {
            return Err(ScrapeError::Session("Chrome connection closed".to_string()));
        }
        if self.count(selector) <= index {
            return Err(ScrapeError::ElementNotFound {
                selector: format!("{selector} [{index}]"),
                waited_ms: 0,
            });
        }
        self.clicks.borrow_mut().push((selector.to_string(), index));

        if self.marker_selector.as_deref() == Some(selector) {
            let mut per_marker = self.clicks_per_marker.borrow_mut();
            let clicks = per_marker.entry(index).or_insert(0);
            *clicks += 1;
            let ready = self
                .popups
                .get(&index)
                .filter(|(_, needed)| *clicks >= *needed)
                .map(|(html, _)| html.clone());
            if ready.is_some() || !self.sticky_popups {
                *self.open_popup.borrow_mut() = ready;
            }
        } else if self.close_selector.as_deref() == Some(selector) && !self.sticky_popups {
            *self.open_popup.borrow_mut() = None;
        }
        Ok(())
    }

    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>, ScrapeError> {
        if expression.contains("Escape") && !self.sticky_popups {
            *self.open_popup.borrow_mut() = None;
        }
        Ok(None)
    }

    fn content(&self) -> Result<String, ScrapeError> {
        let html = self.current_html();
        self.reads.set(self.reads.get() + 1);
        Ok(html)
    }

    fn pause(&self, _duration: Duration) {}

    fn close(&self) -> Result<(), ScrapeError> {
        self.closed.set(true);
        Ok(())
    }
}
