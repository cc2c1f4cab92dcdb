//! Headless Chrome session driver.
//!
//! The portals this crate targets render their result tables with
//! JavaScript, so the default driver runs a real browser and reads the DOM
//! after scripts have settled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::browser::BrowserSession;
use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, SourcePattern};

pub struct ChromeSession {
    // Dropping the Browser tears the whole process down, so it must live as
    // long as the tab.
    _browser: Browser,
    tab: Arc<Tab>,
    search_input: String,
    search_submit: Option<String>,
    next_page: String,
    ready: String,
    ready_timeout: Duration,
    ready_poll: Duration,
}

impl ChromeSession {
    pub fn new(config: &BrowserConfig, source: &SourcePattern) -> Result<Self> {
        let browser = Browser::new(LaunchOptions {
            headless: config.headless,
            sandbox: false,
            enable_logging: false,
            ..Default::default()
        })
        .map_err(|e| AppError::browser("launch", e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::browser("new tab", e.to_string()))?;
        tab.set_default_timeout(Duration::from_secs(config.nav_timeout_secs));
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| AppError::browser("set user agent", e.to_string()))?;

        Ok(Self {
            _browser: browser,
            tab,
            search_input: source.search_input_selector.clone(),
            search_submit: source.search_submit_selector.clone(),
            next_page: source.next_page_selector.clone(),
            ready: source.ready_selector.clone(),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            ready_poll: Duration::from_millis(config.ready_poll_ms),
        })
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        log::debug!("Navigating to {url}");
        self.tab
            .navigate_to(url)
            .map_err(|e| AppError::browser("navigate", e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::browser("navigate", e.to_string()))?;
        Ok(())
    }

    async fn submit_search(&mut self, query: &str) -> Result<()> {
        log::debug!("Submitting search: {query}");
        let input = self
            .tab
            .wait_for_element(&self.search_input)
            .map_err(|e| AppError::browser("find search input", e.to_string()))?;
        input
            .click()
            .map_err(|e| AppError::browser("focus search input", e.to_string()))?;
        self.tab
            .type_str(query)
            .map_err(|e| AppError::browser("type query", e.to_string()))?;

        match &self.search_submit {
            Some(selector) => {
                let button = self
                    .tab
                    .find_element(selector)
                    .map_err(|e| AppError::browser("find submit", e.to_string()))?;
                button
                    .click()
                    .map_err(|e| AppError::browser("click submit", e.to_string()))?;
            }
            None => {
                self.tab
                    .press_key("Enter")
                    .map_err(|e| AppError::browser("press enter", e.to_string()))?;
            }
        }
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::browser("search navigation", e.to_string()))?;
        Ok(())
    }

    async fn wait_ready(&mut self) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.tab.find_element(&self.ready).is_ok() {
                return Ok(());
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(AppError::timeout(
                    &self.ready,
                    self.ready_timeout.as_millis() as u64,
                ));
            }
            tokio::time::sleep(self.ready_poll).await;
        }
    }

    async fn content(&mut self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| AppError::browser("get content", e.to_string()))
    }

    async fn advance_page(&mut self) -> Result<bool> {
        // Absence of the control is how a portal says "last page".
        let control = match self.tab.find_element(&self.next_page) {
            Ok(el) => el,
            Err(_) => return Ok(false),
        };
        control
            .click()
            .map_err(|e| AppError::browser("next page click", e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::browser("next page navigation", e.to_string()))?;
        Ok(true)
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }
}
