//! Plain-HTTP session driver.
//!
//! Works against portals and mirrors that serve their result tables as
//! server-rendered HTML. It cannot run scripts; searches go through a URL
//! template instead of a form, and pagination follows next-link hrefs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::{form_urlencoded, Url};

use crate::browser::BrowserSession;
use crate::browser::page::PageSnapshot;
use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, SourcePattern};

pub struct HttpSession {
    client: Client,
    current: Url,
    body: String,
    next_page: String,
    ready: String,
    search_template: Option<String>,
}

impl HttpSession {
    pub fn new(config: &BrowserConfig, source: &SourcePattern) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.nav_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");
        let current = Url::parse(&source.start_url)?;

        Ok(Self {
            client,
            current,
            body: String::new(),
            next_page: source.next_page_selector.clone(),
            ready: source.ready_selector.clone(),
            search_template: source.search_url_template.clone(),
        })
    }

    async fn fetch(&mut self, url: Url) -> Result<()> {
        log::debug!("Fetching {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        self.current = response.url().clone();
        self.body = response.text().await?;
        Ok(())
    }

    fn snapshot(&self) -> Result<PageSnapshot> {
        PageSnapshot::parse(&self.body, self.current.as_str())
    }

    fn search_url(&self, query: &str) -> Result<String> {
        let template = self.search_template.as_deref().ok_or_else(|| {
            AppError::config("the http driver needs search_url_template on the source")
        })?;
        let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
        Ok(template.replace("{query}", &encoded))
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url)?;
        self.fetch(url).await
    }

    async fn submit_search(&mut self, query: &str) -> Result<()> {
        let url = Url::parse(&self.search_url(query)?)?;
        self.fetch(url).await
    }

    async fn wait_ready(&mut self) -> Result<()> {
        // A static body either has the content already or never will.
        if self.snapshot()?.has_match(&self.ready)? {
            Ok(())
        } else {
            Err(AppError::timeout(&self.ready, 0))
        }
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.body.clone())
    }

    async fn advance_page(&mut self) -> Result<bool> {
        let target = {
            let snapshot = self.snapshot()?;
            let controls = snapshot.select(&self.next_page)?;
            match controls.first().and_then(|control| control.href()) {
                Some(href) => href,
                None => return Ok(false),
            }
        };
        // A next control linking back to the current page would loop forever.
        if target == self.current.as_str() {
            return Ok(false);
        }
        let url = Url::parse(&target)?;
        self.fetch(url).await?;
        Ok(true)
    }

    fn current_url(&self) -> String {
        self.current.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    fn source_with_template(template: Option<&str>) -> SourcePattern {
        let mut source = Config::default().sources[0].clone();
        source.search_url_template = template.map(String::from);
        source
    }

    #[test]
    fn search_url_encodes_query() {
        let session = HttpSession::new(
            &BrowserConfig::default(),
            &source_with_template(Some("https://mirror.test/bids?q={query}&page=1")),
        )
        .unwrap();
        assert_eq!(
            session.search_url("road work").unwrap(),
            "https://mirror.test/bids?q=road+work&page=1"
        );
    }

    #[test]
    fn search_url_requires_template() {
        let session =
            HttpSession::new(&BrowserConfig::default(), &source_with_template(None)).unwrap();
        assert!(matches!(
            session.search_url("roads").unwrap_err(),
            AppError::Config(_)
        ));
    }
}
