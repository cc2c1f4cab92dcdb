//! Browser session drivers and the parsed-page layer.

pub mod page;

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BrowserConfig, DriverKind, SourcePattern};

#[cfg(feature = "chrome")]
pub use chrome::ChromeSession;
pub use http::HttpSession;
pub use page::{Fragment, Link, PageSnapshot};

/// An interactive session against one portal.
///
/// The crawl loop only ever talks to this trait; drivers differ in how a
/// "page" comes to exist. `advance_page` returning `Ok(false)` signals that
/// the portal has no further pages, which ends pagination normally.
#[async_trait]
pub trait BrowserSession {
    /// Navigate to an absolute URL and let the load settle.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Fill the portal's search control with a query and submit it.
    async fn submit_search(&mut self, query: &str) -> Result<()>;

    /// Bounded wait until the results content is rendered.
    async fn wait_ready(&mut self) -> Result<()>;

    /// Raw HTML of the current page.
    async fn content(&mut self) -> Result<String>;

    /// Move to the next page of results if the portal offers one.
    async fn advance_page(&mut self) -> Result<bool>;

    /// URL of the currently loaded page, used to absolutize row links.
    fn current_url(&self) -> String;
}

/// Build the configured session driver for a source.
pub fn open_session(
    config: &BrowserConfig,
    source: &SourcePattern,
) -> Result<Box<dyn BrowserSession>> {
    match config.driver {
        #[cfg(feature = "chrome")]
        DriverKind::Chrome => Ok(Box::new(ChromeSession::new(config, source)?)),
        #[cfg(not(feature = "chrome"))]
        DriverKind::Chrome => Err(crate::error::AppError::config(
            "this build has no chrome driver; use the http driver or enable the 'chrome' feature",
        )),
        DriverKind::Http => Ok(Box::new(HttpSession::new(config, source)?)),
    }
}
