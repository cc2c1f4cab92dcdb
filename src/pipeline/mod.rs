//! Pipeline entry points for scraper operations.
//!
//! - `run_crawl`: Search a portal and harvest bid records
//! - `run_export`: Write stored records out as CSV

pub mod crawl;
pub mod export;

pub use crawl::run_crawl;
pub use export::run_export;
