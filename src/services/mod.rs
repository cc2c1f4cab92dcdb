//! Service layer for the scraper application.
//!
//! This module contains the crawl logic:
//! - Listing-structure discovery (`PatternDetector`)
//! - Row-to-record extraction (`RecordExtractor`)
//! - Pagination and deduplication (`CrawlController`)

mod controller;
mod extractor;
mod patterns;

pub use controller::CrawlController;
pub use extractor::{RecordExtractor, Rejection};
pub use patterns::{DetectedPattern, PatternDetector};
