// src/models/mod.rs

//! Domain models for the scraper application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod crawl;
mod record;

// Re-export all public types
pub use config::{
    AgencyMarker, BrowserConfig, Config, CrawlConfig, DetectorConfig, DriverKind, MarkerConfig,
    SourcePattern,
};
pub use crawl::{CrawlOutcome, CrawlPhase, CrawlState, CrawlStats, ExcessPolicy, TerminalReason};
pub use record::{BidRecord, FormatVariant, UNKNOWN};
