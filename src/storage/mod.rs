//! Storage abstractions for record persistence.
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── records.json    # Latest crawl's record set
//! ├── archive.json    # Cumulative records across crawls, merged by id
//! └── report.json     # Summary of the last crawl
//! ```

pub mod export;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{BidRecord, CrawlOutcome, CrawlStats, TerminalReason};

// Re-export for convenience
pub use local::LocalStorage;

/// What a persisted crawl outcome amounted to on disk.
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// Records written to records.json
    pub written: usize,
    /// Records newly added to archive.json
    pub archived_new: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Header for records.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSet {
    /// When this set was written
    pub updated_at: DateTime<Utc>,
    /// Source portal the crawl ran against
    pub source: String,
    /// Search query that produced the set
    pub query: String,
    /// Total record count
    pub count: usize,
    /// The records array
    pub records: Vec<BidRecord>,
}

impl RecordSet {
    pub fn new(outcome: &CrawlOutcome) -> Self {
        Self {
            updated_at: Utc::now(),
            source: outcome.source.clone(),
            query: outcome.query.clone(),
            count: outcome.records.len(),
            records: outcome.records.clone(),
        }
    }
}

/// Summary of the last crawl, stored alongside the records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub finished_at: DateTime<Utc>,
    pub source: String,
    pub query: String,
    pub reason: TerminalReason,
    pub failure: Option<String>,
    pub stats: CrawlStats,
}

impl From<&CrawlOutcome> for CrawlReport {
    fn from(outcome: &CrawlOutcome) -> Self {
        Self {
            finished_at: outcome.finished_at,
            source: outcome.source.clone(),
            query: outcome.query.clone(),
            reason: outcome.reason,
            failure: outcome.failure.clone(),
            stats: outcome.stats.clone(),
        }
    }
}

/// Trait for record storage backends.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Persist a crawl outcome: the latest set, the cumulative archive,
    /// and the crawl report.
    async fn write_outcome(&self, outcome: &CrawlOutcome) -> Result<WriteSummary>;

    /// Load the latest record set, empty if none was written yet.
    async fn load_records(&self) -> Result<Vec<BidRecord>>;

    /// Load the cumulative archive, empty if none was written yet.
    async fn load_archive(&self) -> Result<Vec<BidRecord>>;

    /// Load the last crawl report, if any.
    async fn load_report(&self) -> Result<Option<CrawlReport>>;
}
