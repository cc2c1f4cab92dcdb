//! Crawl loop state and result types.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::record::BidRecord;

/// Phase of the crawl loop, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Searching,
    PageLoaded,
    Extracting,
    Advancing,
    Done,
    Aborted,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlPhase::Searching => "searching",
            CrawlPhase::PageLoaded => "page_loaded",
            CrawlPhase::Extracting => "extracting",
            CrawlPhase::Advancing => "advancing",
            CrawlPhase::Done => "done",
            CrawlPhase::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The requested number of unique records was accumulated
    TargetReached,
    /// The portal ran out of result pages before the target was met
    PaginationExhausted,
    /// A browsing failure ended the crawl early
    Aborted,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::TargetReached => "target_reached",
            TerminalReason::PaginationExhausted => "pagination_exhausted",
            TerminalReason::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do with records found past the target on the same page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExcessPolicy {
    /// Stop admitting the moment the target is met
    #[default]
    Truncate,
    /// Finish the current page, then stop; may overshoot the target
    KeepPage,
}

/// Counters accumulated over one crawl, reported in the final summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Result pages visited
    pub pages_visited: u32,
    /// Candidate fragments handed to the extractor
    pub fragments_seen: usize,
    /// Fragments rejected for having too few sub-cells
    pub rejected_structure: usize,
    /// Fragments rejected for lacking a qualifying detail link
    pub rejected_no_link: usize,
    /// Fragments rejected for a missing or too-short title
    pub rejected_short_title: usize,
    /// Records dropped as duplicates of an already-seen identity URL
    pub duplicates_skipped: usize,
    /// Records admitted into the result set
    pub admitted: usize,
}

impl CrawlStats {
    pub fn rejected_total(&self) -> usize {
        self.rejected_structure + self.rejected_no_link + self.rejected_short_title
    }
}

/// Mutable state threaded through one crawl: the accumulated records, the
/// seen-identity set, the target, the loop phase, and the terminal reason
/// once it is known.
///
/// The seen-set lives here rather than in any shared place, so repeating a
/// crawl starts from scratch and two crawls never influence each other.
#[derive(Debug)]
pub struct CrawlState {
    seen: HashSet<String>,
    records: Vec<BidRecord>,
    target: usize,
    phase: CrawlPhase,
    reason: Option<TerminalReason>,
    /// Counters for the final summary
    pub stats: CrawlStats,
}

impl CrawlState {
    pub fn new(target: usize) -> Self {
        Self {
            seen: HashSet::new(),
            records: Vec::new(),
            target,
            phase: CrawlPhase::Searching,
            reason: None,
            stats: CrawlStats::default(),
        }
    }

    /// Move the loop into a phase, logging the transition.
    pub fn enter(&mut self, phase: CrawlPhase) {
        self.phase = phase;
        log::debug!("Phase {phase}");
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Record why the crawl stopped, handing the reason back.
    pub fn finish(&mut self, reason: TerminalReason) -> TerminalReason {
        self.reason = Some(reason);
        reason
    }

    pub fn reason(&self) -> Option<TerminalReason> {
        self.reason
    }

    /// Result page currently being worked, 1-based; 0 until one loads.
    pub fn page(&self) -> u32 {
        self.stats.pages_visited
    }

    /// Admit a record unless its identity URL is missing or already seen.
    ///
    /// Returns true if the record was kept. An empty identity can never be
    /// deduplicated, so it never enters the set. Field differences between
    /// two records sharing an identity URL are irrelevant; the first one
    /// wins.
    pub fn admit(&mut self, record: BidRecord) -> bool {
        if record.identity_url.is_empty() {
            log::debug!("Dropping record without identity URL: '{}'", record.title);
            self.stats.duplicates_skipped += 1;
            return false;
        }
        if !self.seen.insert(record.identity_url.clone()) {
            log::debug!("Skipping duplicate: {}", record.identity_url);
            self.stats.duplicates_skipped += 1;
            return false;
        }
        self.stats.admitted += 1;
        self.records.push(record);
        true
    }

    pub fn target_reached(&self) -> bool {
        self.records.len() >= self.target
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the state, yielding the accumulated records.
    pub fn into_records(self) -> Vec<BidRecord> {
        self.records
    }
}

/// Everything a finished crawl produced, including partial results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    /// Source portal name
    pub source: String,
    /// Search query the crawl ran with
    pub query: String,
    /// Why the crawl stopped
    pub reason: TerminalReason,
    /// Browsing failure that ended the crawl, present only when aborted
    pub failure: Option<String>,
    /// Accumulated records, possibly fewer than the target
    pub records: Vec<BidRecord>,
    /// Summary counters
    pub stats: CrawlStats,
    /// When the crawl started
    pub started_at: DateTime<Utc>,
    /// When the crawl stopped
    pub finished_at: DateTime<Utc>,
}

impl CrawlOutcome {
    pub fn is_complete(&self) -> bool {
        self.reason == TerminalReason::TargetReached
    }

    /// One-line summary for the final log message.
    pub fn summary(&self) -> String {
        format!(
            "{} records from '{}' ({}; {} pages, {} fragments, {} rejected, {} duplicates)",
            self.records.len(),
            self.source,
            self.reason,
            self.stats.pages_visited,
            self.stats.fragments_seen,
            self.stats.rejected_total(),
            self.stats.duplicates_skipped,
        )
    }
}
