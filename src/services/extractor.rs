//! Row-to-record extraction and field classification.
//!
//! One extractor handles every row dialect the portals produce. The dialects
//! differ only in which caption lines appear and in what order, so the
//! classifier is a single forward scan over the row's text lines driven by
//! the marker tables in [`MarkerConfig`], with first-unset-field-wins
//! semantics. Ambiguous rows misclassify into `unknown` sentinels rather
//! than fail; the retained raw excerpt makes that auditable.

use std::fmt;

use regex::Regex;

use crate::browser::page::Fragment;
use crate::error::{AppError, Result};
use crate::models::{BidRecord, FormatVariant, MarkerConfig, UNKNOWN};
use crate::utils::text::contains_phrase;

/// Rows with fewer structured sub-cells than this are layout, not data.
const MIN_CELLS: usize = 2;
/// Titles shorter than this are extraction noise, not records.
const MIN_TITLE_CHARS: usize = 5;
/// Bound on the retained raw text snapshot.
const RAW_EXCERPT_MAX: usize = 240;

/// Two-letter USPS codes recognized as a bare state line.
const STATE_ABBREVS: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR",
];

/// Why a fragment was not a data row.
///
/// This is a control-flow result, not an error: rejected fragments are
/// expected on every page (header rows, spacers, ads) and only ever reach
/// the debug log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Fewer than two structured sub-cells
    TooFewCells { cells: usize },
    /// No hyperlink matching the record-detail pattern
    NoQualifyingLink,
    /// First text line missing or under the minimum title length
    ShortTitle { title: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooFewCells { cells } => {
                write!(f, "only {cells} sub-cell(s), looks like layout")
            }
            Rejection::NoQualifyingLink => write!(f, "no record-detail link"),
            Rejection::ShortTitle { title } => write!(f, "title too short: '{title}'"),
        }
    }
}

/// Service that turns one listing-row fragment into a typed record.
pub struct RecordExtractor {
    markers: MarkerConfig,
    detail_link: Regex,
    city_state: Regex,
}

impl RecordExtractor {
    /// Build an extractor for one source's detail-link pattern.
    pub fn new(markers: MarkerConfig, detail_link_pattern: &str) -> Result<Self> {
        let detail_link = Regex::new(detail_link_pattern).map_err(|e| {
            AppError::config(format!("invalid detail_link_pattern: {e}"))
        })?;
        // "Springfield, IL" and friends.
        let city_state =
            Regex::new(r"^[A-Za-z][A-Za-z .'\-]*,\s*[A-Z]{2}$").expect("valid place pattern");
        Ok(Self {
            markers,
            detail_link,
            city_state,
        })
    }

    /// Extract a record from a row fragment, or explain why it is not one.
    ///
    /// Rejection gates run in a fixed order: structure, then link, then
    /// title. A fragment that passes all three always yields a record; every
    /// field the scan cannot assign carries the `unknown` sentinel.
    pub fn extract(
        &self,
        fragment: &Fragment<'_>,
        search_context: &str,
    ) -> std::result::Result<BidRecord, Rejection> {
        let cells = fragment.cell_count();
        if cells < MIN_CELLS {
            return Err(Rejection::TooFewCells { cells });
        }

        let link = fragment
            .links()
            .into_iter()
            .find(|link| self.detail_link.is_match(&link.href))
            .ok_or(Rejection::NoQualifyingLink)?;

        let lines = fragment.text_lines();
        let title = lines.first().cloned().unwrap_or_default();
        if title.chars().count() < MIN_TITLE_CHARS {
            return Err(Rejection::ShortTitle { title });
        }

        let mut record = BidRecord::new(title, link.href, search_context);
        record.raw_excerpt = fragment.excerpt(RAW_EXCERPT_MAX);
        self.classify_lines(&lines, &mut record);
        Ok(record)
    }

    /// Single forward pass over the text lines after the title.
    ///
    /// The scan carries two pieces of state: the previous line, which a
    /// category caption claims as the agency name (the title is the first
    /// candidate), and whether a closing-date section header was just seen
    /// (its following line is the date, verbatim). Each line is claimed by
    /// the first rule that matches it.
    fn classify_lines(&self, lines: &[String], record: &mut BidRecord) {
        // The title seeds the look-behind: a caption on the very next line
        // claims it as the agency name.
        let mut prev: Option<&str> = lines.first().map(String::as_str);
        let mut pending_due = false;
        let mut saw_due_header = false;

        for line in lines.iter().skip(1) {
            let line = line.as_str();

            if pending_due {
                pending_due = false;
                if record.due_date == UNKNOWN {
                    record.due_date = line.to_string();
                }
                prev = Some(line);
                continue;
            }

            if self.is_due_header(line) {
                saw_due_header = true;
                pending_due = true;
                prev = Some(line);
                continue;
            }

            if let Some(variant) = self.agency_marker(line) {
                if record.format_variant == FormatVariant::Unknown {
                    record.format_variant = variant;
                }
                if record.agency_secondary == UNKNOWN {
                    record.agency_secondary = line.to_string();
                }
                // The line above a category caption is the agency name,
                // unless it was itself a caption or layout noise.
                if record.agency_primary == UNKNOWN {
                    if let Some(p) = prev {
                        if self.agency_marker(p).is_none() && !self.is_noise(p) {
                            record.agency_primary = p.to_string();
                        }
                    }
                }
                prev = Some(line);
                continue;
            }

            if self.is_noise(line) {
                prev = Some(line);
                continue;
            }

            if contains_phrase(line, &self.markers.org_tokens) {
                if record.agency_primary == UNKNOWN {
                    record.agency_primary = line.to_string();
                } else if record.location == UNKNOWN {
                    record.location = line.to_string();
                }
                prev = Some(line);
                continue;
            }

            if self.is_place(line) {
                if record.location == UNKNOWN {
                    record.location = line.to_string();
                }
                prev = Some(line);
                continue;
            }

            if contains_phrase(line, &self.markers.prebid_markers) {
                if record.prebid_info == UNKNOWN {
                    record.prebid_info = line.to_string();
                }
                prev = Some(line);
                continue;
            }

            if record.description == UNKNOWN
                && line.chars().count() > self.markers.min_description_len
            {
                record.description = line.to_string();
            }
            prev = Some(line);
        }

        // Rows without a category caption but with a labeled closing-date
        // section follow the portal's plain table layout.
        if record.format_variant == FormatVariant::Unknown && saw_due_header {
            record.format_variant = FormatVariant::Standard;
        }
    }

    fn agency_marker(&self, line: &str) -> Option<FormatVariant> {
        let lower = line.to_lowercase();
        self.markers
            .agency_markers
            .iter()
            .find(|marker| {
                !marker.phrase.is_empty() && lower.contains(&marker.phrase.to_lowercase())
            })
            .map(|marker| marker.variant)
    }

    fn is_noise(&self, line: &str) -> bool {
        contains_phrase(line, &self.markers.noise_phrases)
    }

    /// A section header is the whole line, give or take a trailing colon.
    /// Inline values like "Due: 2024-05-01" are not headers.
    fn is_due_header(&self, line: &str) -> bool {
        let normalized = line.trim().trim_end_matches(':').trim().to_lowercase();
        self.markers
            .due_headers
            .iter()
            .any(|header| normalized == header.to_lowercase())
    }

    fn is_place(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if STATE_ABBREVS.contains(&trimmed) {
            return true;
        }
        if self.city_state.is_match(trimmed) {
            return true;
        }
        contains_phrase(line, &self.markers.major_cities)
    }
}
