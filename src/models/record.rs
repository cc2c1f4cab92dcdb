//! Bid record data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel stored in any free-text field the extractor could not assign.
///
/// Downstream consumers (storage, export) rely on every field being present,
/// so absent values are this literal, never an empty string.
pub const UNKNOWN: &str = "unknown";

/// Detected structural dialect of a listing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormatVariant {
    /// Plain portal table row with a closing-date section
    Standard,
    /// Row carrying a "State & Local" category marker
    State,
    /// Row carrying a "Federal" category marker
    Federal,
    /// Row carrying a "Member Agency" category marker
    MemberAgency,
    /// No recognizable dialect
    #[default]
    Unknown,
}

impl FormatVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatVariant::Standard => "standard",
            FormatVariant::State => "state",
            FormatVariant::Federal => "federal",
            FormatVariant::MemberAgency => "member_agency",
            FormatVariant::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FormatVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One procurement opportunity extracted from a listing row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidRecord {
    /// Opportunity title (first text line of the row)
    pub title: String,

    /// Canonical absolute detail-page URL; sole deduplication key
    pub identity_url: String,

    /// Issuing agency name
    pub agency_primary: String,

    /// Category caption under the agency (e.g. "State & Local Bids")
    pub agency_secondary: String,

    /// Place the work is located or administered
    pub location: String,

    /// Closing/due date text, taken verbatim from the listing
    pub due_date: String,

    /// Long free-text summary of the solicitation
    pub description: String,

    /// Mandatory pre-bid meeting/conference note
    pub prebid_info: String,

    /// Detected row dialect
    pub format_variant: FormatVariant,

    /// Search query that produced this record (provenance, not identity)
    pub search_context: String,

    /// When the record was extracted; set once
    pub extracted_at: DateTime<Utc>,

    /// Bounded raw text snapshot of the source row, for auditing only
    pub raw_excerpt: String,
}

impl BidRecord {
    /// Create a record with the identity fields set and everything else at
    /// its unknown sentinel.
    pub fn new(
        title: impl Into<String>,
        identity_url: impl Into<String>,
        search_context: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            identity_url: identity_url.into(),
            agency_primary: UNKNOWN.to_string(),
            agency_secondary: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            due_date: UNKNOWN.to_string(),
            description: UNKNOWN.to_string(),
            prebid_info: UNKNOWN.to_string(),
            format_variant: FormatVariant::Unknown,
            search_context: search_context.into(),
            extracted_at: Utc::now(),
            raw_excerpt: String::new(),
        }
    }

    /// Stable short identifier derived from the identity URL, used as the
    /// archive key by storage backends.
    pub fn storage_id(&self) -> String {
        let digest = Sha256::digest(self.identity_url.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Field-for-field equality ignoring `extracted_at`.
    pub fn same_fields(&self, other: &BidRecord) -> bool {
        self.title == other.title
            && self.identity_url == other.identity_url
            && self.agency_primary == other.agency_primary
            && self.agency_secondary == other.agency_secondary
            && self.location == other.location
            && self.due_date == other.due_date
            && self.description == other.description
            && self.prebid_info == other.prebid_info
            && self.format_variant == other.format_variant
            && self.search_context == other.search_context
            && self.raw_excerpt == other.raw_excerpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> BidRecord {
        let mut record = BidRecord::new(
            "HVAC Retrofit - Building 4",
            "https://example.com/solicitations/123",
            "hvac",
        );
        record.agency_primary = "City of Example".to_string();
        record.format_variant = FormatVariant::State;
        record
    }

    #[test]
    fn new_record_carries_sentinels() {
        let record = BidRecord::new("Title here", "https://example.com/view/1", "roofing");
        assert_eq!(record.location, UNKNOWN);
        assert_eq!(record.due_date, UNKNOWN);
        assert_eq!(record.description, UNKNOWN);
        assert_eq!(record.prebid_info, UNKNOWN);
        assert_eq!(record.format_variant, FormatVariant::Unknown);
    }

    #[test]
    fn storage_id_is_stable_and_distinct() {
        let a = sample_record();
        let b = sample_record();
        assert_eq!(a.storage_id(), b.storage_id());
        assert_eq!(a.storage_id().len(), 12);

        let other = BidRecord::new("T", "https://example.com/solicitations/124", "hvac");
        assert_ne!(a.storage_id(), other.storage_id());
    }

    #[test]
    fn same_fields_ignores_extraction_time() {
        let a = sample_record();
        let mut b = sample_record();
        b.extracted_at = a.extracted_at + chrono::Duration::seconds(90);
        assert!(a.same_fields(&b));

        b.location = "Example, TX".to_string();
        assert!(!a.same_fields(&b));
    }

    #[test]
    fn variant_serializes_snake_case() {
        let json = serde_json::to_string(&FormatVariant::MemberAgency).unwrap();
        assert_eq!(json, "\"member_agency\"");
        let back: FormatVariant = serde_json::from_str("\"state\"").unwrap();
        assert_eq!(back, FormatVariant::State);
    }
}
