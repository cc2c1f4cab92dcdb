//! CSV export of extracted bid records.

use std::path::Path;

use crate::error::Result;
use crate::models::BidRecord;

const CSV_HEADERS: [&str; 11] = [
    "title",
    "agency_primary",
    "agency_secondary",
    "location",
    "due_date",
    "description",
    "prebid_info",
    "format_variant",
    "identity_url",
    "search_context",
    "extracted_at",
];

/// Write records to a CSV file, returning the number of rows written.
///
/// Sentinel values are written literally so a spreadsheet user can see
/// which fields were never found.
pub fn write_csv(records: &[BidRecord], path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADERS)?;

    for record in records {
        let extracted = record.extracted_at.to_rfc3339();
        writer.write_record([
            record.title.as_str(),
            record.agency_primary.as_str(),
            record.agency_secondary.as_str(),
            record.location.as_str(),
            record.due_date.as_str(),
            record.description.as_str(),
            record.prebid_info.as_str(),
            record.format_variant.as_str(),
            record.identity_url.as_str(),
            record.search_context.as_str(),
            extracted.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::FormatVariant;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bids.csv");

        let mut record = BidRecord::new(
            "Road Resurfacing Phase II",
            "https://portal.test/solicitations/view/42",
            "roads",
        );
        record.agency_primary = "City of Example".to_string();
        record.format_variant = FormatVariant::State;

        let written = write_csv(&[record], &path).unwrap();
        assert_eq!(written, 1);

        let body = std::fs::read_to_string(&path).unwrap();
        let mut lines = body.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("title,agency_primary"));
        assert!(header.ends_with("extracted_at"));

        let row = lines.next().unwrap();
        assert!(row.contains("Road Resurfacing Phase II"));
        assert!(row.contains("City of Example"));
        assert!(row.contains("state"));
        // Fields that were never populated keep their sentinel.
        assert!(row.contains("unknown"));
    }

    #[test]
    fn empty_set_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        let written = write_csv(&[], &path).unwrap();
        assert_eq!(written, 0);

        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), 1);
    }
}
