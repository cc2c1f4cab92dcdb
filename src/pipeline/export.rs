// src/pipeline/export.rs

//! CSV export pipeline.

use std::path::Path;

use crate::error::Result;
use crate::storage::{export, LocalStorage, RecordStorage};

/// Export stored records to a CSV file, returning the row count.
///
/// With `use_archive` set, the cumulative archive is exported instead of
/// the latest crawl's record set.
pub async fn run_export(data_dir: &Path, output: &Path, use_archive: bool) -> Result<usize> {
    let storage = LocalStorage::new(data_dir);
    let records = if use_archive {
        storage.load_archive().await?
    } else {
        storage.load_records().await?
    };

    if records.is_empty() {
        log::warn!("No stored records found under {}", data_dir.display());
    }

    let written = export::write_csv(&records, output)?;
    log::info!("Exported {} row(s) to {}", written, output.display());
    Ok(written)
}
