//! Local filesystem storage implementation.
//!
//! Writes are atomic (temp file, then rename) so a crash mid-write never
//! leaves a half-written records file behind. The archive accumulates
//! records across crawls, merged by storage id, newest first.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{BidRecord, CrawlOutcome};
use crate::storage::{CrawlReport, RecordSet, RecordStorage, WriteSummary};

const RECORDS_KEY: &str = "records.json";
const ARCHIVE_KEY: &str = "archive.json";
const REPORT_KEY: &str = "report.json";

/// Storage backend keeping all three files under one data directory.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Atomic write: the content lands under a temp name and is renamed
    /// into place only once fully flushed.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// A missing file reads as `None`; any other failure is an error.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Merge new records into the cumulative archive.
    ///
    /// Records whose storage id is already archived keep their archived
    /// version; the merged archive is sorted newest first.
    async fn merge_archive(&self, records: &[BidRecord]) -> Result<usize> {
        let mut archive: Vec<BidRecord> = self.read_json(ARCHIVE_KEY).await?.unwrap_or_default();
        let known: HashSet<String> = archive.iter().map(|r| r.storage_id()).collect();

        let mut added = 0;
        for record in records {
            if !known.contains(&record.storage_id()) {
                archive.push(record.clone());
                added += 1;
            }
        }
        archive.sort_by(|a, b| b.extracted_at.cmp(&a.extracted_at));

        self.write_json(ARCHIVE_KEY, &archive).await?;
        Ok(added)
    }
}

#[async_trait]
impl RecordStorage for LocalStorage {
    async fn write_outcome(&self, outcome: &CrawlOutcome) -> Result<WriteSummary> {
        let set = RecordSet::new(outcome);
        self.write_json(RECORDS_KEY, &set).await?;
        log::info!("Wrote {} record(s) to {RECORDS_KEY}", set.count);

        let archived_new = self.merge_archive(&outcome.records).await?;
        log::info!("Archived {archived_new} new record(s)");

        let report = CrawlReport::from(outcome);
        self.write_json(REPORT_KEY, &report).await?;

        Ok(WriteSummary {
            written: set.count,
            archived_new,
            timestamp: set.updated_at,
        })
    }

    async fn load_records(&self) -> Result<Vec<BidRecord>> {
        Ok(self
            .read_json::<RecordSet>(RECORDS_KEY)
            .await?
            .map(|set| set.records)
            .unwrap_or_default())
    }

    async fn load_archive(&self) -> Result<Vec<BidRecord>> {
        Ok(self.read_json(ARCHIVE_KEY).await?.unwrap_or_default())
    }

    async fn load_report(&self) -> Result<Option<CrawlReport>> {
        self.read_json(REPORT_KEY).await
    }
}
