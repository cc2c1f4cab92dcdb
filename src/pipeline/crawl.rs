// src/pipeline/crawl.rs

//! Bid crawling pipeline.

use std::path::Path;

use crate::browser::open_session;
use crate::error::{AppError, Result};
use crate::models::{Config, CrawlOutcome};
use crate::services::CrawlController;
use crate::storage::{LocalStorage, RecordStorage};

/// Run a crawl for the given query against one configured source and
/// persist the outcome under `data_dir`.
///
/// Returns the outcome even when the crawl aborted partway; the caller
/// decides whether a partial harvest counts as failure.
pub async fn run_crawl(
    config: &Config,
    source_name: Option<&str>,
    query: &str,
    data_dir: &Path,
) -> Result<CrawlOutcome> {
    config.validate()?;

    let source = match source_name {
        Some(name) => config
            .find_source(name)
            .ok_or_else(|| AppError::config(format!("Unknown source '{name}'")))?,
        None => config
            .default_source()
            .ok_or_else(|| AppError::config("No sources configured"))?,
    };

    log::info!(
        "Crawling source '{}' for \"{}\" ({})",
        source.name,
        query,
        source.start_url
    );

    let mut session = open_session(&config.browser, source)?;
    let controller = CrawlController::new(config, source)?;
    let outcome = controller.run(session.as_mut(), query).await;

    let storage = LocalStorage::new(data_dir);
    let summary = storage.write_outcome(&outcome).await?;
    log::info!(
        "Persisted {} record(s), {} new in archive",
        summary.written,
        summary.archived_new
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_source_is_a_config_error() {
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();

        let err = run_crawl(&config, Some("nope"), "roads", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown source"));
    }
}
