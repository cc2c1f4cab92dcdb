//! Pagination and deduplication control for one crawl.
//!
//! The controller owns the crawl loop: submit the search, harvest each
//! result page through the extractor, deduplicate by identity URL, and
//! advance until the target count is met or the portal runs out of pages.
//! Pages are strictly sequential; one session drives one page at a time,
//! and each page is parsed and fully extracted before the next await.

use std::time::Duration;

use chrono::Utc;

use crate::browser::page::{Fragment, PageSnapshot};
use crate::browser::BrowserSession;
use crate::error::Result;
use crate::models::{
    Config, CrawlConfig, CrawlOutcome, CrawlPhase, CrawlState, ExcessPolicy, SourcePattern,
    TerminalReason,
};
use crate::services::extractor::{RecordExtractor, Rejection};
use crate::services::patterns::PatternDetector;

pub struct CrawlController {
    source: SourcePattern,
    crawl: CrawlConfig,
    extractor: RecordExtractor,
    detector: PatternDetector,
}

impl CrawlController {
    pub fn new(config: &Config, source: &SourcePattern) -> Result<Self> {
        let extractor =
            RecordExtractor::new(config.markers.clone(), &source.detail_link_pattern)?;
        let detector = PatternDetector::new(config.detector.clone());
        Ok(Self {
            source: source.clone(),
            crawl: config.crawl.clone(),
            extractor,
            detector,
        })
    }

    /// Run one crawl for a search query.
    ///
    /// Never fails: browsing errors end the crawl with the `Aborted` reason
    /// and whatever records were accumulated up to that point. The caller
    /// always gets records plus a terminal reason.
    pub async fn run(&self, session: &mut dyn BrowserSession, query: &str) -> CrawlOutcome {
        let started_at = Utc::now();
        let mut state = CrawlState::new(self.crawl.target_count);
        let mut failure = None;

        log::info!(
            "Crawling '{}' for '{}' (target {}, policy {:?})",
            self.source.name,
            query,
            self.crawl.target_count,
            self.crawl.excess_policy
        );

        let reason = match self.drive(session, query, &mut state).await {
            Ok(reason) => reason,
            Err(e) => {
                state.enter(CrawlPhase::Aborted);
                log::error!("Crawl aborted after {} record(s): {e}", state.len());
                failure = Some(e.to_string());
                state.finish(TerminalReason::Aborted)
            }
        };

        let stats = state.stats.clone();
        let outcome = CrawlOutcome {
            source: self.source.name.clone(),
            query: query.to_string(),
            reason,
            failure,
            records: state.into_records(),
            stats,
            started_at,
            finished_at: Utc::now(),
        };
        log::info!("Crawl finished: {}", outcome.summary());
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
        state: &mut CrawlState,
    ) -> Result<TerminalReason> {
        state.enter(CrawlPhase::Searching);
        session.navigate(&self.source.start_url).await?;
        session.wait_ready().await?;
        session.submit_search(query).await?;
        session.wait_ready().await?;

        loop {
            let html = session.content().await?;
            let page_url = session.current_url();
            // A page counts as visited only once its content is in hand; a
            // failed retrieval leaves the counter at the pages that loaded.
            state.enter(CrawlPhase::PageLoaded);
            state.stats.pages_visited += 1;

            state.enter(CrawlPhase::Extracting);
            let found = self.harvest_page(&html, &page_url, query, state)?;
            log::info!(
                "Page {}: {found} new record(s), {} total",
                state.page(),
                state.len()
            );

            if state.target_reached() {
                state.enter(CrawlPhase::Done);
                return Ok(state.finish(TerminalReason::TargetReached));
            }
            if state.page() >= self.crawl.max_pages {
                log::warn!("Stopping at the page budget ({} pages)", self.crawl.max_pages);
                return Ok(state.finish(TerminalReason::PaginationExhausted));
            }

            state.enter(CrawlPhase::Advancing);
            if self.crawl.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.crawl.page_delay_ms)).await;
            }
            match session.advance_page().await {
                Ok(true) => {}
                Ok(false) => {
                    state.enter(CrawlPhase::Done);
                    return Ok(state.finish(TerminalReason::PaginationExhausted));
                }
                // A control that will not activate ends pagination like a
                // missing one; only navigation and readiness failures abort.
                Err(e) => {
                    log::warn!("Next-page activation failed, treating as last page: {e}");
                    return Ok(state.finish(TerminalReason::PaginationExhausted));
                }
            }
            session.wait_ready().await?;
        }
    }

    /// Parse and extract one page. Synchronous on purpose: the parsed
    /// snapshot must not live across an await.
    fn harvest_page(
        &self,
        html: &str,
        page_url: &str,
        query: &str,
        state: &mut CrawlState,
    ) -> Result<usize> {
        // A fresh tab can report an empty URL; absolutize against the
        // source base in that case.
        let snapshot = PageSnapshot::parse(html, page_url)
            .or_else(|_| PageSnapshot::parse(html, self.source.base()))?;
        let fragments = self.page_fragments(&snapshot)?;
        if fragments.is_empty() {
            log::warn!("No listing rows found on {page_url}");
            return Ok(0);
        }

        let before = state.len();
        for fragment in &fragments {
            state.stats.fragments_seen += 1;
            match self.extractor.extract(fragment, query) {
                Ok(record) => {
                    state.admit(record);
                    if self.crawl.excess_policy == ExcessPolicy::Truncate && state.target_reached()
                    {
                        break;
                    }
                }
                Err(rejection) => {
                    log::debug!("Rejected fragment: {rejection}");
                    match rejection {
                        Rejection::TooFewCells { .. } => state.stats.rejected_structure += 1,
                        Rejection::NoQualifyingLink => state.stats.rejected_no_link += 1,
                        Rejection::ShortTitle { .. } => state.stats.rejected_short_title += 1,
                    }
                }
            }
        }
        Ok(state.len() - before)
    }

    /// Row candidates for a page: the source's known selector when it
    /// matches, otherwise whatever pattern detection finds.
    fn page_fragments<'a>(&self, snapshot: &'a PageSnapshot) -> Result<Vec<Fragment<'a>>> {
        if let Some(selector) = &self.source.row_selector {
            let rows = snapshot.select(selector)?;
            if !rows.is_empty() {
                return Ok(rows);
            }
            log::debug!("Known selector '{selector}' matched nothing, trying detection");
        }
        Ok(self
            .detector
            .detect(snapshot)
            .map(|pattern| pattern.members)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::AppError;

    /// Session double that serves a fixed script of pages.
    struct ScriptedSession {
        pages: Vec<String>,
        index: usize,
        navigated: Vec<String>,
        searched: Vec<String>,
        fail_search: bool,
        fail_advance: bool,
        fail_content_on_page: Option<usize>,
    }

    impl ScriptedSession {
        fn new(pages: Vec<String>) -> Self {
            Self {
                pages,
                index: 0,
                navigated: Vec::new(),
                searched: Vec::new(),
                fail_search: false,
                fail_advance: false,
                fail_content_on_page: None,
            }
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.navigated.push(url.to_string());
            Ok(())
        }

        async fn submit_search(&mut self, query: &str) -> Result<()> {
            if self.fail_search {
                return Err(AppError::browser("search", "portal unreachable"));
            }
            self.searched.push(query.to_string());
            Ok(())
        }

        async fn wait_ready(&mut self) -> Result<()> {
            Ok(())
        }

        async fn content(&mut self) -> Result<String> {
            if self.fail_content_on_page == Some(self.index) {
                return Err(AppError::browser("content", "tab crashed"));
            }
            Ok(self.pages[self.index].clone())
        }

        async fn advance_page(&mut self) -> Result<bool> {
            if self.fail_advance {
                return Err(AppError::browser("next page", "click intercepted"));
            }
            if self.index + 1 < self.pages.len() {
                self.index += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        fn current_url(&self) -> String {
            format!("https://portal.test/bids?page={}", self.index + 1)
        }
    }

    fn row(id: u32) -> String {
        format!(
            r#"<tr><td><a href="/solicitations/view/{id}">Opportunity Number {id}</a></td><td>City of Example</td></tr>"#
        )
    }

    fn page_with_ids(ids: &[u32]) -> String {
        let rows: String = ids.iter().map(|id| row(*id)).collect();
        format!("<html><body><table>{rows}</table></body></html>")
    }

    fn test_config(target: usize, policy: ExcessPolicy) -> Config {
        let mut config = Config::default();
        config.crawl.target_count = target;
        config.crawl.excess_policy = policy;
        config.crawl.page_delay_ms = 0;
        config.crawl.max_pages = 10;
        config.sources[0].start_url = "https://portal.test/bids".to_string();
        config
    }

    fn controller(config: &Config) -> CrawlController {
        CrawlController::new(config, &config.sources[0]).unwrap()
    }

    fn identity_ids(outcome: &CrawlOutcome) -> Vec<String> {
        outcome
            .records
            .iter()
            .map(|r| r.identity_url.rsplit('/').next().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn truncate_stops_exactly_at_the_target() {
        let config = test_config(5, ExcessPolicy::Truncate);
        let mut session = ScriptedSession::new(vec![
            page_with_ids(&[1, 2, 3]),
            page_with_ids(&[4, 5, 6, 7]),
        ]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::TargetReached);
        assert!(outcome.is_complete());
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(identity_ids(&outcome), ["1", "2", "3", "4", "5"]);
        assert_eq!(outcome.stats.pages_visited, 2);
        assert_eq!(session.navigated, ["https://portal.test/bids"]);
        assert_eq!(session.searched, ["roads"]);
    }

    #[tokio::test]
    async fn keep_page_finishes_the_page_past_the_target() {
        let config = test_config(5, ExcessPolicy::KeepPage);
        let mut session = ScriptedSession::new(vec![
            page_with_ids(&[1, 2, 3]),
            page_with_ids(&[4, 5, 6, 7]),
        ]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::TargetReached);
        assert_eq!(outcome.records.len(), 7);
    }

    #[tokio::test]
    async fn exhausted_pagination_returns_partials() {
        let config = test_config(10, ExcessPolicy::Truncate);
        let mut session = ScriptedSession::new(vec![page_with_ids(&[1, 2, 3])]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn repeated_page_content_adds_nothing() {
        // A stalled portal serving the same page twice must not grow the
        // output on the second pass.
        let config = test_config(10, ExcessPolicy::Truncate);
        let mut session = ScriptedSession::new(vec![
            page_with_ids(&[1, 2, 3]),
            page_with_ids(&[1, 2, 3]),
        ]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.stats.duplicates_skipped, 3);
        assert_eq!(outcome.stats.pages_visited, 2);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
    }

    #[tokio::test]
    async fn content_failure_aborts_with_partials() {
        let config = test_config(10, ExcessPolicy::Truncate);
        let mut session = ScriptedSession::new(vec![
            page_with_ids(&[1, 2, 3]),
            page_with_ids(&[4, 5, 6]),
        ]);
        session.fail_content_on_page = Some(1);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::Aborted);
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.failure.as_deref().unwrap().contains("tab crashed"));
        // The second page never delivered content, so it was never visited.
        assert_eq!(outcome.stats.pages_visited, 1);
    }

    #[tokio::test]
    async fn failed_next_activation_ends_pagination_normally() {
        let config = test_config(10, ExcessPolicy::Truncate);
        let mut session = ScriptedSession::new(vec![
            page_with_ids(&[1, 2, 3]),
            page_with_ids(&[4, 5, 6]),
        ]);
        session.fail_advance = true;

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn search_failure_aborts_before_any_page() {
        let config = test_config(10, ExcessPolicy::Truncate);
        let mut session = ScriptedSession::new(vec![page_with_ids(&[1, 2, 3])]);
        session.fail_search = true;

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::Aborted);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.pages_visited, 0);
    }

    #[tokio::test]
    async fn falls_back_to_detection_when_selector_misses() {
        let mut config = test_config(10, ExcessPolicy::Truncate);
        config.sources[0].row_selector = Some("tr.never-present".to_string());
        let cards = r#"<html><body><ul>
            <li><a href="/solicitations/view/1">Opportunity Number 1</a><div>City of Example</div></li>
            <li><a href="/solicitations/view/2">Opportunity Number 2</a><div>City of Example</div></li>
            <li><a href="/solicitations/view/3">Opportunity Number 3</a><div>City of Example</div></li>
            <li><a href="/solicitations/view/4">Opportunity Number 4</a><div>City of Example</div></li>
        </ul></body></html>"#;
        let mut session = ScriptedSession::new(vec![cards.to_string()]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
    }

    #[tokio::test]
    async fn page_budget_bounds_the_crawl() {
        let mut config = test_config(100, ExcessPolicy::Truncate);
        config.crawl.max_pages = 2;
        let mut session = ScriptedSession::new(vec![
            page_with_ids(&[1, 2, 3]),
            page_with_ids(&[4, 5, 6]),
            page_with_ids(&[7, 8, 9]),
        ]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.reason, TerminalReason::PaginationExhausted);
        assert_eq!(outcome.stats.pages_visited, 2);
        assert_eq!(outcome.records.len(), 6);
    }

    #[tokio::test]
    async fn header_rows_are_rejected_not_fatal() {
        let mut config = test_config(10, ExcessPolicy::Truncate);
        // A plain row selector lets the header row through to the extractor.
        config.sources[0].row_selector = Some("table tr".to_string());
        let html = format!(
            "<html><body><table><tr><th>Title</th><th>Agency</th></tr>{}{}{}</table></body></html>",
            row(1),
            row(2),
            row(3)
        );
        let mut session = ScriptedSession::new(vec![html]);

        let outcome = controller(&config).run(&mut session, "roads").await;

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.stats.rejected_no_link, 1);
        assert_eq!(outcome.stats.fragments_seen, 4);
    }
}
