//! Runtime configuration, loaded from TOML with full defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::crawl::ExcessPolicy;
use crate::models::record::FormatVariant;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Browser session behavior settings
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Crawl loop settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Structural pattern discovery settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Marker-phrase tables driving line classification
    #[serde(default)]
    pub markers: MarkerConfig,

    /// Known procurement portals
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourcePattern>,
}

impl Config {
    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing or broken file falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Sanity-check the values before a crawl gets to depend on them.
    pub fn validate(&self) -> Result<()> {
        if self.browser.user_agent.trim().is_empty() {
            return Err(AppError::validation("browser.user_agent is empty"));
        }
        if self.browser.nav_timeout_secs == 0 {
            return Err(AppError::validation("browser.nav_timeout_secs must be > 0"));
        }
        if self.browser.ready_timeout_secs == 0 {
            return Err(AppError::validation(
                "browser.ready_timeout_secs must be > 0",
            ));
        }
        if self.browser.ready_poll_ms == 0 {
            return Err(AppError::validation("browser.ready_poll_ms must be > 0"));
        }
        if self.crawl.target_count == 0 {
            return Err(AppError::validation("crawl.target_count must be > 0"));
        }
        if self.crawl.max_pages == 0 {
            return Err(AppError::validation("crawl.max_pages must be > 0"));
        }
        if self.markers.agency_markers.is_empty() {
            return Err(AppError::validation("No agency markers defined"));
        }
        if self.markers.min_description_len == 0 {
            return Err(AppError::validation(
                "markers.min_description_len must be > 0",
            ));
        }
        if self.detector.candidate_tags.is_empty() {
            return Err(AppError::validation("No detector candidate tags defined"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }

    /// Look up a source pattern by name.
    pub fn find_source(&self, name: &str) -> Option<&SourcePattern> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// The first configured source, used when none is named.
    pub fn default_source(&self) -> Option<&SourcePattern> {
        self.sources.first()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            crawl: CrawlConfig::default(),
            detector: DetectorConfig::default(),
            markers: MarkerConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// Which session driver to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Headless Chrome, for JavaScript-rendered portals
    #[default]
    Chrome,
    /// Plain HTTP fetches, for static mirrors and testing
    Http,
}

/// Browser session behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Session driver to use
    #[serde(default)]
    pub driver: DriverKind,

    /// User-Agent header/identity for the session
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Run the browser without a visible window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Timeout for navigation and interaction calls, in seconds
    #[serde(default = "defaults::nav_timeout")]
    pub nav_timeout_secs: u64,

    /// Bounded wait for content readiness after navigation, in seconds
    #[serde(default = "defaults::ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Poll interval while waiting for readiness, in milliseconds
    #[serde(default = "defaults::ready_poll")]
    pub ready_poll_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            user_agent: defaults::user_agent(),
            headless: defaults::headless(),
            nav_timeout_secs: defaults::nav_timeout(),
            ready_timeout_secs: defaults::ready_timeout(),
            ready_poll_ms: defaults::ready_poll(),
        }
    }
}

/// Crawl loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// How many unique records to accumulate before stopping
    #[serde(default = "defaults::target_count")]
    pub target_count: usize,

    /// Upper bound on result pages visited in one crawl
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// What to do with records found past the target on the same page
    #[serde(default)]
    pub excess_policy: ExcessPolicy,

    /// Delay between page advances, in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            target_count: defaults::target_count(),
            max_pages: defaults::max_pages(),
            excess_policy: ExcessPolicy::default(),
            page_delay_ms: defaults::page_delay(),
        }
    }
}

/// Structural pattern discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Container-like tags considered when grouping repeated structures
    #[serde(default = "defaults::candidate_tags")]
    pub candidate_tags: Vec<String>,

    /// How many member fragments to include in the debug diagnostic sample
    #[serde(default = "defaults::diagnostic_samples")]
    pub diagnostic_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            candidate_tags: defaults::candidate_tags(),
            diagnostic_samples: defaults::diagnostic_samples(),
        }
    }
}

/// A secondary-agency marker phrase and the row dialect it implies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyMarker {
    /// Phrase to search for in a line (case-insensitive containment)
    pub phrase: String,

    /// Format variant assigned when the phrase is seen
    pub variant: FormatVariant,
}

/// Marker-phrase tables driving line classification.
///
/// The original portal scripts duplicated one extraction function per row
/// dialect; these tables are what vary between dialects, so one extractor
/// configured here replaces all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Category captions that identify a row dialect
    #[serde(default = "defaults::agency_markers")]
    pub agency_markers: Vec<AgencyMarker>,

    /// Phrases marking a line as layout noise, never field content
    #[serde(default = "defaults::noise_phrases")]
    pub noise_phrases: Vec<String>,

    /// Phrases marking a mandatory pre-bid meeting note
    #[serde(default = "defaults::prebid_markers")]
    pub prebid_markers: Vec<String>,

    /// Section-header lines whose following line is the closing date
    #[serde(default = "defaults::due_headers")]
    pub due_headers: Vec<String>,

    /// Tokens identifying an organizational name
    #[serde(default = "defaults::org_tokens")]
    pub org_tokens: Vec<String>,

    /// Lowercased city names recognized as locations on their own
    #[serde(default = "defaults::major_cities")]
    pub major_cities: Vec<String>,

    /// Minimum length for a line to qualify as a description
    #[serde(default = "defaults::min_description_len")]
    pub min_description_len: usize,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            agency_markers: defaults::agency_markers(),
            noise_phrases: defaults::noise_phrases(),
            prebid_markers: defaults::prebid_markers(),
            due_headers: defaults::due_headers(),
            org_tokens: defaults::org_tokens(),
            major_cities: defaults::major_cities(),
            min_description_len: defaults::min_description_len(),
        }
    }
}

/// A known procurement portal and the selectors that drive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePattern {
    /// Portal name for identification
    pub name: String,

    /// Listing page the crawl starts from
    pub start_url: String,

    /// Base for absolutizing relative hrefs (defaults to start_url)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Known row selector; when absent the pattern detector discovers one
    #[serde(default)]
    pub row_selector: Option<String>,

    /// Selector for the search input field
    #[serde(default = "defaults::search_input_selector")]
    pub search_input_selector: String,

    /// Selector for the search submit control; absent means press Enter
    #[serde(default)]
    pub search_submit_selector: Option<String>,

    /// Selector for the next-page control
    #[serde(default = "defaults::next_page_selector")]
    pub next_page_selector: String,

    /// Selector whose presence confirms the results content is rendered
    #[serde(default = "defaults::ready_selector")]
    pub ready_selector: String,

    /// Regex a record-detail href must match to qualify a row
    #[serde(default = "defaults::detail_link_pattern")]
    pub detail_link_pattern: String,

    /// URL template with `{query}` for the HTTP driver's search submission
    #[serde(default)]
    pub search_url_template: Option<String>,
}

impl SourcePattern {
    /// The base URL used for absolutizing, falling back to the start URL.
    pub fn base(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.start_url)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("source name is empty"));
        }
        if url::Url::parse(&self.start_url).is_err() {
            return Err(AppError::validation(format!(
                "source '{}' start_url is not a valid URL",
                self.name
            )));
        }
        if let Err(e) = regex::Regex::new(&self.detail_link_pattern) {
            return Err(AppError::validation(format!(
                "source '{}' detail_link_pattern is invalid: {e}",
                self.name
            )));
        }
        Ok(())
    }
}

mod defaults {
    use super::{AgencyMarker, SourcePattern};
    use crate::models::record::FormatVariant;

    // Browser defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; bidsweep/0.1)".into()
    }
    pub fn headless() -> bool {
        true
    }
    pub fn nav_timeout() -> u64 {
        30
    }
    pub fn ready_timeout() -> u64 {
        15
    }
    pub fn ready_poll() -> u64 {
        250
    }

    // Crawl defaults
    pub fn target_count() -> usize {
        25
    }
    pub fn max_pages() -> u32 {
        20
    }
    pub fn page_delay() -> u64 {
        500
    }

    // Detector defaults
    pub fn candidate_tags() -> Vec<String> {
        vec![
            "tr".into(),
            "li".into(),
            "article".into(),
            "section".into(),
            "div".into(),
        ]
    }
    pub fn diagnostic_samples() -> usize {
        3
    }

    // Marker defaults
    pub fn agency_markers() -> Vec<AgencyMarker> {
        vec![
            AgencyMarker {
                phrase: "state & local".into(),
                variant: FormatVariant::State,
            },
            AgencyMarker {
                phrase: "state and local".into(),
                variant: FormatVariant::State,
            },
            AgencyMarker {
                phrase: "federal".into(),
                variant: FormatVariant::Federal,
            },
            AgencyMarker {
                phrase: "member agency".into(),
                variant: FormatVariant::MemberAgency,
            },
        ]
    }
    pub fn noise_phrases() -> Vec<String> {
        vec![
            "view details".into(),
            "view solicitation".into(),
            "add to favorites".into(),
            "save this search".into(),
            "sign in to view".into(),
            "register to view".into(),
            "advertisement".into(),
            "sponsored".into(),
        ]
    }
    pub fn prebid_markers() -> Vec<String> {
        vec![
            "pre-bid".into(),
            "prebid".into(),
            "pre bid".into(),
            "mandatory site visit".into(),
        ]
    }
    pub fn due_headers() -> Vec<String> {
        vec![
            "closing date".into(),
            "close date".into(),
            "due date".into(),
            "bid closing".into(),
            "closes".into(),
        ]
    }
    pub fn org_tokens() -> Vec<String> {
        vec![
            "university of".into(),
            "city of".into(),
            "county of".into(),
            "state of".into(),
            "town of".into(),
            "village of".into(),
            "port of".into(),
            "department of".into(),
            "district".into(),
            "authority".into(),
        ]
    }
    pub fn major_cities() -> Vec<String> {
        vec![
            "new york".into(),
            "los angeles".into(),
            "chicago".into(),
            "houston".into(),
            "phoenix".into(),
            "philadelphia".into(),
            "san antonio".into(),
            "san diego".into(),
            "dallas".into(),
            "seattle".into(),
            "denver".into(),
            "boston".into(),
            "atlanta".into(),
            "miami".into(),
        ]
    }
    pub fn min_description_len() -> usize {
        50
    }

    // Source defaults
    pub fn search_input_selector() -> String {
        "input[name='keywords']".into()
    }
    pub fn next_page_selector() -> String {
        "a[rel='next']".into()
    }
    pub fn ready_selector() -> String {
        "table".into()
    }
    pub fn detail_link_pattern() -> String {
        r"(?i)/(solicitations?|view-notice|opportunit)".into()
    }

    pub fn default_sources() -> Vec<SourcePattern> {
        vec![SourcePattern {
            name: "bidnet".to_string(),
            start_url: "https://www.bidnetdirect.com/public/solicitations/open".to_string(),
            base_url: Some("https://www.bidnetdirect.com".to_string()),
            row_selector: Some("table tr:has(a)".to_string()),
            search_input_selector: search_input_selector(),
            search_submit_selector: Some("button[type='submit']".to_string()),
            next_page_selector: "a[rel='next']".to_string(),
            ready_selector: ready_selector(),
            detail_link_pattern: detail_link_pattern(),
            search_url_template: None,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn blank_user_agent_is_rejected() {
        let mut config = Config::default();
        config.browser.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_target() {
        let mut config = Config::default();
        config.crawl.target_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_detail_pattern() {
        let mut config = Config::default();
        config.sources[0].detail_link_pattern = "([unclosed".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_start_url() {
        let mut config = Config::default();
        config.sources[0].start_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn find_source_by_name() {
        let config = Config::default();
        assert!(config.find_source("bidnet").is_some());
        assert!(config.find_source("missing").is_none());
        assert_eq!(config.default_source().unwrap().name, "bidnet");
    }

    #[test]
    fn source_base_falls_back_to_start_url() {
        let mut config = Config::default();
        config.sources[0].base_url = None;
        assert_eq!(
            config.sources[0].base(),
            "https://www.bidnetdirect.com/public/solicitations/open"
        );
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_str = r#"
            [browser]
            driver = "http"

            [crawl]
            target_count = 5
            excess_policy = "keep_page"

            [[sources]]
            name = "mirror"
            start_url = "https://mirror.test/bids"
            search_url_template = "https://mirror.test/bids?q={query}"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.browser.driver, DriverKind::Http);
        assert_eq!(config.crawl.target_count, 5);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].name, "mirror");
        // Unspecified fields and sections fall back to defaults.
        assert_eq!(config.crawl.max_pages, 20);
        assert!(!config.markers.agency_markers.is_empty());
        assert!(config.validate().is_ok());
    }
}
