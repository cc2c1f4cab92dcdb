//! Structural pattern detection for listing pages.
//!
//! Portals differ in markup but not in shape: results arrive as a run of
//! elements sharing a tag and class list. Instead of pinning a selector per
//! portal, this service finds the dominant repeated signature on the page
//! and hands its members to extraction.

use std::collections::BTreeMap;

use crate::browser::page::{Fragment, PageSnapshot};
use crate::models::DetectorConfig;

/// Groups smaller than this are treated as coincidence, not structure.
const MIN_GROUP_SIZE: usize = 3;

/// A repeated structural signature chosen as the page's listing pattern.
pub struct DetectedPattern<'a> {
    /// Shared signature of the members, e.g. `tr.listing-row`
    pub signature: String,
    /// Member fragments, in document order
    pub members: Vec<Fragment<'a>>,
    /// How many members contain at least one hyperlink
    pub with_links: usize,
}

impl DetectedPattern<'_> {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// One-line description for logging.
    pub fn describe(&self) -> String {
        format!(
            "{}x <{}> ({} linked)",
            self.members.len(),
            self.signature,
            self.with_links
        )
    }
}

/// Service that discovers the listing structure of a results page.
pub struct PatternDetector {
    config: DetectorConfig,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Find the dominant repeated signature on the page.
    ///
    /// Every element with a container-like tag is grouped by signature
    /// across the whole page. Groups are ranked by member count, then by
    /// how many members carry a hyperlink; any remaining tie goes to the
    /// lexicographically first signature. Returns `None` when the page has
    /// no qualifying repetition at all.
    pub fn detect<'a>(&self, snapshot: &'a PageSnapshot) -> Option<DetectedPattern<'a>> {
        // BTreeMap keys keep the final signature tie-break deterministic.
        let mut groups: BTreeMap<String, Vec<Fragment<'a>>> = BTreeMap::new();
        for fragment in snapshot.root().descendant_elements() {
            if self.is_candidate(fragment.tag()) {
                groups.entry(fragment.signature()).or_default().push(fragment);
            }
        }

        let mut candidates: Vec<DetectedPattern<'a>> = groups
            .into_iter()
            .filter(|(_, members)| members.len() >= MIN_GROUP_SIZE)
            .map(|(signature, members)| {
                let with_links = members
                    .iter()
                    .filter(|member| !member.links().is_empty())
                    .count();
                DetectedPattern {
                    signature,
                    members,
                    with_links,
                }
            })
            .collect();

        // Stable sort keeps signature order among full ties.
        candidates.sort_by(|a, b| {
            (b.members.len(), b.with_links).cmp(&(a.members.len(), a.with_links))
        });

        let winner = candidates.into_iter().next()?;
        log::debug!("Detected pattern: {}", winner.describe());
        for (i, member) in winner
            .members
            .iter()
            .take(self.config.diagnostic_samples)
            .enumerate()
        {
            log::debug!("  sample[{i}]: {}", member.markup(120));
        }
        Some(winner)
    }

    fn is_candidate(&self, tag: &str) -> bool {
        self.config.candidate_tags.iter().any(|t| t == tag)
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> PageSnapshot {
        PageSnapshot::parse(html, "https://portal.test/bids").unwrap()
    }

    #[test]
    fn picks_the_dominant_signature() {
        let rows: String = (1..=12)
            .map(|i| {
                format!(
                    r#"<tr class="listing-row"><td><a href="/s/{i}">row {i}</a></td><td>x</td></tr>"#
                )
            })
            .collect();
        let sidebar: String = (1..=4)
            .map(|i| format!(r#"<div class="sidebar-item">item {i}</div>"#))
            .collect();
        let page = parse(&format!(
            "<html><body><table>{rows}</table>{sidebar}</body></html>"
        ));

        let pattern = PatternDetector::default().detect(&page).unwrap();
        assert_eq!(pattern.signature, "tr.listing-row");
        assert_eq!(pattern.member_count(), 12);
        assert_eq!(pattern.with_links, 12);
    }

    #[test]
    fn link_presence_breaks_count_ties() {
        let page = parse(
            r#"<html><body>
            <ul>
              <li class="nav-item">home</li>
              <li class="nav-item">about</li>
              <li class="nav-item">contact</li>
            </ul>
            <ul>
              <li class="bid-row"><a href="/s/1">bid one</a></li>
              <li class="bid-row"><a href="/s/2">bid two</a></li>
              <li class="bid-row">bid three</li>
            </ul>
            </body></html>"#,
        );
        let pattern = PatternDetector::default().detect(&page).unwrap();
        assert_eq!(pattern.signature, "li.bid-row");
        assert_eq!(pattern.with_links, 2);
        assert_eq!(pattern.members[0].text_lines(), vec!["bid one"]);
    }

    #[test]
    fn full_ties_settle_on_signature_order() {
        // Same count, same links: the winner must not depend on document
        // position, only on the signature ordering.
        let page = parse(
            r#"<html><body>
            <div class="beta"><a href="/s/1">one</a></div>
            <div class="beta"><a href="/s/2">two</a></div>
            <div class="beta"><a href="/s/3">three</a></div>
            <div class="alpha"><a href="/s/4">four</a></div>
            <div class="alpha"><a href="/s/5">five</a></div>
            <div class="alpha"><a href="/s/6">six</a></div>
            </body></html>"#,
        );
        let pattern = PatternDetector::default().detect(&page).unwrap();
        assert_eq!(pattern.signature, "div.alpha");
    }

    #[test]
    fn two_members_are_not_a_pattern() {
        let page = parse(
            r#"<html><body>
            <table><tr><td>only</td></tr><tr><td>two</td></tr></table>
            </body></html>"#,
        );
        assert!(PatternDetector::default().detect(&page).is_none());
    }

    #[test]
    fn honors_the_candidate_tag_set() {
        let page = parse(
            r#"<html><body>
            <p><span>a</span><span>b</span><span>c</span><span>d</span></p>
            </body></html>"#,
        );
        assert!(PatternDetector::default().detect(&page).is_none());
    }

    #[test]
    fn class_signatures_separate_cards_from_their_wrapper() {
        let page = parse(
            r#"<html><body>
            <div class="results">
              <div class="card"><a href="/s/1">one</a></div>
              <div class="card"><a href="/s/2">two</a></div>
              <div class="card"><a href="/s/3">three</a></div>
              <div class="card"><a href="/s/4">four</a></div>
            </div>
            </body></html>"#,
        );
        let pattern = PatternDetector::default().detect(&page).unwrap();
        assert_eq!(pattern.signature, "div.card");
        assert_eq!(pattern.member_count(), 4);
    }
}
