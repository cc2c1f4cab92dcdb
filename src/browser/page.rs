//! Parsed listing pages and the fragments extraction works on.
//!
//! A snapshot owns the parsed document for one page of results. Fragments are
//! cheap views into it; they never outlive the snapshot, and the snapshot is
//! never held across an await point because the parsed tree is not `Send`.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::utils::text::{normalize_whitespace, truncate_graphemes};

/// Tags that start and end a visual line of text.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "br",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Tags whose content is never visible text.
const SKIP_TAGS: &[&str] = &["head", "noscript", "script", "style", "template"];

fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

fn is_skipped(tag: &str) -> bool {
    SKIP_TAGS.contains(&tag)
}

/// One page of portal results, parsed and pinned to its URL.
pub struct PageSnapshot {
    html: Html,
    base: Url,
}

impl PageSnapshot {
    /// Parse a page, remembering the URL it was fetched from.
    pub fn parse(html: &str, page_url: &str) -> Result<Self> {
        let base = Url::parse(page_url)?;
        Ok(Self {
            html: Html::parse_document(html),
            base,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The document root, for structure discovery walks.
    pub fn root(&self) -> Fragment<'_> {
        Fragment {
            element: self.html.root_element(),
            base: &self.base,
        }
    }

    /// All fragments matching a CSS selector, in document order.
    pub fn select(&self, selector: &str) -> Result<Vec<Fragment<'_>>> {
        let parsed = Selector::parse(selector)
            .map_err(|e| AppError::selector(selector, e.to_string()))?;
        Ok(self
            .html
            .select(&parsed)
            .map(|element| Fragment {
                element,
                base: &self.base,
            })
            .collect())
    }

    /// Whether any element matches the selector.
    pub fn has_match(&self, selector: &str) -> Result<bool> {
        Ok(!self.select(selector)?.is_empty())
    }
}

/// A hyperlink found inside a fragment, href already absolutized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// A view of one candidate listing row within a snapshot.
#[derive(Clone, Copy)]
pub struct Fragment<'a> {
    element: ElementRef<'a>,
    base: &'a Url,
}

impl<'a> Fragment<'a> {
    pub fn tag(&self) -> &'a str {
        self.element.value().name()
    }

    /// Tag plus sorted classes, e.g. `tr.even.result-row`.
    ///
    /// Sorting makes the signature independent of class order, so rows that
    /// differ only in class ordering still group together. Ids are left out;
    /// they are unique per element and would split every group.
    pub fn signature(&self) -> String {
        let mut signature = self.tag().to_string();
        let mut classes: Vec<&str> = self.element.value().classes().collect();
        classes.sort_unstable();
        for class in classes {
            signature.push('.');
            signature.push_str(class);
        }
        signature
    }

    /// Direct element children, in document order.
    pub fn children(&self) -> Vec<Fragment<'a>> {
        self.element
            .children()
            .filter_map(ElementRef::wrap)
            .map(|element| Fragment {
                element,
                base: self.base,
            })
            .collect()
    }

    /// Every element beneath this one, in document order.
    pub fn descendant_elements(&self) -> Vec<Fragment<'a>> {
        self.element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(|element| Fragment {
                element,
                base: self.base,
            })
            .collect()
    }

    /// How many sub-cells this fragment has.
    ///
    /// Table rows are measured by their `td`/`th` descendants; anything
    /// without table cells falls back to direct element children.
    pub fn cell_count(&self) -> usize {
        let cells = self
            .descendant_elements()
            .iter()
            .filter(|el| matches!(el.tag(), "td" | "th"))
            .count();
        if cells > 0 {
            cells
        } else {
            self.children().len()
        }
    }

    /// Visible text as lines, one per block-level run.
    ///
    /// Inline markup does not split a line; block boundaries and `<br>` do.
    /// Every line comes back whitespace-normalized and non-empty, in
    /// document order.
    pub fn text_lines(&self) -> Vec<String> {
        fn flush(current: &mut String, lines: &mut Vec<String>) {
            let line = normalize_whitespace(current);
            if !line.is_empty() {
                lines.push(line);
            }
            current.clear();
        }

        fn collect(node: NodeRef<'_, Node>, current: &mut String, lines: &mut Vec<String>) {
            for child in node.children() {
                match child.value() {
                    Node::Text(text) => current.push_str(text),
                    Node::Element(element) => {
                        let tag = element.name();
                        if is_skipped(tag) {
                            continue;
                        }
                        if is_block(tag) {
                            flush(current, lines);
                            collect(child, current, lines);
                            flush(current, lines);
                        } else {
                            collect(child, current, lines);
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut lines = Vec::new();
        let mut current = String::new();
        collect(*self.element, &mut current, &mut lines);
        flush(&mut current, &mut lines);
        lines
    }

    /// All hyperlinks under this fragment, absolutized against the page URL.
    ///
    /// Hrefs that fail to resolve or resolve to non-http schemes are dropped.
    pub fn links(&self) -> Vec<Link> {
        self.element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "a")
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                if href.trim().is_empty() {
                    return None;
                }
                let resolved = self.base.join(href).ok()?;
                if !matches!(resolved.scheme(), "http" | "https") {
                    return None;
                }
                Some(Link {
                    href: resolved.to_string(),
                    text: normalize_whitespace(&anchor.text().collect::<String>()),
                })
            })
            .collect()
    }

    /// This element's own href, absolutized, if it is a usable link.
    pub fn href(&self) -> Option<String> {
        let href = self.element.value().attr("href")?;
        if href.trim().is_empty() {
            return None;
        }
        let resolved = self.base.join(href).ok()?;
        matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
    }

    /// Flattened text, bounded, for diagnostics and record excerpts.
    pub fn excerpt(&self, max_graphemes: usize) -> String {
        truncate_graphemes(&self.text_lines().join(" | "), max_graphemes)
    }

    /// Outer markup, collapsed to one line and bounded, for structure
    /// diagnostics.
    pub fn markup(&self, max_graphemes: usize) -> String {
        truncate_graphemes(&normalize_whitespace(&self.element.html()), max_graphemes)
    }
}

impl std::fmt::Debug for Fragment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("signature", &self.signature())
            .field("cells", &self.cell_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <table id="results">
          <tr class="result-row odd">
            <td><a href="/solicitations/view/123">Road Resurfacing <span>Phase II</span></a></td>
            <td>City of Example<br>Springfield, IL</td>
            <td>Due: 2024-05-01</td>
          </tr>
          <tr class="odd result-row">
            <td><a href="https://other.test/solicitations/view/456">Bridge Painting</a></td>
            <td>County of Madison</td>
            <td>Due: 2024-06-15</td>
          </tr>
        </table>
        </body></html>
    "#;

    fn snapshot() -> PageSnapshot {
        PageSnapshot::parse(LISTING, "https://portal.test/bids?page=1").unwrap()
    }

    #[test]
    fn select_returns_rows_in_order() {
        let page = snapshot();
        let rows = page.select("tr.result-row").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag(), "tr");
    }

    #[test]
    fn select_rejects_bad_selector() {
        let page = snapshot();
        let err = page.select("tr[[").unwrap_err();
        assert!(matches!(err, AppError::Selector { .. }));
    }

    #[test]
    fn signature_sorts_classes() {
        let page = snapshot();
        let rows = page.select("tr").unwrap();
        // Both rows share a signature despite differing class order.
        assert_eq!(rows[0].signature(), "tr.odd.result-row");
        assert_eq!(rows[0].signature(), rows[1].signature());
    }

    #[test]
    fn text_lines_respect_block_boundaries() {
        let page = snapshot();
        let rows = page.select("tr").unwrap();
        let lines = rows[0].text_lines();
        // The inline span stays on the title line; br and td boundaries split.
        assert_eq!(
            lines,
            vec![
                "Road Resurfacing Phase II",
                "City of Example",
                "Springfield, IL",
                "Due: 2024-05-01",
            ]
        );
    }

    #[test]
    fn text_lines_skip_script_content() {
        let html = r#"<html><body><div id="card">
            visible
            <script>var hidden = 1;</script>
        </div></body></html>"#;
        let page = PageSnapshot::parse(html, "https://portal.test/").unwrap();
        let card = page.select("#card").unwrap();
        assert_eq!(card[0].text_lines(), vec!["visible"]);
    }

    #[test]
    fn cell_count_prefers_table_cells() {
        let page = snapshot();
        let rows = page.select("tr").unwrap();
        assert_eq!(rows[0].cell_count(), 3);
    }

    #[test]
    fn cell_count_falls_back_to_children() {
        let html = r#"<html><body>
            <div class="card"><div>a</div><div>b</div><span>c</span></div>
        </body></html>"#;
        let page = PageSnapshot::parse(html, "https://portal.test/").unwrap();
        let cards = page.select("div.card").unwrap();
        assert_eq!(cards[0].cell_count(), 3);
    }

    #[test]
    fn links_are_absolutized() {
        let page = snapshot();
        let rows = page.select("tr").unwrap();
        let links = rows[0].links();
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].href,
            "https://portal.test/solicitations/view/123"
        );
        assert_eq!(links[0].text, "Road Resurfacing Phase II");
        // Absolute hrefs pass through untouched.
        let links = rows[1].links();
        assert_eq!(links[0].href, "https://other.test/solicitations/view/456");
    }

    #[test]
    fn links_drop_non_http_schemes() {
        let html = r#"<html><body><div id="card">
            <a href="javascript:void(0)">fake</a>
            <a href="mailto:bids@example.gov">mail</a>
            <a href="/real">real</a>
        </div></body></html>"#;
        let page = PageSnapshot::parse(html, "https://portal.test/bids").unwrap();
        let links = page.select("#card").unwrap()[0].links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "https://portal.test/real");
    }

    #[test]
    fn own_href_is_absolutized() {
        let html = r#"<html><body>
            <a rel="next" href="/bids?page=2">Next</a>
        </body></html>"#;
        let page = PageSnapshot::parse(html, "https://portal.test/bids?page=1").unwrap();
        let next = page.select("a[rel='next']").unwrap();
        assert_eq!(
            next[0].href().as_deref(),
            Some("https://portal.test/bids?page=2")
        );
    }

    #[test]
    fn excerpt_joins_and_bounds() {
        let page = snapshot();
        let rows = page.select("tr").unwrap();
        let excerpt = rows[0].excerpt(30);
        assert!(excerpt.starts_with("Road Resurfacing"));
        assert!(excerpt.ends_with('…'));
        // 30 kept graphemes plus the ellipsis marker.
        assert_eq!(excerpt.chars().count(), 31);
    }

    #[test]
    fn markup_keeps_tags_and_bounds_length() {
        let page = snapshot();
        let rows = page.select("tr").unwrap();
        let markup = rows[0].markup(60);
        // Tags survive, unlike the text excerpt.
        assert!(markup.starts_with(r#"<tr class="result-row odd">"#));
        assert!(markup.contains("<td>"));
        assert!(markup.ends_with('…'));
    }
}
