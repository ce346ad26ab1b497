//! Readable text extraction from HTML.

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::config::ExtractionConfig;
use crate::errors::InsightError;
use crate::normalize::truncate_chars;

static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("paragraph selector is valid"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector is valid"));

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "td", "th", "article",
    "section", "main", "blockquote", "pre", "figcaption", "dt", "dd", "table", "ul", "ol",
];

/// Protocol for content extraction.
pub trait ContentExtractor: Send + Sync {
    /// Extracts readable text from an HTML document, capped at
    /// `config().max_chars` characters.
    fn extract(&self, html: &str) -> String;

    /// Gets the configuration.
    fn config(&self) -> &ExtractionConfig;
}

/// Readability-style extractor built on `scraper`.
///
/// Boilerplate subtrees are skipped. The first main-content selector with
/// enough text wins; otherwise the element whose direct `<p>` children hold
/// the most text; otherwise the whole `<body>`.
#[derive(Debug, Clone)]
pub struct ReadableContentExtractor {
    config: ExtractionConfig,
    remove: Vec<Selector>,
    main_content: Vec<Selector>,
}

fn parse_selectors(selectors: &[String]) -> Result<Vec<Selector>, InsightError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| InsightError::Config(format!("invalid selector '{s}': {e}")))
        })
        .collect()
}

impl ReadableContentExtractor {
    /// Creates an extractor, compiling the configured selectors.
    pub fn new(config: ExtractionConfig) -> Result<Self, InsightError> {
        let remove = parse_selectors(&config.remove_selectors)?;
        let main_content = parse_selectors(&config.main_content_selectors)?;
        Ok(Self {
            config,
            remove,
            main_content,
        })
    }

    fn is_removed(&self, el: &ElementRef<'_>) -> bool {
        self.remove.iter().any(|s| s.matches(el))
    }

    /// Text of `el` with boilerplate skipped, one line per block, blank
    /// lines dropped.
    fn text_of(&self, el: &ElementRef<'_>) -> String {
        let mut buf = String::new();
        let budget = self
            .config
            .max_chars
            .max(self.config.min_text_length)
            .saturating_mul(4);
        self.collect_text(el, &mut buf, budget);
        buf.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn collect_text(&self, el: &ElementRef<'_>, buf: &mut String, budget: usize) {
        for child in el.children() {
            if buf.len() >= budget {
                return;
            }
            match child.value() {
                Node::Text(text) => buf.push_str(text),
                Node::Element(element) => {
                    let Some(child_ref) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if self.is_removed(&child_ref) {
                        continue;
                    }
                    let block = BLOCK_TAGS.contains(&element.name());
                    if block {
                        buf.push('\n');
                    }
                    self.collect_text(&child_ref, buf, budget);
                    if block {
                        buf.push('\n');
                    }
                }
                _ => {}
            }
        }
    }

    fn main_content_text(&self, doc: &Html) -> Option<String> {
        self.main_content.iter().find_map(|selector| {
            doc.select(selector)
                .find(|el| !self.is_removed(el))
                .map(|el| self.text_of(&el))
                .filter(|text| text.chars().count() >= self.config.min_text_length)
        })
    }

    /// The element whose direct paragraph children carry the most text.
    /// Ties go to the block that appears first in the document.
    fn dominant_block_text(&self, doc: &Html) -> Option<String> {
        let mut index = HashMap::new();
        let mut blocks: Vec<(ElementRef<'_>, usize)> = Vec::new();
        for p in doc.select(&PARAGRAPH) {
            let Some(parent) = p.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if self.is_removed(&parent) || self.is_removed(&p) {
                continue;
            }
            let len = p.text().map(|t| t.trim().chars().count()).sum::<usize>();
            let slot = *index.entry(parent.id()).or_insert_with(|| {
                blocks.push((parent, 0));
                blocks.len() - 1
            });
            blocks[slot].1 += len;
        }
        // max_by_key keeps the last maximum, so scan in reverse document order.
        blocks
            .into_iter()
            .rev()
            .filter(|(_, score)| *score > 0)
            .max_by_key(|(_, score)| *score)
            .map(|(el, _)| self.text_of(&el))
            .filter(|text| text.chars().count() >= self.config.min_text_length)
    }

    fn body_text(&self, doc: &Html) -> String {
        match doc.select(&BODY).next() {
            Some(body) => self.text_of(&body),
            None => self.text_of(&doc.root_element()),
        }
    }
}

impl ContentExtractor for ReadableContentExtractor {
    fn extract(&self, html: &str) -> String {
        let doc = Html::parse_document(html);
        let text = self
            .main_content_text(&doc)
            .or_else(|| self.dominant_block_text(&doc))
            .unwrap_or_else(|| self.body_text(&doc));
        truncate_chars(&text, self.config.max_chars).to_string()
    }

    fn config(&self) -> &ExtractionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::article_html;

    fn extractor() -> ReadableContentExtractor {
        ReadableContentExtractor::new(ExtractionConfig::default()).unwrap()
    }

    const LONG_PARAGRAPH: &str = "Community solar programs let renters share the output of a \
        single array and receive credits on their monthly utility bills, which lowers costs \
        for households that cannot install panels on their own roofs.";

    #[test]
    fn test_article_content_skips_boilerplate() {
        let html = article_html("Shared Solar", &[LONG_PARAGRAPH, "Enrollment opens in May."]);
        let text = extractor().extract(&html);

        assert!(text.contains("Shared Solar"));
        assert!(text.contains("Community solar programs"));
        assert!(text.contains("Enrollment opens in May."));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("tracking"));
        assert!(!text.contains("All rights reserved"));
    }

    #[test]
    fn test_dominant_block_without_semantic_tags() {
        let html = format!(
            r#"<html><body>
                <div class="menu"><p>Short link</p></div>
                <div class="story"><p>{LONG_PARAGRAPH}</p><p>{LONG_PARAGRAPH}</p></div>
                <div class="footer-ish"><p>Contact us</p></div>
            </body></html>"#
        );
        let text = extractor().extract(&html);
        assert!(text.starts_with("Community solar programs"));
        assert!(!text.contains("Short link"));
        assert!(!text.contains("Contact us"));
    }

    #[test]
    fn test_tied_blocks_pick_the_first_in_document() {
        let tenants = LONG_PARAGRAPH.replace("renters", "tenants");
        let html = format!(
            r#"<html><body>
                <div class="first"><p>{LONG_PARAGRAPH}</p><p>{LONG_PARAGRAPH}</p></div>
                <div class="second"><p>{tenants}</p><p>{tenants}</p></div>
            </body></html>"#
        );
        let extractor = extractor();
        for _ in 0..16 {
            let text = extractor.extract(&html);
            assert!(text.contains("renters"));
            assert!(!text.contains("tenants"));
        }
    }

    #[test]
    fn test_body_fallback_for_short_pages() {
        let html = "<html><body><nav>Menu</nav><div>Just a little text.</div>\
                    <script>var x = 1;</script></body></html>";
        let text = extractor().extract(html);
        assert_eq!(text, "Just a little text.");
    }

    #[test]
    fn test_blocks_become_lines() {
        let html = "<html><body><h1>Title</h1><p>First.</p><p>Second.</p></body></html>";
        assert_eq!(extractor().extract(html), "Title\nFirst.\nSecond.");
    }

    #[test]
    fn test_output_is_capped() {
        let config = ExtractionConfig {
            max_chars: 50,
            ..ExtractionConfig::default()
        };
        let extractor = ReadableContentExtractor::new(config).unwrap();
        let html = article_html("Cap", &[LONG_PARAGRAPH, LONG_PARAGRAPH]);
        assert_eq!(extractor.extract(&html).chars().count(), 50);
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let config = ExtractionConfig::default().with_remove_selector("<<bad");
        let err = ReadableContentExtractor::new(config).unwrap_err();
        assert_eq!(err.code(), "config");
    }
}
