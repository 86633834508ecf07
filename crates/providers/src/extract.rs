//! Article text extraction
//!
//! Boilerplate-removal heuristic over parsed HTML: keep substantial
//! paragraphs outside navigation/footer containers. Intentionally
//! "good enough" and deterministic, not a full readability engine.

use scraper::{ElementRef, Html, Selector};

/// Minimum paragraph length kept by the extractor
const MIN_PARAGRAPH_CHARS: usize = 60;

/// Container element names that never hold article body text
const BOILERPLATE_TAGS: &[&str] = &[
    "nav", "footer", "header", "aside", "form", "script", "style", "noscript", "button",
];

/// Class/id fragments marking generic boilerplate containers
const BOILERPLATE_MARKERS: &[&str] = &[
    "nav", "menu", "footer", "sidebar", "comment", "cookie", "banner", "subscribe", "related",
];

/// Extracted readable document
#[derive(Debug, Clone, Default)]
pub struct Article {
    pub title: String,
    pub text: String,
    pub author: Option<String>,
}

/// Extract readable article text, title and author from raw HTML.
/// Never fails; a page with no recognizable body yields empty text.
pub fn extract(html: &str) -> Article {
    let document = Html::parse_document(html);

    Article {
        title: extract_title(&document),
        text: extract_text(&document),
        author: extract_author(&document),
    }
}

fn extract_title(document: &Html) -> String {
    // og:title tends to be cleaner than <title> (no site suffix)
    let og_selector = Selector::parse("meta[property=\"og:title\"]").unwrap();
    if let Some(meta) = document.select(&og_selector).next() {
        if let Some(content) = meta.value().attr("content") {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    let title_selector = Selector::parse("title").unwrap();
    document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn extract_author(document: &Html) -> Option<String> {
    for selector in [
        "meta[name=\"author\"]",
        "meta[property=\"article:author\"]",
    ] {
        let parsed = Selector::parse(selector).unwrap();
        if let Some(meta) = document.select(&parsed).next() {
            if let Some(content) = meta.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

fn extract_text(document: &Html) -> String {
    let paragraph_selector = Selector::parse("p").unwrap();

    let mut paragraphs = Vec::new();
    for element in document.select(&paragraph_selector) {
        if inside_boilerplate(&element) {
            continue;
        }

        let text = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if text.chars().count() >= MIN_PARAGRAPH_CHARS {
            paragraphs.push(text);
        }
    }

    paragraphs.join("\n\n")
}

fn inside_boilerplate(element: &ElementRef) -> bool {
    for ancestor in element.ancestors() {
        let Some(el) = ancestor.value().as_element() else {
            continue;
        };

        if BOILERPLATE_TAGS.contains(&el.name()) {
            return true;
        }

        let marker_blob = {
            let classes: Vec<&str> = el.classes().collect();
            let id = el.id().unwrap_or_default();
            format!("{} {}", classes.join(" "), id).to_lowercase()
        };

        if !marker_blob.trim().is_empty()
            && BOILERPLATE_MARKERS
                .iter()
                .any(|marker| marker_blob.contains(marker))
        {
            return true;
        }
    }
    false
}
