//! Readable-text extraction from an arbitrary HTML page.
//!
//! Pulls `<title>`, the description meta tag and the text of the main content
//! container. Script and style text is skipped, whitespace is collapsed, and
//! the result is capped at [`MAX_CONTENT_CHARS`] to bound downstream prompt
//! size.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use blogmate_shared::SourcePage;

/// Upper bound on extracted content, in characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

/// Main-content containers, in preference order. First match wins.
const CONTENT_SELECTORS: [&str; 4] = ["main", "article", ".content", "#content"];

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// Extract title, description and main text from an HTML document.
///
/// A page with no main-content container yields an empty `content`.
pub fn extract_page(url: &str, html: &str) -> SourcePage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();

    let description = doc
        .select(&DESCRIPTION)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|d| d.trim().to_string())
        .unwrap_or_default();

    let content = CONTAINERS
        .iter()
        .find_map(|sel| doc.select(sel).next())
        .map(|el| truncate_chars(&collapse_whitespace(&visible_text(el)), MAX_CONTENT_CHARS))
        .unwrap_or_default();

    SourcePage {
        url: url.to_string(),
        title,
        description,
        content,
    }
}

/// Elements whose start breaks the surrounding text into separate words.
const BLOCK_ELEMENTS: [&str; 20] = [
    "address", "article", "blockquote", "br", "dd", "div", "dt", "h1", "h2", "h3", "h4", "h5",
    "h6", "hr", "li", "p", "pre", "section", "td", "tr",
];

/// Concatenate text nodes under `root`, skipping anything inside script/style.
///
/// Inline markup is joined without a separator, so `wor<b>ld</b>` reads as
/// one word; block elements start on a fresh word.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        if let Some(element) = node.value().as_element() {
            if BLOCK_ELEMENTS.iter().any(|b| *b == element.name()) {
                out.push(' ');
            }
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
