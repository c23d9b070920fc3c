//! HTML link extraction
//!
//! Links are returned raw (as written in the `href` attribute); resolving them against the
//! page's authority is left to [`crate::url::resolve`].

use scraper::{Html, Selector};

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// The page title (from the `<title>` tag)
    pub title: Option<String>,

    /// Raw hrefs in document order
    pub links: Vec<String>,
}

/// Parses HTML content and extracts the title and raw links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - every `<a href="...">` in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - empty and fragment-only hrefs
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
///
/// # Example
///
/// ```
/// use scoped_crawl::crawler::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_html(html);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);
    ParsedPage {
        title: extract_title(&document),
        links: collect_links(&document),
    }
}

/// Extracts raw hrefs from an HTML body
pub fn extract_links(html: &str) -> Vec<String> {
    collect_links(&Html::parse_document(html))
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collect_links(document: &Html) -> Vec<String> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        // Skip if it has the download attribute
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| is_followable(href))
        .map(str::to_string)
        .collect()
}

/// Returns false for hrefs that can never name a crawlable page
fn is_followable(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') {
        return false;
    }

    let lower = href.to_lowercase();
    !(lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:"))
}
