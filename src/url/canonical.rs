use url::Url;

/// Resolves a raw href against the authority of the page it was found on
///
/// # Resolution Rules
///
/// 1. The base is reduced to `scheme://host[:port]/`, so relative hrefs resolve
///    from the site root rather than from the page's directory
/// 2. The href is joined onto that root (absolute hrefs replace it entirely)
/// 3. The joined URL is percent-decoded
///
/// No further normalization is applied: `/x` and `/x/` stay distinct keys.
///
/// # Returns
///
/// * `Some(String)` - The canonical absolute URL
/// * `None` - The base is not a valid URL or the href cannot be joined
///
/// # Examples
///
/// ```
/// use scoped_crawl::url::resolve;
///
/// let url = resolve("https://a.ku.ac.th/dept/index.html", "people").unwrap();
/// assert_eq!(url, "https://a.ku.ac.th/people");
///
/// let url = resolve("https://a.ku.ac.th/", "/th/%E0%B8%82%E0%B9%88%E0%B8%B2%E0%B8%A7").unwrap();
/// assert_eq!(url, "https://a.ku.ac.th/th/ข่าว");
/// ```
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    let mut root = Url::parse(base_url).ok()?;
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);

    let joined = root.join(href.trim()).ok()?;
    Some(percent_decode(joined.as_str()))
}

/// Decodes percent-escapes, keeping the encoded form when it is not valid UTF-8
fn percent_decode(url: &str) -> String {
    match urlencoding::decode(url) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => url.to_string(),
    }
}

/// Extracts the lower-cased extension (with its dot) of the last path segment
///
/// # Examples
///
/// ```
/// use scoped_crawl::url::path_extension;
///
/// assert_eq!(path_extension("https://a.ku.ac.th/docs/Report.PDF"), Some(".pdf".to_string()));
/// assert_eq!(path_extension("https://a.ku.ac.th/docs/"), None);
/// ```
pub fn path_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.last()?;
    let dot = last_segment.rfind('.')?;
    let ext = &last_segment[dot..];
    if ext.len() < 2 {
        return None;
    }
    Some(ext.to_lowercase())
}
