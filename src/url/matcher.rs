/// Checks if a host matches a scope pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "cpe.ku.ac.th" matches only "cpe.ku.ac.th"
/// 2. Suffix match: "*.ku.ac.th" matches:
///    - "ku.ac.th" (the bare domain)
///    - "cpe.ku.ac.th" (single subdomain)
///    - "www.eng.ku.ac.th" (nested subdomains)
///
/// Comparison is case-insensitive; a suffix must align on a label boundary, so
/// "*.ku.ac.th" does not match "evilku.ac.th".
///
/// # Examples
///
/// ```
/// use scoped_crawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("cpe.ku.ac.th", "cpe.ku.ac.th"));
/// assert!(!matches_wildcard("cpe.ku.ac.th", "eng.ku.ac.th"));
///
/// assert!(matches_wildcard("*.ku.ac.th", "ku.ac.th"));
/// assert!(matches_wildcard("*.ku.ac.th", "www.eng.ku.ac.th"));
/// assert!(!matches_wildcard("*.ku.ac.th", "ku.ac.th.example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let candidate = candidate.to_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}
