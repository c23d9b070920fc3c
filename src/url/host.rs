use crate::{UrlError, UrlResult};
use url::Url;

/// Derives the politeness key of a URL: `scheme://host[:port]`
///
/// The port is only included when it differs from the scheme's default, so
/// `https://a.ku.ac.th/x` and `https://a.ku.ac.th:443/y` share one host key.
///
/// # Examples
///
/// ```
/// use scoped_crawl::url::host_key;
///
/// assert_eq!(host_key("https://A.KU.AC.TH/x").unwrap(), "https://a.ku.ac.th");
/// assert_eq!(host_key("http://cpe.ku.ac.th:8080/").unwrap(), "http://cpe.ku.ac.th:8080");
/// ```
pub fn host_key(url: &str) -> UrlResult<String> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;
    host_key_of(&parsed)
}

/// Same as [`host_key`] for an already parsed URL
pub fn host_key_of(url: &Url) -> UrlResult<String> {
    let host = url.host_str().ok_or(UrlError::MissingHost)?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
