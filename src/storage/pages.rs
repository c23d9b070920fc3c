//! Filesystem page store and host-scoped page paths

use crate::storage::traits::{PageStore, StorageError, StorageResult};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Longest file or directory name written, leaving room for the `.html` suffix
const MAX_COMPONENT_BYTES: usize = 200;

/// Derives the host-scoped path a page is stored under
///
/// # Path Rules
///
/// 1. The first component is the host (with its port, if any)
/// 2. A trailing `.html` or `.htm` on the last segment is folded into the final `.html`
/// 3. Any other path is treated as a directory and gets a `page` file
/// 4. The query (with `?` and `&` replaced by `_`) and the fragment are appended with `_`
/// 5. Empty, `.` and `..` segments are dropped so a path never leaves its host directory
/// 6. `/`, `\` and NUL inside a component become `_`, and every component is cut to
///    200 bytes
///
/// # Examples
///
/// ```
/// use scoped_crawl::storage::page_path;
///
/// assert_eq!(page_path("https://a.ku.ac.th/").unwrap(), "a.ku.ac.th/page.html");
/// assert_eq!(page_path("https://a.ku.ac.th/news/item.htm").unwrap(), "a.ku.ac.th/news/item.html");
/// assert_eq!(
///     page_path("https://a.ku.ac.th/view?id=1&lang=th").unwrap(),
///     "a.ku.ac.th/view/page_id=1_lang=th.html"
/// );
/// ```
pub fn page_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut path = host_dir(&parsed)?;

    let mut segments: Vec<&str> = parsed
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect();

    let stem = match segments.last().copied().and_then(html_stem) {
        Some(stem) if !stem.is_empty() => {
            segments.pop();
            stem
        }
        _ => "page",
    };

    let mut name = stem.to_string();
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        name.push('_');
        name.push_str(&query.replace(['?', '&'], "_"));
    }
    if let Some(fragment) = parsed.fragment().filter(|f| !f.is_empty()) {
        name.push('_');
        name.push_str(fragment);
    }

    for segment in segments {
        path.push('/');
        path.push_str(&component(segment));
    }
    path.push('/');
    path.push_str(&component(&name));
    path.push_str(".html");

    Some(path)
}

/// One path component with separators neutralized, cut on a char boundary
fn component(raw: &str) -> String {
    let mut end = raw.len().min(MAX_COMPONENT_BYTES);
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].replace(['/', '\\', '\0'], "_")
}

/// Path of a host's stored robots.txt
pub fn robots_path(host_key: &str) -> Option<String> {
    let parsed = Url::parse(host_key).ok()?;
    Some(format!("{}/robots.txt", host_dir(&parsed)?))
}

fn host_dir(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// The segment without its `.html`/`.htm` suffix, if it has one
fn html_stem(segment: &str) -> Option<&str> {
    [".html", ".htm"].iter().find_map(|suffix| {
        let split = segment.len().checked_sub(suffix.len())?;
        let tail = segment.get(split..)?;
        tail.eq_ignore_ascii_case(suffix).then(|| &segment[..split])
    })
}

/// [`PageStore`] rooted at a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct FsPageStore {
    root: PathBuf,
}

impl FsPageStore {
    /// Creates a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative store path, rejecting anything that could escape the root
    pub fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl PageStore for FsPageStore {
    fn write(&self, path: &str, content: &str) -> StorageResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        tracing::trace!("Wrote {} bytes to {}", content.len(), target.display());
        Ok(())
    }
}
