//! Admission filter for discovered URLs
//!
//! A discovered URL enters the frontier only if it is new, uses an HTTP scheme, belongs to
//! the crawl scope, does not point at an excluded file type and its host still has quota.

use super::frontier::Frontier;
use crate::config::ScopeConfig;
use crate::state::HostPolicyStore;
use crate::url::{host_key_of, matches_wildcard, path_extension};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Why a discovered URL was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Already queued or visited
    Duplicate,
    /// Not a valid absolute URL with a host
    Unparseable,
    /// Scheme other than http/https
    Scheme,
    /// Host outside the crawl scope
    OutOfScope,
    /// Path ends in an excluded extension
    ExcludedExtension,
    /// The host has stored its full page quota
    QuotaReached,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Duplicate => "duplicate",
            Rejection::Unparseable => "unparseable",
            Rejection::Scheme => "non-http scheme",
            Rejection::OutOfScope => "out of scope",
            Rejection::ExcludedExtension => "excluded extension",
            Rejection::QuotaReached => "host quota reached",
        };
        f.write_str(reason)
    }
}

/// Decides which discovered URLs may enter the frontier
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    scope: String,
    excluded_extensions: HashSet<String>,
}

impl AdmissionFilter {
    /// Creates a filter for a scope pattern (e.g. `*.ku.ac.th`) and extension list
    pub fn new<I, S>(scope: impl Into<String>, excluded_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            scope: scope.into(),
            excluded_extensions: excluded_extensions
                .into_iter()
                .map(|ext| ext.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Creates a filter from the `[scope]` configuration section
    pub fn from_config(scope: &ScopeConfig) -> Self {
        Self::new(scope.domain.clone(), &scope.excluded_extensions)
    }

    /// Checks the scope and extension rules only (no dedup or quota)
    pub fn in_scope(&self, url: &str) -> Result<String, Rejection> {
        let parsed = Url::parse(url).map_err(|_| Rejection::Unparseable)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Rejection::Scheme);
        }
        let host_name = parsed.host_str().ok_or(Rejection::Unparseable)?;
        if !matches_wildcard(&self.scope, host_name) {
            return Err(Rejection::OutOfScope);
        }
        if self.has_excluded_extension(&parsed) {
            return Err(Rejection::ExcludedExtension);
        }
        host_key_of(&parsed).map_err(|_| Rejection::Unparseable)
    }

    /// Runs every admission rule against `url` without mutating anything
    pub fn check(
        &self,
        url: &str,
        frontier: &Frontier,
        policy: &HostPolicyStore,
    ) -> Result<(), Rejection> {
        if frontier.contains(url) {
            return Err(Rejection::Duplicate);
        }
        let host = self.in_scope(url)?;
        if policy.quota_reached(&host) {
            return Err(Rejection::QuotaReached);
        }
        Ok(())
    }

    /// Appends `url` to the frontier if every admission rule holds
    pub fn admit(&self, url: &str, frontier: &mut Frontier, policy: &HostPolicyStore) -> bool {
        match self.check(url, frontier, policy) {
            Ok(()) => frontier.enqueue(url),
            Err(reason) => {
                tracing::trace!("Not admitting {}: {}", url, reason);
                false
            }
        }
    }

    /// Admits a batch of links discovered on a page of `source_host`
    ///
    /// Returns the number of newly admitted URLs.
    pub fn admit_all<'a, I>(
        &self,
        urls: I,
        source_host: &str,
        frontier: &mut Frontier,
        policy: &HostPolicyStore,
    ) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let admitted = urls
            .into_iter()
            .filter(|url| self.admit(url, frontier, policy))
            .count();
        tracing::debug!("Admitted {} new URLs from {}", admitted, source_host);
        admitted
    }

    fn has_excluded_extension(&self, url: &Url) -> bool {
        path_extension(url.as_str())
            .map_or(false, |ext| self.excluded_extensions.contains(&ext))
    }
}
