//! URL handling module for Scoped-Crawl
//!
//! This module provides host-key derivation (the unit of politeness), scope matching,
//! href canonicalization and path-extension extraction.

mod canonical;
mod host;
mod matcher;

pub use canonical::{path_extension, resolve};
pub use host::{host_key, host_key_of};
pub use matcher::matches_wildcard;
