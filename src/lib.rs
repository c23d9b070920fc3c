//! Scoped-Crawl: a polite, resumable crawler bound to a domain suffix
//!
//! The crate is built around a single [`crawler::Scheduler`] aggregate that decides which URL
//! may be fetched next, honouring robots.txt, consecutive-fetch throttling, exponential
//! timeout backoff and per-host page quotas. Its full state can be checkpointed and restored.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Scoped-Crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Errors raised while reading, writing or validating a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to access checkpoint file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed checkpoint: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported checkpoint version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("Inconsistent checkpoint: {0}")]
    Inconsistent(String),
}

/// Result type alias for Scoped-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use checkpoint::Checkpoint;
pub use config::Config;
pub use crawler::{Coordinator, Scheduler};
pub use state::{HostPolicyStore, HostState};
pub use url::{host_key, resolve};
