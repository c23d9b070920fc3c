use serde::{Deserialize, Serialize};

/// Main configuration structure for Scoped-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    pub scope: ScopeConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawl-wide limits and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Global limit on successfully stored pages
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u64,

    /// Maximum number of stored pages per host
    #[serde(rename = "host-page-quota", default = "default_host_page_quota")]
    pub host_page_quota: u32,

    /// Transport timeout for every request (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Fixed delay before every page fetch (milliseconds)
    #[serde(rename = "pacing-delay-ms", default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Sleep while every queued host is paused (milliseconds)
    #[serde(rename = "idle-wait-ms", default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,

    /// Stored pages between periodic checkpoints, 0 disables them
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u64,
}

/// Per-host throttling and backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolitenessConfig {
    /// Consecutive dequeues of one host before it is paused
    #[serde(rename = "fetch-pause-trigger", default = "default_fetch_pause_trigger")]
    pub fetch_pause_trigger: u32,

    /// Pause applied when the fetch trigger fires (seconds)
    #[serde(rename = "fetch-pause-secs", default = "default_fetch_pause_secs")]
    pub fetch_pause_secs: u64,

    /// Consecutive timeouts of one host before it is paused and requeued
    #[serde(rename = "timeout-pause-trigger", default = "default_timeout_pause_trigger")]
    pub timeout_pause_trigger: u32,

    /// First timeout pause; doubles on each further trigger (seconds)
    #[serde(
        rename = "initial-timeout-pause-secs",
        default = "default_initial_timeout_pause_secs"
    )]
    pub initial_timeout_pause_secs: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            fetch_pause_trigger: default_fetch_pause_trigger(),
            fetch_pause_secs: default_fetch_pause_secs(),
            timeout_pause_trigger: default_timeout_pause_trigger(),
            initial_timeout_pause_secs: default_initial_timeout_pause_secs(),
        }
    }
}

/// Crawl scope: which hosts and paths may enter the frontier
#[derive(Debug, Clone, Deserialize)]
pub struct ScopeConfig {
    /// Domain pattern (e.g., "*.ku.ac.th")
    pub domain: String,

    /// URLs the frontier starts with
    pub seeds: Vec<String>,

    /// Path extensions that are never admitted (with leading dot)
    #[serde(rename = "excluded-extensions", default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address sent in the `From` header
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite crawl journal
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory of the page store
    #[serde(rename = "pages-dir")]
    pub pages_dir: String,

    /// Where checkpoints are written and resumed from
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,
}

fn default_max_pages() -> u64 {
    10_000
}

fn default_host_page_quota() -> u32 {
    1_000
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_pacing_delay_ms() -> u64 {
    1_000
}

fn default_idle_wait_ms() -> u64 {
    1_000
}

fn default_checkpoint_every() -> u64 {
    50
}

fn default_fetch_pause_trigger() -> u32 {
    5
}

fn default_fetch_pause_secs() -> u64 {
    60
}

fn default_timeout_pause_trigger() -> u32 {
    3
}

fn default_initial_timeout_pause_secs() -> u64 {
    30
}

/// Binary, media, archive, script, style and data formats that are never HTML pages
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    // Images
    ".jpg", ".jpeg", ".png", ".svg", ".gif", ".webp", ".bmp", ".tiff",
    // Documents
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx",
    // Archives
    ".zip", ".rar", ".tar", ".gz", ".7z", ".iso",
    // Media
    ".mp3", ".wav", ".ogg", ".mp4", ".avi", ".mov",
    // Executables and scripts
    ".exe", ".dll", ".bin", ".bat", ".sh",
    // Styles and data
    ".css", ".js", ".json", ".xml", ".csv", ".txt",
];

fn default_excluded_extensions() -> Vec<String> {
    DEFAULT_EXCLUDED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}
