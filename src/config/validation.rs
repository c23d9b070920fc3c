use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, PolitenessConfig, ScopeConfig, UserAgentConfig,
};
use crate::url::matches_wildcard;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_politeness_config(&config.politeness)?;
    validate_scope_config(&config.scope)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.host_page_quota < 1 {
        return Err(ConfigError::Validation(format!(
            "host_page_quota must be >= 1, got {}",
            config.host_page_quota
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_secs must be >= 1, got {}",
            config.fetch_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the throttling and backoff triggers
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.fetch_pause_trigger < 1 {
        return Err(ConfigError::Validation(format!(
            "fetch_pause_trigger must be >= 1, got {}",
            config.fetch_pause_trigger
        )));
    }

    // The fetch history ring is sized by the timeout trigger
    if config.timeout_pause_trigger < 1 || config.timeout_pause_trigger > config.fetch_pause_trigger
    {
        return Err(ConfigError::Validation(format!(
            "timeout_pause_trigger must be between 1 and fetch_pause_trigger ({}), got {}",
            config.fetch_pause_trigger, config.timeout_pause_trigger
        )));
    }

    if config.initial_timeout_pause_secs < 1 {
        return Err(ConfigError::Validation(
            "initial_timeout_pause_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the scope pattern, seeds and excluded extensions
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    validate_domain_pattern(&config.domain)?;

    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "scope must have at least one seed URL".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use an HTTP scheme",
                seed
            )));
        }

        let host = url.host_str().unwrap_or_default();
        if !matches_wildcard(&config.domain, host) {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' is outside the crawl scope '{}'",
                seed, config.domain
            )));
        }
    }

    for ext in &config.excluded_extensions {
        if !ext.starts_with('.') || ext.len() < 2 || ext[1..].contains(['.', '/']) {
            return Err(ConfigError::Validation(format!(
                "Excluded extension '{}' must look like '.ext' (a single dot-segment)",
                ext
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("database_path", &config.database_path),
        ("pages_dir", &config.pages_dir),
        ("checkpoint_path", &config.checkpoint_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
