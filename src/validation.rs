use std::path::Path;

use anyhow::{anyhow, Result};

/// Smallest page size the recent-search endpoint accepts
pub const MIN_PAGE_SIZE: u32 = 10;
/// Largest page size the recent-search endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Validation utilities for configuration values and incoming text
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate the search keyword
    pub fn validate_keyword(keyword: &str) -> Result<()> {
        if keyword.trim().is_empty() {
            return Err(anyhow!("Search keyword cannot be empty"));
        }

        if keyword.len() > 128 {
            return Err(anyhow!("Search keyword too long (max 128 characters)"));
        }

        // Operators are added by the query builder
        if keyword.contains(':') || keyword.trim_start().starts_with('-') {
            return Err(anyhow!("Search keyword must not contain query operators"));
        }

        Ok(())
    }

    /// Validate a two or three letter language code (`pt`, `en`, `spa`)
    pub fn validate_language(language: &str) -> Result<()> {
        if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(anyhow!(
                "Language must be a lowercase ISO 639 code, got '{language}'"
            ));
        }

        Ok(())
    }

    /// Validate the page size requested from the search endpoint
    pub fn validate_page_size(max_results: u32) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&max_results) {
            return Err(anyhow!(
                "max_results must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}, got {max_results}"
            ));
        }

        Ok(())
    }

    /// Validate an HTTP(S) endpoint
    pub fn validate_endpoint(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Endpoint cannot be empty"));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(anyhow!("Endpoint must start with http:// or https://, got '{url}'"));
        }

        if url.len() > 1000 {
            return Err(anyhow!("Endpoint URL too long"));
        }

        Ok(())
    }

    /// Validate a request timeout in seconds
    pub fn validate_timeout(secs: u64) -> Result<()> {
        if secs == 0 {
            return Err(anyhow!("Timeout must be greater than 0"));
        }

        if secs > 600 {
            return Err(anyhow!("Timeout too large (max 600 seconds)"));
        }

        Ok(())
    }

    /// Validate a sampling temperature
    pub fn validate_temperature(temperature: f32) -> Result<()> {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }

        Ok(())
    }

    /// Validate a table file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        if path_str.trim().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        if path_str.len() > 4096 {
            return Err(anyhow!("File path too long (max 4096 characters)"));
        }

        if path.file_name().is_none() {
            return Err(anyhow!("File path must name a file: {path:?}"));
        }

        Ok(())
    }

    /// Normalize a message body: each line break becomes a single space.
    ///
    /// Nothing else is touched. The result is part of the dedup key, so
    /// rows already stored with inner or trailing spaces must still match.
    #[must_use]
    pub fn normalize_text(text: &str) -> String {
        text.replace("\r\n", " ").replace('\n', " ")
    }
}
