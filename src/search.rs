//! Message-search collaborator.
//!
//! [`SearchSource`] is the seam the ingestion stage depends on;
//! [`RecentSearchClient`] implements it against the X API v2 recent-search
//! endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{MonitorError, Result};
use crate::models::Message;
use crate::validation::InputValidator;

const USER_AGENT: &str = concat!("flood-monitor/", env!("CARGO_PKG_VERSION"));

/// Source of candidate messages for ingestion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Fetch the current page of matching messages, normalized and unclassified.
    async fn fetch(&self) -> Result<Vec<Message>>;
}

/// One post as returned by the recent-search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRecord {
    /// Post id, only used in log fields
    pub id: Option<String>,
    /// Raw post body
    pub text: String,
    /// Poster id, kept as text
    pub author_id: Option<String>,
    /// Creation time as sent by the API
    pub created_at: Option<String>,
}

impl SearchRecord {
    /// Convert into an unclassified message, or `None` when the record lacks
    /// an author or creation time and so cannot be deduplicated.
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        let author_id = self.author_id.filter(|a| !a.trim().is_empty())?;
        let posted_at = self.created_at.filter(|c| !c.trim().is_empty())?;
        Some(Message::new(
            author_id.trim(),
            InputValidator::normalize_text(&self.text),
            posted_at.trim(),
        ))
    }
}

/// Body of a recent-search response
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    /// Matching posts; absent when nothing matched
    #[serde(default)]
    pub data: Vec<SearchRecord>,
    /// Paging metadata
    #[serde(default)]
    pub meta: Option<SearchMeta>,
}

/// Paging metadata of a recent-search response
#[derive(Debug, Default, Deserialize)]
pub struct SearchMeta {
    /// Number of posts on this page
    pub result_count: Option<u32>,
    /// Id of the newest post on this page
    pub newest_id: Option<String>,
}

impl SearchResponse {
    /// Messages from every usable record, in response order.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        let total = self.data.len();
        let messages: Vec<Message> = self
            .data
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                let message = record.into_message();
                if message.is_none() {
                    warn!(id = ?id, "Skipping search record without author or creation time");
                }
                message
            })
            .collect();

        debug!(total, usable = messages.len(), "Converted search records");
        messages
    }
}

/// HTTP client for the recent-search endpoint
pub struct RecentSearchClient {
    http: reqwest::Client,
    config: SearchConfig,
    bearer_token: String,
}

impl RecentSearchClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: SearchConfig, bearer_token: impl Into<String>) -> Result<Self> {
        let bearer_token = bearer_token.into();
        if bearer_token.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "search bearer token is not set (BEARER_TOKEN)".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            config,
            bearer_token,
        })
    }

    fn url(&self) -> String {
        format!("{}/2/tweets/search/recent", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchSource for RecentSearchClient {
    async fn fetch(&self) -> Result<Vec<Message>> {
        let query = self.config.query();
        info!(query = %query, max_results = self.config.max_results, "Searching recent messages");

        let max_results = self.config.max_results.to_string();
        let resp = self
            .http
            .get(self.url())
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", query.as_str()),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,author_id"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MonitorError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let body: SearchResponse = resp.json().await?;
        if let Some(meta) = &body.meta {
            debug!(result_count = ?meta.result_count, newest_id = ?meta.newest_id, "Search page metadata");
        }
        Ok(body.into_messages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing_normalizes_and_skips_incomplete() {
        let json = r#"{
            "data": [
                {"id": "1", "text": "agua subindo\nrua X", "author_id": "1234567890123456789", "created_at": "2024-01-10T10:00:00.000Z"},
                {"id": "2", "text": "sem autor", "created_at": "2024-01-10T10:00:00.000Z"},
                {"id": "3", "text": "sem data", "author_id": "9"}
            ],
            "meta": {"result_count": 3, "newest_id": "1"}
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let messages = response.into_messages();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author_id, "1234567890123456789");
        assert_eq!(messages[0].text, "agua subindo rua X");
        assert_eq!(messages[0].posted_at, "2024-01-10T10:00:00.000Z");
        assert!(messages[0].classification.is_unset());
    }

    #[test]
    fn test_empty_result_page() {
        // No "data" key when nothing matched
        let response: SearchResponse = serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(response.into_messages().is_empty());
    }

    #[test]
    fn test_client_requires_token() {
        let config = crate::config::AppConfig::default().search;
        assert!(RecentSearchClient::new(config, "  ").is_err());
    }
}
