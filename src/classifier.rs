//! Classifier collaborator and reply parsing.
//!
//! The classifier is asked for a strict two-field JSON object. Its raw reply
//! is turned into a [`ParsedReply`] by [`parse_reply`]; anything that does
//! not match the expected shape is a [`MonitorError::Classification`].

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::error::{MonitorError, Result};
use crate::models::{Message, ParsedReply};

const SYSTEM_PROMPT: &str = "You classify social-media posts about floods. \
A post is a \"report\" only when it is a firsthand account of flooding observed at a specific place; \
everything else is a \"comment\".";

/// Service that labels one message at a time
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Send the classification request for `message` and return the raw reply text.
    async fn classify(&self, message: &Message) -> Result<String>;
}

/// Instruction sent for one message
#[must_use]
pub fn build_prompt(message: &Message) -> String {
    format!(
        "Classify the following post.\n\n\
         Author: {author}\n\
         Message: \"{text}\"\n\
         Date: {date}\n\n\
         Reply with JSON only, exactly in this shape:\n\
         {{\n  \"classification\": \"report\" or \"comment\",\n  \
         \"location\": \"place name as written in the post if report, empty string if comment\"\n}}",
        author = message.author_id,
        text = message.text,
        date = message.posted_at,
    )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReply {
    classification: String,
    #[serde(default)]
    location: Option<String>,
}

fn code_fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").ok())
        .as_ref()
}

/// Parse a classifier reply into a report or a comment.
///
/// The reply must be a JSON object with `classification` and optionally
/// `location`, nothing else. The label is trimmed and lowercased and must be
/// `report` or `comment`. A report needs a non-empty location; a comment's
/// location is discarded. A surrounding markdown code fence is tolerated.
pub fn parse_reply(content: &str) -> Result<ParsedReply> {
    let trimmed = content.trim();
    let json = code_fence()
        .and_then(|fence| fence.captures(trimmed))
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let raw: RawReply = serde_json::from_str(json)
        .map_err(|e| MonitorError::Classification(format!("malformed reply ({e}): {trimmed}")))?;

    let location = raw.location.as_deref().unwrap_or("").trim();
    match raw.classification.trim().to_lowercase().as_str() {
        "report" if location.is_empty() => Err(MonitorError::Classification(
            "report without location".to_string(),
        )),
        "report" => Ok(ParsedReply::Report {
            location: location.to_string(),
        }),
        "comment" => Ok(ParsedReply::Comment),
        other => Err(MonitorError::Classification(format!(
            "unexpected classification '{other}'"
        ))),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions classifier
pub struct ChatClassifier {
    http: reqwest::Client,
    config: ClassifierConfig,
    api_key: String,
}

impl ChatClassifier {
    /// Build a client with the configured request timeout.
    pub fn new(config: ClassifierConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(MonitorError::InvalidConfig(
                "classifier API key is not set (OPENAI_API_KEY)".to_string(),
            ));
        }

        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config, api_key })
    }
}

#[async_trait]
impl Classifier for ChatClassifier {
    async fn classify(&self, message: &Message) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let prompt = build_prompt(message);
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                WireMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, key = %message.key(), "Classifier request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
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

        let response: ChatResponse = resp.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| MonitorError::Classification("empty reply from classifier".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_message_fields() {
        let prompt = build_prompt(&Message::new("42", "agua subindo rua X", "2024-01-10T10:00:00Z"));
        assert!(prompt.contains("Author: 42"));
        assert!(prompt.contains("\"agua subindo rua X\""));
        assert!(prompt.contains("Date: 2024-01-10T10:00:00Z"));
        assert!(prompt.contains("\"classification\""));
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let reply = "```json\n{\"classification\": \"report\", \"location\": \"Centro\"}\n```";
        assert_eq!(
            parse_reply(reply).unwrap(),
            ParsedReply::Report {
                location: "Centro".to_string()
            }
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4",
            messages: [
                WireMessage { role: "system", content: "s" },
                WireMessage { role: "user", content: "u" },
            ],
            temperature: 0.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][1]["role"], "user");
    }

    #[test]
    fn test_client_requires_key() {
        let config = crate::config::AppConfig::default().classifier;
        assert!(ChatClassifier::new(config, "").is_err());
    }
}
