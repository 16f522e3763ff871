use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::LensConfig;
use crate::http::build_client;
use crate::models::{RawResultSet, SearchRequest};

const BODY_PREVIEW_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum LensError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    Parse(String),
    #[error("http client setup failed: {0}")]
    Setup(String),
}

/// Google Lens engine of SerpApi. One call per `search`, no retries.
#[derive(Clone)]
pub struct LensClient {
    endpoint: String,
    api_key: String,
    http: Client,
}

impl LensClient {
    pub fn new(config: &LensConfig) -> Result<Self, LensError> {
        let http = build_client(&config.http).map_err(|err| LensError::Setup(err.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<RawResultSet, LensError> {
        let mut query = request.query_pairs();
        query.push(("api_key", self.api_key.as_str()));

        debug!(
            target: "lens.client",
            endpoint = %self.endpoint,
            has_image = request.image_url().is_some(),
            has_page_token = request.page_token().is_some(),
            "lens_request"
        );

        let response = self
            .http
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|err| LensError::Network(redact(&err.without_url().to_string())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| LensError::Network(err.without_url().to_string()))?;

        if !status.is_success() {
            return Err(LensError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        parse_result_set(&body)
    }
}

pub fn parse_result_set(body: &str) -> Result<RawResultSet, LensError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => Ok(RawResultSet::new(fields)),
        Ok(other) => Err(LensError::Parse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(err) => Err(LensError::Parse(err.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

// reqwest errors can still echo the query string through their source chain.
fn redact(message: &str) -> String {
    match message.find("api_key=") {
        Some(start) => {
            let rest = &message[start + "api_key=".len()..];
            let end = rest
                .find(|c: char| c == '&' || c == ')' || c.is_whitespace())
                .unwrap_or(rest.len());
            format!("{}api_key=***{}", &message[..start], &rest[end..])
        }
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_body_parses() {
        let set = parse_result_set(r#"{"visual_matches": []}"#).expect("object");
        assert_eq!(set.visual_matches().map(|m| m.len()), Some(0));
    }

    #[test]
    fn non_json_body_is_parse_error() {
        let err = parse_result_set("<html>oops</html>").expect_err("not json");
        assert!(matches!(err, LensError::Parse(_)));
    }

    #[test]
    fn non_object_body_is_parse_error() {
        let err = parse_result_set("[1, 2]").expect_err("array");
        assert_eq!(err.to_string(), "invalid response: expected a JSON object, got an array");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(BODY_PREVIEW_CHARS + 10);
        let out = preview(&body);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), BODY_PREVIEW_CHARS + 3);
    }

    #[test]
    fn api_key_is_redacted() {
        assert_eq!(
            redact("error sending request for url (https://h/s?api_key=abc&engine=x)"),
            "error sending request for url (https://h/s?api_key=***&engine=x)"
        );
        assert_eq!(redact("timed out"), "timed out");
    }
}
