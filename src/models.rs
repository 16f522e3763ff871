use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::extract::DisplayRecord;

pub const LENS_ENGINE: &str = "google_lens";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Direct,
    #[default]
    Expanded,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Direct => "direct",
            SearchMode::Expanded => "expanded",
        }
    }

    pub fn from_str(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "direct" | "a" => Some(SearchMode::Direct),
            "expanded" | "token" | "products" | "b" => Some(SearchMode::Expanded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetMarketplace {
    #[default]
    Amazon,
}

impl TargetMarketplace {
    /// Lower-case substring looked for in a match's `source` and `link`.
    pub fn token(&self) -> &'static str {
        match self {
            TargetMarketplace::Amazon => "amazon",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetMarketplace::Amazon => "Amazon",
        }
    }
}

/// Parameters of one provider call. Direct and phase-1 requests carry an
/// image URL, the phase-2 request carries only the page token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    image_url: Option<String>,
    locale: Option<String>,
    region: Option<String>,
    page_token: Option<String>,
}

impl SearchRequest {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            locale: None,
            region: None,
            page_token: None,
        }
    }

    pub fn page(token: impl Into<String>) -> Self {
        Self {
            image_url: None,
            locale: None,
            region: None,
            page_token: Some(token.into()),
        }
    }

    pub fn localized(self, locale: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            locale: Some(locale.into()),
            region: Some(region.into()),
            ..self
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn page_token(&self) -> Option<&str> {
        self.page_token.as_deref()
    }

    /// Query pairs sent to the provider, without the api key.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("engine", LENS_ENGINE)];
        if let Some(url) = &self.image_url {
            pairs.push(("url", url));
        }
        if let Some(locale) = &self.locale {
            pairs.push(("hl", locale));
        }
        if let Some(region) = &self.region {
            pairs.push(("country", region));
        }
        if let Some(token) = &self.page_token {
            pairs.push(("page_token", token));
        }
        pairs
    }
}

/// Provider response kept verbatim. Every read goes through an accessor that
/// treats missing or mistyped keys as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawResultSet(Map<String, Value>);

impl RawResultSet {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn visual_matches(&self) -> Option<Vec<VisualMatch>> {
        let entries = self.0.get("visual_matches")?.as_array()?;
        Some(entries.iter().map(VisualMatch::from_value).collect())
    }

    pub fn products_page_token(&self) -> Option<&str> {
        self.0
            .get("products_page_token")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Message the provider puts in `error` when it answers but finds nothing.
    pub fn provider_message(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualMatch {
    fields: Map<String, Value>,
}

impl VisualMatch {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Non-object entries become an empty match so counts and order survive.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => Self::new(fields.clone()),
            _ => Self::default(),
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields.get(key).and_then(Value::as_object)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }

    pub fn source(&self) -> Option<&str> {
        self.text("source")
    }

    pub fn link(&self) -> Option<&str> {
        self.text("link")
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    Matches,
    NoMatches,
    NoToken,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotStatus {
    Written { path: PathBuf },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub run_id: String,
    pub mode: SearchMode,
    pub marketplace: TargetMarketplace,
    pub image_url: String,
    pub outcome: SearchOutcome,
    pub total_matches: usize,
    pub matches: Vec<DisplayRecord>,
    pub snapshot: SnapshotStatus,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Serialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawResultSet {
        match value {
            Value::Object(map) => RawResultSet::new(map),
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    #[test]
    fn image_request_pairs() {
        let req = SearchRequest::image("https://i.example/a.png").localized("en", "us");
        assert_eq!(
            req.query_pairs(),
            vec![
                ("engine", "google_lens"),
                ("url", "https://i.example/a.png"),
                ("hl", "en"),
                ("country", "us"),
            ]
        );
    }

    #[test]
    fn page_request_has_no_image_url() {
        let req = SearchRequest::page("T123");
        assert_eq!(req.image_url(), None);
        assert_eq!(
            req.query_pairs(),
            vec![("engine", "google_lens"), ("page_token", "T123")]
        );
    }

    #[test]
    fn missing_visual_matches_is_none() {
        let set = raw(json!({"search_metadata": {"status": "Success"}}));
        assert!(set.visual_matches().is_none());
    }

    #[test]
    fn non_array_visual_matches_is_none() {
        let set = raw(json!({"visual_matches": "oops"}));
        assert!(set.visual_matches().is_none());
    }

    #[test]
    fn visual_matches_keep_order_and_count() {
        let set = raw(json!({
            "visual_matches": [
                {"title": "first"},
                42,
                {"title": "third"}
            ]
        }));
        let matches = set.visual_matches().expect("matches");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].title(), Some("first"));
        assert_eq!(matches[1], VisualMatch::default());
        assert_eq!(matches[2].title(), Some("third"));
    }

    #[test]
    fn blank_page_token_is_absent() {
        assert_eq!(raw(json!({"products_page_token": "  "})).products_page_token(), None);
        assert_eq!(raw(json!({"products_page_token": 7})).products_page_token(), None);
        assert_eq!(
            raw(json!({"products_page_token": "T123"})).products_page_token(),
            Some("T123")
        );
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(SearchMode::from_str(" Direct "), Some(SearchMode::Direct));
        assert_eq!(SearchMode::from_str("expanded"), Some(SearchMode::Expanded));
        assert_eq!(SearchMode::from_str("bogus"), None);
    }
}
