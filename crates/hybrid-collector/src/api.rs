//! JSON API origin: request building and key-map extraction.

use indexmap::IndexMap;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::fetch::{HttpRequest, RetryingFetcher};
use crate::json_path::JsonPath;
use crate::template::render_url;
use crate::types::{CollectorError, CollectorResult, Context, ExtractedValues, SourceDescriptor};

/// Fetches a source's API origin and applies its `json_key_map`.
#[derive(Clone)]
pub struct ApiClient {
    fetcher: RetryingFetcher,
}

impl ApiClient {
    pub fn new(fetcher: RetryingFetcher) -> Self {
        Self { fetcher }
    }

    /// Returns `Ok(None)` without touching the network when the API origin
    /// is absent or disabled.
    pub async fn fetch(
        &self,
        source: &SourceDescriptor,
        context: Option<&Context>,
    ) -> CollectorResult<Option<ExtractedValues>> {
        let Some(api) = source.api_enabled() else {
            debug!(source = %source.id, "api origin disabled; skipping fetch");
            return Ok(None);
        };

        let url = render_url(&api.base_url, context)?;
        let request = HttpRequest::new(parse_method(&api.method)?, url)
            .with_query(query_pairs(&api.params))
            .with_headers(
                api.headers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            );

        let fetched = self.fetcher.fetch_json(&request).await?;
        debug!(
            source = %source.id,
            attempts = fetched.attempts,
            keys = api.json_key_map.len(),
            "api payload received"
        );
        Ok(Some(extract_values(&fetched.payload, &api.json_key_map)))
    }
}

/// Resolve every `output key -> path` entry against the payload.
pub fn extract_values(payload: &Value, key_map: &IndexMap<String, String>) -> ExtractedValues {
    key_map
        .iter()
        .map(|(key, path)| (key.clone(), JsonPath::parse(path).extract(payload).cloned()))
        .collect()
}

/// Case-insensitive HTTP method token.
pub fn parse_method(method: &str) -> CollectorResult<Method> {
    let upper = method.trim().to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes())
        .map_err(|_| CollectorError::Configuration(format!("Invalid HTTP method '{method}'")))
}

/// Flatten static params into query pairs.
///
/// Nulls are dropped, sequences repeat the key, nested objects are sent as
/// JSON text.
pub fn query_pairs(params: &IndexMap<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
