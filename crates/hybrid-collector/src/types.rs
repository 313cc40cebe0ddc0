//! Core data types for source descriptors, extracted values, and records.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Values pulled out of one fetched payload, keyed by output key.
///
/// `None` marks a key whose path or selector matched nothing.
pub type ExtractedValues = IndexMap<String, Option<Value>>;

/// One merged record, keyed by unified field name in declaration order.
pub type NormalizedRecord = IndexMap<String, Option<Value>>;

/// Placeholder substitution table used when rendering URL templates.
pub type Context = HashMap<String, String>;

/// One logical data source combining an optional API and HTML origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub api: Option<ApiSpec>,
    pub html: Option<HtmlSpec>,
    pub mapping: FieldMapping,
}

/// How to query the JSON origin of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub enabled: bool,
    pub base_url: String,
    pub method: String,
    pub params: IndexMap<String, Value>,
    pub headers: IndexMap<String, String>,
    pub json_key_map: IndexMap<String, String>,
}

/// How to scrape the HTML origin of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlSpec {
    pub enabled: bool,
    pub url: String,
    pub selectors: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
}

/// Declarative merge rules for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Unified field name to `"<origin>.<key>"` expression.
    pub unified_fields: IndexMap<String, String>,
    pub field_types: IndexMap<String, FieldType>,
}

/// Target scalar type for a unified field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Float,
    Int,
    Untyped,
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        FieldType::parse(&name)
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        ty.as_str().to_string()
    }
}

impl FieldType {
    /// Any name other than `float` or `int` leaves the value untyped.
    pub fn parse(name: &str) -> Self {
        match name {
            "float" => FieldType::Float,
            "int" => FieldType::Int,
            _ => FieldType::Untyped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Float => "float",
            FieldType::Int => "int",
            FieldType::Untyped => "untyped",
        }
    }
}

impl ApiSpec {
    /// An enabled API origin using GET, with no params, headers or keys.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
            method: "GET".to_string(),
            params: IndexMap::new(),
            headers: IndexMap::new(),
            json_key_map: IndexMap::new(),
        }
    }
}

impl HtmlSpec {
    /// An enabled HTML origin with no selectors or headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: url.into(),
            selectors: IndexMap::new(),
            headers: IndexMap::new(),
        }
    }
}

impl FieldMapping {
    pub fn new<K, V>(unified_fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            unified_fields: unified_fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            field_types: IndexMap::new(),
        }
    }

    pub fn with_type(mut self, field: impl Into<String>, ty: FieldType) -> Self {
        self.field_types.insert(field.into(), ty);
        self
    }
}

impl SourceDescriptor {
    /// Whether the API origin should be fetched.
    pub fn api_enabled(&self) -> Option<&ApiSpec> {
        self.api.as_ref().filter(|api| api.enabled)
    }

    /// Whether the HTML origin should be fetched.
    pub fn html_enabled(&self) -> Option<&HtmlSpec> {
        self.html.as_ref().filter(|html| html.enabled)
    }

    /// Unified field names, used as the required fields during validation.
    pub fn required_fields(&self) -> Vec<String> {
        self.mapping.unified_fields.keys().cloned().collect()
    }

    /// Check the descriptor invariants.
    pub fn validate(&self) -> CollectorResult<()> {
        if self.id.trim().is_empty() {
            return Err(CollectorError::Configuration(
                "source id must be a non-empty string".to_string(),
            ));
        }
        if self.mapping.unified_fields.is_empty() {
            return Err(CollectorError::Configuration(format!(
                "Source '{}': mapping.unified_fields is required and must be a non-empty mapping",
                self.id
            )));
        }
        if let Some(api) = self.api_enabled() {
            if api.base_url.is_empty() {
                return Err(CollectorError::Configuration(format!(
                    "Source '{}': api.base_url is required when api is enabled",
                    self.id
                )));
            }
        }
        if let Some(html) = self.html_enabled() {
            if html.url.is_empty() {
                return Err(CollectorError::Configuration(format!(
                    "Source '{}': html.url is required when html is enabled",
                    self.id
                )));
            }
        }
        if self.api_enabled().is_none() && self.html_enabled().is_none() {
            return Err(CollectorError::Configuration(format!(
                "Source '{}' must enable at least one of 'api' or 'html'",
                self.id
            )));
        }
        Ok(())
    }
}

/// A missing or empty required field in a normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub index: usize,
    pub field: String,
    pub message: String,
}

/// What kind of failure ended a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Every attempt failed at the transport level or with 5xx.
    Exhausted,
    /// A non-retryable status such as 4xx.
    Status,
    /// The API answered 2xx but the body was not JSON.
    InvalidJson,
    /// The request could not be built, e.g. a malformed header.
    InvalidRequest,
}

/// A fetch that could not produce a payload.
#[derive(thiserror::Error, Debug)]
#[error("{message} (url: {url}{})", .status.map(|s| format!(", status: {s}")).unwrap_or_default())]
pub struct FetchError {
    pub url: String,
    pub status: Option<u16>,
    pub attempts: u32,
    pub kind: FetchErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
            attempts: 0,
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Errors that can occur while collecting a source.
#[derive(thiserror::Error, Debug)]
pub enum CollectorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing context key '{key}' for URL formatting: {template}")]
    MissingContextKey { key: String, template: String },

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Convenience result type.
pub type CollectorResult<T> = Result<T, CollectorError>;
