//! Core library for merging JSON API and HTML page data into unified records.

pub mod api;
pub mod collector;
pub mod config;
pub mod encoding;
pub mod export;
pub mod fetch;
pub mod json_path;
pub mod normalize;
pub mod scrape;
pub mod selector;
pub mod template;
pub mod types;
pub mod validate;

pub use api::ApiClient;
pub use collector::{build_context, CollectionReport, Collector, SourceFailure, SourceIssue, SourceRecord};
pub use config::load_sources;
pub use export::{export_to_csv, export_to_json, export_to_xlsx};
pub use fetch::{Backoff, FetchPolicy, ReqwestTransport, RetryingFetcher, Transport};
pub use json_path::{extract_json_value, JsonPath};
pub use normalize::{normalize_all, normalize_record, MappingExpr, Origin};
pub use scrape::HtmlScraper;
pub use selector::SelectorSpec;
pub use template::{render_url, UrlTemplate};
pub use types::*;
pub use validate::validate_records;
