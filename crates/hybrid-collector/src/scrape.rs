//! HTML origin: page fetch and selector extraction.

use indexmap::IndexMap;
use scraper::Html;
use tracing::debug;

use crate::fetch::{HttpRequest, RetryingFetcher};
use crate::selector::SelectorSpec;
use crate::template::render_url;
use crate::types::{CollectorResult, Context, ExtractedValues, SourceDescriptor};

/// Fetches a source's HTML origin and applies its selectors.
#[derive(Clone)]
pub struct HtmlScraper {
    fetcher: RetryingFetcher,
    headers: IndexMap<String, String>,
}

impl HtmlScraper {
    pub fn new(fetcher: RetryingFetcher) -> Self {
        Self {
            fetcher,
            headers: IndexMap::new(),
        }
    }

    /// Headers sent with every page request. Per-source headers win.
    pub fn with_headers(mut self, headers: IndexMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Returns `Ok(None)` without touching the network when the HTML origin
    /// is absent or disabled.
    pub async fn fetch_and_parse(
        &self,
        source: &SourceDescriptor,
        context: Option<&Context>,
    ) -> CollectorResult<Option<ExtractedValues>> {
        let Some(html) = source.html_enabled() else {
            debug!(source = %source.id, "html origin disabled; skipping fetch");
            return Ok(None);
        };

        let url = render_url(&html.url, context)?;
        let selectors = compile_selectors(&html.selectors)?;

        let headers = merge_headers(&self.headers, &html.headers);
        let request = HttpRequest::get(url).with_headers(headers);

        let fetched = self.fetcher.fetch_html(&request).await?;
        debug!(
            source = %source.id,
            attempts = fetched.attempts,
            bytes = fetched.payload.len(),
            "html page received"
        );
        Ok(Some(extract_fields(&fetched.payload, &selectors)))
    }
}

/// Lay `overrides` over `defaults`. Names compare case-insensitively; an
/// override takes the place of the default it replaces.
pub fn merge_headers(
    defaults: &IndexMap<String, String>,
    overrides: &IndexMap<String, String>,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::with_capacity(defaults.len() + overrides.len());
    for (name, value) in defaults.iter().chain(overrides) {
        let entry = (name.clone(), value.clone());
        match merged
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => *slot = entry,
            None => merged.push(entry),
        }
    }
    merged
}

/// Compile every `output key -> selector` entry up front.
pub fn compile_selectors(
    selectors: &IndexMap<String, String>,
) -> CollectorResult<Vec<(String, SelectorSpec)>> {
    selectors
        .iter()
        .map(|(key, raw)| Ok((key.clone(), SelectorSpec::parse(raw)?)))
        .collect()
}

/// Parse the page and run each selector against it.
pub fn extract_fields(html: &str, selectors: &[(String, SelectorSpec)]) -> ExtractedValues {
    let document = Html::parse_document(html);
    selectors
        .iter()
        .map(|(key, spec)| {
            let value = spec.extract(&document).map(serde_json::Value::String);
            (key.clone(), value)
        })
        .collect()
}
