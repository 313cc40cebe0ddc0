//! `<css>` and `<css>::attr(<name>)` selectors applied to HTML documents.

use scraper::{ElementRef, Html, Selector};

use crate::types::{CollectorError, CollectorResult};

const ATTR_DIRECTIVE: &str = "::attr(";

/// A selector string split into its CSS part and optional attribute.
#[derive(Debug, Clone)]
pub struct SelectorSpec {
    css: String,
    attribute: Option<String>,
    compiled: Selector,
}

/// Split a raw selector into `(css, attribute)` without compiling it.
///
/// The directive is recognised only at the tail of the string; the split
/// happens at its first occurrence so parentheses earlier in the CSS part
/// are kept intact. `::attr()` with an empty name means "text".
pub fn split_selector(raw: &str) -> (&str, Option<&str>) {
    if raw.ends_with(')') {
        if let Some(pos) = raw.find(ATTR_DIRECTIVE) {
            let css = &raw[..pos];
            let attr = &raw[pos + ATTR_DIRECTIVE.len()..raw.len() - 1];
            return (css, Some(attr).filter(|a| !a.is_empty()));
        }
    }
    (raw, None)
}

impl SelectorSpec {
    /// Parse and compile. Invalid CSS is a configuration error.
    pub fn parse(raw: &str) -> CollectorResult<Self> {
        let (css, attribute) = split_selector(raw);
        let compiled = Selector::parse(css).map_err(|e| {
            CollectorError::Configuration(format!("Invalid CSS selector '{raw}': {e}"))
        })?;
        Ok(Self {
            css: css.to_string(),
            attribute: attribute.map(str::to_string),
            compiled,
        })
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// First match in document order, rendered as attribute or text.
    pub fn extract(&self, document: &Html) -> Option<String> {
        let element = document.select(&self.compiled).next()?;
        match &self.attribute {
            Some(name) => element.value().attr(name).map(|v| v.trim().to_string()),
            None => Some(element_text(element)),
        }
    }
}

/// Flatten an element to text: each text node trimmed, blanks dropped.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}
