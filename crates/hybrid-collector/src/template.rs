//! URL templates with `{name}` placeholders.

use crate::types::{CollectorError, CollectorResult, Context};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A URL template parsed into literal and placeholder segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Parse a template. `{{` and `}}` are literal braces; an unterminated
    /// `{` is kept as text.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(pos) = rest.find(['{', '}']) {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") || tail.starts_with("}}") {
                literal.push_str(&tail[..1]);
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                literal.push('}');
                rest = &tail[1..];
                continue;
            }

            match tail[1..].find('}') {
                Some(end) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(tail[1..1 + end].to_string()));
                    rest = &tail[end + 2..];
                }
                None => {
                    literal.push_str(tail);
                    rest = "";
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute placeholders from `context`.
    ///
    /// With no context at all the template is returned verbatim. Once a
    /// context is supplied, even an empty one, every placeholder must
    /// resolve.
    pub fn render(&self, context: Option<&Context>) -> CollectorResult<String> {
        let Some(context) = context else {
            return Ok(self.raw.clone());
        };

        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match context.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(CollectorError::MissingContextKey {
                            key: name.clone(),
                            template: self.raw.clone(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render_url(template: &str, context: Option<&Context>) -> CollectorResult<String> {
    UrlTemplate::parse(template).render(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> Context {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_placeholder() {
        let url = render_url("https://x/{slug}", Some(&ctx(&[("slug", "item")]))).unwrap();
        assert_eq!(url, "https://x/item");
    }

    #[test]
    fn test_empty_context_is_missing_key() {
        let err = render_url("https://x/{slug}", Some(&Context::new())).unwrap_err();
        match err {
            CollectorError::MissingContextKey { key, template } => {
                assert_eq!(key, "slug");
                assert_eq!(template, "https://x/{slug}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_partial_context_is_missing_key() {
        let context = ctx(&[("a", "1")]);
        let err = render_url("https://x/{a}/{b}", Some(&context)).unwrap_err();
        assert!(matches!(err, CollectorError::MissingContextKey { ref key, .. } if key == "b"));
    }

    #[test]
    fn test_absent_context_passes_through() {
        let url = render_url("https://x/{slug}", None).unwrap();
        assert_eq!(url, "https://x/{slug}");
    }

    #[test]
    fn test_escaped_and_unterminated_braces() {
        let context = ctx(&[("id", "7")]);
        assert_eq!(
            render_url("https://x/{{raw}}/{id}", Some(&context)).unwrap(),
            "https://x/{raw}/7"
        );
        assert_eq!(
            render_url("https://x/{id}?q={open", Some(&context)).unwrap(),
            "https://x/7?q={open"
        );
    }

    #[test]
    fn test_placeholders_listed_in_order() {
        let template = UrlTemplate::parse("https://{host}/items/{id}");
        assert_eq!(template.placeholders().collect::<Vec<_>>(), vec!["host", "id"]);
    }

    #[test]
    fn test_repeated_placeholder() {
        let context = ctx(&[("id", "9")]);
        assert_eq!(
            render_url("/{id}/{id}", Some(&context)).unwrap(),
            "/9/9"
        );
    }
}
