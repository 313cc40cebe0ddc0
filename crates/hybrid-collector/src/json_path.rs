//! Dot-separated paths into JSON value trees.

use serde_json::Value;

/// A parsed `a.b.0.c` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Self {
        let segments = if path.is_empty() {
            Vec::new()
        } else {
            path.split('.').map(str::to_string).collect()
        };
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk the tree. Any dead end yields `None`; a JSON `null` counts as
    /// a dead end too.
    pub fn extract<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(parse_index(segment)?)?,
                _ => return None,
            };
        }
        match current {
            Value::Null => None,
            value => Some(value),
        }
    }
}

/// Sequence positions must be plain base-10 digits.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Extract the value at `path`, cloned.
pub fn extract_json_value(root: &Value, path: &str) -> Option<Value> {
    JsonPath::parse(path).extract(root).cloned()
}
