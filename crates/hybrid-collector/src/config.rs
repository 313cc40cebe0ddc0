//! Source list loading from YAML.
//!
//! The file is a sequence of source entries. Every string value is
//! environment-expanded before the entry is checked, so secrets such as
//! `Authorization: "Bearer ${API_TOKEN}"` can stay out of the file.

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::api::parse_method;
use crate::types::{
    ApiSpec, CollectorError, CollectorResult, FieldMapping, FieldType, HtmlSpec, SourceDescriptor,
};

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawApi {
    enabled: bool,
    base_url: Option<String>,
    method: Option<String>,
    params: Option<IndexMap<String, Value>>,
    headers: Option<IndexMap<String, String>>,
    json_key_map: Option<IndexMap<String, String>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawHtml {
    enabled: bool,
    url: Option<String>,
    selectors: Option<IndexMap<String, String>>,
    headers: Option<IndexMap<String, String>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMapping {
    unified_fields: Option<IndexMap<String, String>>,
    field_types: Option<IndexMap<String, FieldType>>,
}

/// Load and check every source in a YAML file.
pub fn load_sources(path: impl AsRef<Path>) -> CollectorResult<Vec<SourceDescriptor>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CollectorError::Configuration(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    let sources = parse_sources(&text)?;
    debug!(path = %path.display(), sources = sources.len(), "loaded source config");
    Ok(sources)
}

/// Parse a YAML document holding a list of sources.
pub fn parse_sources(text: &str) -> CollectorResult<Vec<SourceDescriptor>> {
    let document: YamlValue = serde_yaml::from_str(text)?;
    let YamlValue::Sequence(entries) = document else {
        return Err(config_error(
            "Configuration file must contain a list of sources",
        ));
    };

    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(entries.len());
    for (idx, mut entry) in entries.into_iter().enumerate() {
        let idx = idx + 1;
        if !entry.is_mapping() {
            return Err(config_error(format!(
                "Each source entry must be a mapping (index {idx})"
            )));
        }
        expand_env(&mut entry);

        let source = build_source(idx, &entry)?;
        if !seen.insert(source.id.clone()) {
            return Err(config_error(format!("Duplicate source id '{}'", source.id)));
        }
        sources.push(source);
    }
    Ok(sources)
}

fn build_source(idx: usize, entry: &YamlValue) -> CollectorResult<SourceDescriptor> {
    let id = entry
        .get("id")
        .and_then(scalar_id)
        .ok_or_else(|| config_error(format!("Source at index {idx} is missing required 'id'")))?;

    let mapping = match entry.get("mapping") {
        None | Some(YamlValue::Null) => {
            return Err(config_error(format!(
                "Source '{id}' is missing required 'mapping'"
            )))
        }
        Some(raw) => section::<RawMapping>(&id, "mapping", raw)?,
    };
    let api = optional_section::<RawApi>(&id, "api", entry.get("api"))?;
    let html = optional_section::<RawHtml>(&id, "html", entry.get("html"))?;

    if api.is_none() && html.is_none() {
        return Err(config_error(format!(
            "Source '{id}' must define at least one of 'api' or 'html'"
        )));
    }

    let api = api.map(|raw| build_api(&id, raw)).transpose()?;
    let source = SourceDescriptor {
        id,
        api,
        html: html.map(build_html),
        mapping: FieldMapping {
            unified_fields: mapping.unified_fields.unwrap_or_default(),
            field_types: mapping.field_types.unwrap_or_default(),
        },
    };
    source.validate()?;
    Ok(source)
}

fn build_api(id: &str, raw: RawApi) -> CollectorResult<ApiSpec> {
    let method = raw
        .method
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "GET".to_string());
    parse_method(&method)
        .map_err(|_| config_error(format!("Source '{id}': api.method '{method}' is not valid")))?;

    Ok(ApiSpec {
        enabled: raw.enabled,
        base_url: raw.base_url.unwrap_or_default(),
        method: method.to_ascii_uppercase(),
        params: raw.params.unwrap_or_default(),
        headers: raw.headers.unwrap_or_default(),
        json_key_map: raw.json_key_map.unwrap_or_default(),
    })
}

fn build_html(raw: RawHtml) -> HtmlSpec {
    HtmlSpec {
        enabled: raw.enabled,
        url: raw.url.unwrap_or_default(),
        selectors: raw.selectors.unwrap_or_default(),
        headers: raw.headers.unwrap_or_default(),
    }
}

fn section<T: for<'de> Deserialize<'de>>(
    id: &str,
    name: &str,
    raw: &YamlValue,
) -> CollectorResult<T> {
    if !raw.is_mapping() {
        return Err(config_error(format!(
            "Source '{id}': {name} must be a mapping object"
        )));
    }
    serde_yaml::from_value(raw.clone())
        .map_err(|e| config_error(format!("Source '{id}': invalid {name} section: {e}")))
}

fn optional_section<T: for<'de> Deserialize<'de>>(
    id: &str,
    name: &str,
    raw: Option<&YamlValue>,
) -> CollectorResult<Option<T>> {
    match raw {
        None | Some(YamlValue::Null) => Ok(None),
        Some(raw) => section(id, name, raw).map(Some),
    }
}

fn scalar_id(value: &YamlValue) -> Option<String> {
    let id = match value {
        YamlValue::String(s) => s.trim().to_string(),
        YamlValue::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn config_error(message: impl Into<String>) -> CollectorError {
    CollectorError::Configuration(message.into())
}

/// Expand variables in every string value, recursively. Keys are untouched.
fn expand_env(value: &mut YamlValue) {
    match value {
        YamlValue::String(s) => *s = expand_env_vars(s),
        YamlValue::Sequence(items) => items.iter_mut().for_each(expand_env),
        YamlValue::Mapping(map) => map.iter_mut().for_each(|(_, v)| expand_env(v)),
        YamlValue::Tagged(tagged) => expand_env(&mut tagged.value),
        _ => {}
    }
}

/// Replace `$NAME` and `${NAME}` with the variable's value.
///
/// Unknown variables and malformed references are left as written.
pub fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => (&braced[..end], end + 2),
                _ => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        let reference = &rest[pos..pos + 1 + consumed];
        match std::env::var(name) {
            Ok(val) if !name.is_empty() => out.push_str(&val),
            _ => out.push_str(if consumed == 0 { "$" } else { reference }),
        }
        rest = &rest[pos + 1 + consumed..];
    }
    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
