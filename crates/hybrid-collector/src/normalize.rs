//! Merge API and HTML values into one record and coerce declared types.

use std::collections::HashMap;

use serde_json::{Number, Value};

use crate::types::{ExtractedValues, FieldMapping, FieldType, NormalizedRecord, SourceDescriptor};

/// Which extracted-value map a unified field reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Api,
    Html,
}

impl Origin {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "api" => Some(Origin::Api),
            "html" => Some(Origin::Html),
            _ => None,
        }
    }
}

/// A parsed `"<origin>.<key>"` expression. The key keeps any further dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingExpr {
    pub origin: Origin,
    pub key: String,
}

impl MappingExpr {
    /// `None` for expressions without a dot or with an unknown origin.
    pub fn parse(expr: &str) -> Option<Self> {
        let (origin, key) = expr.split_once('.')?;
        Some(Self {
            origin: Origin::parse(origin)?,
            key: key.to_string(),
        })
    }

    fn resolve(
        &self,
        api: Option<&ExtractedValues>,
        html: Option<&ExtractedValues>,
    ) -> Option<Value> {
        let values = match self.origin {
            Origin::Api => api?,
            Origin::Html => html?,
        };
        values.get(&self.key).cloned().flatten()
    }
}

/// Convert a value to the declared type. Failed conversions become absent.
pub fn coerce(value: Option<Value>, ty: Option<FieldType>) -> Option<Value> {
    let value = value?;
    match ty {
        Some(FieldType::Float) => to_float(&value).and_then(Number::from_f64).map(Value::Number),
        Some(FieldType::Int) => to_int(&value).map(|n| Value::Number(n.into())),
        Some(FieldType::Untyped) | None => Some(value),
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            let f = n.as_f64()?;
            (f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64).then(|| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Merge one source's extracted values into a record.
pub fn normalize_record(
    mapping: &FieldMapping,
    api: Option<&ExtractedValues>,
    html: Option<&ExtractedValues>,
) -> NormalizedRecord {
    mapping
        .unified_fields
        .iter()
        .map(|(field, expr)| {
            let raw = MappingExpr::parse(expr).and_then(|parsed| parsed.resolve(api, html));
            let ty = mapping.field_types.get(field).copied();
            (field.clone(), coerce(raw, ty))
        })
        .collect()
}

/// Normalize a batch of sources from results keyed by source id.
pub fn normalize_all(
    sources: &[SourceDescriptor],
    api_results: &HashMap<String, Option<ExtractedValues>>,
    html_results: &HashMap<String, Option<ExtractedValues>>,
) -> Vec<NormalizedRecord> {
    sources
        .iter()
        .map(|source| {
            let api = api_results.get(&source.id).and_then(Option::as_ref);
            let html = html_results.get(&source.id).and_then(Option::as_ref);
            normalize_record(&source.mapping, api, html)
        })
        .collect()
}
