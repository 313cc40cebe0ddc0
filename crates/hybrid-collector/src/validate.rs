//! Required-field checks over normalized records.

use serde_json::Value;

use crate::types::{NormalizedRecord, ValidationIssue};

pub const MISSING_VALUE: &str = "Missing required value";

/// Report every required field that is absent or an empty string.
///
/// Issues come out record by record, in the order of `required_fields`.
pub fn validate_records(
    records: &[NormalizedRecord],
    required_fields: &[String],
) -> Vec<ValidationIssue> {
    records
        .iter()
        .enumerate()
        .flat_map(|(index, record)| {
            required_fields
                .iter()
                .filter(move |field| is_missing(record.get(field.as_str())))
                .map(move |field| ValidationIssue {
                    index,
                    field: field.clone(),
                    message: MISSING_VALUE.to_string(),
                })
        })
        .collect()
}

fn is_missing(value: Option<&Option<Value>>) -> bool {
    match value {
        None | Some(None) | Some(Some(Value::Null)) => true,
        Some(Some(Value::String(s))) => s.is_empty(),
        Some(Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(pairs: &[(&str, Option<Value>)]) -> NormalizedRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_reports_missing_fields() {
        let records = vec![
            record(&[("id", Some(json!(1))), ("title", Some(json!("ok")))]),
            record(&[("id", None), ("title", Some(json!("")))]),
        ];

        let issues = validate_records(&records, &fields(&["id", "title"]));

        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues[0],
            ValidationIssue {
                index: 1,
                field: "id".to_string(),
                message: MISSING_VALUE.to_string(),
            }
        );
        assert_eq!(issues[1].field, "title");
        assert!(issues.iter().all(|issue| issue.index == 1));
    }

    #[test]
    fn test_field_not_in_record_is_missing() {
        let records = vec![record(&[("id", Some(json!(1)))])];
        let issues = validate_records(&records, &fields(&["id", "price"]));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "price");
    }

    #[test]
    fn test_falsy_but_present_values_pass() {
        let records = vec![record(&[
            ("zero", Some(json!(0))),
            ("flag", Some(json!(false))),
            ("space", Some(json!(" "))),
        ])];
        let issues = validate_records(&records, &fields(&["zero", "flag", "space"]));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(validate_records(&[], &fields(&["id"])).is_empty());
        let records = vec![record(&[("id", None)])];
        assert!(validate_records(&records, &[]).is_empty());
    }
}
