//! CSV, JSON and XLSX writers for normalized records.

use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use rust_xlsxwriter::Workbook;
use serde_json::Value;

use crate::types::{CollectorError, CollectorResult, NormalizedRecord};

/// Union of all record keys, in order of first appearance.
pub fn header_union(records: &[NormalizedRecord]) -> IndexSet<&str> {
    records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect()
}

/// Write records as CSV. The header is the union of all keys, in order of
/// first appearance. Absent values become empty cells.
pub fn export_to_csv(records: &[NormalizedRecord], path: impl AsRef<Path>) -> CollectorResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let header = header_union(records);
    if header.is_empty() {
        fs::write(path, "")?;
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(
            header
                .iter()
                .map(|key| cell_text(record.get(*key).and_then(Option::as_ref))),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write records as a pretty-printed JSON array. Absent values are `null`.
pub fn export_to_json(records: &[NormalizedRecord], path: impl AsRef<Path>) -> CollectorResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

/// Write records to the first sheet of an XLSX workbook, header row first.
///
/// Numbers and booleans keep their cell types; strings are written as text,
/// nested values as compact JSON, absent values as blank cells.
pub fn export_to_xlsx(records: &[NormalizedRecord], path: impl AsRef<Path>) -> CollectorResult<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let header = header_union(records);
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, key) in header.iter().enumerate() {
        sheet.write_string(0, column_index(col)?, *key)?;
    }
    for (row, record) in records.iter().enumerate() {
        let row = u32::try_from(row + 1)
            .map_err(|_| CollectorError::Configuration("Too many records for XLSX export".to_string()))?;
        for (col, key) in header.iter().enumerate() {
            let col = column_index(col)?;
            match record.get(*key).and_then(Option::as_ref) {
                None | Some(Value::Null) => {}
                Some(Value::Bool(b)) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(row, col, f)?;
                    }
                    None => {
                        sheet.write_string(row, col, n.to_string())?;
                    }
                },
                Some(other) => {
                    sheet.write_string(row, col, cell_text(Some(other)))?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn column_index(col: usize) -> CollectorResult<u16> {
    u16::try_from(col)
        .map_err(|_| CollectorError::Configuration("Too many fields for XLSX export".to_string()))
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn ensure_parent(path: &Path) -> CollectorResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn record(pairs: &[(&str, Option<Value>)]) -> NormalizedRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_export_to_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("data.csv");
        let records = vec![
            record(&[("id", Some(json!(1))), ("name", Some(json!("Alice")))]),
            record(&[
                ("id", Some(json!(2))),
                ("name", Some(json!("Bob"))),
                ("extra", Some(json!("yes"))),
            ]),
        ];

        export_to_csv(&records, &path).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .unwrap();
        let rows: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        assert_eq!(rows[0], vec!["id", "name", "extra"]);
        assert_eq!(rows[1], vec!["1", "Alice", ""]);
        assert_eq!(rows[2], vec!["2", "Bob", "yes"]);
    }

    #[test]
    fn test_csv_cell_formatting() {
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&json!(null))), "");
        assert_eq!(cell_text(Some(&json!(true))), "true");
        assert_eq!(cell_text(Some(&json!(9.99))), "9.99");
        assert_eq!(cell_text(Some(&json!("a,b"))), "a,b");
        assert_eq!(cell_text(Some(&json!({"k": [1, 2]}))), r#"{"k":[1,2]}"#);
    }

    #[test]
    fn test_export_to_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("data.json");
        let records = vec![record(&[
            ("id", Some(json!(1))),
            ("name", Some(json!("Zoë"))),
            ("price", None),
        ])];

        export_to_json(&records, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Zoë"));
        assert!(text.contains("\n  {\n    \"id\": 1,"));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!([{"id": 1, "name": "Zoë", "price": null}]));
    }

    #[test]
    fn test_header_union_order() {
        let records = vec![
            record(&[("b", None), ("a", None)]),
            record(&[("c", None), ("a", None)]),
        ];
        let header: Vec<&str> = header_union(&records).into_iter().collect();
        assert_eq!(header, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_export_to_xlsx() {
        use calamine::{open_workbook, Data, Reader, Xlsx};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("data.xlsx");
        let records = vec![
            record(&[("id", Some(json!(1))), ("name", Some(json!("Alice")))]),
            record(&[
                ("id", Some(json!(2))),
                ("name", None),
                ("active", Some(json!(true))),
                ("tags", Some(json!(["x", "y"]))),
            ]),
        ];

        export_to_xlsx(&records, &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range("Sheet1").unwrap();
        let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
        assert_eq!(
            rows[0],
            vec![
                Data::String("id".to_string()),
                Data::String("name".to_string()),
                Data::String("active".to_string()),
                Data::String("tags".to_string()),
            ]
        );
        assert_eq!(rows[1][0], Data::Float(1.0));
        assert_eq!(rows[1][1], Data::String("Alice".to_string()));
        assert_eq!(rows[1][2], Data::Empty);
        assert_eq!(rows[2][1], Data::Empty);
        assert_eq!(rows[2][2], Data::Bool(true));
        assert_eq!(rows[2][3], Data::String(r#"["x","y"]"#.to_string()));
    }

    #[test]
    fn test_export_empty_records() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("empty.csv");
        let json_path = dir.path().join("empty.json");

        let xlsx_path = dir.path().join("empty.xlsx");
        export_to_csv(&[], &csv_path).unwrap();
        export_to_json(&[], &json_path).unwrap();
        export_to_xlsx(&[], &xlsx_path).unwrap();
        assert!(xlsx_path.exists());

        assert_eq!(std::fs::read_to_string(csv_path).unwrap(), "");
        assert_eq!(std::fs::read_to_string(json_path).unwrap(), "[]");
    }
}
