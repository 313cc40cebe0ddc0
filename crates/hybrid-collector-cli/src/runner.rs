//! Run and check commands, writing the user-facing status lines.

use std::io::Write;
use std::path::{Path, PathBuf};

use hybrid_collector::{
    export_to_csv, export_to_json, export_to_xlsx, load_sources, CollectionReport, Collector, CollectorError,
    SourceDescriptor,
};

pub const CSV_FILE: &str = "unified_records.csv";
pub const JSON_FILE: &str = "unified_records.json";
pub const XLSX_FILE: &str = "unified_records.xlsx";

/// Options for one collection run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub dry_run: bool,
    /// Also write a spreadsheet next to the CSV and JSON files.
    pub xlsx: bool,
}

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub report: CollectionReport,
    /// CSV and JSON paths, unless the run was dry.
    pub exported: Option<(PathBuf, PathBuf)>,
}

/// Load sources, mapping configuration problems to the `[config error]` line.
pub fn load_config(path: &str) -> Result<Vec<SourceDescriptor>, String> {
    load_sources(path).map_err(|e| match e {
        CollectorError::Configuration(message) => format!("[config error] {message}"),
        other => format!("[config error] {other}"),
    })
}

/// Collect every source, report failures and validation issues, then export.
pub async fn run_sources(
    collector: &Collector,
    sources: &[SourceDescriptor],
    options: &RunOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<RunSummary> {
    let report = collector.run(sources).await;

    for failure in &report.failures {
        writeln!(
            err,
            "[error] Source '{}' failed: {}",
            failure.source_id, failure.error
        )?;
    }

    if report.issues.is_empty() {
        writeln!(out, "[validation] No issues")?;
    } else {
        let labels: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
        writeln!(out, "[validation] Issues found: {}", labels.join(", "))?;
    }

    if options.dry_run {
        writeln!(out, "[dry-run] Skipping export")?;
        return Ok(RunSummary {
            report,
            exported: None,
        });
    }

    let (csv_path, json_path) = export_paths(&options.output_dir);
    let records = report.normalized();
    export_to_csv(&records, &csv_path)?;
    export_to_json(&records, &json_path)?;
    writeln!(
        out,
        "[export] Wrote {} records to {} and {}",
        records.len(),
        csv_path.display(),
        json_path.display()
    )?;
    if options.xlsx {
        let xlsx_path = options.output_dir.join(XLSX_FILE);
        export_to_xlsx(&records, &xlsx_path)?;
        writeln!(
            out,
            "[export] Wrote {} records to {}",
            records.len(),
            xlsx_path.display()
        )?;
    }

    Ok(RunSummary {
        report,
        exported: Some((csv_path, json_path)),
    })
}

/// Print one line per source describing its origins and fields.
pub fn check_sources(
    path: &str,
    sources: &[SourceDescriptor],
    out: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(out, "Valid config: {path}")?;
    writeln!(out, "  Sources: {}", sources.len())?;
    for source in sources {
        let mut origins = Vec::new();
        if let Some(api) = source.api_enabled() {
            origins.push(format!("api {} {}", api.method, api.base_url));
        }
        if let Some(html) = source.html_enabled() {
            origins.push(format!("html {}", html.url));
        }
        writeln!(
            out,
            "  - {}: {} (fields: {})",
            source.id,
            origins.join(", "),
            source.required_fields().join(", ")
        )?;
    }
    Ok(())
}

pub fn export_paths(output_dir: &Path) -> (PathBuf, PathBuf) {
    (output_dir.join(CSV_FILE), output_dir.join(JSON_FILE))
}
