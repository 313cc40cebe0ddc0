//! Per-source pipeline and the run loop.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::fetch::{FetchPolicy, ReqwestTransport, RetryingFetcher, Transport};
use crate::normalize::normalize_record;
use crate::scrape::HtmlScraper;
use crate::types::{
    CollectorResult, Context, ExtractedValues, NormalizedRecord, SourceDescriptor,
    ValidationIssue,
};
use crate::validate::validate_records;

/// Placeholder values available to a source's URL templates.
pub fn build_context(source: &SourceDescriptor) -> Context {
    [
        ("id".to_string(), source.id.clone()),
        ("external_id".to_string(), source.id.clone()),
    ]
    .into()
}

/// Everything produced for one source that fetched successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source_id: String,
    pub api: Option<ExtractedValues>,
    pub html: Option<ExtractedValues>,
    pub record: NormalizedRecord,
}

/// A validation issue tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIssue {
    pub source_id: String,
    pub issue: ValidationIssue,
}

impl fmt::Display for SourceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.source_id, self.issue.field, self.issue.index
        )
    }
}

/// A source that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: String,
}

/// Outcome of one run over a source list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    /// Successful sources, in input order.
    pub records: Vec<SourceRecord>,
    pub issues: Vec<SourceIssue>,
    pub failures: Vec<SourceFailure>,
}

impl CollectionReport {
    /// The normalized records, ready for export.
    pub fn normalized(&self) -> Vec<NormalizedRecord> {
        self.records.iter().map(|r| r.record.clone()).collect()
    }
}

/// Fetches, normalizes and validates sources.
#[derive(Clone)]
pub struct Collector {
    api: ApiClient,
    html: HtmlScraper,
}

impl Collector {
    pub fn new(api: ApiClient, html: HtmlScraper) -> Self {
        Self { api, html }
    }

    /// One transport shared by both origins.
    pub fn with_transport(transport: Arc<dyn Transport>, policy: FetchPolicy) -> Self {
        let fetcher = RetryingFetcher::new(transport, policy);
        Self::new(ApiClient::new(fetcher.clone()), HtmlScraper::new(fetcher))
    }

    /// A collector over a fresh `reqwest` client.
    pub fn from_policy(policy: FetchPolicy) -> CollectorResult<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(Arc::new(transport), policy))
    }

    /// Fetch both origins concurrently and merge them. The first error
    /// cancels the other fetch.
    pub async fn collect_source(&self, source: &SourceDescriptor) -> CollectorResult<SourceRecord> {
        let context = build_context(source);
        let (api, html) = tokio::try_join!(
            self.api.fetch(source, Some(&context)),
            self.html.fetch_and_parse(source, Some(&context)),
        )?;

        let record = normalize_record(&source.mapping, api.as_ref(), html.as_ref());
        debug!(source = %source.id, fields = record.len(), "source normalized");
        Ok(SourceRecord {
            source_id: source.id.clone(),
            api,
            html,
            record,
        })
    }

    /// Collect every source in order. A failed source is logged and skipped.
    pub async fn run(&self, sources: &[SourceDescriptor]) -> CollectionReport {
        let mut report = CollectionReport::default();

        for source in sources {
            match self.collect_source(source).await {
                Ok(collected) => {
                    let index = report.records.len();
                    let issues =
                        validate_records(std::slice::from_ref(&collected.record), &source.required_fields());
                    report
                        .issues
                        .extend(issues.into_iter().map(|issue| SourceIssue {
                            source_id: source.id.clone(),
                            issue: ValidationIssue { index, ..issue },
                        }));
                    report.records.push(collected);
                }
                Err(e) => {
                    warn!(source = %source.id, error = %e, "source failed");
                    report.failures.push(SourceFailure {
                        source_id: source.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            records = report.records.len(),
            issues = report.issues.len(),
            failures = report.failures.len(),
            "collection finished"
        );
        report
    }
}
