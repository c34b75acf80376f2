//! Report data model: the immutable values assembled into a [`Report`].
//!
//! Every section type carries an `available` flag plus an optional error
//! message so the assembler can degrade gracefully when a fetch fails
//! without losing the rest of the report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One quality-gate condition, normalized from the service response.
#[derive(Debug, Clone, Serialize)]
pub struct Condition {
    pub metric_key: String,
    pub display_name: String,
    pub comparator: String,
    pub threshold: String,
    pub actual_value: String,
    pub failed: bool,
    pub on_new_code: bool,
}

/// Normalized quality-gate result. `status` is `"UNKNOWN"` when the gate
/// could not be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct QualityGateInfo {
    pub status: String,
    pub passed: bool,
    pub conditions: Vec<Condition>,
    pub failed_conditions: Vec<Condition>,
}

impl QualityGateInfo {
    /// Placeholder used when the gate fetch fails.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            status: "UNKNOWN".to_string(),
            passed: false,
            conditions: Vec::new(),
            failed_conditions: Vec::new(),
        }
    }
}

/// Per-file coverage summary row. Unique by `component_key` within a report.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageFile {
    pub path: String,
    pub name: String,
    pub language: String,
    pub component_key: String,
    pub coverage: f64,
    pub uncovered_lines: u32,
    pub new_coverage: f64,
    pub new_uncovered_lines: u32,
}

/// A single uncovered source line, with its processed display text.
#[derive(Debug, Clone, Serialize)]
pub struct UncoveredLine {
    pub file: String,
    pub line: u32,
    pub code: String,
    pub is_new: bool,
}

/// Line-level detail for one eligible file: the uncovered lines selected for
/// display plus the surrounding context lines needed to render them.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageDetails {
    pub file_path: String,
    pub coverage_percent: f64,
    pub total_uncovered: u32,
    pub new_uncovered: u32,
    pub uncovered_lines: Vec<UncoveredLine>,
    /// Code for in-range lines that are not themselves uncovered, keyed by
    /// line number. Used as plain context when rendering.
    pub context: BTreeMap<u32, String>,
}

/// The coverage section of a report.
#[derive(Debug, Clone, Serialize)]
pub struct CoverageData {
    pub overall_coverage: f64,
    pub new_code_coverage: f64,
    pub files: Vec<CoverageFile>,
    pub coverage_details: Vec<CoverageDetails>,
    /// All selected uncovered lines, flattened in `coverage_details` order.
    pub uncovered_lines: Vec<UncoveredLine>,
    pub available: bool,
    pub error: Option<String>,
}

impl CoverageData {
    /// Placeholder used when the coverage fetch fails.
    #[must_use]
    pub fn unavailable(error: String) -> Self {
        Self {
            overall_coverage: 0.0,
            new_code_coverage: 0.0,
            files: Vec::new(),
            coverage_details: Vec::new(),
            uncovered_lines: Vec::new(),
            available: false,
            error: Some(error),
        }
    }
}

/// A quality issue, normalized for display.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedIssue {
    pub key: String,
    pub issue_type: String,
    pub severity: String,
    pub rule: String,
    pub file: String,
    pub line: Option<u32>,
    pub message: String,
    pub technical_debt: Option<String>,
}

/// The issues section of a report. Counters cover only the fetched page.
#[derive(Debug, Clone, Serialize)]
pub struct IssuesData {
    pub bugs: u32,
    pub vulnerabilities: u32,
    pub code_smells: u32,
    pub security_hotspots: u32,
    pub issues: Vec<ProcessedIssue>,
    pub total_issues: u64,
    pub available: bool,
    pub error: Option<String>,
}

impl IssuesData {
    /// Placeholder used when the issues fetch fails.
    #[must_use]
    pub fn unavailable(error: String) -> Self {
        Self {
            bugs: 0,
            vulnerabilities: 0,
            code_smells: 0,
            security_hotspots: 0,
            issues: Vec::new(),
            total_issues: 0,
            available: false,
            error: Some(error),
        }
    }
}

/// The metrics summary section: preferred metric values in display order.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsData {
    pub values: Vec<(String, String)>,
    pub available: bool,
    pub error: Option<String>,
}

impl MetricsData {
    /// Placeholder used when the metrics fetch fails.
    #[must_use]
    pub fn unavailable(error: String) -> Self {
        Self {
            values: Vec::new(),
            available: false,
            error: Some(error),
        }
    }
}

/// The assembled report. Built once by the assembler, read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub project_key: String,
    pub timestamp: DateTime<Utc>,
    pub pull_request_id: Option<String>,
    pub quality_gate: QualityGateInfo,
    pub coverage: Option<CoverageData>,
    pub issues: Option<IssuesData>,
    pub metrics: MetricsData,
    /// One entry per section that degraded to `available: false`.
    pub warnings: Vec<String>,
}

/// Filtering and sizing options for report generation.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub include_coverage: bool,
    pub include_issues: bool,
    /// Exclude files at or above this coverage percentage from the file list.
    pub coverage_threshold: Option<f64>,
    /// Page size for file fetches, and the maximum number of files kept.
    pub limit: usize,
    /// Force new-code metrics even for branch pipelines.
    pub new_code_only: bool,
    /// Severity allow-list; empty means all severities.
    pub severity_filter: Vec<String>,
    pub show_worst_first: bool,
    /// Disable the per-file line budget entirely.
    pub show_all_lines: bool,
    /// Budget of displayed uncovered lines per file (new lines exempt).
    pub lines_per_file: usize,
    /// Only consider uncovered lines introduced by the change.
    pub new_lines_only: bool,
    pub min_uncovered_lines: Option<u32>,
    pub max_uncovered_lines: Option<u32>,
    /// Glob matched against the full path or the basename.
    pub file_pattern: Option<String>,
    /// Skip per-file line-detail fetching entirely.
    pub no_line_details: bool,
    /// Truncate displayed code to this many characters.
    pub truncate_lines: usize,
    pub debug: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            include_coverage: true,
            include_issues: true,
            coverage_threshold: None,
            limit: 100,
            new_code_only: false,
            severity_filter: Vec::new(),
            show_worst_first: false,
            show_all_lines: false,
            lines_per_file: 10,
            new_lines_only: false,
            min_uncovered_lines: None,
            max_uncovered_lines: None,
            file_pattern: None,
            no_line_details: false,
            truncate_lines: 120,
            debug: false,
        }
    }
}
