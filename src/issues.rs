//! Issues aggregation: fetch quality issues for the change, apply the
//! severity allow-list, sort by severity and classify into summary counters.

use crate::client::{QualityService, RawIssue};
use crate::context::QueryContext;
use crate::coverage::page_size;
use crate::error::Result;
use crate::model::{FilterOptions, IssuesData, ProcessedIssue};

/// Issue types requested from the service. Hotspots arrive through their own
/// type tag when the server includes them, so the classifier still counts
/// them separately.
pub const ISSUE_TYPES: &str = "BUG,VULNERABILITY,CODE_SMELL";

/// All severities, highest first.
pub const ALL_SEVERITIES: [&str; 5] = ["BLOCKER", "CRITICAL", "MAJOR", "MINOR", "INFO"];

/// Fetch and classify issues for the change. The summary counters are
/// running totals over the fetched page, not the whole project.
pub fn fetch_issues(
    svc: &dyn QualityService,
    ctx: &QueryContext,
    opts: &FilterOptions,
) -> Result<IssuesData> {
    let severities = if opts.severity_filter.is_empty() {
        ALL_SEVERITIES.join(",")
    } else {
        opts.severity_filter.join(",")
    };

    let resp = svc.search_issues(ctx, ISSUE_TYPES, &severities, page_size(opts.limit))?;

    let mut issues: Vec<ProcessedIssue> = resp.issues.iter().map(process_issue).collect();
    // Stable sort keeps the server's ordering within one severity.
    issues.sort_by_key(|i| std::cmp::Reverse(severity_rank(&i.severity)));

    let mut data = IssuesData {
        bugs: 0,
        vulnerabilities: 0,
        code_smells: 0,
        security_hotspots: 0,
        total_issues: resp.total,
        issues: Vec::new(),
        available: true,
        error: None,
    };
    for issue in &issues {
        match issue.issue_type.as_str() {
            "BUG" => data.bugs += 1,
            "VULNERABILITY" => data.vulnerabilities += 1,
            "CODE_SMELL" => data.code_smells += 1,
            "SECURITY_HOTSPOT" => data.security_hotspots += 1,
            _ => {}
        }
    }
    data.issues = issues;
    Ok(data)
}

fn process_issue(raw: &RawIssue) -> ProcessedIssue {
    ProcessedIssue {
        key: raw.key.clone(),
        issue_type: raw.issue_type.clone(),
        severity: raw.severity.clone(),
        rule: raw.rule.clone(),
        file: component_file_path(&raw.component),
        line: raw.line,
        message: raw.message.clone(),
        technical_debt: raw.debt.clone(),
    }
}

/// File path portion of a component key like `proj:src/main.rs`.
fn component_file_path(component: &str) -> String {
    component
        .split_once(':')
        .map_or(component, |(_, path)| path)
        .to_string()
}

/// Rank for descending severity sort; unknown severities sort last.
fn severity_rank(severity: &str) -> u8 {
    match severity {
        "BLOCKER" => 5,
        "CRITICAL" => 4,
        "MAJOR" => 3,
        "MINOR" => 2,
        "INFO" => 1,
        _ => 0,
    }
}
