//! Text rendering for an assembled [`Report`].
//!
//! Uncovered lines are grouped into their merged context ranges: uncovered
//! lines are marked `✗` (or `+` when introduced by the change), surrounding
//! context lines are unmarked.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::coverage::CONTEXT_LINES;
use crate::model::{CoverageData, CoverageDetails, IssuesData, Report};
use crate::ranges::merge_ranges;

/// Render the whole report as plain text.
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();

    writeln!(out, "Project: {}", report.project_key).unwrap();
    if let Some(ref pr) = report.pull_request_id {
        writeln!(out, "Pull request: #{pr}").unwrap();
    }
    writeln!(out, "Generated: {}", report.timestamp.to_rfc3339()).unwrap();
    out.push('\n');

    render_gate(&mut out, report);
    render_metrics(&mut out, report);
    if let Some(ref coverage) = report.coverage {
        render_coverage(&mut out, coverage);
    }
    if let Some(ref issues) = report.issues {
        render_issues(&mut out, issues);
    }

    if !report.warnings.is_empty() {
        writeln!(out, "Warnings:").unwrap();
        for warning in &report.warnings {
            writeln!(out, "  ! {warning}").unwrap();
        }
    }

    out
}

fn render_gate(out: &mut String, report: &Report) {
    let gate = &report.quality_gate;
    let verdict = if gate.passed { "PASSED" } else { "FAILED" };
    writeln!(out, "Quality gate: {} ({})", verdict, gate.status).unwrap();
    for c in &gate.failed_conditions {
        let scope = if c.on_new_code { " [new code]" } else { "" };
        writeln!(
            out,
            "  ✗ {}{}: {} {} {} (threshold)",
            c.display_name, scope, c.actual_value, c.comparator, c.threshold
        )
        .unwrap();
    }
    out.push('\n');
}

fn render_metrics(out: &mut String, report: &Report) {
    if !report.metrics.available {
        return;
    }
    writeln!(out, "Metrics:").unwrap();
    for (metric, value) in &report.metrics.values {
        writeln!(out, "  {:<30} {}", metric, value).unwrap();
    }
    out.push('\n');
}

fn render_coverage(out: &mut String, coverage: &CoverageData) {
    if !coverage.available {
        writeln!(out, "Coverage: unavailable\n").unwrap();
        return;
    }

    writeln!(out, "Coverage: {:.1}% overall", coverage.overall_coverage).unwrap();
    if coverage.new_code_coverage > 0.0 {
        writeln!(out, "          {:.1}% on new code", coverage.new_code_coverage).unwrap();
    }

    if !coverage.files.is_empty() {
        out.push('\n');
        writeln!(out, "{:<60} {:>8} {:>10}", "FILE", "RATE", "UNCOVERED").unwrap();
        writeln!(out, "{}", "-".repeat(80)).unwrap();
        for f in &coverage.files {
            writeln!(
                out,
                "{:<60} {:>7.1}% {:>10}",
                f.path, f.coverage, f.uncovered_lines
            )
            .unwrap();
        }
    }

    for details in &coverage.coverage_details {
        out.push('\n');
        render_file_details(out, details);
    }
    out.push('\n');
}

fn render_file_details(out: &mut String, details: &CoverageDetails) {
    writeln!(
        out,
        "{}  {:.1}% covered, {} uncovered ({} new)",
        details.file_path, details.coverage_percent, details.total_uncovered, details.new_uncovered
    )
    .unwrap();

    let by_line: BTreeMap<u32, (&str, bool)> = details
        .uncovered_lines
        .iter()
        .map(|l| (l.line, (l.code.as_str(), l.is_new)))
        .collect();
    let numbers: Vec<u32> = by_line.keys().copied().collect();

    for (i, range) in merge_ranges(&numbers, CONTEXT_LINES).iter().enumerate() {
        if i > 0 {
            writeln!(out, "     ···").unwrap();
        }
        for line in range.start..=range.end {
            if let Some(&(code, is_new)) = by_line.get(&line) {
                let marker = if is_new { '+' } else { '✗' };
                writeln!(out, " {marker} {line:>5} | {code}").unwrap();
            } else if let Some(code) = details.context.get(&line) {
                writeln!(out, "   {line:>5} | {code}").unwrap();
            }
        }
    }
}

fn render_issues(out: &mut String, issues: &IssuesData) {
    if !issues.available {
        writeln!(out, "Issues: unavailable\n").unwrap();
        return;
    }

    writeln!(
        out,
        "Issues: {} bugs, {} vulnerabilities, {} code smells, {} hotspots ({} total)",
        issues.bugs,
        issues.vulnerabilities,
        issues.code_smells,
        issues.security_hotspots,
        issues.total_issues
    )
    .unwrap();

    for issue in &issues.issues {
        let location = match issue.line {
            Some(line) => format!("{}:{}", issue.file, line),
            None => issue.file.clone(),
        };
        writeln!(
            out,
            "  [{}] {} {} — {}",
            issue.severity, issue.issue_type, location, issue.message
        )
        .unwrap();
    }
    out.push('\n');
}
