//! Coverage engine: project and per-file coverage, eligibility filtering,
//! bounded concurrent line-detail fetching and line prioritization under a
//! per-file display budget.
//!
//! The engine is deliberately best-effort at the file level: a single file's
//! line-detail fetch failure is dropped (debug-logged only) so one flaky
//! fetch cannot take down the whole coverage section. Project- and file-list
//! fetch failures are fatal to the section.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use log::debug;
use regex::Regex;

use crate::client::{Measure, QualityService, SourceLine, TreeComponent};
use crate::context::QueryContext;
use crate::error::{CovgateError, Result};
use crate::model::{CoverageData, CoverageDetails, CoverageFile, FilterOptions, UncoveredLine};
use crate::ranges::merge_ranges;
use crate::report::CancelToken;

/// Number of concurrent line-detail fetches per batch.
pub const BATCH_SIZE: usize = 5;

/// Pause between batches. Politeness toward the service, not a rate limiter.
pub const BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Files with more uncovered lines than this are never fetched for detail;
/// they are too large to usefully render.
pub const MAX_RENDERABLE_UNCOVERED: u32 = 500;

/// Context lines captured on each side of an uncovered line for display.
pub const CONTEXT_LINES: u32 = 2;

/// Extensions where markup tags are semantically meaningful and must not be
/// stripped from displayed code.
const WEB_TEMPLATE_EXTENSIONS: [&str; 6] = ["html", "htm", "tsx", "jsx", "vue", "svelte"];

/// Clamp a requested limit into the service's accepted page-size range.
#[must_use]
pub fn page_size(limit: usize) -> u32 {
    limit.clamp(1, 500) as u32
}

/// Produce the coverage section for the change.
///
/// Returns `Err` only for section-fatal failures (project or file-list fetch,
/// invalid file pattern) and for cancellation; per-file line failures degrade
/// silently.
pub fn fetch_coverage(
    svc: &dyn QualityService,
    ctx: &QueryContext,
    opts: &FilterOptions,
    cancel: &CancelToken,
) -> Result<CoverageData> {
    let pattern = compile_pattern(opts)?;

    cancel.check()?;
    let (overall_coverage, new_code_coverage) = fetch_project_coverage(svc, ctx)?;

    cancel.check()?;
    let files = fetch_coverage_files(svc, ctx, opts)?;

    let coverage_details = if opts.no_line_details {
        Vec::new()
    } else {
        let eligible: Vec<&CoverageFile> = files
            .iter()
            .filter(|f| is_eligible(f, opts, pattern.as_ref()))
            .collect();
        fetch_line_details(svc, ctx, opts, &eligible, cancel)?
    };

    let uncovered_lines: Vec<UncoveredLine> = coverage_details
        .iter()
        .flat_map(|d| d.uncovered_lines.iter().cloned())
        .collect();

    Ok(CoverageData {
        overall_coverage,
        new_code_coverage,
        files,
        coverage_details,
        uncovered_lines,
        available: true,
        error: None,
    })
}

fn compile_pattern(opts: &FilterOptions) -> Result<Option<glob::Pattern>> {
    match &opts.file_pattern {
        None => Ok(None),
        Some(pattern) => glob::Pattern::new(pattern)
            .map(Some)
            .map_err(|e| CovgateError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            }),
    }
}

// ---------------------------------------------------------------------------
// Project and file coverage
// ---------------------------------------------------------------------------

/// One measures fetch for the project component. Missing values are zero.
fn fetch_project_coverage(svc: &dyn QualityService, ctx: &QueryContext) -> Result<(f64, f64)> {
    let mut metrics = vec!["coverage".to_string(), "uncovered_lines".to_string()];
    if ctx.new_code {
        metrics.push("new_coverage".to_string());
        metrics.push("new_uncovered_lines".to_string());
    }
    let resp = svc.component_measures(ctx, &metrics)?;
    let overall = measure_value(&resp.component.measures, "coverage");
    let new_code = measure_value(&resp.component.measures, "new_coverage");
    Ok((overall, new_code))
}

/// Paginated per-file measures fetch. Applies the coverage threshold and
/// caps the list at `opts.limit` files.
fn fetch_coverage_files(
    svc: &dyn QualityService,
    ctx: &QueryContext,
    opts: &FilterOptions,
) -> Result<Vec<CoverageFile>> {
    let mut metrics = vec!["coverage".to_string(), "uncovered_lines".to_string()];
    if ctx.new_code {
        metrics.push("new_coverage".to_string());
        metrics.push("new_uncovered_lines".to_string());
    }

    let sort_metric = ctx.coverage_metric();
    let sort = opts.show_worst_first.then_some(sort_metric.as_str());
    let ps = page_size(opts.limit);

    let mut files: Vec<CoverageFile> = Vec::new();
    let mut page = 1u32;
    loop {
        let resp = svc.component_tree(ctx, &metrics, page, ps, sort)?;
        if resp.components.is_empty() {
            break;
        }
        for component in &resp.components {
            let file = file_from_component(component, ctx);
            if let Some(threshold) = opts.coverage_threshold {
                if file.coverage >= threshold {
                    continue;
                }
            }
            files.push(file);
            if files.len() >= opts.limit {
                return Ok(files);
            }
        }
        let fetched = u64::from(resp.paging.page_index) * u64::from(resp.paging.page_size);
        if fetched >= u64::from(resp.paging.total) {
            break;
        }
        page += 1;
    }
    Ok(files)
}

fn file_from_component(component: &TreeComponent, ctx: &QueryContext) -> CoverageFile {
    let path = component.path.clone().unwrap_or_else(|| {
        // Fall back to the path portion of the component key.
        component
            .key
            .split_once(':')
            .map_or(component.key.as_str(), |(_, p)| p)
            .to_string()
    });
    CoverageFile {
        path,
        name: component.name.clone(),
        language: component.language.clone().unwrap_or_default(),
        component_key: component.key.clone(),
        coverage: measure_value(&component.measures, "coverage"),
        uncovered_lines: measure_value(&component.measures, "uncovered_lines") as u32,
        new_coverage: measure_value(&component.measures, "new_coverage"),
        new_uncovered_lines: measure_value(&component.measures, "new_uncovered_lines") as u32,
    }
}

fn measure_value(measures: &[Measure], metric: &str) -> f64 {
    measures
        .iter()
        .find(|m| m.metric == metric)
        .map_or(0.0, Measure::numeric_value)
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Whether a file qualifies for line-level detail fetching. Pure predicate
/// chain; checks are mutually independent, the order only decides which one
/// reports the exclusion first.
fn is_eligible(file: &CoverageFile, opts: &FilterOptions, pattern: Option<&glob::Pattern>) -> bool {
    if opts.new_lines_only && file.new_uncovered_lines == 0 {
        return false;
    }
    if let Some(min) = opts.min_uncovered_lines {
        if file.uncovered_lines < min {
            return false;
        }
    }
    if let Some(max) = opts.max_uncovered_lines {
        if file.uncovered_lines > max {
            return false;
        }
    }
    if file.uncovered_lines > MAX_RENDERABLE_UNCOVERED {
        return false;
    }
    if file.coverage >= 100.0 {
        return false;
    }
    if is_generated_artifact(&file.path) {
        return false;
    }
    if let Some(pattern) = pattern {
        let basename = file.path.rsplit('/').next().unwrap_or(&file.path);
        if !pattern.matches(&file.path) && !pattern.matches(basename) {
            return false;
        }
    }
    true
}

/// Heuristics for build artifacts and generated code that are never worth
/// rendering line detail for.
fn is_generated_artifact(path: &str) -> bool {
    const GENERATED_DIRS: [&str; 5] = ["node_modules", "vendor", "build", "dist", "target"];
    const GENERATED_SUFFIXES: [&str; 4] = [".min.js", ".min.css", "_pb2.py", ".pb.go"];

    if path
        .split('/')
        .any(|segment| GENERATED_DIRS.contains(&segment))
    {
        return true;
    }
    if GENERATED_SUFFIXES.iter().any(|s| path.ends_with(s)) {
        return true;
    }
    path.contains(".generated.") || path.contains("__generated__")
}

// ---------------------------------------------------------------------------
// Line-detail fetching
// ---------------------------------------------------------------------------

/// Fetch line detail for eligible files in fixed-size concurrent batches.
///
/// Each batch spawns one thread per file; results flow back over a channel
/// owned by this function, keyed by input index so the merged list preserves
/// eligible-file order regardless of completion order. A failed file is
/// dropped from the results (debug log only).
fn fetch_line_details(
    svc: &dyn QualityService,
    ctx: &QueryContext,
    opts: &FilterOptions,
    eligible: &[&CoverageFile],
    cancel: &CancelToken,
) -> Result<Vec<CoverageDetails>> {
    let mut slots: Vec<Option<CoverageDetails>> = vec![None; eligible.len()];
    let batches: Vec<&[&CoverageFile]> = eligible.chunks(BATCH_SIZE).collect();

    for (batch_index, batch) in batches.iter().enumerate() {
        cancel.check()?;

        let (tx, rx) = mpsc::channel::<(usize, Result<CoverageDetails>)>();
        thread::scope(|scope| {
            for (offset, file) in batch.iter().copied().enumerate() {
                let index = batch_index * BATCH_SIZE + offset;
                let tx = tx.clone();
                scope.spawn(move || {
                    let result = fetch_file_details(svc, ctx, opts, file);
                    // The receiver outlives the scope; a send cannot fail.
                    let _ = tx.send((index, result));
                });
            }
        });
        drop(tx);

        for (index, result) in rx {
            match result {
                Ok(details) => slots[index] = Some(details),
                Err(e) => debug!(
                    "skipping line detail for {}: {e}",
                    eligible[index].path
                ),
            }
        }

        if batch_index + 1 < batches.len() {
            thread::sleep(BATCH_PAUSE);
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Fetch and process one file's uncovered lines.
fn fetch_file_details(
    svc: &dyn QualityService,
    ctx: &QueryContext,
    opts: &FilterOptions,
    file: &CoverageFile,
) -> Result<CoverageDetails> {
    let source = svc.source_lines(ctx, &file.component_key)?;

    let mut uncovered: Vec<UncoveredLine> = Vec::new();
    for line in &source {
        if line.line_hits != Some(0) {
            continue;
        }
        if opts.new_lines_only && !line.is_new {
            continue;
        }
        uncovered.push(UncoveredLine {
            file: file.path.clone(),
            line: line.line,
            code: process_code(
                line.code.as_deref().unwrap_or(""),
                &file.path,
                opts.truncate_lines,
            ),
            is_new: line.is_new,
        });
    }

    let selected = prioritize_lines(uncovered, opts.lines_per_file, opts.show_all_lines);
    let context = context_snippets(&source, &selected, &file.path, opts.truncate_lines);

    Ok(CoverageDetails {
        file_path: file.path.clone(),
        coverage_percent: file.coverage,
        total_uncovered: file.uncovered_lines,
        new_uncovered: file.new_uncovered_lines,
        uncovered_lines: selected,
        context,
    })
}

/// Plain context lines for the merged display ranges around the selected
/// uncovered lines: every in-range source line that is not itself selected.
fn context_snippets(
    source: &[SourceLine],
    selected: &[UncoveredLine],
    path: &str,
    truncate: usize,
) -> BTreeMap<u32, String> {
    let numbers: Vec<u32> = selected.iter().map(|l| l.line).collect();
    let ranges = merge_ranges(&numbers, CONTEXT_LINES);

    let mut context = BTreeMap::new();
    for line in source {
        if numbers.contains(&line.line) {
            continue;
        }
        if ranges.iter().any(|r| r.contains(line.line)) {
            context.insert(
                line.line,
                process_code(line.code.as_deref().unwrap_or(""), path, truncate),
            );
        }
    }
    context
}

// ---------------------------------------------------------------------------
// Line processing and prioritization
// ---------------------------------------------------------------------------

/// Trim, strip markup where safe, and truncate a code line for display.
fn process_code(code: &str, path: &str, truncate: usize) -> String {
    let trimmed = code.trim();
    let stripped = if is_web_template(path) {
        trimmed.to_string()
    } else {
        strip_html_tags(trimmed)
    };
    truncate_code(&stripped, truncate)
}

fn is_web_template(path: &str) -> bool {
    let ext = path.rsplit('.').next().unwrap_or("");
    WEB_TEMPLATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// The service returns syntax-highlighted source; drop the markup.
fn strip_html_tags(code: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());
    tag.replace_all(code, "").into_owned()
}

fn truncate_code(code: &str, truncate: usize) -> String {
    if truncate == 0 || code.chars().count() <= truncate {
        return code.to_string();
    }
    let mut out: String = code.chars().take(truncate).collect();
    out.push_str("...");
    out
}

/// Select uncovered lines under the per-file budget: all new lines first
/// (never dropped), then old lines filling whatever budget remains.
fn prioritize_lines(
    lines: Vec<UncoveredLine>,
    lines_per_file: usize,
    show_all: bool,
) -> Vec<UncoveredLine> {
    if show_all {
        return lines;
    }
    let (new_lines, old_lines): (Vec<UncoveredLine>, Vec<UncoveredLine>) =
        lines.into_iter().partition(|l| l.is_new);

    let remaining = lines_per_file.saturating_sub(new_lines.len());
    let mut selected = new_lines;
    selected.extend(old_lines.into_iter().take(remaining));
    selected
}
