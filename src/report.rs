//! Report assembly: orchestrates the quality gate, metrics, coverage and
//! issues fetches into one immutable [`Report`].
//!
//! Section fetches degrade independently: a failure becomes an
//! `available: false` placeholder plus a warning entry, and assembly
//! continues. Only project-key resolution, query-context construction and
//! cancellation abort the whole report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::client::QualityService;
use crate::context::{ChangeRef, QueryContext};
use crate::coverage;
use crate::error::{CovgateError, Result};
use crate::gate;
use crate::issues;
use crate::model::{
    CoverageData, FilterOptions, IssuesData, MetricsData, QualityGateInfo, Report,
};

/// Cooperative cancellation for a whole report assembly. Cloneable; all
/// clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Error out when cancellation has been requested. Fetch loops call this
    /// between requests; partial work is discarded by the propagated error.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CovgateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Generate a report for one change. The quality gate and metrics sections
/// are always computed; coverage and issues only when requested by `opts`.
pub fn generate_report(
    svc: &dyn QualityService,
    project_key: &str,
    change: &ChangeRef,
    opts: &FilterOptions,
    cancel: &CancelToken,
) -> Result<Report> {
    let ctx = QueryContext::build(project_key, change, opts.new_code_only)?;
    let mut warnings: Vec<String> = Vec::new();

    cancel.check()?;
    let quality_gate = match gate::fetch_quality_gate(svc, &ctx) {
        Ok(gate) => gate,
        Err(CovgateError::Cancelled) => return Err(CovgateError::Cancelled),
        Err(e) => {
            warnings.push(format!("quality gate unavailable: {e}"));
            QualityGateInfo::unknown()
        }
    };

    cancel.check()?;
    let metrics = match fetch_metrics(svc, &ctx) {
        Ok(metrics) => metrics,
        Err(CovgateError::Cancelled) => return Err(CovgateError::Cancelled),
        Err(e) => {
            warnings.push(format!("metrics unavailable: {e}"));
            MetricsData::unavailable(e.to_string())
        }
    };

    let coverage = if opts.include_coverage {
        cancel.check()?;
        Some(
            match coverage::fetch_coverage(svc, &ctx, opts, cancel) {
                Ok(data) => data,
                Err(CovgateError::Cancelled) => return Err(CovgateError::Cancelled),
                Err(e) => {
                    warnings.push(format!("coverage unavailable: {e}"));
                    CoverageData::unavailable(e.to_string())
                }
            },
        )
    } else {
        None
    };

    let issues = if opts.include_issues {
        cancel.check()?;
        Some(match issues::fetch_issues(svc, &ctx, opts) {
            Ok(data) => data,
            Err(CovgateError::Cancelled) => return Err(CovgateError::Cancelled),
            Err(e) => {
                warnings.push(format!("issues unavailable: {e}"));
                IssuesData::unavailable(e.to_string())
            }
        })
    } else {
        None
    };

    debug!(
        "assembled report for {} with {} warning(s)",
        ctx.project_key,
        warnings.len()
    );

    Ok(Report {
        project_key: ctx.project_key.clone(),
        timestamp: Utc::now(),
        pull_request_id: ctx.pull_request_id.clone(),
        quality_gate,
        coverage,
        issues,
        metrics,
        warnings,
    })
}

/// One measures fetch for the preferred metric set, keeping display order.
fn fetch_metrics(svc: &dyn QualityService, ctx: &QueryContext) -> Result<MetricsData> {
    let resp = svc.component_measures(ctx, &ctx.preferred_metrics)?;
    let values = ctx
        .preferred_metrics
        .iter()
        .map(|metric| {
            let value = resp
                .component
                .measures
                .iter()
                .find(|m| m.metric == *metric)
                .and_then(|m| m.raw_value().map(str::to_string))
                .unwrap_or_else(|| "-".to_string());
            (metric.clone(), value)
        })
        .collect();
    Ok(MetricsData {
        values,
        available: true,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_starts_clear() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(CovgateError::Cancelled)));
    }
}
