//! Query context construction.
//!
//! A [`QueryContext`] pins down everything the fetch layer needs to scope a
//! request to one change: the project key, the branch or pull-request
//! parameters, and the metric-name policy (whole-project metric names vs.
//! their `new_`-prefixed new-code variants). It is built once per report and
//! never mutated afterwards.

use crate::error::{CovgateError, Result};

/// Metric bases fetched for the metrics summary, in display order.
pub const BASE_METRICS: [&str; 6] = [
    "coverage",
    "uncovered_lines",
    "bugs",
    "vulnerabilities",
    "code_smells",
    "duplicated_lines_density",
];

/// The change a report is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRef {
    /// A branch pipeline, identified by branch name.
    Branch(String),
    /// A pull request, identified by its numeric id (kept as a string since
    /// the service echoes it back verbatim).
    PullRequest(String),
}

/// Immutable per-report query scope.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub project_key: String,
    pub is_pull_request: bool,
    pub pull_request_id: Option<String>,
    /// Extra query parameters appended to every request (branch or
    /// pullRequest scoping).
    pub base_params: Vec<(String, String)>,
    /// Metric names for the summary section, already prefixed per the
    /// new-code policy.
    pub preferred_metrics: Vec<String>,
    /// Whether metric names should use their `new_` variants.
    pub new_code: bool,
}

impl QueryContext {
    /// Build the context for a change. Pull requests always use new-code
    /// metrics; branches only when `new_code_only` forces them.
    pub fn build(project_key: &str, change: &ChangeRef, new_code_only: bool) -> Result<Self> {
        if project_key.is_empty() {
            return Err(CovgateError::InvalidChange(
                "project key must not be empty".to_string(),
            ));
        }

        let (is_pull_request, pull_request_id, base_params) = match change {
            ChangeRef::Branch(name) => {
                if name.is_empty() {
                    return Err(CovgateError::InvalidChange(
                        "branch name must not be empty".to_string(),
                    ));
                }
                (
                    false,
                    None,
                    vec![("branch".to_string(), name.clone())],
                )
            }
            ChangeRef::PullRequest(id) => {
                if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                    return Err(CovgateError::InvalidChange(format!(
                        "pull request id must be numeric, got '{id}'"
                    )));
                }
                (
                    true,
                    Some(id.clone()),
                    vec![("pullRequest".to_string(), id.clone())],
                )
            }
        };

        let new_code = is_pull_request || new_code_only;
        let preferred_metrics = BASE_METRICS
            .iter()
            .map(|m| metric_name(m, new_code))
            .collect();

        Ok(Self {
            project_key: project_key.to_string(),
            is_pull_request,
            pull_request_id,
            base_params,
            preferred_metrics,
            new_code,
        })
    }

    /// The metric the file list is sorted by when showing worst-first.
    #[must_use]
    pub fn coverage_metric(&self) -> String {
        metric_name("coverage", self.new_code)
    }
}

/// Apply the new-code prefix policy to a base metric name.
#[must_use]
pub fn metric_name(base: &str, new_code: bool) -> String {
    if new_code {
        format!("new_{base}")
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_context_uses_project_metrics() {
        let ctx =
            QueryContext::build("proj", &ChangeRef::Branch("main".to_string()), false).unwrap();
        assert!(!ctx.is_pull_request);
        assert_eq!(ctx.pull_request_id, None);
        assert_eq!(ctx.base_params, vec![("branch".to_string(), "main".to_string())]);
        assert!(ctx.preferred_metrics.contains(&"coverage".to_string()));
        assert!(!ctx.preferred_metrics.iter().any(|m| m.starts_with("new_")));
    }

    #[test]
    fn test_pull_request_context_prefixes_metrics() {
        let ctx =
            QueryContext::build("proj", &ChangeRef::PullRequest("42".to_string()), false).unwrap();
        assert!(ctx.is_pull_request);
        assert_eq!(ctx.pull_request_id.as_deref(), Some("42"));
        assert_eq!(
            ctx.base_params,
            vec![("pullRequest".to_string(), "42".to_string())]
        );
        assert!(ctx.preferred_metrics.iter().all(|m| m.starts_with("new_")));
        assert_eq!(ctx.coverage_metric(), "new_coverage");
    }

    #[test]
    fn test_new_code_only_forces_new_metrics_on_branch() {
        let ctx =
            QueryContext::build("proj", &ChangeRef::Branch("main".to_string()), true).unwrap();
        assert!(ctx.new_code);
        assert_eq!(ctx.coverage_metric(), "new_coverage");
    }

    #[test]
    fn test_empty_project_key_rejected() {
        let err = QueryContext::build("", &ChangeRef::Branch("main".to_string()), false);
        assert!(err.is_err());
    }

    #[test]
    fn test_non_numeric_pull_request_rejected() {
        let err = QueryContext::build("proj", &ChangeRef::PullRequest("abc".to_string()), false);
        assert!(err.is_err());
    }

    #[test]
    fn test_metric_name_prefixing() {
        assert_eq!(metric_name("coverage", false), "coverage");
        assert_eq!(metric_name("coverage", true), "new_coverage");
    }
}
