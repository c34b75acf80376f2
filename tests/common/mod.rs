//! Shared stub quality service for integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use covgate::client::{
    ComponentMeasures, GateResponse, IssuesResponse, Measure, MeasuresResponse, Paging,
    PeriodValue, ProjectStatus, QualityService, RawIssue, SourceLine, TreeComponent, TreeResponse,
};
use covgate::context::QueryContext;
use covgate::error::{CovgateError, Result};

/// In-memory [`QualityService`] with per-endpoint failure switches.
#[derive(Default)]
pub struct StubService {
    pub project_measures: Vec<Measure>,
    pub tree: Vec<TreeComponent>,
    pub gate_status: Option<ProjectStatus>,
    pub issues: Vec<RawIssue>,
    pub sources: HashMap<String, Vec<SourceLine>>,
    pub existing_keys: Vec<String>,

    pub fail_measures: bool,
    pub fail_tree: bool,
    pub fail_gate: bool,
    pub fail_issues: bool,
    /// Component keys whose source fetch should fail.
    pub fail_sources_for: Vec<String>,

    /// Component keys fetched through `source_lines`, in call order.
    pub source_fetch_log: Mutex<Vec<String>>,
}

fn stub_error(what: &str) -> CovgateError {
    CovgateError::Http {
        endpoint: what.to_string(),
        status: 500,
        body: "stub failure".to_string(),
    }
}

impl QualityService for StubService {
    fn component_measures(
        &self,
        _ctx: &QueryContext,
        metrics: &[String],
    ) -> Result<MeasuresResponse> {
        if self.fail_measures {
            return Err(stub_error("measures"));
        }
        let measures = self
            .project_measures
            .iter()
            .filter(|m| metrics.contains(&m.metric))
            .cloned()
            .collect();
        Ok(MeasuresResponse {
            component: ComponentMeasures {
                key: "proj".to_string(),
                measures,
            },
        })
    }

    fn component_tree(
        &self,
        _ctx: &QueryContext,
        _metrics: &[String],
        page: u32,
        page_size: u32,
        _sort_metric_asc: Option<&str>,
    ) -> Result<TreeResponse> {
        if self.fail_tree {
            return Err(stub_error("tree"));
        }
        let start = ((page - 1) * page_size) as usize;
        let end = (start + page_size as usize).min(self.tree.len());
        let components = if start < self.tree.len() {
            self.tree[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(TreeResponse {
            paging: Paging {
                page_index: page,
                page_size,
                total: self.tree.len() as u32,
            },
            components,
        })
    }

    fn quality_gate(&self, _ctx: &QueryContext) -> Result<GateResponse> {
        if self.fail_gate {
            return Err(stub_error("gate"));
        }
        let project_status = self.gate_status.clone().unwrap_or(ProjectStatus {
            status: "OK".to_string(),
            conditions: vec![],
        });
        Ok(GateResponse { project_status })
    }

    fn search_issues(
        &self,
        _ctx: &QueryContext,
        _types: &str,
        severities: &str,
        page_size: u32,
    ) -> Result<IssuesResponse> {
        if self.fail_issues {
            return Err(stub_error("issues"));
        }
        let allowed: Vec<&str> = severities.split(',').collect();
        let issues: Vec<RawIssue> = self
            .issues
            .iter()
            .filter(|i| allowed.contains(&i.severity.as_str()))
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(IssuesResponse {
            total: issues.len() as u64,
            issues,
        })
    }

    fn source_lines(&self, _ctx: &QueryContext, component_key: &str) -> Result<Vec<SourceLine>> {
        self.source_fetch_log
            .lock()
            .unwrap()
            .push(component_key.to_string());
        if self.fail_sources_for.iter().any(|k| k == component_key) {
            return Err(stub_error("sources"));
        }
        self.sources
            .get(component_key)
            .cloned()
            .ok_or_else(|| stub_error("sources"))
    }

    fn component_exists(&self, project_key: &str) -> Result<bool> {
        Ok(self.existing_keys.iter().any(|k| k == project_key))
    }
}

// ---------------------------------------------------------------------------
// Fixture builders
// ---------------------------------------------------------------------------

pub fn measure(metric: &str, value: &str) -> Measure {
    Measure {
        metric: metric.to_string(),
        value: Some(value.to_string()),
        period: None,
    }
}

pub fn new_code_measure(metric: &str, value: &str) -> Measure {
    Measure {
        metric: metric.to_string(),
        value: None,
        period: Some(PeriodValue {
            index: Some(1),
            value: Some(value.to_string()),
        }),
    }
}

pub fn component(path: &str, coverage: f64, uncovered: u32, new_uncovered: u32) -> TreeComponent {
    TreeComponent {
        key: format!("proj:{path}"),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: Some(path.to_string()),
        language: Some("rust".to_string()),
        measures: vec![
            measure("coverage", &coverage.to_string()),
            measure("uncovered_lines", &uncovered.to_string()),
            new_code_measure("new_uncovered_lines", &new_uncovered.to_string()),
        ],
    }
}

pub fn source_line(line: u32, code: &str, hits: Option<u64>, is_new: bool) -> SourceLine {
    SourceLine {
        line,
        code: Some(code.to_string()),
        line_hits: hits,
        is_new,
    }
}

pub fn issue(key: &str, issue_type: &str, severity: &str) -> RawIssue {
    RawIssue {
        key: key.to_string(),
        rule: "rust:S100".to_string(),
        severity: severity.to_string(),
        component: format!("proj:src/{key}.rs"),
        line: Some(1),
        message: format!("issue {key}"),
        issue_type: issue_type.to_string(),
        debt: None,
    }
}
