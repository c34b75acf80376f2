//! Quality-service client: the seam between the report engine and the
//! hosted quality-analysis HTTP API.
//!
//! The engine talks to a [`QualityService`] trait so tests can substitute a
//! stub. [`HttpService`] is the production implementation over `ureq`, with
//! bearer-token auth and typed `serde` deserialization per endpoint. HTTP
//! failures surface the status code and response body; decode failures are
//! reported as such rather than silently zero-filled.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::context::QueryContext;
use crate::error::{CovgateError, Result};

// ---------------------------------------------------------------------------
// API payloads
// ---------------------------------------------------------------------------

/// One measure value attached to a component. Whole-project metrics carry
/// `value`; new-code metrics carry the value inside `period`.
#[derive(Debug, Clone, Deserialize)]
pub struct Measure {
    pub metric: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub period: Option<PeriodValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodValue {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub value: Option<String>,
}

impl Measure {
    /// The raw string value, wherever the service put it.
    #[must_use]
    pub fn raw_value(&self) -> Option<&str> {
        self.value
            .as_deref()
            .or_else(|| self.period.as_ref().and_then(|p| p.value.as_deref()))
    }

    /// Numeric value; missing or unparsable values default to zero. This is
    /// deliberate: components without a measure (e.g. no new code yet) are
    /// reported as 0, not as an error.
    #[must_use]
    pub fn numeric_value(&self) -> f64 {
        self.raw_value()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// `api/measures/component` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasuresResponse {
    pub component: ComponentMeasures,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentMeasures {
    pub key: String,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// `api/measures/component_tree` response (one page).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
    pub paging: Paging,
    #[serde(default)]
    pub components: Vec<TreeComponent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_index: u32,
    pub page_size: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeComponent {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// `api/qualitygates/project_status` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResponse {
    pub project_status: ProjectStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectStatus {
    pub status: String,
    #[serde(default)]
    pub conditions: Vec<GateCondition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCondition {
    pub status: String,
    pub metric_key: String,
    pub comparator: String,
    #[serde(default)]
    pub error_threshold: Option<String>,
    #[serde(default)]
    pub actual_value: Option<String>,
    #[serde(default)]
    pub period_index: Option<u32>,
}

/// `api/issues/search` response.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesResponse {
    pub total: u64,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIssue {
    pub key: String,
    pub rule: String,
    pub severity: String,
    /// Component key of the file the issue is in.
    pub component: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(default)]
    pub debt: Option<String>,
}

/// `api/sources/lines` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesResponse {
    #[serde(default)]
    pub sources: Vec<SourceLine>,
}

/// A single source line with its coverage status. `line_hits` is absent for
/// lines that are not instrumentable.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLine {
    pub line: u32,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub line_hits: Option<u64>,
    #[serde(default)]
    pub is_new: bool,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Typed endpoint surface the report engine consumes. `Sync` because the
/// coverage engine shares the service across its per-batch fetch threads.
pub trait QualityService: Sync {
    /// Fetch measures for the project component itself.
    fn component_measures(&self, ctx: &QueryContext, metrics: &[String])
        -> Result<MeasuresResponse>;

    /// Fetch one page of per-file measures under the project.
    fn component_tree(
        &self,
        ctx: &QueryContext,
        metrics: &[String],
        page: u32,
        page_size: u32,
        sort_metric_asc: Option<&str>,
    ) -> Result<TreeResponse>;

    /// Fetch the quality-gate status for the change.
    fn quality_gate(&self, ctx: &QueryContext) -> Result<GateResponse>;

    /// Fetch issues scoped to the project and change.
    fn search_issues(
        &self,
        ctx: &QueryContext,
        types: &str,
        severities: &str,
        page_size: u32,
    ) -> Result<IssuesResponse>;

    /// Fetch all source lines, with hit counts, for one file component.
    fn source_lines(&self, ctx: &QueryContext, component_key: &str) -> Result<Vec<SourceLine>>;

    /// Whether a component with this key exists on the server.
    fn component_exists(&self, project_key: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `ureq`-backed [`QualityService`] implementation.
pub struct HttpService {
    base_url: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl HttpService {
    /// Create a client for `base_url`. `token` is sent as a bearer
    /// Authorization header when present; anonymous access is allowed.
    #[must_use]
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            agent,
        }
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut req = self.agent.get(&url).set("User-Agent", "covgate");
        if let Some(ref token) = self.token {
            req = req.set("Authorization", &format!("Bearer {token}"));
        }
        for (k, v) in params {
            req = req.query(k, v);
        }

        match req.call() {
            Ok(resp) => resp.into_json().map_err(|source| CovgateError::Decode {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(ureq::Error::Status(status, resp)) => Err(CovgateError::Http {
                endpoint: endpoint.to_string(),
                status,
                body: resp.into_string().unwrap_or_default(),
            }),
            Err(e) => Err(CovgateError::Transport {
                endpoint: endpoint.to_string(),
                source: Box::new(e),
            }),
        }
    }

    /// Component param plus the branch/pullRequest scoping params.
    fn scoped_params<'a>(
        &self,
        ctx: &'a QueryContext,
        component_param: &'a str,
        component_value: &'a str,
    ) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![(component_param, component_value)];
        for (k, v) in &ctx.base_params {
            params.push((k.as_str(), v.as_str()));
        }
        params
    }
}

impl QualityService for HttpService {
    fn component_measures(
        &self,
        ctx: &QueryContext,
        metrics: &[String],
    ) -> Result<MeasuresResponse> {
        let metric_keys = metrics.join(",");
        let mut params = self.scoped_params(ctx, "component", &ctx.project_key);
        params.push(("metricKeys", &metric_keys));
        self.get("api/measures/component", &params)
    }

    fn component_tree(
        &self,
        ctx: &QueryContext,
        metrics: &[String],
        page: u32,
        page_size: u32,
        sort_metric_asc: Option<&str>,
    ) -> Result<TreeResponse> {
        let metric_keys = metrics.join(",");
        let page_str = page.to_string();
        let page_size_str = page_size.to_string();
        let mut params = self.scoped_params(ctx, "component", &ctx.project_key);
        params.push(("metricKeys", &metric_keys));
        params.push(("qualifiers", "FIL"));
        params.push(("p", &page_str));
        params.push(("ps", &page_size_str));
        if let Some(metric) = sort_metric_asc {
            params.push(("s", "metric"));
            params.push(("metricSort", metric));
            params.push(("asc", "true"));
        }
        self.get("api/measures/component_tree", &params)
    }

    fn quality_gate(&self, ctx: &QueryContext) -> Result<GateResponse> {
        let params = self.scoped_params(ctx, "projectKey", &ctx.project_key);
        self.get("api/qualitygates/project_status", &params)
    }

    fn search_issues(
        &self,
        ctx: &QueryContext,
        types: &str,
        severities: &str,
        page_size: u32,
    ) -> Result<IssuesResponse> {
        let page_size_str = page_size.to_string();
        let mut params = self.scoped_params(ctx, "componentKeys", &ctx.project_key);
        params.push(("types", types));
        params.push(("severities", severities));
        params.push(("ps", &page_size_str));
        params.push(("s", "SEVERITY"));
        params.push(("asc", "false"));
        self.get("api/issues/search", &params)
    }

    fn source_lines(&self, ctx: &QueryContext, component_key: &str) -> Result<Vec<SourceLine>> {
        let params = self.scoped_params(ctx, "key", component_key);
        let resp: SourcesResponse = self.get("api/sources/lines", &params)?;
        Ok(resp.sources)
    }

    fn component_exists(&self, project_key: &str) -> Result<bool> {
        #[derive(Deserialize)]
        struct ShowResponse {
            #[allow(dead_code)]
            component: serde_json::Value,
        }
        let result: Result<ShowResponse> =
            self.get("api/components/show", &[("component", project_key)]);
        match result {
            Ok(_) => Ok(true),
            Err(CovgateError::Http { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
