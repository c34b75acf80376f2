//! Project key discovery: map a repository to its quality-service project
//! key by probing a small set of conventional key shapes.

use log::debug;

use crate::client::QualityService;
use crate::error::{CovgateError, Result};

/// Resolves the quality-service project key for a repository. Failure here
/// is fatal to report generation.
pub trait ProjectKeyDiscovery {
    fn discover(&self, workspace: &str, repo: &str, commit: Option<&str>) -> Result<String>;
}

/// Probes conventional key shapes against the server, in order:
/// `{workspace}_{repo}`, `{workspace}:{repo}`, `{repo}`.
pub struct CandidateProbe<'a> {
    svc: &'a dyn QualityService,
}

impl<'a> CandidateProbe<'a> {
    #[must_use]
    pub fn new(svc: &'a dyn QualityService) -> Self {
        Self { svc }
    }
}

impl ProjectKeyDiscovery for CandidateProbe<'_> {
    fn discover(&self, workspace: &str, repo: &str, _commit: Option<&str>) -> Result<String> {
        for candidate in candidate_keys(workspace, repo) {
            debug!("probing project key candidate '{candidate}'");
            if self.svc.component_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(CovgateError::ProjectKeyNotFound {
            workspace: workspace.to_string(),
            repo: repo.to_string(),
        })
    }
}

fn candidate_keys(workspace: &str, repo: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    if !workspace.is_empty() {
        candidates.push(format!("{workspace}_{repo}"));
        candidates.push(format!("{workspace}:{repo}"));
    }
    candidates.push(repo.to_string());
    candidates
}
