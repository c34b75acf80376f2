//! Quality-gate evaluation: fetch gate conditions and normalize them into a
//! pass/fail summary.

use crate::client::{GateCondition, QualityService};
use crate::context::QueryContext;
use crate::error::Result;
use crate::model::{Condition, QualityGateInfo};

/// Fetch and normalize the quality gate for the change.
pub fn fetch_quality_gate(svc: &dyn QualityService, ctx: &QueryContext) -> Result<QualityGateInfo> {
    let resp = svc.quality_gate(ctx)?;
    let status = resp.project_status.status;

    let conditions: Vec<Condition> = resp
        .project_status
        .conditions
        .iter()
        .map(normalize_condition)
        .collect();
    let failed_conditions: Vec<Condition> =
        conditions.iter().filter(|c| c.failed).cloned().collect();

    Ok(QualityGateInfo {
        passed: status == "OK",
        status,
        conditions,
        failed_conditions,
    })
}

fn normalize_condition(raw: &GateCondition) -> Condition {
    Condition {
        display_name: display_metric_name(&raw.metric_key),
        metric_key: raw.metric_key.clone(),
        comparator: raw.comparator.clone(),
        threshold: raw.error_threshold.clone().unwrap_or_default(),
        actual_value: raw.actual_value.clone().unwrap_or_default(),
        failed: raw.status == "ERROR",
        on_new_code: raw.period_index.is_some_and(|i| i != 0),
    }
}

/// Human-readable name for a metric key, e.g. `new_coverage` → "New Coverage".
#[must_use]
pub fn display_metric_name(metric_key: &str) -> String {
    metric_key
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(status: &str, metric: &str, period_index: Option<u32>) -> GateCondition {
        GateCondition {
            status: status.to_string(),
            metric_key: metric.to_string(),
            comparator: "LT".to_string(),
            error_threshold: Some("80".to_string()),
            actual_value: Some("62.1".to_string()),
            period_index,
        }
    }

    #[test]
    fn test_error_status_marks_condition_failed() {
        let c = normalize_condition(&condition("ERROR", "new_coverage", Some(1)));
        assert!(c.failed);
        assert!(c.on_new_code);
        assert_eq!(c.threshold, "80");
        assert_eq!(c.actual_value, "62.1");
        assert_eq!(c.display_name, "New Coverage");
    }

    #[test]
    fn test_warn_status_is_not_a_failure() {
        let c = normalize_condition(&condition("WARN", "code_smells", None));
        assert!(!c.failed);
        assert!(!c.on_new_code);
    }

    #[test]
    fn test_zero_period_index_is_whole_project() {
        let c = normalize_condition(&condition("OK", "coverage", Some(0)));
        assert!(!c.on_new_code);
    }

    #[test]
    fn test_missing_threshold_defaults_empty() {
        let mut raw = condition("OK", "bugs", None);
        raw.error_threshold = None;
        raw.actual_value = None;
        let c = normalize_condition(&raw);
        assert_eq!(c.threshold, "");
        assert_eq!(c.actual_value, "");
    }

    #[test]
    fn test_display_metric_name() {
        assert_eq!(display_metric_name("coverage"), "Coverage");
        assert_eq!(display_metric_name("new_coverage"), "New Coverage");
        assert_eq!(
            display_metric_name("duplicated_lines_density"),
            "Duplicated Lines Density"
        );
    }
}
