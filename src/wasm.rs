//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::config::RuleConfig;
use crate::report::{Finding, ReportKind, ValidationReport};

/// Validate one workflow document. `config_toml` overrides the default rule
/// configuration. Returns `{ status: "report", ... }` or
/// `{ status: "config-error", message }`.
#[wasm_bindgen]
pub fn validate_workflow(yaml: &str, config_toml: Option<String>) -> JsValue {
    let result = validate_workflow_inner(yaml, config_toml.as_deref());
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_workflow_inner(yaml: &str, config_toml: Option<&str>) -> ValidateResult {
    let config = match config_toml {
        Some(toml) => match RuleConfig::from_toml_str(toml) {
            Ok(config) => config,
            Err(e) => {
                return ValidateResult::ConfigError {
                    message: e.to_string(),
                };
            }
        },
        None => RuleConfig::default(),
    };

    let report = crate::validate::validate_source("workflow", yaml, &config);
    ValidateResult::Report(ReportDto::from(&report))
}

/// Every rule id with its rule set and summary.
#[wasm_bindgen]
pub fn list_rules() -> JsValue {
    serde_wasm_bindgen::to_value(&crate::validate::rules()).unwrap_or(JsValue::NULL)
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize)]
struct FindingDto {
    rule: String,
    severity: String,
    message: String,
    job: Option<String>,
    step: Option<String>,
    line: Option<usize>,
}

impl From<&Finding> for FindingDto {
    fn from(f: &Finding) -> Self {
        let location = f.location.clone().unwrap_or_default();
        FindingDto {
            rule: f.rule.to_string(),
            severity: f.severity.to_string(),
            message: f.message.clone(),
            job: location.job,
            step: location.step,
            line: location.line,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ReportDto {
    passed: bool,
    load_failed: bool,
    findings: Vec<FindingDto>,
}

impl From<&ValidationReport> for ReportDto {
    fn from(r: &ValidationReport) -> Self {
        ReportDto {
            passed: r.passed(),
            load_failed: r.kind() == ReportKind::LoadFailed,
            findings: r.findings().iter().map(FindingDto::from).collect(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum ValidateResult {
    Report(ReportDto),
    ConfigError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_config_is_reported_not_panicked() {
        let result = validate_workflow_inner("name: x", Some("protected_branch = 3"));
        assert!(matches!(result, ValidateResult::ConfigError { .. }));
    }

    #[test]
    fn load_failure_is_a_report() {
        let ValidateResult::Report(report) = validate_workflow_inner("jobs: [", None) else {
            panic!("expected a report");
        };
        assert!(report.load_failed);
        assert!(!report.passed);
        assert_eq!(report.findings[0].rule, "P001");
    }
}
