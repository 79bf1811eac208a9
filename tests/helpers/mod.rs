use workflow_guard::parse::{self, WorkflowDocument};
use workflow_guard::report::{Finding, ValidationReport};
use workflow_guard::{validate, RuleConfig};

// =============================================================================
// Fixtures
// =============================================================================

/// Jobs init → validate → plan → apply, apply gated to `main`, every action
/// pinned. Produces zero findings under the default configuration.
pub const TERRAFORM_PASS: &str = include_str!("../fixtures/terraform_pass.yml");

/// Single-job deploy with a health-check polling loop, scanners and an
/// artifact upload. Passes with `tfsec` and `zap` required.
pub const DEPLOY_WITH_HEALTH_CHECK: &str = include_str!("../fixtures/deploy_with_health_check.yml");

/// The job-level predicate on `apply` in `TERRAFORM_PASS`.
pub const APPLY_CONDITION: &str =
    "if: github.ref == 'refs/heads/main' && github.event_name == 'push'";

/// `TERRAFORM_PASS` with the `apply` job predicate replaced. An empty
/// predicate removes the line.
pub fn terraform_with_apply_condition(condition: &str) -> String {
    let replacement = if condition.is_empty() {
        String::new()
    } else {
        format!("if: {}", condition)
    };
    TERRAFORM_PASS.replace(APPLY_CONDITION, &replacement)
}

// =============================================================================
// Workflow builders
// =============================================================================

/// A well-formed workflow around the given `jobs:` body (indented by two
/// spaces per level, starting at job ids).
pub fn workflow_with_jobs(jobs: &str) -> String {
    format!(
        "name: Infrastructure Pipeline\n\
         on:\n  push:\n    branches: [main]\n\
         env:\n  AWS_REGION: us-east-1\n  TF_LOG: INFO\n\
         jobs:\n{}",
        indent(jobs, 2)
    )
}

/// A workflow with a single `build` job running the given steps.
pub fn workflow_with_steps(steps: &str) -> String {
    workflow_with_jobs(&format!(
        "build:\n  runs-on: ubuntu-latest\n  steps:\n{}",
        indent(steps, 4)
    ))
}

/// A workflow with one step running `script` under an optional shell.
pub fn workflow_with_script(script: &str, shell: Option<&str>) -> String {
    let mut step = String::from("- name: Inline script\n");
    if let Some(shell) = shell {
        step.push_str(&format!("  shell: {}\n", shell));
    }
    step.push_str("  run: |\n");
    step.push_str(&indent(script, 4));
    workflow_with_steps(&step)
}

fn indent(text: &str, spaces: usize) -> String {
    let pad = " ".repeat(spaces);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::from("\n")
            } else {
                format!("{}{}\n", pad, line)
            }
        })
        .collect()
}

// =============================================================================
// Running rules
// =============================================================================

pub fn load(source: &str) -> WorkflowDocument {
    parse::load(source).expect("fixture should load")
}

pub fn run(source: &str) -> ValidationReport {
    validate::validate_source("test.yml", source, &RuleConfig::default())
}

pub fn run_with(source: &str, config: &RuleConfig) -> ValidationReport {
    validate::validate_source("test.yml", source, config)
}

// =============================================================================
// Assertions
// =============================================================================

pub fn assert_has_finding(report: &ValidationReport, rule: &str) {
    assert!(
        report.failures().any(|f| f.rule == rule),
        "Expected finding {}, got: {:#?}",
        rule,
        report.findings()
    );
}

pub fn assert_no_finding(report: &ValidationReport, rule: &str) {
    assert!(
        !report.failures().any(|f| f.rule == rule),
        "Did not expect finding {}, but got: {:#?}",
        rule,
        report.findings()
    );
}

pub fn failures_for<'a>(report: &'a ValidationReport, rule: &str) -> Vec<&'a Finding> {
    report.failures().filter(|f| f.rule == rule).collect()
}
