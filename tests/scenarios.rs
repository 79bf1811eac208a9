//! End-to-end scenarios over whole documents.

#[allow(dead_code)]
mod helpers;

use helpers::*;
use workflow_guard::report::ReportKind;
use workflow_guard::tree::FileTree;
use workflow_guard::{validate, RuleConfig};

#[test]
fn passing_pipeline_has_zero_findings() {
    let tree = FileTree::from_listing([
        ".github/workflows/terraform.yml",
        "infra/main.tf",
        "infra/variables.tf",
        "README.md",
    ]);
    let report = validate::validate_source_with_tree(
        "terraform.yml",
        TERRAFORM_PASS,
        &tree,
        &RuleConfig::default(),
    );
    assert!(report.passed());
    assert!(report.findings().is_empty(), "{:#?}", report.findings());
}

#[test]
fn deploy_with_scanners_passes_with_required_tools() {
    let config = RuleConfig::default().with_required_tools(["tfsec", "zap"]);
    let report = run_with(DEPLOY_WITH_HEALTH_CHECK, &config);
    assert!(report.findings().is_empty(), "{:#?}", report.findings());
}

#[test]
fn validation_is_idempotent() {
    let source = terraform_with_apply_condition("");
    assert_eq!(run(&source), run(&source));
    assert_eq!(run(TERRAFORM_PASS), run(TERRAFORM_PASS));
}

#[test]
fn feature_branch_predicate_fails_only_branch_gating() {
    let report = run(&terraform_with_apply_condition(
        "github.ref == 'refs/heads/main' || startsWith(github.ref, 'refs/heads/feature/')",
    ));
    assert!(!report.passed());
    assert_eq!(report.findings().len(), 1, "{:#?}", report.findings());
    assert_eq!(report.findings()[0].rule, "M002");
}

#[test]
fn missing_trigger_key_fails_loading() {
    let source = TERRAFORM_PASS.replace("on:\n", "triggers:\n");
    let report = run(&source);
    assert_eq!(report.kind(), ReportKind::LoadFailed);
    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].rule, "S001");
    assert!(report.findings()[0].message.contains("on"));
}

#[test]
fn findings_keep_rule_set_order() {
    let report = run(&workflow_with_jobs(
        "deploy:\n  steps:\n    - uses: actions/checkout@main\n    - run: terraform apply\n",
    ));
    let rules: Vec<&str> = report.findings().iter().map(|f| f.rule).collect();
    assert_eq!(rules, vec!["S005", "M002", "C003"]);
}

#[test]
fn rendered_finding() {
    let report = run(&terraform_with_apply_condition(""));
    let finding = &report.findings()[0];
    insta::assert_snapshot!(
        finding.to_string(),
        @"[M002] fail: Irreversible step is not gated to branch 'main' (job 'apply', step 'Terraform Apply')"
    );
}

#[test]
fn report_serializes_to_json() {
    let report = run(&terraform_with_apply_condition(""));
    insta::assert_json_snapshot!(report, @r###"
    {
      "source": "test.yml",
      "kind": "evaluated",
      "passed": false,
      "findings": [
        {
          "rule": "M002",
          "severity": "fail",
          "message": "Irreversible step is not gated to branch 'main'",
          "location": {
            "job": "apply",
            "step": "Terraform Apply"
          }
        }
      ]
    }
    "###);
}
