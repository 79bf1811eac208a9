//! Integration tests for semantic rules (M001–M006).

#[allow(dead_code)]
mod helpers;

use helpers::*;
use workflow_guard::RuleConfig;

// =============================================================================
// M001: init ordering
// =============================================================================

#[test]
fn m001_plan_before_init() {
    let report = run(&workflow_with_steps(
        "- name: Terraform Plan\n  run: terraform plan\n- name: Terraform Init\n  run: terraform init\n",
    ));
    let findings = failures_for(&report, "M001");
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("'Terraform Plan'"), "{}", findings[0].message);
    assert!(findings[0].message.contains("'Terraform Init'"), "{}", findings[0].message);
}

#[test]
fn m001_one_finding_per_job() {
    let report = run(&workflow_with_steps(
        "- run: terraform validate\n- run: terraform plan\n- run: terraform init\n",
    ));
    assert_eq!(failures_for(&report, "M001").len(), 1);
}

#[test]
fn m001_commands_within_one_script() {
    let report = run(&workflow_with_script("terraform plan\nterraform init\n", None));
    assert_has_finding(&report, "M001");
}

#[test]
fn m001_job_without_init_is_not_ordered() {
    let report = run(&workflow_with_steps("- run: terraform plan\n"));
    assert_no_finding(&report, "M001");
}

// =============================================================================
// M002: branch gating
// =============================================================================

#[test]
fn m002_removing_the_gate_adds_a_finding() {
    let ungated = run(&terraform_with_apply_condition(""));
    let findings = failures_for(&ungated, "M002");
    assert_eq!(findings.len(), 1);

    let gated = run(&terraform_with_apply_condition(
        "github.ref == 'refs/heads/main'",
    ));
    assert_no_finding(&gated, "M002");
}

#[test]
fn m002_feature_branch_disjunction() {
    let report = run(&terraform_with_apply_condition(
        "github.ref == 'refs/heads/main' || startsWith(github.ref, 'refs/heads/feature/')",
    ));
    assert_eq!(failures_for(&report, "M002").len(), 1);
}

#[test]
fn m002_branch_case_must_match() {
    let report = run(&terraform_with_apply_condition(
        "github.ref == 'refs/heads/MAIN'",
    ));
    assert_eq!(failures_for(&report, "M002").len(), 1);
}

#[test]
fn m002_step_level_gate() {
    let report = run(&workflow_with_steps(
        "- run: terraform init\n\
         - name: Apply\n  if: ${{ github.ref_name == 'main' }}\n  run: terraform apply -auto-approve\n",
    ));
    assert_no_finding(&report, "M002");
}

#[test]
fn m002_respects_configured_branch() {
    let source = terraform_with_apply_condition("github.ref == 'refs/heads/release'");
    assert_has_finding(&run(&source), "M002");

    let config = RuleConfig {
        protected_branch: "release".into(),
        ..RuleConfig::default()
    };
    let report = run_with(&source, &config);
    assert_no_finding(&report, "M002");
}

#[test]
fn m002_unparsable_predicate() {
    let report = run(&terraform_with_apply_condition("(github.ref == 'refs/heads/main'"));
    let findings = failures_for(&report, "M002");
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("Cannot parse"), "{}", findings[0].message);
}

#[test]
fn m002_destroy_and_wrapper_actions_are_irreversible() {
    let report = run(&workflow_with_steps(
        "- run: terraform destroy -auto-approve\n- uses: dflook/terraform-apply@v1\n",
    ));
    assert_eq!(failures_for(&report, "M002").len(), 2);
}

// =============================================================================
// M003 / M004: required declarations
// =============================================================================

#[test]
fn m003_missing_variables_are_reported_individually() {
    let source = TERRAFORM_PASS
        .replace("  AWS_REGION: us-east-1\n", "")
        .replace("  TF_LOG: INFO\n", "");
    let findings_report = run(&source);
    let findings = failures_for(&findings_report, "M003");
    assert_eq!(findings.len(), 2);
    assert!(findings[0].message.contains("AWS_REGION"));
    assert!(findings[1].message.contains("TF_LOG"));
}

#[test]
fn m003_job_level_declarations_must_cover_every_job() {
    let both = run(&format!(
        "name: Job scoped env\non: push\njobs:\n{}{}",
        "  a:\n    runs-on: x\n    env: {AWS_REGION: us-east-1, TF_LOG: INFO}\n    steps:\n      - run: echo a\n",
        "  b:\n    runs-on: x\n    env: {AWS_REGION: us-east-1, TF_LOG: INFO}\n    steps:\n      - run: echo b\n",
    ));
    assert_no_finding(&both, "M003");

    let one = run(&format!(
        "name: Job scoped env\non: push\njobs:\n{}{}",
        "  a:\n    runs-on: x\n    env: {AWS_REGION: us-east-1, TF_LOG: INFO}\n    steps:\n      - run: echo a\n",
        "  b:\n    runs-on: x\n    steps:\n      - run: echo b\n",
    ));
    assert_eq!(failures_for(&one, "M003").len(), 2);
}

#[test]
fn m004_empty_tool_list_passes_trivially() {
    assert_no_finding(&run(TERRAFORM_PASS), "M004");
}

#[test]
fn m004_required_tools() {
    let config = RuleConfig::default().with_required_tools(["tfsec", "zap"]);
    assert_no_finding(&run_with(DEPLOY_WITH_HEALTH_CHECK, &config), "M004");

    let report = run_with(TERRAFORM_PASS, &config);
    let findings = failures_for(&report, "M004");
    assert_eq!(findings.len(), 2);
    assert!(findings[0].message.contains("'tfsec'"));
}

// =============================================================================
// M005 / M006
// =============================================================================

#[test]
fn m005_upload_without_path() {
    let report = run(&workflow_with_steps(
        "- uses: actions/upload-artifact@v4\n  with:\n    name: report\n",
    ));
    let findings = failures_for(&report, "M005");
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("with.path"));
}

#[test]
fn m006_push_filter_excludes_protected_branch() {
    let source = TERRAFORM_PASS.replacen("branches: [main]", "branches: [develop]", 1);
    assert_has_finding(&run(&source), "M006");

    let ignored = TERRAFORM_PASS.replacen("branches: [main]", "branches-ignore: [main]", 1);
    assert_has_finding(&run(&ignored), "M006");
}

#[test]
fn m006_ignores_workflows_without_irreversible_steps() {
    let source = workflow_with_steps("- run: terraform plan\n")
        .replace("branches: [main]", "branches: [develop]");
    assert_no_finding(&run(&source), "M006");
}
