//! Integration tests for structural rules (S001–S007).

#[allow(dead_code)]
mod helpers;

use helpers::*;
use workflow_guard::report::ReportKind;

#[test]
fn terraform_fixture_is_structurally_clean() {
    let report = run(TERRAFORM_PASS);
    for rule in ["S001", "S002", "S003", "S004", "S005", "S006", "S007"] {
        assert_no_finding(&report, rule);
    }
}

#[test]
fn s001_missing_name_is_one_finding() {
    let source = TERRAFORM_PASS.replace("name: Terraform Infrastructure Deploy\n", "");
    let report = run(&source);
    assert_eq!(report.kind(), ReportKind::LoadFailed);
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.rule, "S001");
    assert!(finding.message.contains("name"), "{}", finding.message);
}

#[test]
fn s001_empty_jobs_and_triggers() {
    let report = run("name: Nothing declared\non: {}\njobs: {}\n");
    assert_eq!(failures_for(&report, "S001").len(), 2);
}

#[test]
fn s002_short_or_placeholder_names() {
    for name in ["CI", "Build", "12345678", "  Workflow  ", "untitled"] {
        let source = TERRAFORM_PASS.replace("Terraform Infrastructure Deploy", name);
        assert_has_finding(&run(&source), "S002");
    }
}

#[test]
fn s002_descriptive_name_passes() {
    let source = TERRAFORM_PASS.replace("Terraform Infrastructure Deploy", "Deploy v2");
    assert_no_finding(&run(&source), "S002");
}

#[test]
fn s003_job_without_steps() {
    let report = run(&workflow_with_jobs(
        "lint:\n  runs-on: ubuntu-latest\n  steps: []\n\
         call:\n  uses: org/shared/.github/workflows/lint.yml@v1\n",
    ));
    let findings = failures_for(&report, "S003");
    assert_eq!(findings.len(), 1, "{:#?}", findings);
    assert_eq!(
        findings[0].location.as_ref().and_then(|l| l.job.as_deref()),
        Some("lint")
    );
}

#[test]
fn s004_step_with_both_or_neither() {
    let report = run(&workflow_with_steps(
        "- uses: actions/checkout@v4\n  run: echo both\n- name: Empty step\n- run: echo fine\n",
    ));
    assert_eq!(failures_for(&report, "S004").len(), 2);
}

#[test]
fn s005_missing_runs_on() {
    let report = run(&workflow_with_jobs("build:\n  steps:\n    - run: echo ok\n"));
    assert_has_finding(&report, "S005");
}

#[test]
fn s006_unknown_needs() {
    let report = run(&workflow_with_jobs(
        "deploy:\n  needs: [build]\n  runs-on: ubuntu-latest\n  steps:\n    - run: echo ok\n",
    ));
    let findings = failures_for(&report, "S006");
    assert_eq!(findings.len(), 1);
    assert!(findings[0].message.contains("'build'"));
}

#[test]
fn s007_needs_cycle() {
    let report = run(&workflow_with_jobs(
        "a:\n  needs: b\n  runs-on: x\n  steps:\n    - run: echo a\n\
         b:\n  needs: a\n  runs-on: x\n  steps:\n    - run: echo b\n",
    ));
    assert_has_finding(&report, "S007");
    assert_no_finding(&report, "S006");
}

#[test]
fn structural_checks_do_not_short_circuit() {
    let report = run("name: CI\non: {}\njobs:\n  broken:\n    steps: []\n");
    for rule in ["S001", "S002", "S003", "S005"] {
        assert_has_finding(&report, rule);
    }
}
