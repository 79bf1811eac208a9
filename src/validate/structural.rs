//! Structural rules (S001–S007): presence and shape of the document.

use crate::error::MANDATORY_KEYS_RULE;
use crate::parse::{NeedsGraph, StepBody, StepShape};
use crate::report::{Finding, Location};

use super::{Rule, RuleContext};

pub const RULES: &[Rule] = &[
    Rule {
        id: MANDATORY_KEYS_RULE,
        summary: "Workflow declares a name, at least one trigger and at least one job",
        check: s001_mandatory_content,
    },
    Rule {
        id: "S002",
        summary: "Workflow name is descriptive",
        check: s002_descriptive_name,
    },
    Rule {
        id: "S003",
        summary: "Every job runs at least one step",
        check: s003_job_has_steps,
    },
    Rule {
        id: "S004",
        summary: "Every step either uses an action or runs a script",
        check: s004_step_shape,
    },
    Rule {
        id: "S005",
        summary: "Every job declares runs-on",
        check: s005_runs_on_declared,
    },
    Rule {
        id: "S006",
        summary: "needs references existing jobs",
        check: s006_needs_exist,
    },
    Rule {
        id: "S007",
        summary: "Job dependencies are acyclic",
        check: s007_needs_acyclic,
    },
];

fn s001_mandatory_content(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    if ctx.doc.triggers.is_empty() {
        findings.push(Finding::fail(
            MANDATORY_KEYS_RULE,
            "Workflow must declare at least one trigger under 'on'",
        ));
    }
    if ctx.doc.jobs.is_empty() {
        findings.push(Finding::fail(
            MANDATORY_KEYS_RULE,
            "Workflow must declare at least one job under 'jobs'",
        ));
    }
}

/// Longer than five characters, at least one letter, and not a known
/// placeholder default.
fn s002_descriptive_name(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let name = ctx.doc.name.trim();
    let problem = if name.is_empty() {
        Some("is empty")
    } else if name.chars().count() <= 5 {
        Some("is too short (5 characters or fewer)")
    } else if !name.chars().any(char::is_alphabetic) {
        Some("contains no letters")
    } else if ctx.config.is_placeholder_name(name) {
        Some("is a placeholder default")
    } else {
        None
    };

    if let Some(problem) = problem {
        findings.push(Finding::fail(
            "S002",
            format!("Workflow name '{}' {}", name, problem),
        ));
    }
}

fn s003_job_has_steps(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for job in &ctx.doc.jobs {
        if !job.is_reusable_call() && job.steps.is_empty() {
            findings.push(
                Finding::fail("S003", format!("Job '{}' has no steps", job.id))
                    .at(Location::job(&job.id)),
            );
        }
    }
}

fn s004_step_shape(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for (job, step) in ctx.doc.steps() {
        let StepBody::Malformed(shape) = &step.body else {
            continue;
        };
        let message = match shape {
            StepShape::Both => "Step declares both 'uses' and 'run'",
            StepShape::Neither => "Step declares neither 'uses' nor 'run'",
        };
        findings.push(Finding::fail("S004", message).at(Location::step(&job.id, &step.label())));
    }
}

fn s005_runs_on_declared(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for job in &ctx.doc.jobs {
        if !job.is_reusable_call() && job.runs_on.is_none() {
            findings.push(
                Finding::fail("S005", format!("Job '{}' does not declare runs-on", job.id))
                    .at(Location::job(&job.id)),
            );
        }
    }
}

fn s006_needs_exist(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let graph = NeedsGraph::build(ctx.doc);
    for unknown in &graph.unknown {
        findings.push(
            Finding::fail(
                "S006",
                format!(
                    "Job '{}' needs unknown job '{}'",
                    unknown.job, unknown.needs
                ),
            )
            .at(Location::job(&unknown.job)),
        );
    }
}

fn s007_needs_acyclic(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let graph = NeedsGraph::build(ctx.doc);
    if let Err(job) = graph.execution_order() {
        findings.push(
            Finding::fail(
                "S007",
                format!("Job '{}' is part of a dependency cycle", job),
            )
            .at(Location::job(job)),
        );
    }
}
