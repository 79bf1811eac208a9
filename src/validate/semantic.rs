//! Semantic rules (M001–M006): ordering, branch gating and declarations the
//! deployment policy requires.

use regex::Regex;

use crate::parse::{Job, Step, Trigger};
use crate::report::{Finding, Location};

use super::classify::{self, StateCommand};
use super::predicate;
use super::{Rule, RuleContext};

pub const RULES: &[Rule] = &[
    Rule {
        id: "M001",
        summary: "State initialization precedes every step that reads or changes state",
        check: m001_init_ordering,
    },
    Rule {
        id: "M002",
        summary: "Irreversible steps run only on the protected branch",
        check: m002_branch_gating,
    },
    Rule {
        id: "M003",
        summary: "Required environment variables are declared",
        check: m003_required_env,
    },
    Rule {
        id: "M004",
        summary: "Required scanning tools are referenced",
        check: m004_required_tools,
    },
    Rule {
        id: "M005",
        summary: "Uploaded artifacts declare a name and a path",
        check: m005_artifact_inputs,
    },
    Rule {
        id: "M006",
        summary: "Push filters do not exclude the protected branch",
        check: m006_trigger_reaches_protected_branch,
    },
];

// =============================================================================
// M001: ORDERING
// =============================================================================

fn m001_init_ordering(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for job in &ctx.doc.jobs {
        if let Some(finding) = init_ordering(job) {
            findings.push(finding);
        }
    }
}

/// The first state command issued before the job's first `init`, if any.
fn init_ordering(job: &Job) -> Option<Finding> {
    let commands: Vec<(&Step, StateCommand)> = job
        .steps
        .iter()
        .flat_map(|step| {
            classify::state_commands(step)
                .into_iter()
                .map(move |cmd| (step, cmd))
        })
        .collect();

    let init_pos = commands
        .iter()
        .position(|(_, cmd)| *cmd == StateCommand::Init)?;
    let (init_step, _) = commands[init_pos];
    let (early_step, early_cmd) = commands[..init_pos].first().copied()?;

    let message = if early_step.index == init_step.index {
        format!(
            "Step '{}' runs '{}' before 'init'",
            early_step.label(),
            early_cmd.as_str()
        )
    } else {
        format!(
            "Step '{}' runs '{}' before the 'init' step '{}'",
            early_step.label(),
            early_cmd.as_str(),
            init_step.label()
        )
    };
    Some(Finding::fail("M001", message).at(Location::step(&job.id, &early_step.label())))
}

// =============================================================================
// M002: BRANCH GATING
// =============================================================================

fn m002_branch_gating(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let branch = ctx.config.protected_branch.as_str();

    for (job, step) in ctx.doc.steps() {
        if !classify::is_irreversible(step) {
            continue;
        }
        let location = Location::step(&job.id, &step.label());

        let mut gated = false;
        let mut unparsed = Vec::new();
        for condition in [&step.condition, &job.condition].into_iter().flatten() {
            match predicate::admits_only_branch(condition, branch) {
                Ok(restricted) => gated |= restricted,
                Err(e) => unparsed.push(format!("Cannot parse predicate '{}': {}", condition, e)),
            }
        }

        if gated {
            continue;
        }
        if !unparsed.is_empty() {
            for message in unparsed {
                findings.push(Finding::fail("M002", message).at(location.clone()));
            }
        } else {
            let message = match &step.condition {
                Some(condition) => format!(
                    "Irreversible step predicate '{}' admits branches other than '{}'",
                    condition, branch
                ),
                None => format!(
                    "Irreversible step is not gated to branch '{}'",
                    branch
                ),
            };
            findings.push(Finding::fail("M002", message).at(location));
        }
    }
}

// =============================================================================
// M003 / M004: REQUIRED DECLARATIONS
// =============================================================================

/// Declared at workflow scope, or in the env of every job that runs steps.
fn m003_required_env(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let step_jobs: Vec<&Job> = ctx
        .doc
        .jobs
        .iter()
        .filter(|j| !j.steps.is_empty())
        .collect();

    for var in &ctx.config.required_env {
        let declared = ctx.doc.env.contains_key(var)
            || (!step_jobs.is_empty() && step_jobs.iter().all(|j| j.env.contains_key(var)));
        if !declared {
            findings.push(Finding::fail(
                "M003",
                format!("Required environment variable '{}' is not declared", var),
            ));
        }
    }
}

fn m004_required_tools(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for tool in &ctx.config.required_tools {
        let needle = tool.to_lowercase();
        let referenced = ctx
            .doc
            .steps()
            .any(|(_, step)| step_mentions(step, &needle));
        if !referenced {
            findings.push(Finding::fail(
                "M004",
                format!("No step references required tool '{}'", tool),
            ));
        }
    }
}

fn step_mentions(step: &Step, needle: &str) -> bool {
    let action = step.action().map(|a| a.raw.as_str());
    [action, step.script(), step.name.as_deref()]
        .into_iter()
        .flatten()
        .chain(step.with.values().map(String::as_str))
        .any(|text| text.to_lowercase().contains(needle))
}

// =============================================================================
// M005: ARTIFACTS
// =============================================================================

fn m005_artifact_inputs(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for (job, step) in ctx.doc.steps() {
        let Some(action) = step.action() else {
            continue;
        };
        if !action.target.to_ascii_lowercase().ends_with("upload-artifact") {
            continue;
        }
        let missing: Vec<&str> = ["name", "path"]
            .into_iter()
            .filter(|key| step.with.get(*key).is_none_or(|v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            findings.push(
                Finding::fail(
                    "M005",
                    format!("Artifact upload is missing with.{}", missing.join(" and with.")),
                )
                .at(Location::step(&job.id, &step.label())),
            );
        }
    }
}

// =============================================================================
// M006: TRIGGER CONSISTENCY
// =============================================================================

fn m006_trigger_reaches_protected_branch(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let has_irreversible = ctx
        .doc
        .steps()
        .any(|(_, step)| classify::is_irreversible(step));
    if !has_irreversible {
        return;
    }
    let Some(push) = ctx.doc.triggers.get("push") else {
        return;
    };

    let branch = ctx.config.protected_branch.as_str();
    if !push_reaches(push, branch) {
        findings.push(Finding::fail(
            "M006",
            format!(
                "Push filters exclude '{}', so irreversible steps gated to it never run on push",
                branch
            ),
        ));
    }
}

fn push_reaches(push: &Trigger, branch: &str) -> bool {
    if push.branches_ignore.iter().any(|p| glob_matches(p, branch)) {
        return false;
    }
    if push.branches.is_empty() {
        return true;
    }
    // Later patterns override earlier ones; `!` negates.
    let mut included = false;
    for pattern in &push.branches {
        match pattern.strip_prefix('!') {
            Some(negated) if glob_matches(negated, branch) => included = false,
            Some(_) => {}
            None if glob_matches(pattern, branch) => included = true,
            None => {}
        }
    }
    included
}

/// Branch filter glob: `**` spans `/`, `*` does not, `?` is one character.
fn glob_matches(pattern: &str, branch: &str) -> bool {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                re.push_str(".*");
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).is_ok_and(|re| re.is_match(branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_globs() {
        assert!(glob_matches("main", "main"));
        assert!(glob_matches("ma*", "main"));
        assert!(!glob_matches("feature/*", "feature/a/b"));
        assert!(glob_matches("feature/**", "feature/a/b"));
        assert!(glob_matches("release-?", "release-1"));
    }

    #[test]
    fn negated_filter_excludes() {
        let mut push = Trigger::event("push");
        push.branches = vec!["**".into(), "!main".into()];
        assert!(!push_reaches(&push, "main"));
        push.branches.push("main".into());
        assert!(push_reaches(&push, "main"));
    }

    #[test]
    fn ignore_filter_excludes() {
        let mut push = Trigger::event("push");
        push.branches_ignore = vec!["main".into()];
        assert!(!push_reaches(&push, "main"));
    }
}
