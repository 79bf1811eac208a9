//! Embedded-script rules (X001–X003) over `run:` bodies.

use std::sync::LazyLock;

use regex::Regex;

use crate::parse::{Job, Step};
use crate::report::{Finding, Location};
use crate::shell::{self, loops::ShellLoop};

use super::{Rule, RuleContext};

pub const RULES: &[Rule] = &[
    Rule {
        id: "X001",
        summary: "Inline scripts are syntactically well-formed",
        check: x001_script_syntax,
    },
    Rule {
        id: "X002",
        summary: "Polling loops are bounded and exit 0 on success, non-zero on exhaustion",
        check: x002_timeout_loop,
    },
    Rule {
        id: "X003",
        summary: "Scripts use environment files instead of deprecated workflow commands",
        check: x003_output_channel,
    },
];

fn scripts<'a>(ctx: &RuleContext<'a>) -> impl Iterator<Item = (&'a Job, &'a Step, &'a str)> {
    ctx.doc
        .steps()
        .filter_map(|(job, step)| step.script().map(|script| (job, step, script)))
}

fn x001_script_syntax(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for (job, step, script) in scripts(ctx) {
        let location = Location::step(&job.id, &step.label());
        if !shell::is_supported(step.shell.as_deref()) {
            findings.push(
                Finding::pass(
                    "X001",
                    format!(
                        "Scripts for shell '{}' are not analyzed",
                        shell::dialect(step.shell.as_deref())
                    ),
                )
                .at(location),
            );
            continue;
        }
        if let Err(e) = shell::check(script) {
            findings.push(
                Finding::fail("X001", format!("Script syntax error at {}", e)).at(location),
            );
        }
    }
}

// =============================================================================
// X002: TIMEOUT LOOPS
// =============================================================================

#[derive(Debug, Default)]
struct LoopShape {
    polls: bool,
    bounded: bool,
    exits_zero: bool,
    exits_nonzero: bool,
}

/// Polling loops must each be bounded unless the script runs under a
/// `timeout` wrapper.
fn loop_shape(script: &str) -> Option<LoopShape> {
    let commands = shell::commands(script).ok()?;
    let loops = shell::loops::analyze(script).ok()?;
    let polling: Vec<&ShellLoop<'_>> = loops.iter().filter(|l| l.polls).collect();
    let wrapped = commands.iter().any(|c| c.name() == Some("timeout"));

    let mut shape = LoopShape {
        polls: !polling.is_empty(),
        bounded: wrapped || polling.iter().all(|l| l.bounded),
        ..LoopShape::default()
    };

    for cmd in commands.iter().filter(|c| c.name() == Some("exit")) {
        match cmd.arg(0).map(str::parse::<u8>) {
            Some(Ok(0)) => shape.exits_zero = true,
            Some(Ok(_)) => shape.exits_nonzero = true,
            _ => {}
        }
    }
    Some(shape)
}

fn x002_timeout_loop(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for (job, step, script) in scripts(ctx) {
        if !shell::is_supported(step.shell.as_deref()) {
            continue;
        }
        let Some(shape) = loop_shape(script) else {
            continue;
        };
        if !shape.polls {
            continue;
        }

        let mut problems = Vec::new();
        if !shape.bounded {
            problems.push("has no iteration or time bound");
        }
        if !shape.exits_zero {
            problems.push("has no 'exit 0' on success");
        }
        if !shape.exits_nonzero {
            problems.push("has no non-zero exit when the wait is exhausted");
        }
        if !problems.is_empty() {
            findings.push(
                Finding::fail(
                    "X002",
                    format!("Polling loop {}", problems.join("; ")),
                )
                .at(Location::step(&job.id, &step.label())),
            );
        }
    }
}

// =============================================================================
// X003: OUTPUT CHANNEL
// =============================================================================

static WORKFLOW_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::(set-output|save-state|set-env|add-path)\b").unwrap());

fn replacement(command: &str) -> &'static str {
    match command {
        "set-output" => "$GITHUB_OUTPUT",
        "save-state" => "$GITHUB_STATE",
        "set-env" => "$GITHUB_ENV",
        _ => "$GITHUB_PATH",
    }
}

fn x003_output_channel(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for (job, step, script) in scripts(ctx) {
        let code = shell::code_text(script);
        let mut seen: Vec<&str> = Vec::new();
        for cap in WORKFLOW_COMMAND.captures_iter(&code) {
            let command = cap.get(1).map_or("", |m| m.as_str());
            if seen.contains(&command) {
                continue;
            }
            seen.push(command);
            findings.push(
                Finding::fail(
                    "X003",
                    format!(
                        "Deprecated '::{}' workflow command; write to {} instead",
                        command,
                        replacement(command)
                    ),
                )
                .at(Location::step(&job.id, &step.label())),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_shape() {
        let script = "for i in {1..30}; do\n  if check; then\n    exit 0\n  fi\n  sleep 10\ndone\nexit 1\n";
        let shape = loop_shape(script).unwrap();
        assert!(shape.polls && shape.bounded && shape.exits_zero && shape.exits_nonzero);
    }

    #[test]
    fn unbounded_while_loop() {
        let shape = loop_shape("while ! curl -sf \"$URL\"; do\n  sleep 5\ndone\n").unwrap();
        assert!(shape.polls);
        assert!(!shape.bounded);
    }

    #[test]
    fn counter_in_condition_is_a_bound() {
        let script = "n=0\nwhile [ \"$n\" -lt 10 ]; do\n  n=$((n+1))\n  sleep 1\ndone\n";
        assert!(loop_shape(script).unwrap().bounded);
    }

    #[test]
    fn exit_in_comment_does_not_count() {
        let script = "for i in $(seq 1 5); do sleep 1; done\n# exit 0\nexit 3\n";
        let shape = loop_shape(script).unwrap();
        assert!(shape.bounded);
        assert!(!shape.exits_zero);
        assert!(shape.exits_nonzero);
    }
}
