//! Security rules (C001, C003, C004). The file-tree scan (C002) lives in
//! `tree`.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::parse::{ActionRef, ActionSource, Job};
use crate::report::{Finding, Location};
use crate::shell::lexer::line_at;

use super::{Rule, RuleContext};

pub const RULES: &[Rule] = &[
    Rule {
        id: "C001",
        summary: "No literal credentials in the workflow",
        check: c001_credential_literals,
    },
    Rule {
        id: "C003",
        summary: "Actions and reusable workflows are pinned to a commit or version tag",
        check: c003_version_pins,
    },
    Rule {
        id: "C004",
        summary: "Jobs that use the workflow token declare permissions",
        check: c004_token_permissions,
    },
];

// =============================================================================
// C001: CREDENTIAL LITERALS
// =============================================================================

/// Each pattern captures the literal in group 1.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)((?:AKIA|ASIA)[0-9A-Z]{16})").unwrap(),
            "AWS access key id",
        ),
        (
            Regex::new(r#"(?i)aws[_-]?access[_-]?key[_-]?id["']?\s*[:=]\s*["']?([A-Z0-9]{20})\b"#)
                .unwrap(),
            "AWS access key id",
        ),
        (
            Regex::new(
                r#"(?i)aws[_-]?secret[_-]?access[_-]?key["']?\s*[:=]\s*["']?([A-Za-z0-9/+=]{40})"#,
            )
            .unwrap(),
            "AWS secret access key",
        ),
        (
            Regex::new(r"\b(gh[pousr]_[A-Za-z0-9]{36,})\b").unwrap(),
            "GitHub token",
        ),
        (
            Regex::new(r"(?i)\bbearer\s+([A-Za-z0-9\-._~+/]{20,}=*)").unwrap(),
            "bearer token",
        ),
        (
            Regex::new(r"(-----BEGIN (?:[A-Z]+ )*PRIVATE KEY-----)").unwrap(),
            "private key",
        ),
        (
            Regex::new(r#"(?i)\bpassword["']?\s*[:=]\s*["']([^"'\s]{4,})["']"#).unwrap(),
            "password",
        ),
        (
            Regex::new(r#"(?i)\bapi[_-]?key["']?\s*[:=]\s*["']([A-Za-z0-9]{20,})["']"#).unwrap(),
            "API key",
        ),
        (
            Regex::new(r#"(?i)token["']?\s*[:=]\s*["']([A-Za-z0-9_\-]{20,})["']"#).unwrap(),
            "token",
        ),
    ]
});

/// Input or variable names whose value is itself a credential.
static SECRET_KEY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[_-])(?:password|passwd|secret|api[_-]?key|access[_-]?key|token)$")
        .unwrap()
});

fn is_reference(value: &str) -> bool {
    value.contains("${{") || value.contains("secrets.")
}

/// First four characters, then a mask.
fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{}****", prefix)
}

struct CredentialScan<'a> {
    ctx: &'a RuleContext<'a>,
    seen: HashSet<String>,
    findings: Vec<Finding>,
}

impl<'a> CredentialScan<'a> {
    fn report(&mut self, value: &str, what: &str, location: Option<&Location>) {
        let value = value.trim();
        if value.is_empty() || is_reference(value) || self.ctx.config.is_allowed_literal(value) {
            return;
        }
        if !self.seen.insert(value.to_string()) {
            return;
        }
        let finding = Finding::fail("C001", format!("Hardcoded {} '{}'", what, redact(value)));
        self.findings.push(match location {
            Some(location) => finding.at(location.clone()),
            None => finding,
        });
    }

    fn scan_text(&mut self, text: &str, location: Option<&Location>) {
        for (re, what) in SECRET_PATTERNS.iter() {
            for cap in re.captures_iter(text) {
                if let Some(m) = cap.get(1) {
                    self.report(m.as_str(), what, location);
                }
            }
        }
    }

    fn scan_map(&mut self, map: &BTreeMap<String, String>, location: Option<&Location>) {
        for (key, value) in map {
            if SECRET_KEY_NAME.is_match(key) && value.trim().len() >= 8 {
                self.report(value, &format!("value for '{}'", key), location);
            }
            self.scan_text(value, location);
        }
    }

    fn scan_raw(&mut self, source: &str) {
        for (re, what) in SECRET_PATTERNS.iter() {
            for cap in re.captures_iter(source) {
                if let Some(m) = cap.get(1) {
                    let location = Location::line(line_at(source, m.start()));
                    self.report(m.as_str(), what, Some(&location));
                }
            }
        }
    }
}

/// Decoded fields first so findings carry job and step locations; the raw
/// text pass then catches anything the decoded model does not hold.
fn c001_credential_literals(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    let mut scan = CredentialScan {
        ctx,
        seen: HashSet::new(),
        findings: Vec::new(),
    };

    scan.scan_map(&ctx.doc.env, None);
    for job in &ctx.doc.jobs {
        scan.scan_map(&job.env, Some(&Location::job(&job.id)));
        for step in &job.steps {
            let location = Location::step(&job.id, &step.label());
            if let Some(script) = step.script() {
                scan.scan_text(script, Some(&location));
            }
            scan.scan_map(&step.env, Some(&location));
            scan.scan_map(&step.with, Some(&location));
        }
    }
    scan.scan_raw(&ctx.doc.source);

    findings.extend(scan.findings);
}

// =============================================================================
// C003: VERSION PINS
// =============================================================================

static COMMIT_SHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").unwrap());

static VERSION_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?\d+(?:\.\d+){0,2}(?:[-+][0-9A-Za-z.-]+)?$").unwrap()
});

/// Why a reference is not pinned, or `None` when it is.
pub fn pin_problem(action: &ActionRef) -> Option<String> {
    match action.source {
        ActionSource::Local => None,
        ActionSource::Docker => match action.version.as_deref() {
            None => Some("has no tag or digest".into()),
            Some(v) if v.eq_ignore_ascii_case("latest") => Some("uses the mutable 'latest' tag".into()),
            Some(_) => None,
        },
        ActionSource::Repository => match action.version.as_deref() {
            None => Some("has no ref".into()),
            Some(v) if COMMIT_SHA.is_match(v) || VERSION_TAG.is_match(v) => None,
            Some(v) => Some(format!("uses mutable ref '{}'", v)),
        },
    }
}

fn c003_version_pins(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    for job in &ctx.doc.jobs {
        if let Some(problem) = job.uses.as_ref().and_then(pin_problem) {
            findings.push(
                Finding::fail(
                    "C003",
                    format!(
                        "Reusable workflow '{}' {}; pin a commit SHA or version tag",
                        job.uses.as_ref().map_or("", |u| u.raw.as_str()),
                        problem
                    ),
                )
                .at(Location::job(&job.id)),
            );
        }
        for step in &job.steps {
            let Some(action) = step.action() else {
                continue;
            };
            if let Some(problem) = pin_problem(action) {
                findings.push(
                    Finding::fail(
                        "C003",
                        format!(
                            "Action '{}' {}; pin a commit SHA or version tag",
                            action.raw, problem
                        ),
                    )
                    .at(Location::step(&job.id, &step.label())),
                );
            }
        }
    }
}

// =============================================================================
// C004: TOKEN PERMISSIONS
// =============================================================================

static TOKEN_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)github\.token|\bGITHUB_TOKEN\b").unwrap());

fn mentions_token<'a>(mut texts: impl Iterator<Item = &'a str>) -> bool {
    texts.any(|t| TOKEN_USE.is_match(t))
}

fn job_uses_token(job: &Job) -> bool {
    let job_level = job
        .env
        .values()
        .map(String::as_str)
        .chain(job.condition.as_deref());
    let step_level = job.steps.iter().flat_map(|step| {
        step.script()
            .into_iter()
            .chain(step.condition.as_deref())
            .chain(step.env.values().map(String::as_str))
            .chain(step.with.values().map(String::as_str))
    });
    mentions_token(job_level.chain(step_level))
}

fn c004_token_permissions(ctx: &RuleContext<'_>, findings: &mut Vec<Finding>) {
    if ctx.doc.permissions.is_some() {
        return;
    }
    let workflow_env_token = mentions_token(ctx.doc.env.values().map(String::as_str));

    for job in &ctx.doc.jobs {
        if job.permissions.is_some() {
            continue;
        }
        if workflow_env_token || job_uses_token(job) {
            findings.push(
                Finding::fail(
                    "C004",
                    format!(
                        "Job '{}' uses the workflow token but neither it nor the workflow declares permissions",
                        job.id
                    ),
                )
                .at(Location::job(&job.id)),
            );
        }
    }
}
