//! Findings and the reports that aggregate them.

use std::fmt;

use serde::Serialize;

use crate::error::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fail,
    /// Informational: a check that passed or could not evaluate a construct.
    Pass,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fail => write!(f, "fail"),
            Severity::Pass => write!(f, "pass"),
        }
    }
}

/// Where a finding points: a job, a step within a job, a source line, or a
/// path in the surrounding file tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Location {
    pub fn job(job: &str) -> Self {
        Location {
            job: Some(job.to_string()),
            ..Location::default()
        }
    }

    pub fn step(job: &str, step: &str) -> Self {
        Location {
            job: Some(job.to_string()),
            step: Some(step.to_string()),
            ..Location::default()
        }
    }

    pub fn line(line: usize) -> Self {
        Location {
            line: Some(line),
            ..Location::default()
        }
    }

    pub fn path(path: &str) -> Self {
        Location {
            path: Some(path.to_string()),
            ..Location::default()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(path) = &self.path {
            parts.push(format!("path '{}'", path));
        }
        if let Some(job) = &self.job {
            parts.push(format!("job '{}'", job));
        }
        if let Some(step) = &self.step {
            parts.push(format!("step '{}'", step));
        }
        if let Some(line) = self.line {
            parts.push(format!("line {}", line));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Finding {
    pub fn fail(rule: &'static str, message: impl Into<String>) -> Self {
        Finding {
            rule,
            severity: Severity::Fail,
            message: message.into(),
            location: None,
        }
    }

    pub fn pass(rule: &'static str, message: impl Into<String>) -> Self {
        Finding {
            rule,
            severity: Severity::Pass,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Fail
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "[{}] {}: {} ({})",
                self.rule, self.severity, self.message, loc
            ),
            None => write!(f, "[{}] {}: {}", self.rule, self.severity, self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Evaluated,
    LoadFailed,
}

/// All findings for one validated input. Findings are kept in rule-set
/// evaluation order and are never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    source: String,
    kind: ReportKind,
    passed: bool,
    findings: Vec<Finding>,
}

impl ValidationReport {
    /// Merge per-rule-set findings, preserving their order.
    pub fn aggregate(
        source: impl Into<String>,
        rule_sets: impl IntoIterator<Item = Vec<Finding>>,
    ) -> Self {
        let findings: Vec<Finding> = rule_sets.into_iter().flatten().collect();
        let passed = !findings.iter().any(Finding::is_failure);
        ValidationReport {
            source: source.into(),
            kind: ReportKind::Evaluated,
            passed,
            findings,
        }
    }

    pub fn load_failed(source: impl Into<String>, error: &LoadError) -> Self {
        ValidationReport {
            source: source.into(),
            kind: ReportKind::LoadFailed,
            passed: false,
            findings: vec![error.to_finding()],
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_failure())
    }

    pub fn findings_for(&self, rule: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.rule == rule).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Process exit status for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitStatus {
    Success,
    RuleFailures,
    LoadFailures,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::RuleFailures => 1,
            ExitStatus::LoadFailures => 2,
        }
    }
}

/// Reports for every document in a repository plus the file-tree scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub documents: Vec<ValidationReport>,
    pub tree: Option<ValidationReport>,
}

impl BatchReport {
    pub fn reports(&self) -> impl Iterator<Item = &ValidationReport> {
        self.documents.iter().chain(self.tree.iter())
    }

    pub fn passed(&self) -> bool {
        self.reports().all(ValidationReport::passed)
    }

    /// Load-level failures outrank rule failures so callers can branch on
    /// severity.
    pub fn exit_status(&self) -> ExitStatus {
        if self
            .documents
            .iter()
            .any(|r| r.kind() == ReportKind::LoadFailed)
        {
            ExitStatus::LoadFailures
        } else if self.passed() {
            ExitStatus::Success
        } else {
            ExitStatus::RuleFailures
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
