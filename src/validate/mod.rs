//! Rule engine.
//!
//! Each rule set is a static slice of rules. Every rule reads the loaded
//! document and the rule configuration and appends findings; rules never
//! short-circuit one another, so one run reports every violation.

pub mod classify;
pub mod predicate;
pub mod script;
pub mod security;
pub mod semantic;
pub mod structural;
pub mod tree;

use serde::Serialize;
use tracing::debug;

use crate::config::RuleConfig;
use crate::parse::{self, WorkflowDocument};
use crate::report::{Finding, ValidationReport};
use crate::tree::FileTree;

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub doc: &'a WorkflowDocument,
    pub config: &'a RuleConfig,
}

pub type Check = fn(&RuleContext<'_>, &mut Vec<Finding>);

pub struct Rule {
    pub id: &'static str,
    pub summary: &'static str,
    pub check: Check,
}

pub struct RuleSet {
    pub name: &'static str,
    pub rules: &'static [Rule],
}

impl RuleSet {
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rule in self.rules {
            (rule.check)(ctx, &mut findings);
        }
        debug!(
            rule_set = self.name,
            findings = findings.len(),
            "rule set evaluated"
        );
        findings
    }
}

/// Document rule sets, in evaluation (and reporting) order.
pub static RULE_SETS: [RuleSet; 4] = [
    RuleSet {
        name: "structural",
        rules: structural::RULES,
    },
    RuleSet {
        name: "semantic",
        rules: semantic::RULES,
    },
    RuleSet {
        name: "script",
        rules: script::RULES,
    },
    RuleSet {
        name: "security",
        rules: security::RULES,
    },
];

/// Identifier and summary of a rule, as exposed to callers that list rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    pub id: &'static str,
    pub rule_set: &'static str,
    pub summary: &'static str,
}

/// Every rule, including the file-tree scan, in evaluation order.
pub fn rules() -> Vec<RuleInfo> {
    RULE_SETS
        .iter()
        .flat_map(|set| {
            set.rules.iter().map(move |rule| RuleInfo {
                id: rule.id,
                rule_set: set.name,
                summary: rule.summary,
            })
        })
        .chain(std::iter::once(RuleInfo {
            id: tree::SECRET_FILE_RULE,
            rule_set: "security",
            summary: tree::SECRET_FILE_SUMMARY,
        }))
        .collect()
}

/// Run every rule set against an already-loaded document.
pub fn validate_document(
    label: &str,
    doc: &WorkflowDocument,
    config: &RuleConfig,
) -> ValidationReport {
    let ctx = RuleContext { doc, config };
    debug!(document = label, jobs = doc.jobs.len(), "validating document");
    ValidationReport::aggregate(label, RULE_SETS.iter().map(|set| set.evaluate(&ctx)))
}

/// Load and validate one document. A load failure yields a `load-failed`
/// report whose only finding is the load error.
pub fn validate_source(label: &str, source: &str, config: &RuleConfig) -> ValidationReport {
    match parse::load(source) {
        Ok(doc) => validate_document(label, &doc, config),
        Err(e) => {
            debug!(document = label, error = %e, "document failed to load");
            ValidationReport::load_failed(label, &e)
        }
    }
}

/// Like `validate_source`, with the file-tree scan appended to the
/// document's findings.
pub fn validate_source_with_tree(
    label: &str,
    source: &str,
    file_tree: &FileTree,
    config: &RuleConfig,
) -> ValidationReport {
    let doc = match parse::load(source) {
        Ok(doc) => doc,
        Err(e) => return ValidationReport::load_failed(label, &e),
    };
    let ctx = RuleContext { doc: &doc, config };
    let mut sets: Vec<Vec<Finding>> = RULE_SETS.iter().map(|set| set.evaluate(&ctx)).collect();
    sets.push(tree::scan(file_tree, config));
    ValidationReport::aggregate(label, sets)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn rule_ids_are_unique() {
        let all = rules();
        let ids: HashSet<&str> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), all.len());
    }

    #[test]
    fn rule_sets_evaluate_in_declared_order() {
        let names: Vec<&str> = RULE_SETS.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["structural", "semantic", "script", "security"]);
    }
}
