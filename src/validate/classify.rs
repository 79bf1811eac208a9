//! Classification of steps that touch infrastructure-as-code state.

use std::sync::LazyLock;

use regex::Regex;

use crate::parse::types::{Step, StepBody};
use crate::shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCommand {
    Init,
    Validate,
    Plan,
    Apply,
    Destroy,
    Import,
    Refresh,
    State,
    Output,
}

impl StateCommand {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "init" => StateCommand::Init,
            "validate" => StateCommand::Validate,
            "plan" => StateCommand::Plan,
            "apply" => StateCommand::Apply,
            "destroy" => StateCommand::Destroy,
            "import" => StateCommand::Import,
            "refresh" => StateCommand::Refresh,
            "state" => StateCommand::State,
            "output" => StateCommand::Output,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StateCommand::Init => "init",
            StateCommand::Validate => "validate",
            StateCommand::Plan => "plan",
            StateCommand::Apply => "apply",
            StateCommand::Destroy => "destroy",
            StateCommand::Import => "import",
            StateCommand::Refresh => "refresh",
            StateCommand::State => "state",
            StateCommand::Output => "output",
        }
    }

    /// Applies infrastructure changes that cannot be rolled back by re-running.
    pub fn is_irreversible(self) -> bool {
        matches!(self, StateCommand::Apply | StateCommand::Destroy)
    }
}

/// `terraform [-chdir=dir ...] <command>` in scripts and step names.
static COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:terraform|tofu|terragrunt)(?:\s+-\S+)*\s+(init|validate|plan|apply|destroy|import|refresh|state|output)\b",
    )
    .unwrap()
});

/// Marketplace wrappers such as `dflook/terraform-apply`.
static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:terraform|tofu)[-_](init|validate|plan|apply|destroy)\b").unwrap()
});

/// State commands a step issues, in the order they appear. Scripts are read
/// first, then the step name, then the action id.
pub fn state_commands(step: &Step) -> Vec<StateCommand> {
    if let StepBody::Script(script) = &step.body {
        let found = scan(&COMMAND, &shell::code_text(script));
        if !found.is_empty() {
            return found;
        }
    }
    if let Some(name) = &step.name {
        let found = scan(&COMMAND, name);
        if !found.is_empty() {
            return found;
        }
    }
    match &step.body {
        StepBody::Action(action) => scan(&ACTION, &action.target),
        _ => vec![],
    }
}

pub fn is_irreversible(step: &Step) -> bool {
    state_commands(step).into_iter().any(StateCommand::is_irreversible)
}

fn scan(re: &Regex, text: &str) -> Vec<StateCommand> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| StateCommand::from_word(m.as_str()))
        .collect()
}
