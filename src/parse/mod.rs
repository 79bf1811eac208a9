//! Document loader: workflow markup → `WorkflowDocument`.
//!
//! Syntax errors fail with `LoadError::Parse` before any shape checks; a
//! mapping that lacks mandatory keys fails with `LoadError::MissingKeys`.

pub mod graph;
pub mod raw;
pub mod types;

pub use graph::NeedsGraph;
pub use types::*;

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::error::LoadError;
use raw::{RawJob, RawStep, RawWorkflow};

/// Top-level keys every workflow must declare, in reporting order.
pub const MANDATORY_KEYS: [&str; 3] = ["name", "on", "jobs"];

/// Parse workflow markup into a `WorkflowDocument`.
pub fn load(source: &str) -> Result<WorkflowDocument, LoadError> {
    let value: Value = serde_yaml::from_str(source)?;
    let mut mapping = match value {
        Value::Mapping(m) => m,
        Value::Null => Mapping::new(),
        other => {
            return Err(LoadError::Schema {
                message: format!("top level must be a mapping, found {}", describe(&other)),
            });
        }
    };

    normalize_trigger_key(&mut mapping);

    let missing: Vec<&'static str> = MANDATORY_KEYS
        .iter()
        .filter(|key| !mapping.contains_key(**key))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingKeys { missing });
    }

    let raw: RawWorkflow = serde_yaml::from_value(Value::Mapping(mapping)).map_err(schema)?;

    let mut jobs = Vec::new();
    for (key, value) in raw.jobs.unwrap_or_default() {
        let id = key_string(&key, "jobs")?;
        let raw_job: RawJob = serde_yaml::from_value(value).map_err(|e| LoadError::Schema {
            message: format!("job '{}': {}", id, e),
        })?;
        jobs.push(build_job(id, raw_job));
    }

    Ok(WorkflowDocument {
        name: raw.name.as_ref().and_then(scalar).unwrap_or_default(),
        triggers: build_triggers(raw.on)?,
        env: string_map(raw.env.as_ref()),
        permissions: raw.permissions.as_ref().map(build_permissions),
        jobs,
        source: source.to_string(),
    })
}

/// YAML 1.1 parsers read a bare `on` key as boolean `true`. Rename it so the
/// trigger set is always found under `on`.
fn normalize_trigger_key(mapping: &mut Mapping) {
    if mapping.contains_key("on") {
        return;
    }
    if let Some(triggers) = mapping.remove(Value::Bool(true)) {
        mapping.insert(Value::String("on".into()), triggers);
    }
}

fn build_job(id: String, raw: RawJob) -> Job {
    let steps = raw
        .steps
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, step)| build_step(index, step))
        .collect();

    Job {
        name: raw.name.as_ref().and_then(scalar),
        runs_on: raw.runs_on.as_ref().and_then(labels),
        needs: raw.needs.as_ref().map(string_list).unwrap_or_default(),
        condition: raw.condition.as_ref().and_then(scalar),
        env: string_map(raw.env.as_ref()),
        permissions: raw.permissions.as_ref().map(build_permissions),
        steps,
        uses: raw.uses.as_deref().map(ActionRef::parse),
        id,
    }
}

fn build_step(index: usize, raw: RawStep) -> Step {
    let run = raw.run.as_ref().and_then(scalar);
    let body = match (raw.uses, run) {
        (Some(uses), None) => StepBody::Action(ActionRef::parse(&uses)),
        (None, Some(run)) => StepBody::Script(run),
        (Some(_), Some(_)) => StepBody::Malformed(StepShape::Both),
        (None, None) => StepBody::Malformed(StepShape::Neither),
    };

    Step {
        index,
        id: raw.id.as_ref().and_then(scalar),
        name: raw.name.as_ref().and_then(scalar),
        body,
        condition: raw.condition.as_ref().and_then(scalar),
        shell: raw.shell,
        env: string_map(raw.env.as_ref()),
        with: string_map(raw.with.as_ref()),
    }
}

/// Accepts the three forms of `on`: a single event, a list of events, or a
/// mapping of event → filters.
fn build_triggers(on: Option<Value>) -> Result<TriggerSet, LoadError> {
    let triggers = match on {
        None | Some(Value::Null) => vec![],
        Some(Value::String(event)) => vec![Trigger::event(event)],
        Some(Value::Sequence(events)) => events
            .iter()
            .filter_map(scalar)
            .map(Trigger::event)
            .collect(),
        Some(Value::Mapping(events)) => {
            let mut triggers = Vec::new();
            for (key, filters) in &events {
                let mut trigger = Trigger::event(key_string(key, "on")?);
                if let Value::Mapping(filters) = filters {
                    if let Some(v) = filters.get("branches") {
                        trigger.branches = string_list(v);
                    }
                    if let Some(v) = filters.get("branches-ignore") {
                        trigger.branches_ignore = string_list(v);
                    }
                }
                triggers.push(trigger);
            }
            triggers
        }
        Some(other) => {
            return Err(LoadError::Schema {
                message: format!("'on' must be an event, list or mapping, found {}", describe(&other)),
            });
        }
    };
    Ok(TriggerSet { triggers })
}

fn build_permissions(value: &Value) -> Permissions {
    match value {
        Value::Mapping(_) => Permissions::Scoped(string_map(Some(value))),
        other => Permissions::All(scalar(other).unwrap_or_default()),
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => scalar(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

/// `runs-on` may be a label, a list of labels, or `{ group, labels }`.
fn labels(value: &Value) -> Option<String> {
    let labels = match value {
        Value::Mapping(m) => m
            .get("labels")
            .or_else(|| m.get("group"))
            .map(string_list)
            .unwrap_or_default(),
        other => string_list(other),
    };
    if labels.is_empty() {
        None
    } else {
        Some(labels.join(","))
    }
}

/// Non-mapping values (e.g. an `env` built from an expression) yield an
/// empty map.
fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Mapping(m)) = value else {
        return BTreeMap::new();
    };
    m.iter()
        .filter_map(|(k, v)| Some((scalar(k)?, scalar(v).unwrap_or_default())))
        .collect()
}

fn key_string(key: &Value, section: &str) -> Result<String, LoadError> {
    scalar(key).ok_or_else(|| LoadError::Schema {
        message: format!("keys under '{}' must be strings, found {}", section, describe(key)),
    })
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn schema(e: serde_yaml::Error) -> LoadError {
    LoadError::Schema {
        message: e.to_string(),
    }
}
