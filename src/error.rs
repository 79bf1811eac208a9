//! Error types shared across the loader, configuration and batch runner.
//!
//! Load-level errors are fatal for one document and surface as that
//! document's sole finding. Configuration and batch errors abort the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::report::{Finding, Location};

/// Rule id reported for malformed markup.
pub const PARSE_RULE: &str = "P001";
/// Rule id reported for valid markup with an unusable shape.
pub const SCHEMA_RULE: &str = "P002";
/// Rule id reported for missing mandatory top-level keys. Shared with the
/// structural rule that checks those keys are non-empty.
pub const MANDATORY_KEYS_RULE: &str = "S001";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("malformed workflow markup: {message}")]
    Parse { message: String, line: Option<usize> },

    #[error("workflow is missing mandatory key(s): {}", .missing.join(", "))]
    MissingKeys { missing: Vec<&'static str> },

    #[error("workflow has an invalid shape: {message}")]
    Schema { message: String },
}

impl LoadError {
    pub fn rule_id(&self) -> &'static str {
        match self {
            LoadError::Parse { .. } => PARSE_RULE,
            LoadError::MissingKeys { .. } => MANDATORY_KEYS_RULE,
            LoadError::Schema { .. } => SCHEMA_RULE,
        }
    }

    /// The single failing finding that stands in for a document that could
    /// not be loaded.
    pub fn to_finding(&self) -> Finding {
        let finding = Finding::fail(self.rule_id(), self.to_string());
        match self {
            LoadError::Parse {
                line: Some(line), ..
            } => finding.at(Location::line(*line)),
            _ => finding,
        }
    }
}

impl From<serde_yaml::Error> for LoadError {
    fn from(e: serde_yaml::Error) -> Self {
        LoadError::Parse {
            message: e.to_string(),
            line: e.location().map(|l| l.line()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rule configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rule configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read workflow {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
