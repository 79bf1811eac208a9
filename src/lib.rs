pub mod batch;
pub mod config;
pub mod error;
pub mod parse;
pub mod report;
pub mod shell;
pub mod tree;
pub mod validate;
pub mod wasm;

pub use config::RuleConfig;
pub use report::{BatchReport, ExitStatus, Finding, Severity, ValidationReport};
pub use validate::{validate_document, validate_source, validate_source_with_tree};
