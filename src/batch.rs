//! Batch runner: every workflow document in a repository plus one file-tree
//! scan.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::RuleConfig;
use crate::error::BatchError;
use crate::report::{BatchReport, ValidationReport};
use crate::tree::FileTree;
use crate::validate;

/// A workflow document to validate: a label for reports and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSource {
    pub label: String,
    pub text: String,
}

/// Validate documents in parallel; reports come back in input order.
pub fn validate_batch(
    sources: &[WorkflowSource],
    tree: Option<&FileTree>,
    config: &RuleConfig,
) -> BatchReport {
    tracing::info!("Validating {} workflow documents", sources.len());

    let documents: Vec<ValidationReport> = sources
        .par_iter()
        .map(|source| {
            tracing::trace!("Validating {}", source.label);
            validate::validate_source(&source.label, &source.text, config)
        })
        .collect();

    let tree = tree.map(|tree| {
        ValidationReport::aggregate("file tree", [validate::tree::scan(tree, config)])
    });

    let report = BatchReport { documents, tree };
    tracing::info!(
        passed = report.passed(),
        exit_code = report.exit_status().code(),
        "Batch validation complete"
    );
    report
}

/// `.yml` / `.yaml` files directly under the configured workflow directory,
/// sorted by path.
pub fn discover_workflows(root: &Path, config: &RuleConfig) -> Result<Vec<PathBuf>, BatchError> {
    let dir = root.join(&config.workflow_dir);
    if !dir.is_dir() {
        tracing::debug!("No workflow directory at {}", dir.display());
        return Ok(vec![]);
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| BatchError::Walk {
            root: dir.clone(),
            source,
        })?;
        let is_workflow = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if entry.file_type().is_file() && is_workflow {
            paths.push(entry.into_path());
        }
    }
    paths.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    Ok(paths)
}

/// Discover, read and validate every workflow under `root`, and scan the
/// tree once for secret files.
pub fn validate_repository(root: &Path, config: &RuleConfig) -> Result<BatchReport, BatchError> {
    let _span = tracing::info_span!("validate_repository", root = %root.display()).entered();

    let mut sources = Vec::new();
    for path in discover_workflows(root, config)? {
        let text = std::fs::read_to_string(&path).map_err(|source| BatchError::Read {
            path: path.clone(),
            source,
        })?;
        let label = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        sources.push(WorkflowSource { label, text });
    }

    let tree = FileTree::scan(root)?;
    Ok(validate_batch(&sources, Some(&tree), config))
}
