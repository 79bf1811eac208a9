//! Snapshot of the repository file tree around the workflow documents.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::BatchError;

/// Bytes of content kept per file; enough to see a key header.
pub const HEAD_BYTES: usize = 4096;

const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Relative path with `/` separators.
    pub path: String,
    /// Leading bytes of the file, when it could be read as text.
    pub head: Option<String>,
}

impl TreeEntry {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTree {
    pub entries: Vec<TreeEntry>,
}

impl FileTree {
    /// A listing without file contents.
    pub fn from_listing<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FileTree {
            entries: paths
                .into_iter()
                .map(|p| TreeEntry {
                    path: p.into(),
                    head: None,
                })
                .collect(),
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, head: impl Into<String>) -> Self {
        self.entries.push(TreeEntry {
            path: path.into(),
            head: Some(head.into()),
        });
        self
    }

    /// Walk `root`, skipping VCS and build directories. Files that cannot be
    /// read are listed without a head.
    pub fn scan(root: &Path) -> Result<Self, BatchError> {
        let _span = tracing::debug_span!("scan_tree", root = %root.display()).entered();

        let mut entries = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && e.file_name()
                            .to_str()
                            .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
            });

        for entry in walker {
            let entry = entry.map_err(|source| BatchError::Walk {
                root: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let head = match read_head(entry.path()) {
                Ok(head) => Some(head),
                Err(e) => {
                    tracing::warn!("Cannot read {}: {}", entry.path().display(), e);
                    None
                }
            };
            entries.push(TreeEntry { path, head });
        }

        tracing::debug!("Scanned {} files", entries.len());
        Ok(FileTree { entries })
    }
}

fn read_head(path: &Path) -> std::io::Result<String> {
    let mut buf = Vec::with_capacity(HEAD_BYTES);
    File::open(path)?
        .take(HEAD_BYTES as u64)
        .read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
