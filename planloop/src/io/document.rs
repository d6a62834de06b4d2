//! Plan document location and reading.
//!
//! The document is read fresh on every call. There is no cache: the worker and
//! reviewer rewrite it between steps.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::parser::parse;
use crate::core::types::PlanSnapshot;
use crate::error::PlanError;

/// Resolve the CLI plan argument to a document path.
///
/// A bare name (no path separator, no extension) resolves to
/// `<plans_dir>/<name>.<extension>`. Anything else is used as given.
pub fn resolve_document_path(arg: &str, plans_dir: &Path, extension: &str) -> PathBuf {
    let candidate = Path::new(arg);
    let has_separator = arg.contains('/') || arg.contains(std::path::MAIN_SEPARATOR);
    if has_separator || candidate.extension().is_some() {
        return candidate.to_path_buf();
    }
    plans_dir.join(format!("{arg}.{}", extension.trim_start_matches('.')))
}

/// Handle to the plan document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    path: PathBuf,
}

impl PlanDocument {
    /// Open a document, failing with `DocumentNotFound` if it is not a readable file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PlanError> {
        let path = path.into();
        if !path.is_file() {
            return Err(PlanError::DocumentNotFound { path });
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String, PlanError> {
        fs::read_to_string(&self.path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PlanError::DocumentNotFound {
                path: self.path.clone(),
            },
            _ => PlanError::DocumentRead {
                path: self.path.clone(),
                source,
            },
        })
    }

    /// Read and parse the current document contents.
    pub fn snapshot(&self) -> Result<PlanSnapshot, PlanError> {
        let text = self.read()?;
        let snapshot = parse(&text);
        debug!(
            tasks = snapshot.tasks.len(),
            next = ?snapshot.next_eligible_index,
            all_done = snapshot.all_done,
            has_blocked = snapshot.has_blocked,
            "parsed plan document"
        );
        Ok(snapshot)
    }
}
