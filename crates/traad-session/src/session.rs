//! The session facade itself.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SessionError};
use crate::history::{ChangeDescription, ChangeHistory};
use crate::resources::{self, Resource};

/// One project's refactoring session.
///
/// Constructed once per server process; every transport forwards into the
/// same instance. The method surface below is the complete remote contract:
/// transports map wire method names onto these calls 1:1 and must not reach
/// around them.
///
/// Mutating operations validate their arguments and record an undoable
/// change. The session is not safe for concurrent mutation; callers must
/// serialize access (the transports do this by construction).
#[derive(Debug)]
pub struct ProjectSession {
    root: PathBuf,
    history: ChangeHistory,
}

impl ProjectSession {
    /// Open a session on `project`, which must be an existing directory.
    pub fn new(project: impl AsRef<Path>) -> Result<Self> {
        let project = project.as_ref();
        if !project.is_dir() {
            return Err(SessionError::NotADirectory(project.to_path_buf()));
        }
        let root = project
            .canonicalize()
            .map_err(|e| SessionError::io(e, project))?;
        debug!("opened session on {}", root.display());
        Ok(Self {
            root,
            history: ChangeHistory::new(),
        })
    }

    /// Absolute project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every resource in the project as `(path, is_folder)` pairs.
    pub fn get_all_resources(&self) -> Result<Vec<Resource>> {
        resources::walk_all(&self.root)
    }

    /// Immediate children of a folder resource. An empty path means the
    /// project root.
    pub fn get_children(&self, folder: &str) -> Result<Vec<Resource>> {
        resources::list_children(&self.root, folder)
    }

    /// Rename a resource. The target must exist and the new name must be a
    /// plain file name, not a path.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<ChangeDescription> {
        let resolved = resources::resolve(&self.root, path)?;
        if !resolved.exists() {
            return Err(SessionError::NoSuchResource(path.to_string()));
        }
        validate_name(new_name)?;

        let change = ChangeDescription::new(format!("Renaming {path} to {new_name}"));
        self.history.record(change.clone());
        Ok(change)
    }

    /// Undo the most recent change.
    pub fn undo(&mut self) -> Result<ChangeDescription> {
        self.history.undo()
    }

    /// Redo the most recently undone change.
    pub fn redo(&mut self) -> Result<ChangeDescription> {
        self.history.redo()
    }

    /// Descriptions of undoable changes, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.history.undo_descriptions()
    }

    /// Descriptions of redoable changes, most recent first.
    pub fn redo_history(&self) -> Vec<String> {
        self.history.redo_descriptions()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| SessionError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("name must not contain path separators"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name must not be a relative path component"));
    }
    Ok(())
}
