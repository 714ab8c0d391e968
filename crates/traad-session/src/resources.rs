//! Project resource discovery.
//!
//! A resource is anything addressable inside the project: a file or a
//! folder, identified by its project-relative path with `/` separators on
//! every platform. Hidden entries (leading `.`) are skipped, which keeps
//! `.git` and editor droppings out of remote listings.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Result, SessionError};

/// A single project resource: its project-relative path and whether it is a
/// folder. This is the `(string, boolean)` pair the wire protocols carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub path: String,
    pub is_folder: bool,
}

impl Resource {
    fn from_entry(root: &Path, path: &Path, is_folder: bool) -> Self {
        let rel = path.strip_prefix(root).unwrap_or(path);
        Self {
            path: relative_display(rel),
            is_folder,
        }
    }
}

fn relative_display(rel: &Path) -> String {
    let parts: Vec<_> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Resolve a project-relative resource path against the root, rejecting
/// absolute paths and `..` traversal.
pub fn resolve(root: &Path, resource: &str) -> Result<PathBuf> {
    let candidate = Path::new(resource);
    if candidate.is_absolute() {
        return Err(SessionError::OutsideProject(resource.to_string()));
    }
    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(SessionError::OutsideProject(resource.to_string())),
        }
    }
    Ok(root.join(candidate))
}

/// Recursively list every resource under `root`, sorted by path.
pub fn walk_all(root: &Path) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()));

    for entry in walker {
        let entry = entry.map_err(|e| SessionError::Io {
            message: e.to_string(),
            path: e.path().map(Path::to_path_buf),
            source: e.into_io_error(),
        })?;
        resources.push(Resource::from_entry(
            root,
            entry.path(),
            entry.file_type().is_dir(),
        ));
    }

    resources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(resources)
}

/// List the immediate children of a folder resource, sorted by path.
///
/// An empty `folder` means the project root itself.
pub fn list_children(root: &Path, folder: &str) -> Result<Vec<Resource>> {
    let dir = resolve(root, folder)?;
    if !dir.exists() {
        return Err(SessionError::NoSuchResource(folder.to_string()));
    }
    if !dir.is_dir() {
        return Err(SessionError::NotAFolder(folder.to_string()));
    }

    let mut children = Vec::new();
    let entries = std::fs::read_dir(&dir).map_err(|e| SessionError::io(e, &dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| SessionError::io(e, &dir))?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        children.push(Resource::from_entry(root, &path, path.is_dir()));
    }

    children.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(children)
}
