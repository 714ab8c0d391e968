//! Undo/redo bookkeeping for session changes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// A human-readable record of one performed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescription {
    pub description: String,
}

impl ChangeDescription {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Two-stack change history. Performing a change clears the redo stack,
/// matching the usual editor contract.
#[derive(Debug, Default)]
pub struct ChangeHistory {
    undo: Vec<ChangeDescription>,
    redo: Vec<ChangeDescription>,
}

impl ChangeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, change: ChangeDescription) {
        self.undo.push(change);
        self.redo.clear();
    }

    pub fn undo(&mut self) -> Result<ChangeDescription> {
        let change = self.undo.pop().ok_or(SessionError::NothingToUndo)?;
        self.redo.push(change.clone());
        Ok(change)
    }

    pub fn redo(&mut self) -> Result<ChangeDescription> {
        let change = self.redo.pop().ok_or(SessionError::NothingToRedo)?;
        self.undo.push(change.clone());
        Ok(change)
    }

    /// Undoable change descriptions, most recent first.
    pub fn undo_descriptions(&self) -> Vec<String> {
        self.undo
            .iter()
            .rev()
            .map(|c| c.description.clone())
            .collect()
    }

    /// Redoable change descriptions, most recent first.
    pub fn redo_descriptions(&self) -> Vec<String> {
        self.redo
            .iter()
            .rev()
            .map(|c| c.description.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_cannot_undo() {
        let mut history = ChangeHistory::new();
        assert!(matches!(
            history.undo().unwrap_err(),
            SessionError::NothingToUndo
        ));
    }

    #[test]
    fn test_undo_moves_change_to_redo_stack() {
        let mut history = ChangeHistory::new();
        history.record(ChangeDescription::new("rename a -> b"));
        let undone = history.undo().unwrap();
        assert_eq!(undone.description, "rename a -> b");
        assert_eq!(history.redo_descriptions(), ["rename a -> b"]);
        assert!(history.undo_descriptions().is_empty());
    }

    #[test]
    fn test_redo_restores_change() {
        let mut history = ChangeHistory::new();
        history.record(ChangeDescription::new("rename a -> b"));
        history.undo().unwrap();
        let redone = history.redo().unwrap();
        assert_eq!(redone.description, "rename a -> b");
        assert_eq!(history.undo_descriptions(), ["rename a -> b"]);
    }

    #[test]
    fn test_new_change_clears_redo_stack() {
        let mut history = ChangeHistory::new();
        history.record(ChangeDescription::new("first"));
        history.undo().unwrap();
        history.record(ChangeDescription::new("second"));
        assert!(matches!(
            history.redo().unwrap_err(),
            SessionError::NothingToRedo
        ));
    }

    #[test]
    fn test_descriptions_most_recent_first() {
        let mut history = ChangeHistory::new();
        history.record(ChangeDescription::new("first"));
        history.record(ChangeDescription::new("second"));
        assert_eq!(history.undo_descriptions(), ["second", "first"]);
    }
}
