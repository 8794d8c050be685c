//! Per-layer undo log.
//!
//! A [`History`] is a stack of undo levels, each level an ordered list of the
//! commands that produced it. Undo pops a level and rebuilds the layer by
//! replaying [`History::flatten`]; there is no redo.

use crate::command::Command;

/// Ordered undo levels of a single layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    levels: Vec<Vec<Command>>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new, empty undo level.
    pub fn begin_new_undo_level(&mut self) {
        self.levels.push(Vec::new());
    }

    /// Append a command to the most recently opened level, opening one first
    /// if the history is empty.
    pub fn store_undo_data(&mut self, command: Command) {
        if self.levels.is_empty() {
            self.begin_new_undo_level();
        }
        if let Some(level) = self.levels.last_mut() {
            level.push(command);
        }
    }

    /// Discard the most recent level. Returns `false` if there was none.
    pub fn pop_undo_level(&mut self) -> bool {
        if self.levels.pop().is_none() {
            log::debug!("[History] No more undo levels");
            return false;
        }
        true
    }

    /// Discard every level.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// All stored commands, oldest level first, in storage order.
    pub fn flatten(&self) -> Vec<Command> {
        self.levels.iter().flatten().cloned().collect()
    }

    /// Number of undo levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Total number of stored commands across all levels.
    pub fn command_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// True if no level exists.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The commands of each level, oldest first.
    pub fn levels(&self) -> impl Iterator<Item = &[Command]> {
        self.levels.iter().map(Vec::as_slice)
    }
}
