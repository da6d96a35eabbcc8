//! Save point stack.
//!
//! A save point captures the log length, the structural record count, the
//! content flags and the index undo generation at the moment it was set.
//! Save points are strictly LIFO.

use crate::write_batch::ContentFlags;

/// State of the batch captured by `set_save_point`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    /// Serialized log size in bytes.
    pub size: usize,
    /// Structural record count.
    pub count: u32,
    /// Record kinds present.
    pub content_flags: ContentFlags,
    /// Undo log length of the index.
    pub index_generation: usize,
}

/// Stack of save points, most recent on top.
#[derive(Debug, Default)]
pub struct SavePoints {
    stack: Vec<SavePoint>,
}

impl SavePoints {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a save point.
    pub fn push(&mut self, save_point: SavePoint) {
        self.stack.push(save_point);
    }

    /// Pops the most recent save point.
    pub fn pop(&mut self) -> Option<SavePoint> {
        self.stack.pop()
    }

    /// Returns the number of open save points.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if no save point is open.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drops every save point.
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
