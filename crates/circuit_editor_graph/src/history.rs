// SPDX-License-Identifier: MIT OR Apache-2.0
//! Snapshot-based undo/redo.
//!
//! Every undo step is a full value copy of the graph taken just before a
//! mutation. Compound actions bracket their steps with
//! [`History::begin_batch`]/[`History::end_batch`] so only the first
//! snapshot inside the bracket is kept.

use crate::camera::CameraSnapshot;
use crate::chip::ChipDescriptor;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::PortRef;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Default maximum undo history depth
pub const MAX_HISTORY: usize = 50;

/// History errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// One node in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node id
    pub id: NodeId,
    /// Chip payload the node was created from
    pub payload: ChipDescriptor,
    /// World x
    pub x: f32,
    /// World y
    pub y: f32,
    /// Selection flag
    pub selected: bool,
}

/// One connection in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    /// Output end
    pub from: PortRef,
    /// Input end
    pub to: PortRef,
}

/// Value copy of the editable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Camera placement
    pub camera: CameraSnapshot,
    /// Nodes in paint order
    pub nodes: Vec<NodeSnapshot>,
    /// Connections
    pub connections: Vec<ConnectionSnapshot>,
}

impl Snapshot {
    /// Capture a graph and camera.
    ///
    /// Connections whose ends no longer resolve are left out.
    pub fn capture(graph: &Graph, camera: CameraSnapshot) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeSnapshot {
                id: node.id,
                payload: node.descriptor.clone(),
                x: node.position[0],
                y: node.position[1],
                selected: node.selected,
            })
            .collect();

        let connections = graph
            .connections()
            .filter(|c| graph.port(c.from).is_some() && graph.port(c.to).is_some())
            .map(|c| ConnectionSnapshot { from: c.from, to: c.to })
            .collect();

        Self {
            camera,
            nodes,
            connections,
        }
    }
}

/// History statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Maximum undo depth
    pub max_depth: usize,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    /// Undo stack, oldest first
    undo_stack: VecDeque<Snapshot>,
    /// Redo stack, oldest first
    redo_stack: VecDeque<Snapshot>,
    /// Maximum history depth
    max_depth: usize,
    /// Open batch brackets
    batch_depth: usize,
    /// A snapshot was already taken in the current batch
    batch_recorded: bool,
    /// Set while a snapshot is being applied
    restoring: bool,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
            batch_depth: 0,
            batch_recorded: false,
            restoring: false,
        }
    }

    /// Whether the next mutation should be recorded
    pub fn wants_record(&self) -> bool {
        !self.restoring && !(self.batch_depth > 0 && self.batch_recorded)
    }

    /// Record the state before a mutation. Clears the redo stack.
    ///
    /// Returns `false` when the snapshot was dropped because a batch already
    /// recorded or a restore is in progress.
    pub fn record(&mut self, snapshot: Snapshot) -> bool {
        if !self.wants_record() {
            return false;
        }
        if self.batch_depth > 0 {
            self.batch_recorded = true;
        }
        self.redo_stack.clear();
        self.push_undo(snapshot);
        true
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Open a batch. Nested brackets join the outer one.
    pub fn begin_batch(&mut self) {
        if self.batch_depth == 0 {
            self.batch_recorded = false;
        }
        self.batch_depth += 1;
    }

    /// Close a batch
    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.batch_recorded = false;
        }
    }

    /// Whether a batch is open
    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Suppress recording while a snapshot is applied
    pub fn begin_restore(&mut self) {
        self.restoring = true;
    }

    /// Re-enable recording
    pub fn end_restore(&mut self) {
        self.restoring = false;
    }

    /// Whether a snapshot is being applied
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Step back. `current` becomes the redo entry; the returned snapshot is
    /// the state to restore.
    pub fn undo(&mut self, current: Snapshot) -> Result<Snapshot> {
        let previous = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        self.redo_stack.push_back(current);
        Ok(previous)
    }

    /// Step forward. `current` goes back on the undo stack.
    pub fn redo(&mut self, current: Snapshot) -> Result<Snapshot> {
        let next = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        self.push_undo(current);
        Ok(next)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum undo depth
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Change the cap, evicting the oldest entries if needed
    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth.max(1);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
        while self.redo_stack.len() > self.max_depth {
            self.redo_stack.pop_front();
        }
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            max_depth: self.max_depth,
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(tx: f32) -> Snapshot {
        Snapshot {
            camera: CameraSnapshot { tx, ty: 0.0, scale: 1.0 },
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    #[test]
    fn test_undo_redo_swap() {
        let mut history = History::new();
        assert!(history.record(snap(1.0)));
        let restored = history.undo(snap(2.0)).unwrap();
        assert_eq!(restored, snap(1.0));
        assert!(history.can_redo());
        let again = history.redo(snap(1.0)).unwrap();
        assert_eq!(again, snap(2.0));
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 0);
    }

    #[test]
    fn test_empty_stacks() {
        let mut history = History::new();
        assert_eq!(history.undo(snap(0.0)), Err(HistoryError::NothingToUndo));
        assert_eq!(history.redo(snap(0.0)), Err(HistoryError::NothingToRedo));
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new();
        history.record(snap(1.0));
        history.undo(snap(2.0)).unwrap();
        history.record(snap(3.0));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut history = History::with_max_depth(3);
        for i in 0..5 {
            history.record(snap(i as f32));
        }
        assert_eq!(history.undo_depth(), 3);
        assert_eq!(history.undo(snap(9.0)).unwrap(), snap(4.0));
        history.undo(snap(4.0)).unwrap();
        assert_eq!(history.undo(snap(3.0)).unwrap(), snap(2.0));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_batch_records_once() {
        let mut history = History::new();
        history.begin_batch();
        assert!(history.record(snap(1.0)));
        history.begin_batch();
        assert!(!history.record(snap(2.0)));
        history.end_batch();
        assert!(!history.record(snap(3.0)));
        history.end_batch();
        assert_eq!(history.undo_depth(), 1);

        assert!(history.record(snap(4.0)));
        assert_eq!(history.undo_depth(), 2);
    }

    #[test]
    fn test_restore_suppresses_recording() {
        let mut history = History::new();
        history.begin_restore();
        assert!(!history.record(snap(1.0)));
        history.end_restore();
        assert!(history.record(snap(1.0)));
    }
}
