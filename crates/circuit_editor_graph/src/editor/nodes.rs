// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node lifecycle, selection, dragging and the clipboard.

use super::{CanvasGesture, GraphEditor};
use crate::chip::ChipDescriptor;
use crate::gesture::{command_held, exceeds_threshold, PointerEvent, PointerId};
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::port::PortRef;
use egui::{Pos2, Vec2};
use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

/// Options for [`GraphEditor::add_node_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AddNodeOptions {
    /// Explicit id, used when restoring
    pub id: Option<NodeId>,
    /// World position; the viewport center when `None`
    pub position: Option<Pos2>,
    /// Start selected
    pub selected: bool,
    /// Do not record an undo step
    pub skip_history: bool,
}

impl AddNodeOptions {
    /// Place at a world position
    pub fn at(position: Pos2) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }
}

/// A copied node
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardNode {
    /// Id of the node it was copied from
    pub source_id: NodeId,
    /// Chip payload
    pub payload: ChipDescriptor,
    /// Position relative to the top-left of the copied set
    pub offset: Vec2,
}

/// A copied connection, in terms of source node ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardConnection {
    /// Output end
    pub from: PortRef,
    /// Input end
    pub to: PortRef,
}

/// Copied nodes detached from any live node
#[derive(Debug, Clone, PartialEq)]
pub struct Clipboard {
    /// Nodes
    pub nodes: Vec<ClipboardNode>,
    /// Connections with both ends inside the copied set
    pub connections: Vec<ClipboardConnection>,
    /// When the copy was taken
    pub created_at: SystemTime,
}

impl Clipboard {
    /// Copy a set of nodes. Returns the clipboard and the top-left corner of the set.
    pub fn capture(graph: &Graph, ids: &[NodeId]) -> Option<(Self, Pos2)> {
        let nodes: Vec<&Node> = ids.iter().filter_map(|id| graph.node(*id)).collect();
        let min = nodes.iter().map(|n| n.origin()).reduce(|a, b| a.min(b))?;

        let set: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let connections = graph
            .internal_connections(&set)
            .map(|c| ClipboardConnection { from: c.from, to: c.to })
            .collect();

        let clipboard = Self {
            nodes: nodes
                .iter()
                .map(|n| ClipboardNode {
                    source_id: n.id,
                    payload: n.descriptor.clone(),
                    offset: n.origin() - min,
                })
                .collect(),
            connections,
            created_at: SystemTime::now(),
        };
        Some((clipboard, min))
    }

    /// Whether nothing was copied
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// In-flight node drag
#[derive(Debug, Clone)]
pub(crate) struct NodeDrag {
    pub(crate) pointer: PointerId,
    origin: Pos2,
    grabbed: NodeId,
    preselected: bool,
    toggle: bool,
    moved: bool,
    offsets: Vec<(NodeId, Vec2)>,
}

impl NodeDrag {
    pub(crate) fn includes(&self, id: NodeId) -> bool {
        self.offsets.iter().any(|(n, _)| *n == id)
    }

    pub(crate) fn has_moved(&self) -> bool {
        self.moved
    }
}

impl GraphEditor {
    /// Add a node at the viewport center
    pub fn add_node(&mut self, descriptor: ChipDescriptor) -> Option<NodeId> {
        self.add_node_with(descriptor, AddNodeOptions::default())
    }

    /// Add a node. Returns `None` when the renderer produced nothing or an
    /// explicit id is already taken.
    pub fn add_node_with(&mut self, descriptor: ChipDescriptor, options: AddNodeOptions) -> Option<NodeId> {
        if let Some(id) = options.id {
            if self.graph.contains_node(id) {
                tracing::warn!("Node id {} already in use", id);
                return None;
            }
        }
        let Some(rendered) = self.renderer.render(&descriptor) else {
            tracing::warn!("Chip renderer produced nothing for '{}'", descriptor.name);
            return None;
        };

        if !options.skip_history {
            self.record_history();
        }

        let id = self.graph.allocate_node_id(options.id);
        let position = options.position.unwrap_or_else(|| self.viewport_center_world());
        let mut node = Node::from_rendered(id, descriptor, rendered, &self.config.palette)
            .with_position(position.x, position.y);
        node.selected = options.selected;

        tracing::info!("Added node {} '{}'", id, node.name());
        self.graph.add_node(node);
        self.request_render();
        Some(id)
    }

    /// Delete a node and every connection touching it
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if !self.graph.contains_node(id) {
            tracing::debug!("Delete ignored, no node {}", id);
            return false;
        }
        self.record_history();

        if self.wire_drag.as_ref().is_some_and(|d| d.origin.node == id) {
            self.cancel_connection_drag();
        }
        if matches!(&self.canvas, CanvasGesture::Nodes(d) if d.includes(id)) {
            self.canvas = CanvasGesture::Idle;
        }
        if self.long_press.is_some_and(|p| p.target == Some(id)) {
            self.long_press = None;
        }

        if let Some((_, removed)) = self.graph.remove_node(id) {
            tracing::info!("Deleted node {} ({} connections)", id, removed.len());
        }
        self.refresh_bindings();
        self.request_render();
        true
    }

    /// Delete every selected node as one undo step
    pub fn delete_selected(&mut self) -> usize {
        let selected = self.selected_nodes();
        if selected.is_empty() {
            return 0;
        }
        self.begin_batch();
        let deleted = selected.into_iter().filter(|id| self.delete_node(*id)).count();
        self.end_batch();
        deleted
    }

    /// Move a node to a world position
    pub fn set_node_position(&mut self, id: NodeId, x: f32, y: f32) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            tracing::debug!("Move ignored, no node {}", id);
            return false;
        };
        node.position = [x, y];
        self.request_render();
        true
    }

    // Selection

    fn set_selected(&mut self, id: NodeId, selected: bool) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        if node.selected != selected {
            node.selected = selected;
            self.request_render();
        }
        true
    }

    /// Add a node to the selection
    pub fn select_node(&mut self, id: NodeId) -> bool {
        self.set_selected(id, true)
    }

    /// Remove a node from the selection
    pub fn deselect_node(&mut self, id: NodeId) -> bool {
        self.set_selected(id, false)
    }

    /// Flip a node's selection
    pub fn toggle_node(&mut self, id: NodeId) -> bool {
        let selected = self.is_selected(id);
        self.set_selected(id, !selected)
    }

    /// Whether a node is selected
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.graph.node(id).is_some_and(|n| n.selected)
    }

    /// Deselect everything
    pub fn clear_selection(&mut self) {
        for id in self.selected_nodes() {
            self.set_selected(id, false);
        }
    }

    /// Make `id` the only selected node
    pub fn select_only(&mut self, id: NodeId) -> bool {
        if !self.graph.contains_node(id) {
            return false;
        }
        self.clear_selection();
        self.set_selected(id, true)
    }

    /// Selected nodes in storage order
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.graph.selected_ids()
    }

    // Dragging

    pub(crate) fn begin_node_drag(&mut self, event: &PointerEvent, grabbed: NodeId) {
        let toggle = command_held(event.modifiers);
        let preselected = !self.is_selected(grabbed);
        if preselected {
            if !toggle {
                self.clear_selection();
            }
            self.select_node(grabbed);
        }

        let world = self.camera.screen_to_world(event.pos);
        let offsets = self
            .graph
            .nodes()
            .filter(|n| n.selected)
            .map(|n| (n.id, world - n.origin()))
            .collect();

        self.canvas = CanvasGesture::Nodes(NodeDrag {
            pointer: event.id,
            origin: event.pos,
            grabbed,
            preselected,
            toggle,
            moved: false,
            offsets,
        });
    }

    pub(crate) fn drag_nodes(&mut self, drag: &mut NodeDrag, pos: Pos2) {
        if !drag.moved {
            if !exceeds_threshold(drag.origin, pos, self.config.gestures.drag_threshold) {
                return;
            }
            drag.moved = true;
            self.record_history();
            for (id, _) in &drag.offsets {
                self.graph.bring_to_front(*id);
            }
            tracing::debug!("Dragging {} node(s)", drag.offsets.len());
        }

        let world = self.camera.screen_to_world(pos);
        for (id, offset) in &drag.offsets {
            if let Some(node) = self.graph.node_mut(*id) {
                let p = world - *offset;
                node.position = [p.x, p.y];
            }
        }
        self.request_render();
    }

    /// A press and release without movement is a click on the grabbed node
    pub(crate) fn finish_node_drag(&mut self, drag: &NodeDrag, released: bool) {
        if drag.moved || !released {
            return;
        }
        if !drag.toggle {
            self.select_only(drag.grabbed);
        } else if !drag.preselected {
            self.toggle_node(drag.grabbed);
        }
    }

    // Clipboard

    /// The clipboard contents
    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Copy the selection. Restarts the paste offset.
    pub fn copy_selection(&mut self) -> bool {
        let selected = self.selected_nodes();
        let Some((clipboard, _)) = Clipboard::capture(&self.graph, &selected) else {
            return false;
        };
        tracing::info!("Copied {} node(s)", clipboard.nodes.len());
        self.clipboard = Some(clipboard);
        self.paste_serial = 0;
        true
    }

    /// Copy then delete the selection, as one undo step
    pub fn cut_selection(&mut self) -> bool {
        if !self.copy_selection() {
            return false;
        }
        self.delete_selected() > 0
    }

    /// Paste near the viewport center. The pasted nodes become the selection.
    pub fn paste(&mut self) -> Vec<NodeId> {
        let Some(clipboard) = self.clipboard.clone().filter(|c| !c.is_empty()) else {
            return Vec::new();
        };
        if !self.renders_any(&clipboard) {
            tracing::warn!("Paste skipped, no copied chip renders");
            return Vec::new();
        }
        self.begin_batch();
        self.record_history();
        self.paste_serial += 1;
        let base = self.viewport_center_world() + self.serial_offset(self.paste_serial);
        let created = self.instantiate(&clipboard, base);
        self.end_batch();
        tracing::info!("Pasted {} node(s)", created.len());
        created
    }

    /// Duplicate the selection next to itself. The copies become the selection.
    pub fn duplicate_selection(&mut self) -> Vec<NodeId> {
        let mut selected = self.selected_nodes();
        let Some((clipboard, min)) = Clipboard::capture(&self.graph, &selected) else {
            return Vec::new();
        };
        if !self.renders_any(&clipboard) {
            tracing::warn!("Duplicate skipped, no selected chip renders");
            return Vec::new();
        }

        selected.sort_unstable();
        if selected == self.duplicate_source {
            self.duplicate_serial += 1;
        } else {
            self.duplicate_serial = 1;
            self.duplicate_source = selected;
        }

        self.begin_batch();
        self.record_history();
        let base = min + self.serial_offset(self.duplicate_serial);
        let created = self.instantiate(&clipboard, base);
        self.end_batch();
        tracing::info!("Duplicated {} node(s)", created.len());
        created
    }

    fn renders_any(&self, clipboard: &Clipboard) -> bool {
        clipboard.nodes.iter().any(|n| self.renderer.render(&n.payload).is_some())
    }

    fn serial_offset(&self, serial: u32) -> Vec2 {
        Vec2::splat(self.config.paste_offset * serial as f32)
    }

    fn instantiate(&mut self, clipboard: &Clipboard, base: Pos2) -> Vec<NodeId> {
        self.clear_selection();

        let mut id_map = HashMap::new();
        let mut created = Vec::new();
        for entry in &clipboard.nodes {
            let options = AddNodeOptions {
                id: None,
                position: Some(base + entry.offset),
                selected: true,
                skip_history: true,
            };
            if let Some(id) = self.add_node_with(entry.payload.clone(), options) {
                id_map.insert(entry.source_id, id);
                created.push(id);
            }
        }

        for wire in &clipboard.connections {
            let (Some(from), Some(to)) = (id_map.get(&wire.from.node), id_map.get(&wire.to.node)) else {
                continue;
            };
            let from = PortRef::new(*from, wire.from.port);
            let to = PortRef::new(*to, wire.to.port);
            if let Err(err) = self.connect(from, to, true) {
                tracing::warn!("Could not recreate connection {} -> {}: {}", from, to, err);
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::ChipSection;
    use crate::editor::tests::{chip, editor, port};
    use crate::gesture::PointerPhase;
    use egui::{Modifiers, PointerButton};
    use std::time::Instant;

    fn two_nodes(editor: &mut GraphEditor) -> (NodeId, NodeId) {
        let a = editor
            .add_node_with(chip("A", ChipSection::new().output("Out", "float")), AddNodeOptions::at(Pos2::new(0.0, 0.0)))
            .unwrap();
        let b = editor
            .add_node_with(chip("B", ChipSection::new().input("In", "float")), AddNodeOptions::at(Pos2::new(300.0, 0.0)))
            .unwrap();
        (a, b)
    }

    #[test]
    fn test_ids_increment() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        assert_eq!((a, b), (NodeId(0), NodeId(1)));
        let c = editor
            .add_node_with(chip("C", ChipSection::new()), AddNodeOptions { id: Some(NodeId(7)), ..Default::default() })
            .unwrap();
        assert_eq!(c, NodeId(7));
        assert_eq!(editor.add_node(chip("D", ChipSection::new())), Some(NodeId(8)));
        assert!(editor
            .add_node_with(chip("E", ChipSection::new()), AddNodeOptions { id: Some(NodeId(7)), ..Default::default() })
            .is_none());
    }

    #[test]
    fn test_add_at_viewport_center() {
        let mut editor = editor();
        let id = editor.add_node(chip("A", ChipSection::new())).unwrap();
        assert_eq!(editor.graph().node(id).unwrap().origin(), Pos2::ZERO);
        assert_eq!(editor.history().undo_depth(), 1);
    }

    #[test]
    fn test_failed_render_records_nothing() {
        let mut editor = editor();
        assert!(editor.add_node(ChipDescriptor::new("")).is_none());
        assert_eq!(editor.history().undo_depth(), 0);
    }

    #[test]
    fn test_delete_cascades() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.add_connection(port(a, 0), port(b, 0)).unwrap();
        assert!(editor.delete_node(a));
        assert_eq!(editor.graph().connection_count(), 0);
        assert!(!editor.delete_node(a));
    }

    #[test]
    fn test_delete_selected_is_one_step() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.select_node(a);
        editor.select_node(b);
        let before = editor.history().undo_depth();
        assert_eq!(editor.delete_selected(), 2);
        assert_eq!(editor.history().undo_depth(), before + 1);
        editor.undo().unwrap();
        assert_eq!(editor.graph().node_count(), 2);
    }

    #[test]
    fn test_selection_storage_order() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.select_node(b);
        editor.select_node(a);
        assert_eq!(editor.selected_nodes(), vec![a, b]);
        editor.select_only(b);
        assert_eq!(editor.selected_nodes(), vec![b]);
        assert!(!editor.select_node(NodeId(99)));
    }

    fn press(pos: Pos2, modifiers: Modifiers) -> PointerEvent {
        PointerEvent::mouse(PointerPhase::Down, pos, Some(PointerButton::Primary), Instant::now()).with_modifiers(modifiers)
    }

    #[test]
    fn test_drag_moves_selection_without_drift() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.select_node(a);
        editor.select_node(b);
        editor.camera.scale = 2.0;

        let start = editor.node_screen_rect(a).unwrap().center();
        editor.begin_node_drag(&press(start, Modifiers::NONE), a);
        let CanvasGesture::Nodes(mut drag) = std::mem::take(&mut editor.canvas) else {
            panic!("expected a node drag");
        };
        editor.drag_nodes(&mut drag, start + Vec2::new(2.0, 0.0));
        assert!(!drag.has_moved());
        editor.drag_nodes(&mut drag, start + Vec2::new(40.0, 20.0));
        editor.drag_nodes(&mut drag, start + Vec2::new(20.0, 10.0));

        // 20 screen px at scale 2 is 10 world units.
        assert_eq!(editor.graph().node(a).unwrap().origin(), Pos2::new(10.0, 5.0));
        assert_eq!(editor.graph().node(b).unwrap().origin(), Pos2::new(310.0, 5.0));
        assert_eq!(editor.graph().node_ids().last(), Some(b));
    }

    #[test]
    fn test_press_unselected_moves_only_it() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.select_node(a);
        let start = editor.node_screen_rect(b).unwrap().center();
        editor.begin_node_drag(&press(start, Modifiers::NONE), b);
        assert_eq!(editor.selected_nodes(), vec![b]);
        let CanvasGesture::Nodes(drag) = &editor.canvas else {
            panic!("expected a node drag");
        };
        assert!(drag.includes(b) && !drag.includes(a));
    }

    #[test]
    fn test_click_toggle_with_command() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.select_node(a);
        editor.select_node(b);
        let pos = editor.node_screen_rect(b).unwrap().center();

        editor.begin_node_drag(&press(pos, Modifiers::CTRL), b);
        let CanvasGesture::Nodes(drag) = std::mem::take(&mut editor.canvas) else {
            panic!("expected a node drag");
        };
        editor.finish_node_drag(&drag, true);
        assert_eq!(editor.selected_nodes(), vec![a]);

        // Ctrl-click on an unselected node preselects it and keeps it.
        editor.begin_node_drag(&press(pos, Modifiers::CTRL), b);
        let CanvasGesture::Nodes(drag) = std::mem::take(&mut editor.canvas) else {
            panic!("expected a node drag");
        };
        editor.finish_node_drag(&drag, true);
        assert_eq!(editor.selected_nodes(), vec![a, b]);
    }

    #[test]
    fn test_copy_paste_offsets_fan_out() {
        let mut editor = editor();
        let (a, b) = two_nodes(&mut editor);
        editor.add_connection(port(a, 0), port(b, 0)).unwrap();
        editor.select_node(a);
        editor.select_node(b);
        assert!(editor.copy_selection());

        let first = editor.paste();
        let second = editor.paste();
        assert_eq!(first.len(), 2);
        assert_eq!(editor.graph().node(first[0]).unwrap().origin(), Pos2::new(20.0, 20.0));
        assert_eq!(editor.graph().node(second[0]).unwrap().origin(), Pos2::new(40.0, 40.0));
        assert_eq!(editor.graph().node(second[1]).unwrap().origin(), Pos2::new(340.0, 40.0));
        assert_eq!(editor.graph().connection_count(), 3);
        assert_eq!(editor.selected_nodes(), second);

        // A fresh copy restarts the serial.
        editor.copy_selection();
        let third = editor.paste();
        assert_eq!(editor.graph().node(third[0]).unwrap().origin(), Pos2::new(20.0, 20.0));
    }

    #[test]
    fn test_paste_empty_clipboard() {
        let mut editor = editor();
        assert!(editor.paste().is_empty());
        assert_eq!(editor.history().undo_depth(), 0);
    }

    #[test]
    fn test_cut_is_one_step() {
        let mut editor = editor();
        let (a, _) = two_nodes(&mut editor);
        editor.select_node(a);
        let before = editor.history().undo_depth();
        assert!(editor.cut_selection());
        assert_eq!(editor.graph().node_count(), 1);
        assert_eq!(editor.history().undo_depth(), before + 1);
        assert_eq!(editor.paste().len(), 1);
    }

    #[test]
    fn test_duplicate_serial_resets_for_new_source() {
        let mut editor = editor();
        let (a, _) = two_nodes(&mut editor);
        editor.select_only(a);
        let copy = editor.duplicate_selection();
        assert_eq!(editor.graph().node(copy[0]).unwrap().origin(), Pos2::new(20.0, 20.0));

        // The copies are a new source set, so the offset restarts from them.
        let copy2 = editor.duplicate_selection();
        assert_eq!(editor.graph().node(copy2[0]).unwrap().origin(), Pos2::new(40.0, 40.0));

        // Re-duplicating the same original set fans out further.
        editor.select_only(a);
        let again = editor.duplicate_selection();
        assert_eq!(editor.graph().node(again[0]).unwrap().origin(), Pos2::new(20.0, 20.0));
        editor.select_only(a);
        let more = editor.duplicate_selection();
        assert_eq!(editor.graph().node(more[0]).unwrap().origin(), Pos2::new(40.0, 40.0));
    }
}
