// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph editor controller.
//!
//! [`GraphEditor`] owns every piece of editable state: the graph, the camera,
//! history, the clipboard and all in-flight gestures. Hosts feed it input
//! events and read back what to paint; nothing else mutates the graph.

mod capture;
mod input;
mod menu;
mod nodes;
mod wiring;

pub use menu::MenuOutcome;
pub use nodes::{AddNodeOptions, Clipboard, ClipboardConnection, ClipboardNode};
pub use wiring::{ConnectionDrag, DragOutcome, TempWire};

use crate::camera::{Camera, GridLines, RenderScheduler};
use crate::chip::ChipRenderer;
use crate::config::GraphConfig;
use crate::connection::{Connection, WirePath, WireStyle};
use crate::context_menu::ContextMenu;
use crate::export::Visibility;
use crate::gesture::{BoxSelect, LongPress, PanGesture, PinchGesture, TouchSet};
use crate::graph::{Graph, PortBindings};
use crate::history::{History, HistoryError, Snapshot};
use crate::node::NodeId;
use crate::port::{PortDirection, PortRef};
use capture::PendingExport;
use egui::{Pos2, Rect, Vec2};
use nodes::NodeDrag;

/// Gesture currently driving the canvas
#[derive(Debug, Clone, Default)]
enum CanvasGesture {
    #[default]
    Idle,
    Pan(PanGesture),
    Pinch(PinchGesture),
    Nodes(NodeDrag),
    Select(BoxSelect),
}

/// Interactive chip graph editor
pub struct GraphEditor {
    graph: Graph,
    camera: Camera,
    viewport: Vec2,
    config: GraphConfig,
    renderer: Box<dyn ChipRenderer>,
    history: History,
    clipboard: Option<Clipboard>,
    paste_serial: u32,
    duplicate_serial: u32,
    duplicate_source: Vec<NodeId>,
    bindings: PortBindings,
    visibility: Visibility,
    render: RenderScheduler,
    keyboard_installed: bool,
    touches: TouchSet,
    canvas: CanvasGesture,
    wire_drag: Option<ConnectionDrag>,
    cannot_connect: Option<PortRef>,
    long_press: Option<LongPress<Option<NodeId>>>,
    menu: Option<Box<dyn ContextMenu>>,
    pending_export: Option<PendingExport>,
}

impl GraphEditor {
    /// Create an editor for a viewport of the given size.
    ///
    /// The camera starts with the world origin at the viewport center and
    /// keyboard shortcuts are installed.
    pub fn new(renderer: Box<dyn ChipRenderer>, config: GraphConfig, viewport: Vec2) -> Self {
        let mut editor = Self {
            graph: Graph::new(),
            camera: Camera::centered(&config.camera, viewport),
            viewport,
            history: History::with_max_depth(config.history_depth),
            config,
            renderer,
            clipboard: None,
            paste_serial: 0,
            duplicate_serial: 0,
            duplicate_source: Vec::new(),
            bindings: PortBindings::default(),
            visibility: Visibility::default(),
            render: RenderScheduler::default(),
            keyboard_installed: false,
            touches: TouchSet::default(),
            canvas: CanvasGesture::Idle,
            wire_drag: None,
            cannot_connect: None,
            long_press: None,
            menu: None,
            pending_export: None,
        };
        editor.install_keyboard_shortcuts();
        editor.request_render();
        tracing::info!("Graph editor created ({}x{})", viewport.x, viewport.y);
        editor
    }

    /// Enable keyboard shortcuts. Returns `false` when already installed.
    pub fn install_keyboard_shortcuts(&mut self) -> bool {
        if self.keyboard_installed {
            return false;
        }
        self.keyboard_installed = true;
        true
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The camera
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Active configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Undo/redo state
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Derived port display state
    pub fn bindings(&self) -> &PortBindings {
        &self.bindings
    }

    /// Current paint overrides
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Viewport size in px
    pub fn viewport_size(&self) -> Vec2 {
        self.viewport
    }

    /// Update the viewport size. The camera is left alone.
    pub fn set_viewport_size(&mut self, size: Vec2) {
        if self.viewport != size {
            self.viewport = size;
            self.request_render();
        }
    }

    /// World point at the center of the viewport
    pub fn viewport_center_world(&self) -> Pos2 {
        self.camera.screen_to_world((self.viewport * 0.5).to_pos2())
    }

    /// Put the world origin back at the viewport center
    pub fn reset_camera(&mut self) {
        self.camera.reset(self.viewport);
        self.request_render();
    }

    /// Swap in a new configuration without touching graph state
    pub fn apply_config(&mut self, config: GraphConfig) {
        self.camera.set_limits(config.camera.min_scale, config.camera.max_scale);
        self.history.set_max_depth(config.history_depth);
        for node in self.graph.nodes_mut() {
            for port in &mut node.ports {
                port.base_color = config.palette.port_color(&port.resolved);
            }
        }
        self.config = config;
        self.refresh_bindings();
        self.request_render();
        tracing::info!("Applied editor configuration");
    }

    /// Queue a repaint. Returns `true` if this call scheduled it.
    pub fn request_render(&mut self) -> bool {
        self.render.request()
    }

    /// Consume the pending repaint, once per frame
    pub fn take_render(&mut self) -> bool {
        self.render.take()
    }

    pub(crate) fn refresh_bindings(&mut self) {
        self.bindings = self.graph.port_bindings();
    }

    // History

    fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.graph, self.camera.snapshot())
    }

    /// Record the current state as an undo step unless suppressed
    pub(crate) fn record_history(&mut self) {
        if self.history.wants_record() {
            let snapshot = self.snapshot();
            self.history.record(snapshot);
        }
    }

    /// Open a history batch: the mutations until [`Self::end_batch`] undo as one step
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    /// Close a history batch
    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    /// Step back one undo entry
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        let current = self.snapshot();
        let previous = self.history.undo(current)?;
        self.restore(previous);
        tracing::debug!("Undo ({} left)", self.history.undo_depth());
        Ok(())
    }

    /// Step forward one redo entry
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        let current = self.snapshot();
        let next = self.history.redo(current)?;
        self.restore(next);
        tracing::debug!("Redo ({} left)", self.history.redo_depth());
        Ok(())
    }

    /// Current state as a snapshot value
    pub fn capture_snapshot(&self) -> Snapshot {
        self.snapshot()
    }

    /// Replace the graph and camera with a snapshot, without recording history
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.cancel_connection_drag();
        self.canvas = CanvasGesture::Idle;
        self.long_press = None;
        self.history.begin_restore();

        self.graph.clear();
        self.camera.restore(snapshot.camera);

        for node in snapshot.nodes {
            let options = AddNodeOptions {
                id: Some(node.id),
                position: Some(Pos2::new(node.x, node.y)),
                selected: node.selected,
                skip_history: true,
            };
            if self.add_node_with(node.payload, options).is_none() {
                tracing::warn!("Could not restore node {}", node.id);
            }
        }
        for wire in snapshot.connections {
            match self.graph.check_connection(wire.from, wire.to) {
                Ok((from, to)) => {
                    self.graph.insert_connection(Connection::new(from, to));
                }
                Err(err) => tracing::warn!("Dropped connection {} -> {}: {}", wire.from, wire.to, err),
            }
        }
        self.graph.reseed_node_ids();

        self.history.end_restore();
        self.refresh_bindings();
        self.request_render();
    }

    // Geometry

    /// World rectangle mapped to the viewport
    pub fn world_rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_min_max(
            self.camera.world_to_screen(rect.min),
            self.camera.world_to_screen(rect.max),
        )
    }

    /// Node bounds in viewport px
    pub fn node_screen_rect(&self, id: NodeId) -> Option<Rect> {
        self.graph.node(id).map(|n| self.world_rect_to_screen(n.world_rect()))
    }

    /// Port bounds in viewport px
    pub fn port_screen_rect(&self, port: PortRef) -> Option<Rect> {
        let node = self.graph.node(port.node)?;
        let rect = node.port(port.port)?.world_rect(node.origin());
        Some(self.world_rect_to_screen(rect))
    }

    /// Topmost node under a viewport point
    pub fn node_at(&self, pos: Pos2) -> Option<NodeId> {
        let world = self.camera.screen_to_world(pos);
        self.graph
            .nodes()
            .rev()
            .filter(|n| !self.visibility.is_node_hidden(n.id))
            .find(|n| n.world_rect().contains(world))
            .map(|n| n.id)
    }

    /// Topmost port under a viewport point, with the configured hit slop
    pub fn port_at(&self, pos: Pos2) -> Option<PortRef> {
        let slop = self.config.gestures.port_hit_slop;
        self.graph
            .nodes()
            .rev()
            .filter(|n| !self.visibility.is_node_hidden(n.id))
            .find_map(|node| {
                node.ports.iter().find_map(|port| {
                    let rect = self.world_rect_to_screen(port.world_rect(node.origin()));
                    rect.expand(slop).contains(pos).then(|| PortRef::new(node.id, port.id))
                })
            })
    }

    /// Bezier for a connection in viewport px
    pub fn wire_path(&self, connection: &Connection) -> Option<WirePath> {
        let from = self.port_screen_rect(connection.from)?.center();
        let to = self.port_screen_rect(connection.to)?.center();
        Some(WirePath::between(
            from,
            PortDirection::Output,
            to,
            PortDirection::Input,
            self.config.wires.min_control_offset,
        ))
    }

    /// Stroke style for a connection
    pub fn wire_style(&self, connection: &Connection) -> WireStyle {
        let color = |port: PortRef| self.graph.port(port).and_then(|p| self.bindings.color_of(port, p));
        WireStyle::for_ports(color(connection.from), color(connection.to), self.camera.scale, &self.config.wires)
    }

    /// Background grid for the current view
    pub fn grid(&self) -> GridLines {
        self.camera.grid(self.config.camera.grid_major, self.config.camera.grid_minor)
    }

    /// Rubber-band rectangle while box-selecting
    pub fn box_select_rect(&self) -> Option<Rect> {
        match &self.canvas {
            CanvasGesture::Select(b) if b.dragged => Some(b.rect()),
            _ => None,
        }
    }

    /// Port currently marked as an invalid drop target
    pub fn cannot_connect(&self) -> Option<PortRef> {
        self.cannot_connect
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chip::{BlockRenderer, ChipDescriptor, ChipSection};
    use crate::port::PortId;

    pub(crate) fn editor() -> GraphEditor {
        GraphEditor::new(Box::new(BlockRenderer::default()), GraphConfig::default(), Vec2::new(800.0, 600.0))
    }

    pub(crate) fn chip(name: &str, section: ChipSection) -> ChipDescriptor {
        ChipDescriptor::new(name).with_section(section)
    }

    pub(crate) fn port(node: NodeId, index: u32) -> PortRef {
        PortRef::new(node, PortId(index))
    }

    #[test]
    fn test_new_centers_camera() {
        let editor = editor();
        assert_eq!(editor.camera().tx, 400.0);
        assert_eq!(editor.camera().ty, 300.0);
        assert_eq!(editor.viewport_center_world(), Pos2::ZERO);
    }

    #[test]
    fn test_keyboard_install_once() {
        let mut editor = editor();
        assert!(!editor.install_keyboard_shortcuts());
    }

    #[test]
    fn test_render_requests_coalesce() {
        let mut editor = editor();
        assert!(editor.take_render());
        assert!(editor.request_render());
        assert!(!editor.request_render());
        assert!(editor.take_render());
        assert!(!editor.take_render());
    }

    #[test]
    fn test_port_hit_testing() {
        let mut editor = editor();
        let id = editor
            .add_node_with(
                chip("A", ChipSection::new().input("In", "float")),
                AddNodeOptions::at(Pos2::new(0.0, 0.0)),
            )
            .unwrap();
        // Input port sits on the left edge, centered in the first row.
        let center = editor.port_screen_rect(port(id, 0)).unwrap().center();
        assert_eq!(center, Pos2::new(400.0, 300.0 + 24.0 + 11.0));
        assert_eq!(editor.port_at(center + Vec2::new(9.0, 0.0)), Some(port(id, 0)));
        assert_eq!(editor.port_at(center + Vec2::new(11.0, 0.0)), None);
        assert_eq!(editor.node_at(Pos2::new(450.0, 310.0)), Some(id));
    }

    #[test]
    fn test_apply_config_recolors_ports() {
        let mut editor = editor();
        let id = editor.add_node(chip("A", ChipSection::new().output("Out", "float"))).unwrap();
        let mut config = GraphConfig::default();
        config.palette.colors.insert("float".into(), [1, 2, 3]);
        config.history_depth = 5;
        editor.apply_config(config);
        assert_eq!(editor.graph().port(port(id, 0)).unwrap().base_color, Some([1, 2, 3]));
        assert_eq!(editor.history().max_depth(), 5);
    }
}
