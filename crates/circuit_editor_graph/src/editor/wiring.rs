// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection creation, removal and the drag-to-connect gesture.

use super::GraphEditor;
use crate::connection::{Connection, ConnectionError, ConnectionId, WirePath};
use crate::gesture::{exceeds_threshold, PointerId};
use crate::port::{PortDirection, PortRef};
use egui::Pos2;

/// In-flight drag from a port
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDrag {
    /// Owning pointer
    pub pointer: PointerId,
    /// Port the drag started on
    pub origin: PortRef,
    /// Direction of the origin port
    pub direction: PortDirection,
    /// Press position
    pub start: Pos2,
    /// Latest pointer position
    pub current: Pos2,
    /// The origin already had connections when pressed
    pub had_connections: bool,
    /// Passed the drag threshold
    pub moved: bool,
}

/// How a connection drag ended
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// A new connection was made
    Connected(ConnectionId),
    /// The drop target refused the connection
    Rejected(ConnectionError),
    /// A click on a connected port removed this many connections
    Disconnected(usize),
    /// Released over nothing useful
    Cancelled,
}

/// Temporary wire following the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempWire {
    /// Curve in viewport px
    pub path: WirePath,
    /// Stroke color
    pub color: [u8; 3],
}

impl GraphEditor {
    /// Connect two ports. The ends may be given in either order.
    ///
    /// A conflicting wire on a single-slot end is replaced; the replacement and
    /// the new wire undo as one step.
    pub fn add_connection(&mut self, a: PortRef, b: PortRef) -> Result<ConnectionId, ConnectionError> {
        self.connect(a, b, false)
    }

    pub(crate) fn connect(&mut self, a: PortRef, b: PortRef, skip_history: bool) -> Result<ConnectionId, ConnectionError> {
        let (from, to) = self
            .graph
            .check_connection(a, b)
            .inspect_err(|err| tracing::debug!("Connection {} -> {} rejected: {}", a, b, err))?;

        let from_single = self.graph.port(from).is_some_and(|p| p.is_single_slot());
        let to_single = self.graph.port(to).is_some_and(|p| p.is_single_slot());

        self.begin_batch();
        if !skip_history {
            self.record_history();
        }
        let replaced = self
            .graph
            .remove_connections_where(|c| (to_single && c.to == to) || (from_single && c.from == from));
        let id = self.graph.insert_connection(Connection::new(from, to));
        self.end_batch();

        if !replaced.is_empty() {
            tracing::debug!("Replaced {} connection(s) on single-slot ports", replaced.len());
        }
        tracing::debug!("Connected {} -> {}", from, to);
        self.refresh_bindings();
        self.request_render();
        Ok(id)
    }

    /// Remove one connection
    pub fn remove_connection(&mut self, id: ConnectionId) -> bool {
        if self.graph.connection(id).is_none() {
            tracing::debug!("Remove ignored, no connection {:?}", id);
            return false;
        }
        self.record_history();
        self.graph.disconnect(id);
        self.refresh_bindings();
        self.request_render();
        true
    }

    /// Remove every connection touching a port
    pub fn remove_connections_for_port(&mut self, port: PortRef) -> usize {
        self.remove_connections_matching(|c| c.involves_port(port))
    }

    /// Remove every connection leaving a port
    pub fn remove_connections_from_port(&mut self, port: PortRef) -> usize {
        self.remove_connections_matching(|c| c.from == port)
    }

    /// Remove every connection arriving at a port
    pub fn remove_connections_to_port(&mut self, port: PortRef) -> usize {
        self.remove_connections_matching(|c| c.to == port)
    }

    fn remove_connections_matching(&mut self, pred: impl Fn(&Connection) -> bool) -> usize {
        let matching = self.graph.connections().filter(|c| pred(c)).count();
        if matching == 0 {
            return 0;
        }
        self.record_history();
        let removed = self.graph.remove_connections_where(pred).len();
        self.refresh_bindings();
        self.request_render();
        removed
    }

    // Drag gesture

    /// The in-flight connection drag
    pub fn connection_drag(&self) -> Option<&ConnectionDrag> {
        self.wire_drag.as_ref()
    }

    /// Start dragging from a port. Any previous drag is cancelled.
    pub fn begin_connection_drag(&mut self, pointer: PointerId, origin: PortRef, pos: Pos2) -> bool {
        self.cancel_connection_drag();
        let Some(port) = self.graph.port(origin) else {
            tracing::debug!("Drag ignored, no port {}", origin);
            return false;
        };
        self.wire_drag = Some(ConnectionDrag {
            pointer,
            origin,
            direction: port.direction,
            start: pos,
            current: pos,
            had_connections: self.graph.is_port_connected(origin),
            moved: false,
        });
        tracing::debug!("Connection drag from {}", origin);
        self.request_render();
        true
    }

    /// Track the pointer and mark an invalid hovered port
    pub fn update_connection_drag(&mut self, pointer: PointerId, pos: Pos2) {
        let threshold = self.config.gestures.drag_threshold;
        let Some(drag) = self.wire_drag.as_mut().filter(|d| d.pointer == pointer) else {
            return;
        };
        drag.current = pos;
        if !drag.moved && exceeds_threshold(drag.start, pos, threshold) {
            drag.moved = true;
        }
        let origin = drag.origin;

        self.cannot_connect = self
            .port_at(pos)
            .filter(|target| *target != origin && self.graph.check_connection(origin, *target).is_err());
        self.request_render();
    }

    /// Finish the drag at `pos`
    pub fn end_connection_drag(&mut self, pointer: PointerId, pos: Pos2) -> DragOutcome {
        let Some(drag) = self.wire_drag.take_if(|d| d.pointer == pointer) else {
            return DragOutcome::Cancelled;
        };
        self.cannot_connect = None;
        self.request_render();

        let target = self.port_at(pos);
        if target == Some(drag.origin) {
            if !drag.moved && drag.had_connections {
                let removed = self.remove_connections_for_port(drag.origin);
                tracing::debug!("Click on {} removed {} connection(s)", drag.origin, removed);
                return DragOutcome::Disconnected(removed);
            }
            return DragOutcome::Cancelled;
        }
        let Some(target) = target else {
            return DragOutcome::Cancelled;
        };
        match self.add_connection(drag.origin, target) {
            Ok(id) => DragOutcome::Connected(id),
            Err(err) => DragOutcome::Rejected(err),
        }
    }

    /// Abort the drag without changes
    pub fn cancel_connection_drag(&mut self) -> bool {
        if self.wire_drag.take().is_none() {
            return false;
        }
        self.cannot_connect = None;
        self.request_render();
        true
    }

    /// The wire to paint while dragging
    pub fn temp_wire(&self) -> Option<TempWire> {
        let drag = self.wire_drag.as_ref()?;
        if self.visibility.temp_wire_hidden || (drag.had_connections && !drag.moved) {
            return None;
        }
        let start = self.port_screen_rect(drag.origin)?.center();
        let side = drag.direction.side();
        let color = self
            .graph
            .port(drag.origin)
            .and_then(|p| self.bindings.color_of(drag.origin, p))
            .unwrap_or(self.config.wires.temp_color);
        Some(TempWire {
            path: WirePath::new(start, side, drag.current, -side, self.config.wires.min_control_offset),
            color,
        })
    }
}
