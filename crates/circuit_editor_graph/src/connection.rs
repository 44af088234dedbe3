// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (wire) definitions and wire geometry.

use crate::config::WireConfig;
use crate::node::NodeId;
use crate::port::{PortDirection, PortId, PortRef};
use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A wire from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Output side
    pub from: PortRef,
    /// Input side
    pub to: PortRef,
}

impl Connection {
    /// Create a new connection
    pub fn new(from: PortRef, to: PortRef) -> Self {
        Self {
            id: ConnectionId::new(),
            from,
            to,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }

    /// Check if this connection touches a specific port
    pub fn involves_port(&self, port: PortRef) -> bool {
        self.from == port || self.to == port
    }

    /// The endpoint opposite to `port`
    pub fn other_end(&self, port: PortRef) -> Option<PortRef> {
        if self.from == port {
            Some(self.to)
        } else if self.to == port {
            Some(self.from)
        } else {
            None
        }
    }
}

/// Why a connection was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}/{1}")]
    PortNotFound(NodeId, PortId),

    /// Both ends are the same port
    #[error("Cannot connect a port to itself")]
    SelfConnection,

    /// Not an output paired with an input
    #[error("Connections must run from an output to an input")]
    DirectionMismatch,

    /// Exec paired with data
    #[error("Exec ports only connect to exec ports")]
    ExecMismatch,

    /// Allowed type sets do not intersect
    #[error("Incompatible port types")]
    IncompatibleTypes,

    /// Same output and input already wired
    #[error("Connection already exists")]
    Duplicate,
}

/// Cubic bezier for one wire, in screen space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WirePath {
    /// Start point
    pub p0: Pos2,
    /// First control point
    pub c1: Pos2,
    /// Second control point
    pub c2: Pos2,
    /// End point
    pub p1: Pos2,
}

impl WirePath {
    /// Curve from `p0` to `p1` where each end pulls horizontally towards its side.
    ///
    /// `side` is `-1` for inputs (pull left) and `+1` for outputs (pull right).
    pub fn new(p0: Pos2, side0: f32, p1: Pos2, side1: f32, min_offset: f32) -> Self {
        let offset = min_offset.max((p1.x - p0.x).abs() * 0.5);
        Self {
            p0,
            c1: Pos2::new(p0.x + offset * side0, p0.y),
            c2: Pos2::new(p1.x + offset * side1, p1.y),
            p1,
        }
    }

    /// Curve between two port centers
    pub fn between(
        from: Pos2,
        from_dir: PortDirection,
        to: Pos2,
        to_dir: PortDirection,
        min_offset: f32,
    ) -> Self {
        Self::new(from, from_dir.side(), to, to_dir.side(), min_offset)
    }

    /// Point on the curve at `t` in `[0, 1]`
    pub fn point(&self, t: f32) -> Pos2 {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        Pos2::new(
            a * self.p0.x + b * self.c1.x + c * self.c2.x + d * self.p1.x,
            a * self.p0.y + b * self.c1.y + c * self.c2.y + d * self.p1.y,
        )
    }

    /// Polyline approximation with `segments + 1` points
    pub fn points(&self, segments: usize) -> Vec<Pos2> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point(i as f32 / segments as f32))
            .collect()
    }

    /// Rectangle containing the end points and both control points
    pub fn control_bounds(&self) -> Rect {
        Rect::from_points(&[self.p0, self.c1, self.c2, self.p1])
    }
}

/// Stroke appearance of a wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireStyle {
    /// Stroke color
    pub color: [u8; 3],
    /// Stroke width in screen px
    pub width: f32,
    /// Opacity of the halo drawn under the stroke
    pub shadow_alpha: f32,
}

impl WireStyle {
    /// Style for a wire between two ports with optional colors.
    ///
    /// The output side's color wins, then the input side's, then the default.
    pub fn for_ports(
        from_color: Option<[u8; 3]>,
        to_color: Option<[u8; 3]>,
        scale: f32,
        config: &WireConfig,
    ) -> Self {
        Self {
            color: from_color.or(to_color).unwrap_or(config.default_color),
            width: config.stroke_width(scale),
            shadow_alpha: config.shadow_alpha,
        }
    }

    /// Halo color as RGBA
    pub fn shadow_rgba(&self) -> [u8; 4] {
        let [r, g, b] = self.color;
        [r, g, b, (self.shadow_alpha.clamp(0.0, 1.0) * 255.0).round() as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_end() {
        let a = PortRef::new(NodeId(1), PortId(2));
        let b = PortRef::new(NodeId(2), PortId(0));
        let c = Connection::new(a, b);
        assert_eq!(c.other_end(a), Some(b));
        assert_eq!(c.other_end(b), Some(a));
        assert_eq!(c.other_end(PortRef::new(NodeId(9), PortId(0))), None);
        assert!(c.involves_node(NodeId(2)));
    }

    #[test]
    fn test_control_offsets() {
        // Short horizontal distance uses the minimum offset.
        let path = WirePath::new(Pos2::new(0.0, 0.0), 1.0, Pos2::new(40.0, 100.0), -1.0, 60.0);
        assert_eq!(path.c1, Pos2::new(60.0, 0.0));
        assert_eq!(path.c2, Pos2::new(-20.0, 100.0));

        // Long distance uses half the span.
        let path = WirePath::new(Pos2::new(0.0, 0.0), 1.0, Pos2::new(400.0, 0.0), -1.0, 60.0);
        assert_eq!(path.c1, Pos2::new(200.0, 0.0));
        assert_eq!(path.c2, Pos2::new(200.0, 0.0));
    }

    #[test]
    fn test_curve_end_points() {
        let path = WirePath::between(
            Pos2::new(10.0, 10.0),
            PortDirection::Output,
            Pos2::new(300.0, 80.0),
            PortDirection::Input,
            60.0,
        );
        let points = path.points(16);
        assert_eq!(points.len(), 17);
        assert_eq!(points[0], Pos2::new(10.0, 10.0));
        assert!((points[16].x - 300.0).abs() < 1e-3 && (points[16].y - 80.0).abs() < 1e-3);
        assert!(path.control_bounds().contains(Pos2::new(155.0, 45.0)));
    }

    #[test]
    fn test_style_color_fallbacks() {
        let config = WireConfig::default();
        let style = WireStyle::for_ports(Some([1, 2, 3]), Some([9, 9, 9]), 1.0, &config);
        assert_eq!(style.color, [1, 2, 3]);
        let style = WireStyle::for_ports(None, Some([9, 9, 9]), 1.0, &config);
        assert_eq!(style.color, [9, 9, 9]);
        let style = WireStyle::for_ports(None, None, 4.0, &config);
        assert_eq!(style.color, config.default_color);
        assert!((style.width - 10.0).abs() < f32::EPSILON);
        assert_eq!(style.shadow_rgba()[3], 89);
    }
}
