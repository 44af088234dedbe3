// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for chip inputs/outputs.

use crate::node::NodeId;
use crate::types::ResolvedType;
use egui::{Pos2, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port identifier, unique within its owning node only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// Horizontal pull of wires leaving this side: inputs pull left, outputs right
    pub fn side(self) -> f32 {
        match self {
            Self::Input => -1.0,
            Self::Output => 1.0,
        }
    }
}

/// A port addressed through its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Port within the node
    pub port: PortId,
}

impl PortRef {
    /// Create a port reference
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.port)
    }
}

/// A port on a node, resolved once when the node is created
#[derive(Debug, Clone)]
pub struct Port {
    /// Positional id within the node
    pub id: PortId,
    /// Label
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Chip section the port belongs to
    pub section: usize,
    /// Index among the section's ports of the same direction
    pub slot: usize,
    /// Declared type as written in the descriptor
    pub declared_type: Option<String>,
    /// Resolved type information
    pub resolved: ResolvedType,
    /// Color from the palette, `None` for adaptive or untyped ports
    pub base_color: Option<[u8; 3]>,
    /// Bounds relative to the node origin, in world units
    pub rect: Rect,
}

impl Port {
    /// Control-flow port
    pub fn is_exec(&self) -> bool {
        self.resolved.is_exec
    }

    /// Color follows whatever concrete port this connects to
    pub fn is_adaptive(&self) -> bool {
        self.resolved.adaptive
    }

    /// Input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Output port
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// Whether this port accepts more than one connection.
    ///
    /// Data inputs and exec outputs hold a single wire.
    pub fn is_single_slot(&self) -> bool {
        match self.direction {
            PortDirection::Input => !self.is_exec(),
            PortDirection::Output => self.is_exec(),
        }
    }

    /// Bounds in world space for a node at `origin`
    pub fn world_rect(&self, origin: Pos2) -> Rect {
        self.rect.translate(origin.to_vec2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Vec2;

    fn port(direction: PortDirection, ty: &str) -> Port {
        Port {
            id: PortId(0),
            name: "p".into(),
            direction,
            section: 0,
            slot: 0,
            declared_type: Some(ty.into()),
            resolved: ResolvedType::resolve(Some(ty), &[]),
            base_color: None,
            rect: Rect::from_min_size(Pos2::new(-6.0, 20.0), Vec2::splat(12.0)),
        }
    }

    #[test]
    fn test_single_slot_rules() {
        assert!(port(PortDirection::Input, "float").is_single_slot());
        assert!(!port(PortDirection::Output, "float").is_single_slot());
        assert!(port(PortDirection::Output, "exec").is_single_slot());
        assert!(!port(PortDirection::Input, "exec").is_single_slot());
    }

    #[test]
    fn test_world_rect() {
        let p = port(PortDirection::Input, "int");
        let rect = p.world_rect(Pos2::new(100.0, 50.0));
        assert_eq!(rect.center(), Pos2::new(100.0, 76.0));
    }

    #[test]
    fn test_display() {
        let r = PortRef::new(NodeId(3), PortId(7));
        assert_eq!(r.to_string(), "node-3/port-7");
    }
}
