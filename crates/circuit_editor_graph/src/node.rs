// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the chip graph.

use crate::chip::{ChipDescriptor, RenderedChip};
use crate::port::{Port, PortDirection, PortId};
use crate::types::{ResolvedType, TypePalette};
use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a node, written as `node-<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Error parsing the textual form of a node id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid node id: {0}")]
pub struct NodeIdParseError(pub String);

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("node-")
            .and_then(|n| n.parse().ok())
            .map(NodeId)
            .ok_or_else(|| NodeIdParseError(s.to_string()))
    }
}

/// A chip instance on the canvas
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Top-left corner in world space
    pub position: [f32; 2],
    /// Selection flag
    pub selected: bool,
    /// Payload the node was created from
    pub descriptor: ChipDescriptor,
    /// Size in world units
    pub size: Vec2,
    /// Title bar height in world units
    pub header_height: f32,
    /// Ports in markup order; `PortId(i)` is `ports[i]`
    pub ports: Vec<Port>,
}

impl Node {
    /// Build a node from rendered geometry, stitching port metadata back by
    /// section and slot.
    pub fn from_rendered(
        id: NodeId,
        descriptor: ChipDescriptor,
        rendered: RenderedChip,
        palette: &TypePalette,
    ) -> Self {
        let ports = rendered
            .ports
            .into_iter()
            .enumerate()
            .map(|(index, rp)| {
                let decl = descriptor.port_decl(rp.section, rp.direction, rp.slot);
                let declared_type = decl
                    .and_then(|d| d.type_name.clone())
                    .filter(|t| !t.trim().is_empty())
                    .or(rp.type_hint);
                let resolved = ResolvedType::resolve(declared_type.as_deref(), &descriptor.type_params);
                let base_color = palette.port_color(&resolved);
                Port {
                    id: PortId(index as u32),
                    name: decl.map(|d| d.name.clone()).unwrap_or_default(),
                    direction: rp.direction,
                    section: rp.section,
                    slot: rp.slot,
                    declared_type,
                    resolved,
                    base_color,
                    rect: rp.rect,
                }
            })
            .collect();

        Self {
            id,
            position: [0.0, 0.0],
            selected: false,
            descriptor,
            size: rendered.size,
            header_height: rendered.header_height,
            ports,
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Position as a point
    pub fn origin(&self) -> Pos2 {
        Pos2::new(self.position[0], self.position[1])
    }

    /// Bounds in world space
    pub fn world_rect(&self) -> Rect {
        Rect::from_min_size(self.origin(), self.size)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.ports.get(port_id.0 as usize).filter(|p| p.id == port_id)
    }

    /// Input ports
    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction == PortDirection::Input)
    }

    /// Output ports
    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.direction == PortDirection::Output)
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}
