// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chip descriptors and the chip renderer contract.
//!
//! A [`ChipDescriptor`] is the payload a node is created from. The engine
//! treats it as opaque apart from the port declarations it carries. Turning a
//! descriptor into geometry is the job of a [`ChipRenderer`]; the engine only
//! needs the node size and one rectangle per port, in markup order.

use crate::port::PortDirection;
use crate::types::{looks_like_list, TypeExpr, TypeParam};
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared port on a chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDecl {
    /// Label
    pub name: String,
    /// Declared type
    #[serde(default)]
    pub type_name: Option<String>,
}

impl PortDecl {
    /// Create a port declaration
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
        }
    }
}

/// A group of inputs and outputs rendered side by side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipSection {
    /// Input ports, top to bottom
    #[serde(default)]
    pub inputs: Vec<PortDecl>,
    /// Output ports, top to bottom
    #[serde(default)]
    pub outputs: Vec<PortDecl>,
}

impl ChipSection {
    /// Empty section
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input
    pub fn input(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.inputs.push(PortDecl::new(name, type_name));
        self
    }

    /// Add an output
    pub fn output(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.outputs.push(PortDecl::new(name, type_name));
        self
    }

    fn ports(&self, direction: PortDirection) -> &[PortDecl] {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }
}

/// Payload describing a chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipDescriptor {
    /// Display name
    pub name: String,
    /// Generic parameters referenced by port types
    #[serde(default)]
    pub type_params: Vec<TypeParam>,
    /// Port sections
    #[serde(default)]
    pub sections: Vec<ChipSection>,
}

/// Descriptor problems caught before a chip is ever placed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A port type that yields no type information
    #[error("Port '{port}' has an unparsable type '{raw}'")]
    UnparsableType {
        /// Port label
        port: String,
        /// Declared type
        raw: String,
    },

    /// A type parameter constraint that is not a type list
    #[error("Type parameter '{param}' has an unparsable constraint '{raw}'")]
    UnparsableConstraint {
        /// Parameter name
        param: String,
        /// Declared constraint
        raw: String,
    },
}

impl ChipDescriptor {
    /// Chip with no ports
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Add a generic parameter
    pub fn with_type_param(mut self, param: TypeParam) -> Self {
        self.type_params.push(param);
        self
    }

    /// Add a section
    pub fn with_section(mut self, section: ChipSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Metadata for the `slot`-th port of one direction in one section
    pub fn port_decl(&self, section: usize, direction: PortDirection, slot: usize) -> Option<&PortDecl> {
        self.sections.get(section)?.ports(direction).get(slot)
    }

    /// Check that every declared type parses
    pub fn validate(&self) -> Result<(), DescriptorError> {
        for section in &self.sections {
            for decl in section.inputs.iter().chain(&section.outputs) {
                let Some(raw) = decl.type_name.as_deref() else {
                    continue;
                };
                if !raw.trim().is_empty() && TypeExpr::parse(raw).is_none() {
                    return Err(DescriptorError::UnparsableType {
                        port: decl.name.clone(),
                        raw: raw.to_string(),
                    });
                }
            }
        }
        for param in &self.type_params {
            let Some(raw) = param.constraint.as_deref() else {
                continue;
            };
            let parses = raw.trim().is_empty() || TypeExpr::parse(raw).is_some() || looks_like_list(raw);
            if !parses {
                return Err(DescriptorError::UnparsableConstraint {
                    param: param.name.clone(),
                    raw: raw.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Port geometry produced by a renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPort {
    /// Section index in the descriptor
    pub section: usize,
    /// Port direction
    pub direction: PortDirection,
    /// Index among the section's ports of this direction
    pub slot: usize,
    /// Bounds relative to the node origin, in world units
    pub rect: Rect,
    /// Type the markup carries, used when the descriptor declares none
    pub type_hint: Option<String>,
}

/// Geometry of one rendered chip
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChip {
    /// Node size in world units
    pub size: Vec2,
    /// Title bar height in world units
    pub header_height: f32,
    /// Ports in markup order
    pub ports: Vec<RenderedPort>,
}

/// External chip renderer.
///
/// Returns `None` when the descriptor produced nothing to show.
pub trait ChipRenderer {
    /// Lay out a chip
    fn render(&self, descriptor: &ChipDescriptor) -> Option<RenderedChip>;
}

/// Fixed-metric renderer: title bar, then one row per port pair in each section
#[derive(Debug, Clone)]
pub struct BlockRenderer {
    /// Chip width
    pub width: f32,
    /// Title bar height
    pub header_height: f32,
    /// Height of one port row
    pub row_height: f32,
    /// Port square size
    pub port_size: f32,
    /// Gap under the last row
    pub bottom_padding: f32,
}

impl Default for BlockRenderer {
    fn default() -> Self {
        Self {
            width: 180.0,
            header_height: 24.0,
            row_height: 22.0,
            port_size: 12.0,
            bottom_padding: 8.0,
        }
    }
}

impl BlockRenderer {
    fn port_rect(&self, x: f32, row_top: f32) -> Rect {
        Rect::from_center_size(
            Pos2::new(x, row_top + self.row_height * 0.5),
            Vec2::splat(self.port_size),
        )
    }
}

impl ChipRenderer for BlockRenderer {
    fn render(&self, descriptor: &ChipDescriptor) -> Option<RenderedChip> {
        if descriptor.name.trim().is_empty() && descriptor.sections.is_empty() {
            return None;
        }

        let mut ports = Vec::new();
        let mut top = self.header_height;
        for (section_index, section) in descriptor.sections.iter().enumerate() {
            for (direction, x) in [(PortDirection::Input, 0.0), (PortDirection::Output, self.width)] {
                for (slot, decl) in section.ports(direction).iter().enumerate() {
                    ports.push(RenderedPort {
                        section: section_index,
                        direction,
                        slot,
                        rect: self.port_rect(x, top + slot as f32 * self.row_height),
                        type_hint: decl.type_name.clone(),
                    });
                }
            }
            let rows = section.inputs.len().max(section.outputs.len());
            top += rows as f32 * self.row_height;
        }

        Some(RenderedChip {
            size: Vec2::new(self.width, top + self.bottom_padding),
            header_height: self.header_height,
            ports,
        })
    }
}

/// Named chips offered by a palette
#[derive(Debug, Clone, Default)]
pub struct ChipLibrary {
    chips: IndexMap<String, ChipDescriptor>,
}

impl ChipLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chip under its name. Invalid descriptors are refused.
    pub fn register(&mut self, chip: ChipDescriptor) -> Result<(), DescriptorError> {
        chip.validate()?;
        self.chips.insert(chip.name.clone(), chip);
        Ok(())
    }

    /// Look up a chip
    pub fn get(&self, name: &str) -> Option<&ChipDescriptor> {
        self.chips.get(name)
    }

    /// All chips in registration order
    pub fn chips(&self) -> impl Iterator<Item = &ChipDescriptor> {
        self.chips.values()
    }

    /// Case-insensitive substring search on names
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a ChipDescriptor> + 'a {
        let query = query.trim().to_lowercase();
        self.chips
            .values()
            .filter(move |chip| query.is_empty() || chip.name.to_lowercase().contains(&query))
    }

    /// Number of chips
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_chip() -> ChipDescriptor {
        ChipDescriptor::new("Add")
            .with_type_param(TypeParam::new("T").with_constraint("(float, int)"))
            .with_section(ChipSection::new().input("A", "T").input("B", "T").output("Sum", "T"))
    }

    #[test]
    fn test_port_decl_lookup() {
        let chip = add_chip();
        assert_eq!(chip.port_decl(0, PortDirection::Input, 1).map(|d| d.name.as_str()), Some("B"));
        assert!(chip.port_decl(0, PortDirection::Output, 1).is_none());
        assert!(chip.port_decl(3, PortDirection::Input, 0).is_none());
    }

    #[test]
    fn test_block_layout_order() {
        let chip = ChipDescriptor::new("If")
            .with_section(ChipSection::new().input("Run", "exec").output("Then", "exec").output("Else", "exec"))
            .with_section(ChipSection::new().input("Condition", "bool"));
        let rendered = BlockRenderer::default().render(&chip).unwrap();

        let order: Vec<_> = rendered.ports.iter().map(|p| (p.section, p.direction, p.slot)).collect();
        assert_eq!(
            order,
            vec![
                (0, PortDirection::Input, 0),
                (0, PortDirection::Output, 0),
                (0, PortDirection::Output, 1),
                (1, PortDirection::Input, 0),
            ]
        );
        // Two rows for the first section, one for the second.
        assert!((rendered.size.y - (24.0 + 3.0 * 22.0 + 8.0)).abs() < f32::EPSILON);
        assert!((rendered.ports[1].rect.center().x - 180.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_descriptor_renders_nothing() {
        assert!(BlockRenderer::default().render(&ChipDescriptor::new("  ")).is_none());
    }

    #[test]
    fn test_validate() {
        assert!(add_chip().validate().is_ok());
        let bad = ChipDescriptor::new("Bad").with_section(ChipSection::new().input("X", "()"));
        assert!(matches!(bad.validate(), Err(DescriptorError::UnparsableType { .. })));
    }

    #[test]
    fn test_library_search() {
        let mut library = ChipLibrary::new();
        library.register(add_chip()).unwrap();
        library.register(ChipDescriptor::new("Random Float")).unwrap();
        assert_eq!(library.search("add").count(), 1);
        assert_eq!(library.search("").count(), 2);
        assert_eq!(library.search("FLOAT").next().map(|c| c.name.as_str()), Some("Random Float"));
    }

    #[test]
    fn test_descriptor_ron() {
        let chip = add_chip();
        let text = ron::to_string(&chip).unwrap();
        let back: ChipDescriptor = ron::from_str(&text).unwrap();
        assert_eq!(back, chip);
    }
}
