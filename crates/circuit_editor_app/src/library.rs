// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chip palette contents.
//!
//! A built-in demo set, optionally extended from a `chips.ron` file next to
//! the editor configuration.

use circuit_editor_graph::chip::DescriptorError;
use circuit_editor_graph::types::{TypeParam, ANY, EXEC};
use circuit_editor_graph::{ChipDescriptor, ChipLibrary, ChipSection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Chip file errors
#[derive(Debug, Error)]
pub enum LibraryError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A chip failed validation
    #[error("Invalid chip: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// On-disk list of extra chips
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChipFile {
    /// Chips to add to the palette
    #[serde(default)]
    pub chips: Vec<ChipDescriptor>,
}

/// The built-in chips
pub fn demo_library() -> ChipLibrary {
    let chips = [
        ChipDescriptor::new("Event Receiver").with_section(ChipSection::new().output("", EXEC)),
        ChipDescriptor::new("If")
            .with_section(ChipSection::new().input("Run", EXEC).input("Condition", "bool"))
            .with_section(ChipSection::new().output("Then", EXEC).output("Else", EXEC)),
        ChipDescriptor::new("Add")
            .with_type_param(TypeParam::new("T").with_constraint("(int, float)"))
            .with_section(ChipSection::new().input("A", "T").input("B", "T").output("Sum", "T")),
        ChipDescriptor::new("Greater Than")
            .with_type_param(TypeParam::new("T").with_constraint("(int, float)"))
            .with_section(ChipSection::new().input("A", "T").input("B", "T").output("Result", "bool")),
        ChipDescriptor::new("Float Constant").with_section(ChipSection::new().output("Value", "float")),
        ChipDescriptor::new("Integer Constant").with_section(ChipSection::new().output("Value", "int")),
        ChipDescriptor::new("Random Float")
            .with_section(ChipSection::new().input("Min", "float").input("Max", "float").output("Value", "float")),
        ChipDescriptor::new("Round").with_section(ChipSection::new().input("Value", "float").output("Result", "int")),
        ChipDescriptor::new("To String").with_section(ChipSection::new().input("Value", ANY).output("Text", "string")),
        ChipDescriptor::new("Log")
            .with_section(ChipSection::new().input("Run", EXEC).input("Message", ANY).output("", EXEC)),
        ChipDescriptor::new("Local Player").with_section(ChipSection::new().output("Player", "player")),
        ChipDescriptor::new("Set Color")
            .with_section(ChipSection::new().input("Run", EXEC).input("Color", "color").output("", EXEC)),
        ChipDescriptor::new("Value Or Color")
            .with_section(ChipSection::new().input("In", "(float|color)").output("Out", "(float|color)")),
    ];

    let mut library = ChipLibrary::new();
    for chip in chips {
        let name = chip.name.clone();
        if let Err(e) = library.register(chip) {
            tracing::warn!("Skipping built-in chip '{}': {}", name, e);
        }
    }
    library
}

/// Parse a chip file
pub fn parse_chip_file(content: &str) -> Result<ChipFile, LibraryError> {
    Ok(ron::from_str(content)?)
}

/// Add every chip from a file. Stops at the first invalid chip.
pub fn extend_from_file(library: &mut ChipLibrary, path: &Path) -> Result<usize, LibraryError> {
    let content = std::fs::read_to_string(path)?;
    let file = parse_chip_file(&content)?;
    let count = file.chips.len();
    for chip in file.chips {
        library.register(chip)?;
    }
    tracing::info!("Loaded {} chip(s) from {:?}", count, path);
    Ok(count)
}
