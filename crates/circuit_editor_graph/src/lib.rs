// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chip graph editing engine.
//!
//! This crate models an infinite canvas of chips wired together through typed
//! ports and provides the interactive controller that edits it:
//! - Pan/zoom camera with pinch and wheel zoom
//! - Chip placement, selection, box-select and multi-node drag
//! - Typed connections with exec/data separation and adaptive `any` ports
//! - Snapshot undo/redo with batching
//! - Clipboard copy/cut/paste and duplicate
//! - Context menu and long-press gestures
//! - Selection export to PNG
//!
//! ## Architecture
//!
//! [`GraphEditor`] owns all mutable state. Hosts translate their input into
//! [`gesture`] events, feed them to the editor and paint what it reports back;
//! [`ui::GraphView`] does both for egui. Chip layout comes from a
//! [`ChipRenderer`], menus from a [`ContextMenu`] and export pixels from a
//! [`Rasterizer`].

pub mod camera;
pub mod chip;
pub mod config;
pub mod connection;
pub mod context_menu;
pub mod editor;
pub mod export;
pub mod gesture;
pub mod graph;
pub mod history;
pub mod node;
pub mod port;
pub mod types;
pub mod ui;

pub use camera::Camera;
pub use chip::{BlockRenderer, ChipDescriptor, ChipLibrary, ChipRenderer, ChipSection, PortDecl};
pub use config::{ConfigError, GraphConfig};
pub use connection::{Connection, ConnectionError, ConnectionId};
pub use context_menu::{ContextMenu, MenuAction, MenuItem, MenuState};
pub use editor::{AddNodeOptions, DragOutcome, GraphEditor, MenuOutcome};
pub use export::{ExportError, ExportOptions, ExportedImage, Rasterizer};
pub use graph::Graph;
pub use history::{History, HistoryError, Snapshot};
pub use node::{Node, NodeId};
pub use port::{Port, PortDirection, PortId, PortRef};
