// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selection-to-image export.
//!
//! The engine decides what region to capture and what to hide while capturing.
//! Turning that region into pixels is the job of an external [`Rasterizer`].

use crate::connection::{ConnectionId, WirePath};
use crate::editor::GraphEditor;
use crate::node::NodeId;
use egui::{Pos2, Rect, Vec2};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing selected
    #[error("No nodes selected")]
    EmptySelection,

    /// Another export has not finished
    #[error("An export is already in progress")]
    InProgress,

    /// The capture region lies outside the viewport
    #[error("Export region is empty")]
    EmptyRegion,

    /// The rasterizer failed
    #[error("Rasterizer failed: {0}")]
    Rasterizer(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How an export is framed and what it shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Space around the content (screen px)
    pub padding: f32,
    /// RGBA fill composited under the capture
    pub background: Option<[u8; 4]>,
    /// Output pixels per screen px
    pub pixel_ratio: f32,
    /// Capture wires between selected nodes
    pub include_wires: bool,
    /// Hide nodes outside the selection
    pub hide_unselected: bool,
    /// Hide the background grid
    pub hide_grid: bool,
    /// Hide selection outlines
    pub hide_selection_outline: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            padding: 150.0,
            background: None,
            pixel_ratio: 1.0,
            include_wires: true,
            hide_unselected: true,
            hide_grid: true,
            hide_selection_outline: true,
        }
    }
}

impl ExportOptions {
    /// Set the padding
    pub fn with_padding(mut self, padding: f32) -> Self {
        self.padding = padding;
        self
    }

    /// Set the background fill
    pub fn with_background(mut self, rgba: [u8; 4]) -> Self {
        self.background = Some(rgba);
        self
    }

    /// Set the pixel ratio
    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    /// Include or leave out wires
    pub fn with_wires(mut self, include: bool) -> Self {
        self.include_wires = include;
        self
    }
}

/// Elements temporarily hidden from painting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visibility {
    /// Nodes not painted
    pub hidden_nodes: HashSet<NodeId>,
    /// Wires not painted
    pub hidden_connections: HashSet<ConnectionId>,
    /// The in-progress connection wire is not painted
    pub temp_wire_hidden: bool,
    /// Number of active grid-hiding overrides
    pub grid_hidden_depth: u32,
    /// Selection outlines not painted
    pub outlines_hidden: bool,
}

impl Visibility {
    /// Whether a node is hidden
    pub fn is_node_hidden(&self, id: NodeId) -> bool {
        self.hidden_nodes.contains(&id)
    }

    /// Whether a wire is hidden
    pub fn is_connection_hidden(&self, id: ConnectionId) -> bool {
        self.hidden_connections.contains(&id)
    }

    /// Whether the grid is hidden
    pub fn grid_hidden(&self) -> bool {
        self.grid_hidden_depth > 0
    }
}

/// A prepared capture waiting for pixels
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    /// Region to capture, viewport px with integral edges
    pub region: Rect,
    /// Output pixels per viewport px
    pub pixel_ratio: f32,
    /// Fill composited under the capture
    pub background: Option<[u8; 4]>,
    /// Suggested file name
    pub file_name: String,
    /// Nodes the capture shows
    pub nodes: Vec<NodeId>,
}

impl ExportJob {
    /// Output image size
    pub fn output_size(&self) -> (u32, u32) {
        (
            (self.region.width() * self.pixel_ratio).ceil().max(1.0) as u32,
            (self.region.height() * self.pixel_ratio).ceil().max(1.0) as u32,
        )
    }
}

/// Renders the editor's visible state inside a region to pixels
pub trait Rasterizer {
    /// Capture `job.region` at `job.pixel_ratio`, honoring the editor's visibility overrides
    fn rasterize(&mut self, editor: &GraphEditor, job: &ExportJob) -> Result<RgbaImage, ExportError>;
}

/// A finished export
#[derive(Debug, Clone)]
pub struct ExportedImage {
    /// Composited pixels
    pub image: RgbaImage,
    /// Suggested file name
    pub file_name: String,
}

impl ExportedImage {
    /// Write as PNG into `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.file_name);
        self.image.save_with_format(&path, ImageFormat::Png)?;
        tracing::info!("Exported selection to {:?}", path);
        Ok(path)
    }
}

/// Union of node rectangles and, optionally, wire extents.
///
/// Each wire contributes its end and control points grown by `wire_pad`.
pub fn selection_bounds(
    nodes: impl IntoIterator<Item = Rect>,
    wires: impl IntoIterator<Item = WirePath>,
    wire_pad: f32,
) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    let mut add = |rect: Rect| {
        bounds = Some(bounds.map_or(rect, |b| b.union(rect)));
    };
    for rect in nodes {
        add(rect);
    }
    for wire in wires {
        add(wire.control_bounds().expand(wire_pad));
    }
    bounds
}

/// Wire padding for a stroke width
pub fn wire_padding(stroke: f32) -> f32 {
    (stroke * 2.0 + 8.0).max(8.0)
}

/// Pixel-aligned capture region around `bounds`, clipped to the viewport
pub fn crop_region(bounds: Rect, padding: f32, viewport: Vec2) -> Option<Rect> {
    let x = (bounds.min.x - padding).floor();
    let y = (bounds.min.y - padding).floor();
    let w = (bounds.width() + padding * 2.0).ceil();
    let h = (bounds.height() + padding * 2.0).ceil();

    let min = Pos2::new(x.max(0.0), y.max(0.0));
    let max = Pos2::new((x + w).min(viewport.x), (y + h).min(viewport.y));
    (max.x > min.x && max.y > min.y).then(|| Rect::from_min_max(min, max))
}

/// `graph-selection-<unix millis>.png`
pub fn export_file_name(now: SystemTime) -> String {
    let millis = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    format!("graph-selection-{millis}.png")
}

/// Fill with the background first, then draw the raster over it
pub fn composite(raster: RgbaImage, background: Option<[u8; 4]>) -> RgbaImage {
    let Some(bg) = background else {
        return raster;
    };
    let mut out = RgbaImage::from_pixel(raster.width(), raster.height(), Rgba(bg));
    image::imageops::overlay(&mut out, &raster, 0, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortDirection;

    #[test]
    fn test_bounds_union() {
        let a = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = Rect::from_min_size(Pos2::new(50.0, 20.0), Vec2::new(10.0, 10.0));
        let bounds = selection_bounds([a, b], [], 0.0).unwrap();
        assert_eq!(bounds, Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(60.0, 30.0)));
        assert!(selection_bounds([], [], 8.0).is_none());
    }

    #[test]
    fn test_bounds_include_wire_controls() {
        let node = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let wire = WirePath::between(
            Pos2::new(10.0, 5.0),
            PortDirection::Output,
            Pos2::new(20.0, 5.0),
            PortDirection::Input,
            60.0,
        );
        let bounds = selection_bounds([node], [wire], wire_padding(2.0)).unwrap();
        // Control points reach 60px past each end, plus 12px of padding.
        assert!((bounds.max.x - 82.0).abs() < 1e-4);
        assert!((bounds.min.x - -52.0).abs() < 1e-4);
    }

    #[test]
    fn test_crop_region() {
        let bounds = Rect::from_min_max(Pos2::new(100.4, 100.6), Pos2::new(200.0, 150.0));
        let region = crop_region(bounds, 10.0, Vec2::new(1000.0, 1000.0)).unwrap();
        assert_eq!(region.min, Pos2::new(90.0, 90.0));
        assert_eq!(region.width(), 120.0);

        let clipped = crop_region(bounds, 150.0, Vec2::new(300.0, 300.0)).unwrap();
        assert_eq!(clipped.min, Pos2::ZERO);
        assert_eq!(clipped.max, Pos2::new(300.0, 300.0));

        let outside = Rect::from_min_max(Pos2::new(500.0, 500.0), Pos2::new(600.0, 600.0));
        assert!(crop_region(outside, 0.0, Vec2::new(300.0, 300.0)).is_none());
    }

    #[test]
    fn test_composite_background() {
        let mut raster = RgbaImage::new(2, 1);
        raster.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let out = composite(raster.clone(), Some([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(composite(raster.clone(), None), raster);
    }

    #[test]
    fn test_file_name() {
        let t = UNIX_EPOCH + std::time::Duration::from_millis(1234);
        assert_eq!(export_file_name(t), "graph-selection-1234.png");
    }

    #[test]
    fn test_options_ron_defaults() {
        let options: ExportOptions = ron::from_str("(padding: 20.0)").unwrap();
        assert_eq!(options.padding, 20.0);
        assert!(options.include_wires);
        assert_eq!(options.pixel_ratio, 1.0);
    }
}
