// SPDX-License-Identifier: MIT OR Apache-2.0
//! CPU rasterizer for selection export.
//!
//! Draws flat node blocks, port dots and wire polylines straight into an
//! `RgbaImage`. It honors the editor's visibility overrides, so whatever the
//! engine hides for the capture never reaches the pixels.

use circuit_editor_graph::export::{ExportError, ExportJob, Rasterizer};
use circuit_editor_graph::{GraphEditor, PortRef};
use egui::{Pos2, Rect};
use image::{Rgba, RgbaImage};

const NODE_BODY: Rgba<u8> = Rgba([45, 45, 48, 255]);
const NODE_HEADER: Rgba<u8> = Rgba([70, 100, 130, 255]);
const WIRE_SEGMENTS: usize = 48;

/// Renders the editor's visible state without a GPU
#[derive(Debug, Default)]
pub struct SoftwareRasterizer;

impl Rasterizer for SoftwareRasterizer {
    fn rasterize(&mut self, editor: &GraphEditor, job: &ExportJob) -> Result<RgbaImage, ExportError> {
        let (width, height) = job.output_size();
        let mut canvas = Canvas {
            image: RgbaImage::new(width, height),
            origin: job.region.min,
            ratio: job.pixel_ratio,
        };
        let visibility = editor.visibility();
        let scale = editor.camera().scale;

        for connection in editor.graph().connections() {
            if visibility.is_connection_hidden(connection.id) {
                continue;
            }
            let Some(path) = editor.wire_path(connection) else {
                continue;
            };
            let style = editor.wire_style(connection);
            let [r, g, b] = style.color;
            canvas.polyline(&path.points(WIRE_SEGMENTS), style.width, Rgba([r, g, b, 255]));
        }

        for node in editor.graph().nodes() {
            if visibility.is_node_hidden(node.id) {
                continue;
            }
            let Some(rect) = editor.node_screen_rect(node.id) else {
                continue;
            };
            canvas.fill_rect(rect, NODE_BODY);
            let header = Rect::from_min_max(rect.min, Pos2::new(rect.max.x, rect.min.y + node.header_height * scale));
            canvas.fill_rect(header, NODE_HEADER);

            for port in &node.ports {
                let port_ref = PortRef::new(node.id, port.id);
                let Some(port_rect) = editor.port_screen_rect(port_ref) else {
                    continue;
                };
                let [r, g, b] = editor
                    .bindings()
                    .color_of(port_ref, port)
                    .unwrap_or(editor.config().palette.adaptive);
                canvas.disc(port_rect.center(), port_rect.width() * 0.5, Rgba([r, g, b, 255]));
            }
        }

        tracing::debug!("Rasterized {}x{} export", width, height);
        Ok(canvas.image)
    }
}

/// Output image addressed in viewport coordinates
struct Canvas {
    image: RgbaImage,
    origin: Pos2,
    ratio: f32,
}

impl Canvas {
    fn to_pixel(&self, pos: Pos2) -> Pos2 {
        ((pos - self.origin) * self.ratio).to_pos2()
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height()) {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let min = self.to_pixel(rect.min);
        let max = self.to_pixel(rect.max);
        for y in min.y.floor() as i64..max.y.ceil() as i64 {
            for x in min.x.floor() as i64..max.x.ceil() as i64 {
                self.put(x, y, color);
            }
        }
    }

    fn disc(&mut self, center: Pos2, radius: f32, color: Rgba<u8>) {
        let c = self.to_pixel(center);
        let r = (radius * self.ratio).max(0.5);
        let r2 = r * r;
        for y in (c.y - r).floor() as i64..=(c.y + r).ceil() as i64 {
            for x in (c.x - r).floor() as i64..=(c.x + r).ceil() as i64 {
                let dx = x as f32 + 0.5 - c.x;
                let dy = y as f32 + 0.5 - c.y;
                if dx * dx + dy * dy <= r2 {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn polyline(&mut self, points: &[Pos2], width: f32, color: Rgba<u8>) {
        let radius = width * 0.5;
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let steps = (a.distance(b) * self.ratio).ceil().max(1.0) as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                self.disc(a.lerp(b, t), radius, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuit_editor_graph::{AddNodeOptions, BlockRenderer, ChipDescriptor, ChipSection, GraphConfig, PortId};
    use egui::Vec2;

    fn editor() -> GraphEditor {
        GraphEditor::new(Box::new(BlockRenderer::default()), GraphConfig::default(), Vec2::new(800.0, 600.0))
    }

    fn job(region: Rect) -> ExportJob {
        ExportJob {
            region,
            pixel_ratio: 1.0,
            background: None,
            file_name: "test.png".into(),
            nodes: Vec::new(),
        }
    }

    #[test]
    fn test_draws_node_block() {
        let mut editor = editor();
        editor
            .add_node_with(ChipDescriptor::new("A").with_section(ChipSection::new()), AddNodeOptions::at(Pos2::ZERO))
            .unwrap();
        let region = Rect::from_min_max(Pos2::new(390.0, 290.0), Pos2::new(600.0, 350.0));
        let image = SoftwareRasterizer.rasterize(&editor, &job(region)).unwrap();

        assert_eq!(image.dimensions(), (210, 60));
        // Outside the node stays transparent.
        assert_eq!(image.get_pixel(2, 2), &Rgba([0, 0, 0, 0]));
        // Header row, then body below it.
        assert_eq!(image.get_pixel(50, 15), &NODE_HEADER);
        assert_eq!(image.get_pixel(50, 38), &NODE_BODY);
    }

    #[test]
    fn test_header_follows_renderer_metric() {
        let renderer = BlockRenderer {
            header_height: 40.0,
            ..BlockRenderer::default()
        };
        let mut editor = GraphEditor::new(Box::new(renderer), GraphConfig::default(), Vec2::new(800.0, 600.0));
        editor
            .add_node_with(ChipDescriptor::new("A").with_section(ChipSection::new()), AddNodeOptions::at(Pos2::ZERO))
            .unwrap();
        let region = Rect::from_min_max(Pos2::new(390.0, 290.0), Pos2::new(600.0, 350.0));
        let image = SoftwareRasterizer.rasterize(&editor, &job(region)).unwrap();

        // Screen y 328 is body for the default layout, header here.
        assert_eq!(image.get_pixel(50, 38), &NODE_HEADER);
        assert_eq!(image.get_pixel(50, 54), &NODE_BODY);
    }

    #[test]
    fn test_hidden_nodes_are_skipped() {
        let mut editor = editor();
        let a = editor
            .add_node_with(ChipDescriptor::new("A").with_section(ChipSection::new()), AddNodeOptions::at(Pos2::ZERO))
            .unwrap();
        editor
            .add_node_with(
                ChipDescriptor::new("B").with_section(ChipSection::new()),
                AddNodeOptions::at(Pos2::new(0.0, 100.0)),
            )
            .unwrap();
        editor.select_node(a);
        let prepared = editor.prepare_export(&Default::default()).unwrap();
        let image = SoftwareRasterizer.rasterize(&editor, &prepared).unwrap();
        editor.cancel_export();

        // Node B sits at screen y 400, inside the padded region but hidden.
        let x = (450.0 - prepared.region.min.x) as u32;
        let y = (410.0 - prepared.region.min.y) as u32;
        assert_eq!(image.get_pixel(x, y), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_wire_is_stroked_in_port_color() {
        let mut editor = editor();
        let a = editor
            .add_node_with(
                ChipDescriptor::new("A").with_section(ChipSection::new().output("Out", "float")),
                AddNodeOptions::at(Pos2::ZERO),
            )
            .unwrap();
        let b = editor
            .add_node_with(
                ChipDescriptor::new("B").with_section(ChipSection::new().input("In", "float")),
                AddNodeOptions::at(Pos2::new(300.0, 0.0)),
            )
            .unwrap();
        let id = editor
            .add_connection(PortRef::new(a, PortId(0)), PortRef::new(b, PortId(0)))
            .unwrap();
        let connection = editor.graph().connection(id).unwrap();
        let mid = editor.wire_path(connection).unwrap().point(0.5);

        let region = Rect::from_min_max(Pos2::ZERO, Pos2::new(800.0, 600.0));
        let image = SoftwareRasterizer.rasterize(&editor, &job(region)).unwrap();
        let [r, g, b] = editor.config().palette.color("float").unwrap();
        assert_eq!(image.get_pixel(mid.x as u32, mid.y as u32), &Rgba([r, g, b, 255]));
    }
}
