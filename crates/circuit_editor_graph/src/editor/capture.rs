// SPDX-License-Identifier: MIT OR Apache-2.0
//! Image export of the selection.

use super::GraphEditor;
use crate::export::{
    composite, crop_region, export_file_name, selection_bounds, wire_padding, ExportError, ExportJob,
    ExportOptions, ExportedImage, Rasterizer, Visibility,
};
use crate::node::NodeId;
use egui::Rect;
use image::RgbaImage;
use std::collections::HashSet;
use std::time::SystemTime;

/// Export waiting for the rasterizer
#[derive(Debug, Clone)]
pub(crate) struct PendingExport {
    job: ExportJob,
    saved: Visibility,
    grid_pushed: bool,
}

impl GraphEditor {
    /// Screen bounds of the selection, optionally with its internal wires
    pub fn selection_screen_bounds(&self, include_wires: bool) -> Option<Rect> {
        let selected: HashSet<NodeId> = self.graph.selected_ids().into_iter().collect();
        let rects: Vec<Rect> = selected.iter().filter_map(|id| self.node_screen_rect(*id)).collect();
        let wires: Vec<_> = if include_wires {
            self.graph
                .internal_connections(&selected)
                .filter_map(|c| self.wire_path(c))
                .collect()
        } else {
            Vec::new()
        };
        let pad = wire_padding(self.config.wires.stroke_width(self.camera.scale));
        selection_bounds(rects, wires, pad)
    }

    /// Frame the selection and hide everything else until the export completes.
    ///
    /// Only one export may be pending at a time.
    pub fn prepare_export(&mut self, options: &ExportOptions) -> Result<ExportJob, ExportError> {
        if self.pending_export.is_some() {
            return Err(ExportError::InProgress);
        }
        let nodes = self.graph.selected_ids();
        if nodes.is_empty() {
            return Err(ExportError::EmptySelection);
        }
        let bounds = self
            .selection_screen_bounds(options.include_wires)
            .ok_or(ExportError::EmptySelection)?;
        let region = crop_region(bounds, options.padding, self.viewport).ok_or(ExportError::EmptyRegion)?;

        let saved = self.visibility.clone();
        let selected: HashSet<NodeId> = nodes.iter().copied().collect();
        if options.hide_unselected {
            self.visibility
                .hidden_nodes
                .extend(self.graph.node_ids().filter(|id| !selected.contains(id)));
        }
        let hidden_wires: Vec<_> = self
            .graph
            .connections()
            .filter(|c| {
                !options.include_wires || !selected.contains(&c.from.node) || !selected.contains(&c.to.node)
            })
            .map(|c| c.id)
            .collect();
        self.visibility.hidden_connections.extend(hidden_wires);
        self.visibility.temp_wire_hidden = true;
        if options.hide_grid {
            self.visibility.grid_hidden_depth += 1;
        }
        if options.hide_selection_outline {
            self.visibility.outlines_hidden = true;
        }

        let job = ExportJob {
            region,
            pixel_ratio: options.pixel_ratio.max(0.01),
            background: options.background,
            file_name: export_file_name(SystemTime::now()),
            nodes,
        };
        self.pending_export = Some(PendingExport {
            job: job.clone(),
            saved,
            grid_pushed: options.hide_grid,
        });
        tracing::info!("Export prepared: {} node(s), region {:?}", job.nodes.len(), job.region);
        self.request_render();
        Ok(job)
    }

    /// The export waiting for pixels
    pub fn pending_export(&self) -> Option<&ExportJob> {
        self.pending_export.as_ref().map(|p| &p.job)
    }

    fn restore_visibility(&mut self) -> Option<ExportJob> {
        let pending = self.pending_export.take()?;
        let depth = self
            .visibility
            .grid_hidden_depth
            .saturating_sub(u32::from(pending.grid_pushed));
        self.visibility = pending.saved;
        self.visibility.grid_hidden_depth = depth;
        self.request_render();
        Some(pending.job)
    }

    /// Finish the pending export with the rasterizer's result.
    ///
    /// Visibility is restored whether or not rasterizing succeeded.
    pub fn complete_export(&mut self, raster: Result<RgbaImage, ExportError>) -> Result<ExportedImage, ExportError> {
        let job = self
            .restore_visibility()
            .ok_or_else(|| ExportError::Rasterizer("no export in progress".into()))?;
        let raster = raster.inspect_err(|err| tracing::warn!("Rasterizer failed: {}", err))?;
        let image = composite(raster, job.background);
        tracing::info!("Exported {}x{} image", image.width(), image.height());
        Ok(ExportedImage {
            image,
            file_name: job.file_name,
        })
    }

    /// Drop the pending export and restore visibility
    pub fn cancel_export(&mut self) -> bool {
        self.restore_visibility().is_some()
    }

    /// Prepare, rasterize and complete in one call
    pub fn export_selection(
        &mut self,
        rasterizer: &mut dyn Rasterizer,
        options: &ExportOptions,
    ) -> Result<ExportedImage, ExportError> {
        let job = self.prepare_export(options)?;
        let raster = rasterizer.rasterize(self, &job);
        self.complete_export(raster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::ChipSection;
    use crate::editor::tests::{chip, editor, port};
    use crate::editor::AddNodeOptions;
    use egui::Pos2;
    use image::Rgba;

    struct Solid {
        seen_hidden: usize,
        grid_hidden: bool,
    }

    impl Rasterizer for Solid {
        fn rasterize(&mut self, editor: &GraphEditor, job: &ExportJob) -> Result<RgbaImage, ExportError> {
            self.seen_hidden = editor.visibility().hidden_nodes.len();
            self.grid_hidden = editor.visibility().grid_hidden();
            let (w, h) = job.output_size();
            Ok(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0])))
        }
    }

    struct Broken;

    impl Rasterizer for Broken {
        fn rasterize(&mut self, _editor: &GraphEditor, _job: &ExportJob) -> Result<RgbaImage, ExportError> {
            Err(ExportError::Rasterizer("unavailable".into()))
        }
    }

    #[test]
    fn test_export_hides_then_restores() {
        let mut editor = editor();
        let a = editor.add_node_with(chip("A", ChipSection::new()), AddNodeOptions::at(Pos2::ZERO)).unwrap();
        editor.add_node_with(chip("B", ChipSection::new()), AddNodeOptions::at(Pos2::new(-300.0, 0.0)));
        editor.select_node(a);

        let mut rasterizer = Solid {
            seen_hidden: 0,
            grid_hidden: false,
        };
        let options = ExportOptions::default().with_padding(10.0).with_background([1, 2, 3, 255]);
        let exported = editor.export_selection(&mut rasterizer, &options).unwrap();

        assert_eq!(rasterizer.seen_hidden, 1);
        assert!(rasterizer.grid_hidden);
        assert_eq!(editor.visibility(), &Visibility::default());
        // 180x32 node plus 10px on each side.
        assert_eq!(exported.image.dimensions(), (200, 52));
        assert_eq!(exported.image.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
        assert!(exported.file_name.starts_with("graph-selection-"));
    }

    #[test]
    fn test_export_requires_selection() {
        let mut editor = editor();
        editor.add_node(chip("A", ChipSection::new()));
        assert!(matches!(
            editor.prepare_export(&ExportOptions::default()),
            Err(ExportError::EmptySelection)
        ));
    }

    #[test]
    fn test_second_prepare_is_rejected() {
        let mut editor = editor();
        let a = editor.add_node(chip("A", ChipSection::new())).unwrap();
        editor.select_node(a);
        editor.prepare_export(&ExportOptions::default()).unwrap();
        assert!(matches!(
            editor.prepare_export(&ExportOptions::default()),
            Err(ExportError::InProgress)
        ));
        assert!(editor.cancel_export());
        assert!(editor.pending_export().is_none());
        assert!(!editor.visibility().grid_hidden());
    }

    #[test]
    fn test_failed_raster_still_restores() {
        let mut editor = editor();
        let a = editor.add_node(chip("A", ChipSection::new().output("Out", "int"))).unwrap();
        let b = editor
            .add_node_with(chip("B", ChipSection::new().input("In", "int")), AddNodeOptions::at(Pos2::new(200.0, 0.0)))
            .unwrap();
        editor.add_connection(port(a, 0), port(b, 0)).unwrap();
        editor.select_node(a);

        let result = editor.export_selection(&mut Broken, &ExportOptions::default());
        assert!(matches!(result, Err(ExportError::Rasterizer(_))));
        assert!(editor.visibility().hidden_connections.is_empty());
        assert!(editor.pending_export().is_none());
    }

    #[test]
    fn test_wires_only_between_selected_stay_visible() {
        let mut editor = editor();
        let a = editor.add_node(chip("A", ChipSection::new().output("Out", "int"))).unwrap();
        let b = editor
            .add_node_with(chip("B", ChipSection::new().input("In", "int")), AddNodeOptions::at(Pos2::new(200.0, 0.0)))
            .unwrap();
        let c = editor
            .add_node_with(chip("C", ChipSection::new().input("In", "int")), AddNodeOptions::at(Pos2::new(200.0, 100.0)))
            .unwrap();
        let inner = editor.add_connection(port(a, 0), port(b, 0)).unwrap();
        let outer = editor.add_connection(port(a, 0), port(c, 0)).unwrap();
        editor.select_node(a);
        editor.select_node(b);

        let options = ExportOptions::default().with_padding(0.0);
        editor.prepare_export(&options).unwrap();
        assert!(!editor.visibility().is_connection_hidden(inner));
        assert!(editor.visibility().is_connection_hidden(outer));
        assert!(editor.visibility().is_node_hidden(c));
        assert!(editor.temp_wire().is_none());
    }
}
