// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor window setup and event loop.

use crate::config_watcher::{ConfigWatcher, WatchEvent};
use crate::library::{demo_library, extend_from_file};
use crate::raster::SoftwareRasterizer;
use circuit_editor_graph::context_menu::SelectionPayload;
use circuit_editor_graph::export::{ExportError, ExportJob, ExportedImage, Rasterizer};
use circuit_editor_graph::ui::GraphView;
use circuit_editor_graph::{BlockRenderer, ChipLibrary, GraphConfig, GraphEditor, MenuOutcome, MenuState};
use egui_wgpu::wgpu;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const CONFIG_FILE: &str = "circuit_editor.ron";
const CHIPS_FILE: &str = "chips.ron";
const EXPORT_DIR: &str = "exports";
const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Editor application errors
#[derive(Debug, Error)]
pub enum EditorError {
    /// Window creation failed
    #[error("Failed to create window: {0}")]
    WindowCreation(String),

    /// Renderer initialization failed
    #[error("Failed to initialize renderer: {0}")]
    RendererInit(String),

    /// Event loop error
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Result type for editor operations
pub type Result<T> = std::result::Result<T, EditorError>;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

/// Swapchain and egui painter for the editor window
struct GraphicsState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    egui_renderer: egui_wgpu::Renderer,
}

/// Prefer an sRGB swapchain format, else whatever the surface lists first
fn pick_surface_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(wgpu::TextureFormat::is_srgb)
        .or_else(|| formats.first().copied())
}

impl GraphicsState {
    fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| EditorError::RendererInit(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            compatible_surface: Some(&surface),
            ..Default::default()
        }))
        .ok_or_else(|| EditorError::RendererInit("no suitable GPU adapter".into()))?;
        tracing::info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None))
            .map_err(|e| EditorError::RendererInit(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats)
            .ok_or_else(|| EditorError::RendererInit("surface reports no formats".into()))?;
        let config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .map(|config| wgpu::SurfaceConfiguration { format, ..config })
            .ok_or_else(|| EditorError::RendererInit("surface is not supported by the adapter".into()))?;
        surface.configure(&device, &config);

        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            egui_renderer,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn render(
        &mut self,
        egui_ctx: &egui::Context,
        full_output: egui::FullOutput,
        window: &Window,
    ) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Editor Encoder") });

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };
        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(&self.device, &self.queue, &mut encoder, &paint_jobs, &screen_descriptor);

        {
            // egui-wgpu wants a 'static pass; the encoder stays locked until it drops.
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Editor Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    ..Default::default()
                })
                .forget_lifetime();
            self.egui_renderer.render(&mut render_pass, &paint_jobs, &screen_descriptor);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
        Ok(())
    }
}

/// Running state of the editor
struct EditorRunning {
    window: Arc<Window>,
    graphics: GraphicsState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    editor: EditorInner,
}

/// A payload window opened from the context menu
struct DetailsWindow {
    title: &'static str,
    payload: SelectionPayload,
}

/// Everything the window shows
struct EditorInner {
    editor: GraphEditor,
    view: GraphView,
    library: ChipLibrary,
    search: String,
    watcher: Option<ConfigWatcher>,
    rasterizer: SoftwareRasterizer,
    config_path: PathBuf,
    chips_path: PathBuf,
    export_dir: PathBuf,
    details: Option<DetailsWindow>,
    status: Option<String>,
    request_exit: bool,
}

impl EditorInner {
    fn new(viewport: egui::Vec2) -> Self {
        let config_path = PathBuf::from(CONFIG_FILE);
        let chips_path = PathBuf::from(CHIPS_FILE);

        let config = GraphConfig::load_or_default(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring {:?}: {}", config_path, e);
            GraphConfig::default()
        });

        let mut editor = GraphEditor::new(Box::new(BlockRenderer::default()), config, viewport);
        editor.attach_context_menu(Box::new(MenuState::new()));

        let watcher = match ConfigWatcher::new(&[config_path.clone(), chips_path.clone()], WATCH_DEBOUNCE) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!("Settings hot reload disabled: {}", e);
                None
            }
        };

        Self {
            editor,
            view: GraphView::new(),
            library: load_library(&chips_path),
            search: String::new(),
            watcher,
            rasterizer: SoftwareRasterizer,
            config_path,
            chips_path,
            export_dir: PathBuf::from(EXPORT_DIR),
            details: None,
            status: None,
            request_exit: false,
        }
    }

    fn update(&mut self, ctx: &egui::Context) {
        self.poll_watcher();

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                self.file_menu(ui);
                self.edit_menu(ui);
                self.view_menu(ui);

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(status) = &self.status {
                        ui.label(status);
                    }
                });
            });
        });

        egui::SidePanel::left("chip_palette")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| self.palette_ui(ui));

        let outcomes = egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.view.show(ui, &mut self.editor))
            .inner;
        for outcome in outcomes {
            self.handle_outcome(outcome);
        }

        self.details_window(ctx);
    }

    fn file_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("File", |ui| {
            let has_selection = !self.editor.selected_nodes().is_empty();
            if ui.add_enabled(has_selection, egui::Button::new("Export Selection...")).clicked() {
                self.export_selection();
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Reload Config").clicked() {
                self.reload_config();
                ui.close_menu();
            }
            if ui.button("Save Config").clicked() {
                match self.editor.config().save(&self.config_path) {
                    Ok(()) => self.set_status(format!("Saved {}", self.config_path.display())),
                    Err(e) => self.set_status(format!("Config not saved: {e}")),
                }
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Exit").clicked() {
                self.request_exit = true;
                ui.close_menu();
            }
        });
    }

    fn edit_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("Edit", |ui| {
            let can_undo = self.editor.history().can_undo();
            let can_redo = self.editor.history().can_redo();
            let has_selection = !self.editor.selected_nodes().is_empty();

            if ui.add_enabled(can_undo, egui::Button::new("Undo (Ctrl+Z)")).clicked() {
                if let Err(err) = self.editor.undo() {
                    tracing::warn!("Undo failed: {err}");
                }
                ui.close_menu();
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo (Ctrl+Y)")).clicked() {
                if let Err(err) = self.editor.redo() {
                    tracing::warn!("Redo failed: {err}");
                }
                ui.close_menu();
            }

            ui.separator();
            if ui.add_enabled(has_selection, egui::Button::new("Cut (Ctrl+X)")).clicked() {
                self.editor.cut_selection();
                ui.close_menu();
            }
            if ui.add_enabled(has_selection, egui::Button::new("Copy (Ctrl+C)")).clicked() {
                self.editor.copy_selection();
                ui.close_menu();
            }
            let can_paste = self.editor.clipboard().is_some();
            if ui.add_enabled(can_paste, egui::Button::new("Paste (Ctrl+V)")).clicked() {
                self.editor.paste();
                ui.close_menu();
            }
            ui.separator();
            if ui.add_enabled(has_selection, egui::Button::new("Duplicate (Ctrl+D)")).clicked() {
                self.editor.duplicate_selection();
                ui.close_menu();
            }
            if ui.add_enabled(has_selection, egui::Button::new("Delete (Del)")).clicked() {
                self.editor.delete_selected();
                ui.close_menu();
            }
            if ui.button("Select None").clicked() {
                self.editor.clear_selection();
                ui.close_menu();
            }
        });
    }

    fn view_menu(&mut self, ui: &mut egui::Ui) {
        ui.menu_button("View", |ui| {
            if ui.button("Reset Camera").clicked() {
                self.editor.reset_camera();
                ui.close_menu();
            }
            ui.checkbox(&mut self.view.show_status_bar, "Status Bar");
        });
    }

    fn palette_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Chips");
        ui.add(egui::TextEdit::singleline(&mut self.search).hint_text("Search..."));
        ui.separator();

        let mut picked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for chip in self.library.search(&self.search) {
                if ui.button(&chip.name).clicked() {
                    picked = Some(chip.clone());
                }
            }
        });

        if let Some(chip) = picked {
            let name = chip.name.clone();
            if self.editor.add_node(chip).is_none() {
                self.set_status(format!("Could not place '{name}'"));
            }
        }
    }

    fn details_window(&mut self, ctx: &egui::Context) {
        let Some(details) = &self.details else {
            return;
        };

        let mut open = true;
        egui::Window::new(details.title)
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                for chip in &details.payload.nodes {
                    ui.strong(format!("#{} {}", chip.id, chip.payload.name));
                    for section in &chip.payload.sections {
                        for port in &section.inputs {
                            ui.label(format!("  in  {}: {}", port.name, port.type_name.as_deref().unwrap_or("-")));
                        }
                        for port in &section.outputs {
                            ui.label(format!("  out {}: {}", port.name, port.type_name.as_deref().unwrap_or("-")));
                        }
                    }
                }
            });

        if !open {
            self.details = None;
        }
    }

    fn handle_outcome(&mut self, outcome: MenuOutcome) {
        match outcome {
            MenuOutcome::Handled | MenuOutcome::Ignored => {}
            MenuOutcome::CreateInvention(payload) => {
                tracing::info!("Create invention from {} chip(s)", payload.ids.len());
                self.details = Some(DetailsWindow {
                    title: "Create Invention",
                    payload,
                });
            }
            MenuOutcome::AboutChip(payload) => {
                self.details = Some(DetailsWindow {
                    title: "About Chip",
                    payload,
                });
            }
            MenuOutcome::Export(job) => self.finish_export(job),
            MenuOutcome::ExportFailed(e) => self.set_status(format!("Export failed: {e}")),
        }
    }

    fn export_selection(&mut self) {
        let options = self.editor.config().export.clone();
        let result = self.editor.export_selection(&mut self.rasterizer, &options);
        self.save_export(result);
    }

    fn finish_export(&mut self, job: ExportJob) {
        let raster = self.rasterizer.rasterize(&self.editor, &job);
        let result = self.editor.complete_export(raster);
        self.save_export(result);
    }

    fn save_export(&mut self, result: std::result::Result<ExportedImage, ExportError>) {
        let saved = result.and_then(|image| {
            std::fs::create_dir_all(&self.export_dir)?;
            image.save(&self.export_dir)
        });
        match saved {
            Ok(path) => self.set_status(format!("Exported {}", path.display())),
            Err(e) => self.set_status(format!("Export failed: {e}")),
        }
    }

    fn poll_watcher(&mut self) {
        let events = match &self.watcher {
            Some(watcher) => watcher.poll_events(),
            None => return,
        };

        for event in events {
            match event {
                WatchEvent::Changed(path) if same_file_name(&path, &self.config_path) => self.reload_config(),
                WatchEvent::Changed(path) | WatchEvent::Removed(path) if same_file_name(&path, &self.chips_path) => {
                    self.library = load_library(&self.chips_path);
                    self.set_status(format!("Chip palette reloaded ({} chips)", self.library.len()));
                }
                WatchEvent::Changed(_) => {}
                WatchEvent::Removed(path) => {
                    tracing::info!("{:?} removed, keeping current settings", path);
                }
                WatchEvent::Error(e) => tracing::warn!("Settings watcher: {}", e),
            }
        }
    }

    fn reload_config(&mut self) {
        match GraphConfig::load(&self.config_path) {
            Ok(config) => {
                self.editor.apply_config(config);
                self.set_status("Config reloaded".to_string());
            }
            Err(e) => self.set_status(format!("Config not reloaded: {e}")),
        }
    }

    fn set_status(&mut self, message: String) {
        tracing::info!("{}", message);
        self.status = Some(message);
    }
}

fn load_library(chips_path: &Path) -> ChipLibrary {
    let mut library = demo_library();
    if chips_path.exists() {
        if let Err(e) = extend_from_file(&mut library, chips_path) {
            tracing::warn!("Failed to load {:?}: {}", chips_path, e);
        }
    }
    library
}

fn same_file_name(a: &Path, b: &Path) -> bool {
    a.file_name().is_some() && a.file_name() == b.file_name()
}

/// Main editor application
pub struct EditorApp {
    running: Option<EditorRunning>,
    error: Option<EditorError>,
}

impl EditorApp {
    /// Create a new editor application
    pub fn new() -> Self {
        Self {
            running: None,
            error: None,
        }
    }

    /// Open the window and run until it closes
    pub fn run() -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = EditorApp::new();
        event_loop.run_app(&mut app)?;

        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<EditorRunning> {
        tracing::info!("Creating editor window...");

        let window_attrs = Window::default_attributes()
            .with_title("Circuit Editor")
            .with_inner_size(winit::dpi::LogicalSize::new(1400, 860))
            .with_min_inner_size(winit::dpi::LogicalSize::new(640, 480));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| EditorError::WindowCreation(e.to_string()))?,
        );

        tracing::info!("Initializing graphics...");
        let graphics = GraphicsState::new(window.clone())?;

        let egui_ctx = egui::Context::default();
        egui_ctx.set_visuals(egui::Visuals::dark());

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &window,
            Some(window.scale_factor() as f32),
            None,
            Some(2 * 1024),
        );

        let size = window.inner_size().to_logical::<f32>(window.scale_factor());
        let editor = EditorInner::new(egui::vec2(size.width, size.height));

        tracing::info!("Editor initialized, window size {:?}", window.inner_size());

        Ok(EditorRunning {
            window,
            graphics,
            egui_ctx,
            egui_state,
            editor,
        })
    }
}

impl Default for EditorApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationHandler for EditorApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(e) => {
                tracing::error!("{}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(running) = &mut self.running else {
            return;
        };

        let response = running.egui_state.on_window_event(&running.window, &event);
        if response.consumed {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                tracing::debug!("Window resized to {:?}", new_size);
                running.graphics.resize(new_size);
                running.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                let raw_input = running.egui_state.take_egui_input(&running.window);
                let full_output = running.egui_ctx.run(raw_input, |ctx| {
                    running.editor.update(ctx);
                });

                if running.editor.request_exit {
                    event_loop.exit();
                    return;
                }

                running
                    .egui_state
                    .handle_platform_output(&running.window, full_output.platform_output.clone());

                match running.graphics.render(&running.egui_ctx, full_output, &running.window) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = running.window.inner_size();
                        running.graphics.resize(size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        tracing::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        tracing::warn!("Surface timeout");
                    }
                }

                running.window.request_redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_surface_format() {
        use wgpu::TextureFormat;
        assert_eq!(
            pick_surface_format(&[TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb]),
            Some(TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(pick_surface_format(&[TextureFormat::Rgba16Float]), Some(TextureFormat::Rgba16Float));
        assert_eq!(pick_surface_format(&[]), None);
    }

    #[test]
    fn test_same_file_name() {
        assert!(same_file_name(Path::new("/work/circuit_editor.ron"), Path::new("circuit_editor.ron")));
        assert!(!same_file_name(Path::new("/work/chips.ron"), Path::new("circuit_editor.ron")));
        assert!(!same_file_name(Path::new("/"), Path::new("/")));
    }

    #[test]
    fn test_missing_chip_file_keeps_demo_set() {
        let library = load_library(Path::new("does/not/exist/chips.ron"));
        assert_eq!(library.len(), demo_library().len());
    }
}
