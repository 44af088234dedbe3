// SPDX-License-Identifier: MIT OR Apache-2.0
//! Circuit Editor - desktop host for the chip graph editor
//!
//! A single window featuring:
//! - Infinite pan/zoom canvas with typed chip wiring
//! - Searchable chip palette
//! - Context menu, undo/redo and clipboard
//! - PNG export of the selection
//! - Hot-reloaded editor configuration
//!
//! ## Architecture
//!
//! All editing lives in `circuit_editor_graph`; this binary only hosts it in a
//! winit window rendered through egui-wgpu.

mod app;
mod config_watcher;
mod library;
mod raster;

use app::EditorApp;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    ["circuit_editor_app=debug", "circuit_editor_graph=debug", "wgpu=warn", "naga=warn"]
        .into_iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive)
}

fn main() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Circuit Editor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = EditorApp::run() {
        tracing::error!("Editor crashed: {e}");
        std::process::exit(1);
    }
}
