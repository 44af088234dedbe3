// SPDX-License-Identifier: MIT OR Apache-2.0
//! Camera transform between screen space and world space.
//!
//! Screen coordinates are viewport pixels. World coordinates are where node
//! positions live. The mapping is `screen = world * scale + translation`.

use crate::config::CameraConfig;
use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Pan/zoom state of the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Horizontal translation (screen px)
    pub tx: f32,
    /// Vertical translation (screen px)
    pub ty: f32,
    /// Current zoom
    pub scale: f32,
    /// Smallest allowed zoom
    pub min_scale: f32,
    /// Largest allowed zoom
    pub max_scale: f32,
}

/// The part of the camera stored in history snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    /// Horizontal translation
    pub tx: f32,
    /// Vertical translation
    pub ty: f32,
    /// Zoom
    pub scale: f32,
}

impl Camera {
    /// Camera at scale 1 with no translation
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            scale: 1.0,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
        }
    }

    /// Camera that shows the world origin at the center of a viewport
    pub fn centered(config: &CameraConfig, viewport: Vec2) -> Self {
        let mut camera = Self::new(config);
        camera.reset(viewport);
        camera
    }

    /// Put the world origin back at the viewport center at scale 1
    pub fn reset(&mut self, viewport: Vec2) {
        self.tx = viewport.x * 0.5;
        self.ty = viewport.y * 0.5;
        self.scale = 1.0;
    }

    /// Apply new limits, re-clamping the current scale
    pub fn set_limits(&mut self, min_scale: f32, max_scale: f32) {
        self.min_scale = min_scale;
        self.max_scale = max_scale;
        self.scale = self.clamp_scale(self.scale);
    }

    /// Translation as a vector
    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.tx, self.ty)
    }

    /// Convert a screen point to world space
    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        Pos2::new(
            (screen.x - self.tx) / self.scale,
            (screen.y - self.ty) / self.scale,
        )
    }

    /// Convert a world point to screen space
    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        Pos2::new(world.x * self.scale + self.tx, world.y * self.scale + self.ty)
    }

    /// Move the view by a screen-space delta
    pub fn pan(&mut self, delta: Vec2) {
        self.tx += delta.x;
        self.ty += delta.y;
    }

    /// Clamp a scale into the allowed range
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Multiply the zoom by `factor`, keeping the world point under `anchor` fixed.
    ///
    /// Returns `false` when the clamped scale did not change.
    pub fn zoom_at(&mut self, anchor: Pos2, factor: f32) -> bool {
        let world = self.screen_to_world(anchor);
        let scale = self.clamp_scale(self.scale * factor);
        if scale == self.scale {
            return false;
        }
        self.place(anchor, world, scale);
        true
    }

    /// Set an absolute scale and put `world` under `anchor`.
    ///
    /// Used by pinch zoom, which always works from the state at gesture start.
    pub fn zoom_to(&mut self, anchor: Pos2, world: Pos2, scale: f32) {
        let scale = self.clamp_scale(scale);
        self.place(anchor, world, scale);
    }

    fn place(&mut self, anchor: Pos2, world: Pos2, scale: f32) {
        self.scale = scale;
        self.tx = anchor.x - world.x * scale;
        self.ty = anchor.y - world.y * scale;
    }

    /// Capture the snapshot part of the camera
    pub fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot {
            tx: self.tx,
            ty: self.ty,
            scale: self.scale,
        }
    }

    /// Restore from a snapshot
    pub fn restore(&mut self, snapshot: CameraSnapshot) {
        self.tx = snapshot.tx;
        self.ty = snapshot.ty;
        self.scale = self.clamp_scale(snapshot.scale);
    }

    /// Background grid placement for the current view
    pub fn grid(&self, base_major: f32, base_minor: f32) -> GridLines {
        let major = base_major * self.scale;
        GridLines {
            major,
            minor: base_minor * self.scale,
            offset: Vec2::new(self.tx.rem_euclid(major), self.ty.rem_euclid(major)),
        }
    }
}

/// Zoom factor for a wheel delta
pub fn wheel_zoom_factor(delta_y: f32, speed: f32) -> f32 {
    (-delta_y * speed).exp()
}

/// Screen-space grid spacing and phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLines {
    /// Major line spacing (screen px)
    pub major: f32,
    /// Minor line spacing (screen px)
    pub minor: f32,
    /// Offset of the first major line, always in `[0, major)`
    pub offset: Vec2,
}

/// Coalesces render requests so any number of mutations in one frame paint once
#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: bool,
}

impl RenderScheduler {
    /// Ask for a repaint. Returns `true` only for the request that scheduled it.
    pub fn request(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        true
    }

    /// Consume the pending request at frame time
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    /// Whether a repaint is queued
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
