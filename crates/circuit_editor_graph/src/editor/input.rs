// SPDX-License-Identifier: MIT OR Apache-2.0
//! Routing of pointer, wheel and keyboard input to gestures.

use super::{CanvasGesture, GraphEditor};
use crate::camera::wheel_zoom_factor;
use crate::context_menu::{MenuRequest, MenuSource};
use crate::gesture::{
    BoxSelect, KeyEvent, LongPress, PanGesture, PinchGesture, PointerEvent, PointerKind, PointerPhase, Shortcut,
    WheelEvent,
};
use egui::{Key, PointerButton};
use std::time::Instant;

impl GraphEditor {
    /// Feed one pointer event
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        self.touches.track(event);
        match event.phase {
            PointerPhase::Down => self.pointer_down(event),
            PointerPhase::Move => self.pointer_move(event),
            PointerPhase::Up | PointerPhase::Cancel => self.pointer_up(event),
        }
    }

    fn pointer_down(&mut self, event: &PointerEvent) {
        if let Some(menu) = self.menu.as_mut().filter(|m| m.is_open()) {
            if menu.contains(event.pos) {
                return;
            }
            if event.is_primary() {
                menu.hide();
                self.render.request();
            }
        }

        if event.kind == PointerKind::Touch && self.touches.len() == 2 && self.try_begin_pinch(event) {
            return;
        }

        if event.kind == PointerKind::Mouse {
            if event.button == Some(self.config.gestures.pan_button.button()) {
                if matches!(self.canvas, CanvasGesture::Idle) {
                    self.canvas = CanvasGesture::Pan(PanGesture::new(event.id, event.pos));
                }
                return;
            }
            if event.button == Some(PointerButton::Secondary) {
                let target = self.node_at(event.pos);
                self.open_context_menu(MenuRequest {
                    pos: event.pos,
                    source: MenuSource::ContextMenu,
                    target,
                });
                return;
            }
        }
        if !event.is_primary() {
            return;
        }

        if let Some(port) = self.port_at(event.pos) {
            self.begin_connection_drag(event.id, port, event.pos);
            return;
        }
        if !matches!(self.canvas, CanvasGesture::Idle) {
            return;
        }

        let node = self.node_at(event.pos);
        match node {
            Some(id) => self.begin_node_drag(event, id),
            None if event.kind == PointerKind::Touch => {
                self.canvas = CanvasGesture::Pan(PanGesture::new(event.id, event.pos));
            }
            None => self.canvas = CanvasGesture::Select(BoxSelect::new(event.id, event.pos)),
        }
        if event.kind.supports_long_press() {
            self.long_press = Some(LongPress::new(event.id, event.pos, event.time, node));
        }
    }

    fn try_begin_pinch(&mut self, event: &PointerEvent) -> bool {
        let Some(other) = self.touches.other_than(event.id) else {
            return false;
        };
        let owner_is_other = match &self.canvas {
            CanvasGesture::Idle => true,
            CanvasGesture::Pan(pan) => pan.pointer == other.0,
            _ => false,
        };
        if !owner_is_other || self.wire_drag.as_ref().is_some_and(|d| d.pointer == other.0) {
            return false;
        }

        let mid = PinchGesture::midpoint(other.1, event.pos);
        let world = self.camera.screen_to_world(mid);
        self.canvas = CanvasGesture::Pinch(PinchGesture::new(other, (event.id, event.pos), self.camera.scale, world));
        self.long_press = None;
        tracing::debug!("Pinch started");
        true
    }

    fn pointer_move(&mut self, event: &PointerEvent) {
        let tolerance = self.config.gestures.long_press_tolerance;
        if self
            .long_press
            .is_some_and(|p| p.pointer == event.id && p.moved_away(event.pos, tolerance))
        {
            self.long_press = None;
        }

        if self.wire_drag.as_ref().is_some_and(|d| d.pointer == event.id) {
            self.update_connection_drag(event.id, event.pos);
            return;
        }

        let mut canvas = std::mem::take(&mut self.canvas);
        match &mut canvas {
            CanvasGesture::Pan(pan) if pan.pointer == event.id => {
                let delta = pan.update(event.pos);
                self.camera.pan(delta);
                self.request_render();
            }
            CanvasGesture::Pinch(pinch) => {
                if let Some(step) = pinch.update(event.id, event.pos) {
                    let scale = self.camera.clamp_scale(step.scale);
                    self.camera.zoom_to(step.anchor, step.world, scale);
                    self.request_render();
                }
            }
            CanvasGesture::Nodes(drag) if drag.pointer == event.id => {
                self.drag_nodes(drag, event.pos);
            }
            CanvasGesture::Select(select) if select.pointer == event.id => {
                select.update(event.pos, self.config.gestures.drag_threshold);
                if select.dragged {
                    self.apply_box_selection(select.rect());
                }
            }
            _ => {}
        }
        self.canvas = canvas;
    }

    fn apply_box_selection(&mut self, rect: egui::Rect) {
        let hits: Vec<_> = self
            .graph
            .nodes()
            .map(|n| (n.id, self.world_rect_to_screen(n.world_rect()).intersects(rect)))
            .collect();
        for (id, hit) in hits {
            if let Some(node) = self.graph.node_mut(id) {
                node.selected = hit;
            }
        }
        self.request_render();
    }

    fn pointer_up(&mut self, event: &PointerEvent) {
        let released = event.phase == PointerPhase::Up;
        if self.long_press.is_some_and(|p| p.pointer == event.id) {
            self.long_press = None;
        }

        if self.wire_drag.as_ref().is_some_and(|d| d.pointer == event.id) {
            if released {
                self.end_connection_drag(event.id, event.pos);
            } else {
                self.cancel_connection_drag();
            }
            return;
        }

        let canvas = std::mem::take(&mut self.canvas);
        self.canvas = match canvas {
            CanvasGesture::Pinch(pinch) if pinch.owns(event.id) => match pinch.release(event.id) {
                Some((other, last)) => {
                    let pos = self.touches.get(other).unwrap_or(last);
                    tracing::debug!("Pinch degraded to pan");
                    CanvasGesture::Pan(PanGesture::new(other, pos))
                }
                None => CanvasGesture::Idle,
            },
            CanvasGesture::Pan(pan) if pan.pointer == event.id => CanvasGesture::Idle,
            CanvasGesture::Nodes(drag) if drag.pointer == event.id => {
                self.finish_node_drag(&drag, released);
                CanvasGesture::Idle
            }
            CanvasGesture::Select(select) if select.pointer == event.id => {
                if released && !select.dragged {
                    self.clear_selection();
                }
                CanvasGesture::Idle
            }
            other => other,
        };
        self.request_render();
    }

    /// Feed one wheel step
    pub fn handle_wheel(&mut self, event: &WheelEvent) {
        let factor = wheel_zoom_factor(event.delta_y, self.config.camera.wheel_zoom_speed);
        if self.camera.zoom_at(event.pos, factor) {
            self.request_render();
        }
    }

    /// Feed one key press. Returns `true` when it was handled.
    pub fn handle_key(&mut self, event: &KeyEvent) -> bool {
        if !self.keyboard_installed {
            return false;
        }
        if event.key == Key::Escape && self.wire_drag.is_some() {
            return self.cancel_connection_drag();
        }
        if event.text_focus || self.wire_drag.is_some() {
            return false;
        }
        let Some(shortcut) = Shortcut::from_key(event.key, event.modifiers) else {
            return false;
        };
        tracing::debug!("Shortcut {:?}", shortcut);
        match shortcut {
            Shortcut::Delete => self.delete_selected() > 0,
            Shortcut::Copy => self.copy_selection(),
            Shortcut::Cut => self.cut_selection(),
            Shortcut::Paste => !self.paste().is_empty(),
            Shortcut::Undo => self.undo().is_ok(),
            Shortcut::Redo => self.redo().is_ok(),
        }
    }

    /// Advance timers. Opens the context menu when a long-press is due.
    pub fn tick(&mut self, now: Instant) -> bool {
        let delay = self.config.gestures.long_press_delay();
        let Some(press) = self.long_press.filter(|p| p.is_due(now, delay)) else {
            return false;
        };
        self.long_press = None;

        // The hold claims the pointer from whatever canvas gesture it started.
        let owned = match &self.canvas {
            CanvasGesture::Pan(pan) => pan.pointer == press.pointer,
            CanvasGesture::Nodes(drag) => drag.pointer == press.pointer && !drag.has_moved(),
            CanvasGesture::Select(select) => select.pointer == press.pointer && !select.dragged,
            CanvasGesture::Idle | CanvasGesture::Pinch(_) => false,
        };
        if owned {
            self.canvas = CanvasGesture::Idle;
        }

        tracing::debug!("Long-press at {:?}", press.origin);
        self.open_context_menu(MenuRequest {
            pos: press.origin,
            source: MenuSource::LongPress,
            target: press.target,
        })
    }
}
