// SPDX-License-Identifier: MIT OR Apache-2.0
//! egui front end for the graph editor.
//!
//! [`GraphView`] paints a [`GraphEditor`] into an egui region and turns the
//! frame's raw input into engine events. All editing decisions stay in the
//! editor; this module only translates and draws.

use crate::context_menu::{MenuItem, MENU_ROW_HEIGHT};
use crate::editor::{GraphEditor, MenuOutcome};
use crate::gesture::{KeyEvent, PointerEvent, PointerPhase, WheelEvent};
use crate::node::Node;
use crate::port::{Port, PortRef};
use egui::{Color32, Key, Modifiers, Pos2, Rect, Shape, Stroke, TouchPhase, Vec2};
use std::collections::HashSet;
use std::time::{Duration, Instant};

const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;
const WIRE_SEGMENTS: usize = 32;
const MIN_MINOR_SPACING: f32 = 6.0;

const BACKGROUND: Color32 = Color32::from_rgb(30, 30, 32);
const NODE_BODY: Color32 = Color32::from_rgb(45, 45, 48);
const NODE_HEADER: Color32 = Color32::from_rgb(70, 100, 130);
const SELECTION: Color32 = Color32::from_rgb(100, 150, 255);
const CANNOT_CONNECT: Color32 = Color32::from_rgb(230, 70, 70);

/// Paints the editor and feeds it input
#[derive(Debug)]
pub struct GraphView {
    /// Draw the node/connection/zoom summary along the bottom edge
    pub show_status_bar: bool,
    touches: HashSet<u64>,
}

impl GraphView {
    /// Create a view
    pub fn new() -> Self {
        Self {
            show_status_bar: true,
            touches: HashSet::new(),
        }
    }

    /// Handle this frame's input and paint the editor into the remaining space.
    ///
    /// Returns the outcomes of any context menu items picked this frame.
    pub fn show(&mut self, ui: &mut egui::Ui, editor: &mut GraphEditor) -> Vec<MenuOutcome> {
        let rect = ui.available_rect_before_wrap();
        ui.allocate_rect(rect, egui::Sense::click_and_drag());
        editor.set_viewport_size(rect.size());

        let outcomes = self.handle_input(ui, editor, rect);
        if editor.tick(Instant::now()) {
            ui.ctx().request_repaint();
        }
        if !self.touches.is_empty() {
            ui.ctx().request_repaint_after(Duration::from_millis(50));
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BACKGROUND);
        if !editor.visibility().grid_hidden() {
            draw_grid(&painter, rect, editor);
        }
        draw_connections(&painter, rect, editor);
        draw_nodes(&painter, rect, editor);
        if let Some(select) = editor.box_select_rect() {
            let select = select.translate(rect.min.to_vec2());
            painter.rect_filled(select, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 30));
            painter.rect_stroke(select, 0.0, Stroke::new(1.0, SELECTION));
        }
        draw_context_menu(&painter, rect, editor, ui.input(|i| i.pointer.hover_pos()));
        if self.show_status_bar {
            draw_status_bar(&painter, rect, editor);
        }

        if editor.take_render() {
            ui.ctx().request_repaint();
        }
        outcomes
    }

    fn handle_input(&mut self, ui: &egui::Ui, editor: &mut GraphEditor, rect: Rect) -> Vec<MenuOutcome> {
        let (events, scroll, hover) = ui.input(|i| (i.events.clone(), i.raw_scroll_delta, i.pointer.hover_pos()));
        let text_focus = ui.ctx().wants_keyboard_input();
        let origin = rect.min.to_vec2();
        let now = Instant::now();
        let mut outcomes = Vec::new();
        let mut ended = Vec::new();

        for event in &events {
            if let Some(key) = key_event(event, text_focus) {
                editor.handle_key(&key);
                continue;
            }
            let pointer = match *event {
                egui::Event::Touch { id, phase, pos, .. } => {
                    match phase {
                        TouchPhase::Start => {
                            if !rect.contains(pos) {
                                continue;
                            }
                            self.touches.insert(id.0);
                        }
                        TouchPhase::End | TouchPhase::Cancel => ended.push(id.0),
                        TouchPhase::Move => {}
                    }
                    if !self.touches.contains(&id.0) {
                        continue;
                    }
                    PointerEvent::touch(id.0, touch_phase(phase), pos - origin, now)
                }
                // egui-winit mirrors the first touch as mouse input.
                _ if !self.touches.is_empty() => continue,
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers,
                } => {
                    let local = pos - origin;
                    if pressed {
                        if !rect.contains(pos) {
                            continue;
                        }
                        if button == egui::PointerButton::Primary {
                            if let Some(item) = editor.menu_item_at(local) {
                                outcomes.extend(editor.menu_item_clicked(item));
                                continue;
                            }
                        }
                    }
                    let phase = if pressed { PointerPhase::Down } else { PointerPhase::Up };
                    PointerEvent::mouse(phase, local, Some(button), now).with_modifiers(modifiers)
                }
                egui::Event::PointerMoved(pos) => PointerEvent::mouse(PointerPhase::Move, pos - origin, None, now),
                egui::Event::PointerGone => {
                    let last = hover.unwrap_or(rect.center()) - origin;
                    PointerEvent::mouse(PointerPhase::Cancel, last, None, now)
                }
                _ => continue,
            };
            editor.handle_pointer(&pointer);
        }
        for id in ended {
            self.touches.remove(&id);
        }

        if scroll.y != 0.0 {
            if let Some(pos) = hover.filter(|p| rect.contains(*p)) {
                // egui reports wheel-up as positive, the editor expects scroll-down positive.
                editor.handle_wheel(&WheelEvent {
                    pos: pos - origin,
                    delta_y: -scroll.y,
                });
            }
        }
        outcomes
    }
}

impl Default for GraphView {
    fn default() -> Self {
        Self::new()
    }
}

/// Editor key event for an egui event.
///
/// Clipboard chords reach egui as dedicated events, not key presses.
pub fn key_event(event: &egui::Event, text_focus: bool) -> Option<KeyEvent> {
    let (key, modifiers) = match event {
        egui::Event::Key {
            key,
            pressed: true,
            modifiers,
            ..
        } => (*key, *modifiers),
        egui::Event::Copy => (Key::C, Modifiers::COMMAND),
        egui::Event::Cut => (Key::X, Modifiers::COMMAND),
        egui::Event::Paste(_) => (Key::V, Modifiers::COMMAND),
        _ => return None,
    };
    Some(KeyEvent {
        key,
        modifiers,
        text_focus,
    })
}

fn touch_phase(phase: TouchPhase) -> PointerPhase {
    match phase {
        TouchPhase::Start => PointerPhase::Down,
        TouchPhase::Move => PointerPhase::Move,
        TouchPhase::End => PointerPhase::Up,
        TouchPhase::Cancel => PointerPhase::Cancel,
    }
}

fn rgb([r, g, b]: [u8; 3]) -> Color32 {
    Color32::from_rgb(r, g, b)
}

fn draw_grid(painter: &egui::Painter, rect: Rect, editor: &GraphEditor) {
    let grid = editor.grid();
    let minor_color = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
    let major_color = Color32::from_rgba_unmultiplied(80, 80, 80, 150);

    let mut lines = |spacing: f32, offset: Vec2, color: Color32| {
        let stroke = Stroke::new(1.0, color);
        let mut x = rect.left() + offset.x;
        while x < rect.right() {
            painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
            x += spacing;
        }
        let mut y = rect.top() + offset.y;
        while y < rect.bottom() {
            painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
            y += spacing;
        }
    };

    if grid.minor >= MIN_MINOR_SPACING {
        let offset = Vec2::new(grid.offset.x.rem_euclid(grid.minor), grid.offset.y.rem_euclid(grid.minor));
        lines(grid.minor, offset, minor_color);
    }
    if grid.major >= MIN_MINOR_SPACING {
        lines(grid.major, grid.offset, major_color);
    }
}

fn draw_connections(painter: &egui::Painter, rect: Rect, editor: &GraphEditor) {
    let origin = rect.min.to_vec2();
    for connection in editor.graph().connections() {
        if editor.visibility().is_connection_hidden(connection.id) {
            continue;
        }
        let Some(path) = editor.wire_path(connection) else {
            continue;
        };
        let style = editor.wire_style(connection);
        let points: Vec<Pos2> = path.points(WIRE_SEGMENTS).into_iter().map(|p| p + origin).collect();
        let [r, g, b, a] = style.shadow_rgba();
        painter.add(Shape::line(
            points.clone(),
            Stroke::new(style.width * 2.0, Color32::from_rgba_unmultiplied(r, g, b, a)),
        ));
        painter.add(Shape::line(points, Stroke::new(style.width, rgb(style.color))));
    }

    if let Some(temp) = editor.temp_wire() {
        let width = editor.config().wires.stroke_width(editor.camera().scale);
        let points: Vec<Pos2> = temp.path.points(WIRE_SEGMENTS).into_iter().map(|p| p + origin).collect();
        painter.extend(Shape::dashed_line(&points, Stroke::new(width, rgb(temp.color)), 8.0, 4.0));
    }
}

fn draw_nodes(painter: &egui::Painter, rect: Rect, editor: &GraphEditor) {
    let origin = rect.min.to_vec2();
    let zoom = editor.camera().scale;
    for node in editor.graph().nodes() {
        if editor.visibility().is_node_hidden(node.id) {
            continue;
        }
        let Some(screen_rect) = editor.node_screen_rect(node.id).map(|r| r.translate(origin)) else {
            continue;
        };
        if !screen_rect.intersects(rect) {
            continue;
        }

        painter.rect_filled(
            screen_rect.translate(Vec2::splat(NODE_SHADOW_OFFSET)),
            NODE_ROUNDING * zoom,
            Color32::from_rgba_unmultiplied(0, 0, 0, 60),
        );
        painter.rect_filled(screen_rect, NODE_ROUNDING * zoom, NODE_BODY);

        let header_rect = Rect::from_min_size(screen_rect.min, Vec2::new(screen_rect.width(), node.header_height * zoom));
        painter.rect_filled(
            header_rect,
            egui::Rounding {
                nw: NODE_ROUNDING * zoom,
                ne: NODE_ROUNDING * zoom,
                sw: 0.0,
                se: 0.0,
            },
            NODE_HEADER,
        );
        painter.text(
            header_rect.center(),
            egui::Align2::CENTER_CENTER,
            node.name(),
            egui::FontId::proportional(12.0 * zoom),
            Color32::WHITE,
        );

        if node.selected && !editor.visibility().outlines_hidden {
            painter.rect_stroke(screen_rect, NODE_ROUNDING * zoom, Stroke::new(2.0, SELECTION));
        }

        draw_ports(painter, origin, editor, node);
    }
}

fn draw_ports(painter: &egui::Painter, origin: Vec2, editor: &GraphEditor, node: &Node) {
    let zoom = editor.camera().scale;
    for port in &node.ports {
        let port_ref = PortRef::new(node.id, port.id);
        let Some(port_rect) = editor.port_screen_rect(port_ref).map(|r| r.translate(origin)) else {
            continue;
        };
        let color = port_color(editor, port_ref, port);
        let connected = editor.bindings().is_connected(port_ref);

        if port.is_exec() {
            let c = port_rect.center();
            let h = port_rect.height() * 0.5;
            let triangle = vec![
                Pos2::new(c.x - h, c.y - h),
                Pos2::new(c.x + h, c.y),
                Pos2::new(c.x - h, c.y + h),
            ];
            let fill = if connected { color } else { NODE_BODY };
            painter.add(Shape::convex_polygon(triangle, fill, Stroke::new(1.5, color)));
        } else {
            let radius = port_rect.width() * 0.5;
            if connected {
                painter.circle_filled(port_rect.center(), radius, color);
            } else {
                painter.circle(port_rect.center(), radius, NODE_BODY, Stroke::new(1.5, color));
            }
        }

        if editor.cannot_connect() == Some(port_ref) {
            painter.rect_stroke(port_rect.expand(3.0), 2.0, Stroke::new(2.0, CANNOT_CONNECT));
        }

        let (anchor, align) = if port.is_input() {
            (port_rect.right_center() + Vec2::new(4.0 * zoom, 0.0), egui::Align2::LEFT_CENTER)
        } else {
            (port_rect.left_center() - Vec2::new(4.0 * zoom, 0.0), egui::Align2::RIGHT_CENTER)
        };
        painter.text(
            anchor,
            align,
            &port.name,
            egui::FontId::proportional(10.0 * zoom),
            Color32::from_gray(200),
        );
    }
}

fn port_color(editor: &GraphEditor, port_ref: PortRef, port: &Port) -> Color32 {
    rgb(editor
        .bindings()
        .color_of(port_ref, port)
        .unwrap_or(editor.config().palette.adaptive))
}

fn draw_context_menu(painter: &egui::Painter, rect: Rect, editor: &GraphEditor, hover: Option<Pos2>) {
    let Some(menu) = editor.context_menu() else {
        return;
    };
    let Some(bounds) = menu.bounds() else {
        return;
    };
    let origin = rect.min.to_vec2();
    let bounds = bounds.translate(origin);

    painter.rect_filled(bounds.translate(Vec2::splat(2.0)), 4.0, Color32::from_rgba_unmultiplied(0, 0, 0, 80));
    painter.rect_filled(bounds, 4.0, Color32::from_rgb(40, 40, 44));
    painter.rect_stroke(bounds, 4.0, Stroke::new(1.0, Color32::from_gray(70)));

    let visible = MenuItem::ALL
        .into_iter()
        .map(|item| (item, menu.item_state(item)))
        .filter(|(_, state)| !state.hidden);
    for (row, (item, state)) in visible.enumerate() {
        let row_rect = Rect::from_min_size(
            bounds.min + Vec2::new(0.0, row as f32 * MENU_ROW_HEIGHT),
            Vec2::new(bounds.width(), MENU_ROW_HEIGHT),
        );
        if state.is_active() && hover.is_some_and(|p| row_rect.contains(p)) {
            painter.rect_filled(row_rect.shrink(2.0), 3.0, Color32::from_rgb(60, 70, 90));
        }
        let text_color = if state.disabled {
            Color32::from_gray(110)
        } else {
            Color32::from_gray(220)
        };
        painter.text(
            row_rect.left_center() + Vec2::new(10.0, 0.0),
            egui::Align2::LEFT_CENTER,
            item.label(),
            egui::FontId::proportional(13.0),
            text_color,
        );
    }
}

fn draw_status_bar(painter: &egui::Painter, rect: Rect, editor: &GraphEditor) {
    let graph = editor.graph();
    painter.text(
        Pos2::new(rect.left() + 5.0, rect.bottom() - 11.0),
        egui::Align2::LEFT_CENTER,
        format!(
            "Nodes: {} | Connections: {} | Zoom: {:.0}% | Selected: {}",
            graph.node_count(),
            graph.connection_count(),
            editor.camera().scale * 100.0,
            graph.selected_ids().len(),
        ),
        egui::FontId::proportional(11.0),
        Color32::from_gray(150),
    );
}
