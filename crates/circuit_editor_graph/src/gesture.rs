// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified pointer input and gesture recognizers.
//!
//! Mouse, touch and pen input all arrive as [`PointerEvent`]s. Each
//! recognizer owns the pointer(s) that started it and ignores everything else,
//! so concurrent touches never leak into each other's gestures.

use egui::{Key, Modifiers, PointerButton, Pos2, Vec2};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Identity of one pointer (mouse, finger or pen contact)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub u64);

impl PointerId {
    /// The single mouse pointer
    pub const MOUSE: Self = Self(0);
}

/// Device class of a pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Mouse or trackpad
    Mouse,
    /// Finger
    Touch,
    /// Stylus
    Pen,
}

impl PointerKind {
    /// Long-press applies to touch and pen only
    pub fn supports_long_press(self) -> bool {
        matches!(self, Self::Touch | Self::Pen)
    }
}

/// Pointer lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Contact started or button pressed
    Down,
    /// Pointer moved
    Move,
    /// Contact ended or button released
    Up,
    /// The platform took the pointer away
    Cancel,
}

/// One pointer event in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Pointer identity
    pub id: PointerId,
    /// Device class
    pub kind: PointerKind,
    /// Phase
    pub phase: PointerPhase,
    /// Position in viewport px
    pub pos: Pos2,
    /// Mouse button for press/release events
    pub button: Option<PointerButton>,
    /// Held modifiers
    pub modifiers: Modifiers,
    /// Event time
    pub time: Instant,
}

impl PointerEvent {
    /// Mouse event
    pub fn mouse(phase: PointerPhase, pos: Pos2, button: Option<PointerButton>, time: Instant) -> Self {
        Self {
            id: PointerId::MOUSE,
            kind: PointerKind::Mouse,
            phase,
            pos,
            button,
            modifiers: Modifiers::NONE,
            time,
        }
    }

    /// Touch event for one finger
    pub fn touch(id: u64, phase: PointerPhase, pos: Pos2, time: Instant) -> Self {
        Self {
            id: PointerId(id + 1),
            kind: PointerKind::Touch,
            phase,
            pos,
            button: None,
            modifiers: Modifiers::NONE,
            time,
        }
    }

    /// Replace the modifiers
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Primary activation: left mouse button, or any touch/pen contact
    pub fn is_primary(&self) -> bool {
        match self.kind {
            PointerKind::Mouse => self.button == Some(PointerButton::Primary),
            PointerKind::Touch | PointerKind::Pen => true,
        }
    }
}

/// Ctrl on most platforms, Cmd on macOS
pub fn command_held(modifiers: Modifiers) -> bool {
    modifiers.ctrl || modifiers.mac_cmd || modifiers.command
}

/// A wheel step at a cursor position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Cursor position in viewport px
    pub pos: Pos2,
    /// Vertical scroll delta, positive scrolls down
    pub delta_y: f32,
}

/// A key press
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    /// Key
    pub key: Key,
    /// Held modifiers
    pub modifiers: Modifiers,
    /// A text field currently has focus
    pub text_focus: bool,
}

/// Graph keyboard commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Delete the selection
    Delete,
    /// Copy the selection
    Copy,
    /// Cut the selection
    Cut,
    /// Paste the clipboard
    Paste,
    /// Undo
    Undo,
    /// Redo
    Redo,
}

impl Shortcut {
    /// Map a key chord to a command
    pub fn from_key(key: Key, modifiers: Modifiers) -> Option<Self> {
        let command = command_held(modifiers);
        match key {
            Key::Delete | Key::Backspace => Some(Self::Delete),
            Key::C if command => Some(Self::Copy),
            Key::X if command => Some(Self::Cut),
            Key::V if command => Some(Self::Paste),
            Key::Z if command && modifiers.shift => Some(Self::Redo),
            Key::Z if command => Some(Self::Undo),
            Key::Y if command => Some(Self::Redo),
            _ => None,
        }
    }
}

/// Whether a pointer left the click zone. Each axis is tested separately.
pub fn exceeds_threshold(origin: Pos2, pos: Pos2, threshold: f32) -> bool {
    (pos.x - origin.x).abs() > threshold || (pos.y - origin.y).abs() > threshold
}

/// Single-pointer camera pan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanGesture {
    /// Owning pointer
    pub pointer: PointerId,
    last: Pos2,
}

impl PanGesture {
    /// Start panning at `pos`
    pub fn new(pointer: PointerId, pos: Pos2) -> Self {
        Self { pointer, last: pos }
    }

    /// Raw delta since the previous move
    pub fn update(&mut self, pos: Pos2) -> Vec2 {
        let delta = pos - self.last;
        self.last = pos;
        delta
    }
}

/// Two-finger zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchGesture {
    fingers: [(PointerId, Pos2); 2],
    start_distance: f32,
    start_scale: f32,
    world_anchor: Pos2,
}

/// Camera placement produced by a pinch step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchStep {
    /// Screen point the world anchor must land on
    pub anchor: Pos2,
    /// World point captured at the start of the gesture
    pub world: Pos2,
    /// Unclamped target scale
    pub scale: f32,
}

impl PinchGesture {
    /// Start a pinch. `world_anchor` is the world point under the start midpoint.
    pub fn new(a: (PointerId, Pos2), b: (PointerId, Pos2), start_scale: f32, world_anchor: Pos2) -> Self {
        Self {
            fingers: [a, b],
            start_distance: a.1.distance(b.1).max(1.0),
            start_scale,
            world_anchor,
        }
    }

    /// Midpoint between two points
    pub fn midpoint(a: Pos2, b: Pos2) -> Pos2 {
        a + (b - a) * 0.5
    }

    /// Whether a pointer is one of the two fingers
    pub fn owns(&self, pointer: PointerId) -> bool {
        self.fingers.iter().any(|(id, _)| *id == pointer)
    }

    /// Move one finger. Returns `None` for foreign pointers.
    pub fn update(&mut self, pointer: PointerId, pos: Pos2) -> Option<PinchStep> {
        let finger = self.fingers.iter_mut().find(|(id, _)| *id == pointer)?;
        finger.1 = pos;
        let [(_, a), (_, b)] = self.fingers;
        Some(PinchStep {
            anchor: Self::midpoint(a, b),
            world: self.world_anchor,
            scale: self.start_scale * (a.distance(b) / self.start_distance),
        })
    }

    /// Lift one finger and return the one that stays down
    pub fn release(&self, pointer: PointerId) -> Option<(PointerId, Pos2)> {
        match self.fingers {
            [(a, _), other] if a == pointer => Some(other),
            [other, (b, _)] if b == pointer => Some(other),
            _ => None,
        }
    }
}

/// Rubber-band selection rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSelect {
    /// Owning pointer
    pub pointer: PointerId,
    /// Press position
    pub start: Pos2,
    /// Latest position
    pub current: Pos2,
    /// Passed the drag threshold at least once
    pub dragged: bool,
}

impl BoxSelect {
    /// Start at `pos`
    pub fn new(pointer: PointerId, pos: Pos2) -> Self {
        Self {
            pointer,
            start: pos,
            current: pos,
            dragged: false,
        }
    }

    /// Track the pointer
    pub fn update(&mut self, pos: Pos2, threshold: f32) {
        self.current = pos;
        if !self.dragged && exceeds_threshold(self.start, pos, threshold) {
            self.dragged = true;
        }
    }

    /// Current rectangle in screen px
    pub fn rect(&self) -> egui::Rect {
        egui::Rect::from_two_pos(self.start, self.current)
    }
}

/// Pending press-and-hold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongPress<T> {
    /// Owning pointer
    pub pointer: PointerId,
    /// Press position
    pub origin: Pos2,
    /// Press time
    pub started: Instant,
    /// What the press landed on
    pub target: T,
}

impl<T: Copy> LongPress<T> {
    /// Arm a long-press timer
    pub fn new(pointer: PointerId, origin: Pos2, started: Instant, target: T) -> Self {
        Self {
            pointer,
            origin,
            started,
            target,
        }
    }

    /// Whether the pointer wandered past the tolerance
    pub fn moved_away(&self, pos: Pos2, tolerance: f32) -> bool {
        self.origin.distance(pos) > tolerance
    }

    /// Whether the hold time has elapsed
    pub fn is_due(&self, now: Instant, delay: Duration) -> bool {
        now.saturating_duration_since(self.started) >= delay
    }
}

/// Positions of the touch contacts currently down
#[derive(Debug, Clone, Default)]
pub struct TouchSet {
    active: HashMap<PointerId, Pos2>,
}

impl TouchSet {
    /// Apply an event; non-touch events are ignored
    pub fn track(&mut self, event: &PointerEvent) {
        if event.kind != PointerKind::Touch {
            return;
        }
        match event.phase {
            PointerPhase::Down | PointerPhase::Move => {
                self.active.insert(event.id, event.pos);
            }
            PointerPhase::Up | PointerPhase::Cancel => {
                self.active.remove(&event.id);
            }
        }
    }

    /// Number of fingers down
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// No fingers down
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Position of one finger
    pub fn get(&self, pointer: PointerId) -> Option<Pos2> {
        self.active.get(&pointer).copied()
    }

    /// Some other finger than `pointer`
    pub fn other_than(&self, pointer: PointerId) -> Option<(PointerId, Pos2)> {
        self.active
            .iter()
            .find(|(id, _)| **id != pointer)
            .map(|(id, pos)| (*id, *pos))
    }
}
