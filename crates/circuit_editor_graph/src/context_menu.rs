// SPDX-License-Identifier: MIT OR Apache-2.0
//! Context menu contract.
//!
//! The menu widget itself lives outside the engine. The engine talks to it
//! through [`ContextMenu`]: it registers one typed action per item, toggles
//! item states before opening and receives actions back when the user picks
//! an item.

use crate::chip::ChipDescriptor;
use crate::node::NodeId;
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Window-edge margin kept around an open menu
pub const MENU_MARGIN: f32 = 10.0;

/// Height of one menu row
pub const MENU_ROW_HEIGHT: f32 = 24.0;

/// Fixed set of menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuItem {
    /// Duplicate the selection
    Duplicate,
    /// Delete the selection
    Delete,
    /// Undo
    Undo,
    /// Redo
    Redo,
    /// Hand the selection to the host as a new invention
    CreateInvention,
    /// Show details of the single selected chip
    AboutChip,
    /// Export the selection as an image
    ExportImage,
}

impl MenuItem {
    /// All items in menu order
    pub const ALL: [MenuItem; 7] = [
        Self::Duplicate,
        Self::Delete,
        Self::Undo,
        Self::Redo,
        Self::CreateInvention,
        Self::AboutChip,
        Self::ExportImage,
    ];

    /// Stable key
    pub fn key(self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Delete => "delete",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::CreateInvention => "createInvention",
            Self::AboutChip => "aboutChip",
            Self::ExportImage => "exportImage",
        }
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Self::Duplicate => "Duplicate",
            Self::Delete => "Delete",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::CreateInvention => "Create Invention",
            Self::AboutChip => "About Chip",
            Self::ExportImage => "Export Image",
        }
    }

    /// Action the engine registers for this item
    pub fn action(self) -> MenuAction {
        match self {
            Self::Duplicate => MenuAction::Duplicate,
            Self::Delete => MenuAction::Delete,
            Self::Undo => MenuAction::Undo,
            Self::Redo => MenuAction::Redo,
            Self::CreateInvention => MenuAction::CreateInvention,
            Self::AboutChip => MenuAction::AboutChip,
            Self::ExportImage => MenuAction::ExportImage,
        }
    }
}

/// Engine command triggered from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    /// Undo requested
    Undo,
    /// Redo requested
    Redo,
    /// Delete requested
    Delete,
    /// Duplicate requested
    Duplicate,
    /// Create-invention requested
    CreateInvention,
    /// About-chip requested
    AboutChip,
    /// Export-image requested
    ExportImage,
}

/// Visibility and enablement of one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemState {
    /// Not shown
    pub hidden: bool,
    /// Shown greyed out
    pub disabled: bool,
}

impl ItemState {
    /// Hidden item
    pub const HIDDEN: Self = Self {
        hidden: true,
        disabled: false,
    };

    /// Visible item, enabled unless `disabled`
    pub fn visible(disabled: bool) -> Self {
        Self { hidden: false, disabled }
    }

    /// Visible and enabled
    pub fn is_active(&self) -> bool {
        !self.hidden && !self.disabled
    }
}

/// What opened the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSource {
    /// Secondary click
    ContextMenu,
    /// Touch or pen press-and-hold
    LongPress,
}

/// Request to open the menu
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuRequest {
    /// Viewport position of the press
    pub pos: Pos2,
    /// What opened it
    pub source: MenuSource,
    /// Node under the press, if any
    pub target: Option<NodeId>,
}

/// Selected nodes handed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionPayload {
    /// Selected node ids in storage order
    pub ids: Vec<NodeId>,
    /// Id and chip payload of each selected node
    pub nodes: Vec<SelectedChip>,
}

/// One entry of a [`SelectionPayload`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedChip {
    /// Node id
    pub id: NodeId,
    /// Chip payload
    pub payload: ChipDescriptor,
}

/// External context menu widget
pub trait ContextMenu {
    /// Bind an item to an engine action
    fn register_action(&mut self, item: MenuItem, action: MenuAction);

    /// Update one item
    fn set_item_state(&mut self, item: MenuItem, state: ItemState);

    /// Current state of one item
    fn item_state(&self, item: MenuItem) -> ItemState;

    /// Show the menu for a request inside a window of `window` size
    fn open(&mut self, request: &MenuRequest, window: Vec2);

    /// Hide the menu
    fn hide(&mut self);

    /// Whether the menu is showing
    fn is_open(&self) -> bool;

    /// Screen rectangle of the open menu
    fn bounds(&self) -> Option<Rect>;

    /// Whether a viewport point is inside the open menu
    fn contains(&self, pos: Pos2) -> bool {
        self.bounds().is_some_and(|r| r.contains(pos))
    }

    /// User picked an item. Returns the bound action when the item is usable.
    fn activate(&mut self, item: MenuItem) -> Option<MenuAction>;
}

/// Default in-process menu model, drawn by the egui adapter
#[derive(Debug, Clone)]
pub struct MenuState {
    items: IndexMap<MenuItem, (ItemState, Option<MenuAction>)>,
    rect: Option<Rect>,
    source: Option<MenuSource>,
    /// Menu size used for placement and hit-testing
    pub size: Vec2,
}

impl MenuState {
    /// Closed menu with every item hidden
    pub fn new() -> Self {
        Self {
            items: MenuItem::ALL
                .into_iter()
                .map(|item| (item, (ItemState::HIDDEN, None)))
                .collect(),
            rect: None,
            source: None,
            size: Vec2::new(180.0, 7.0 * MENU_ROW_HEIGHT),
        }
    }

    /// What opened the menu
    pub fn source(&self) -> Option<MenuSource> {
        self.source
    }

    /// Visible items in menu order
    pub fn visible_items(&self) -> impl Iterator<Item = (MenuItem, ItemState)> + '_ {
        self.items
            .iter()
            .filter(|(_, (state, _))| !state.hidden)
            .map(|(item, (state, _))| (*item, *state))
    }

    /// Top-left corner for a menu of `size` at `pos`, kept inside the window
    pub fn place(pos: Pos2, size: Vec2, window: Vec2) -> Pos2 {
        let max_x = (window.x - size.x - MENU_MARGIN).max(MENU_MARGIN);
        let max_y = (window.y - size.y - MENU_MARGIN).max(MENU_MARGIN);
        Pos2::new(pos.x.min(max_x).max(MENU_MARGIN), pos.y.min(max_y).max(MENU_MARGIN))
    }
}

impl Default for MenuState {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextMenu for MenuState {
    fn register_action(&mut self, item: MenuItem, action: MenuAction) {
        if let Some(entry) = self.items.get_mut(&item) {
            entry.1 = Some(action);
        }
    }

    fn set_item_state(&mut self, item: MenuItem, state: ItemState) {
        if let Some(entry) = self.items.get_mut(&item) {
            entry.0 = state;
        }
    }

    fn item_state(&self, item: MenuItem) -> ItemState {
        self.items.get(&item).map(|(state, _)| *state).unwrap_or(ItemState::HIDDEN)
    }

    fn open(&mut self, request: &MenuRequest, window: Vec2) {
        let rows = self.visible_items().count().max(1) as f32;
        let size = Vec2::new(self.size.x, rows * MENU_ROW_HEIGHT);
        let min = Self::place(request.pos, size, window);
        self.rect = Some(Rect::from_min_size(min, size));
        self.source = Some(request.source);
    }

    fn hide(&mut self) {
        self.rect = None;
        self.source = None;
    }

    fn is_open(&self) -> bool {
        self.rect.is_some()
    }

    fn bounds(&self) -> Option<Rect> {
        self.rect
    }

    fn activate(&mut self, item: MenuItem) -> Option<MenuAction> {
        let (state, action) = self.items.get(&item).copied()?;
        if !state.is_active() {
            return None;
        }
        self.hide();
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(x: f32, y: f32) -> MenuRequest {
        MenuRequest {
            pos: Pos2::new(x, y),
            source: MenuSource::ContextMenu,
            target: None,
        }
    }

    #[test]
    fn test_placement_clamps_to_window() {
        let size = Vec2::new(100.0, 50.0);
        let window = Vec2::new(400.0, 300.0);
        assert_eq!(MenuState::place(Pos2::new(50.0, 60.0), size, window), Pos2::new(50.0, 60.0));
        assert_eq!(MenuState::place(Pos2::new(390.0, 290.0), size, window), Pos2::new(290.0, 240.0));
        assert_eq!(MenuState::place(Pos2::new(-5.0, 2.0), size, window), Pos2::new(10.0, 10.0));
    }

    #[test]
    fn test_activate_requires_enabled_item() {
        let mut menu = MenuState::new();
        for item in MenuItem::ALL {
            menu.register_action(item, item.action());
        }
        assert_eq!(menu.activate(MenuItem::Undo), None);

        menu.set_item_state(MenuItem::Undo, ItemState::visible(true));
        assert_eq!(menu.activate(MenuItem::Undo), None);

        menu.set_item_state(MenuItem::Undo, ItemState::visible(false));
        menu.open(&request(20.0, 20.0), Vec2::new(800.0, 600.0));
        assert!(menu.is_open());
        assert_eq!(menu.activate(MenuItem::Undo), Some(MenuAction::Undo));
        assert!(!menu.is_open());
    }

    #[test]
    fn test_contains() {
        let mut menu = MenuState::new();
        menu.set_item_state(MenuItem::Delete, ItemState::visible(false));
        menu.open(&request(100.0, 100.0), Vec2::new(800.0, 600.0));
        assert!(menu.contains(Pos2::new(110.0, 110.0)));
        assert!(!menu.contains(Pos2::new(90.0, 110.0)));
        assert_eq!(menu.visible_items().count(), 1);
    }
}
