// SPDX-License-Identifier: MIT OR Apache-2.0
//! Context menu integration.

use super::GraphEditor;
use crate::context_menu::{
    ContextMenu, ItemState, MenuAction, MenuItem, MenuRequest, SelectedChip, SelectionPayload, MENU_ROW_HEIGHT,
};
use crate::export::{ExportError, ExportJob};
use egui::Pos2;

/// Result of running a menu action
#[derive(Debug)]
pub enum MenuOutcome {
    /// The engine handled the action
    Handled,
    /// The action had nothing to act on
    Ignored,
    /// The host should create an invention from these chips
    CreateInvention(SelectionPayload),
    /// The host should show details for this chip
    AboutChip(SelectionPayload),
    /// The host should rasterize this job and hand the pixels to [`GraphEditor::complete_export`]
    Export(ExportJob),
    /// Export could not start
    ExportFailed(ExportError),
}

impl GraphEditor {
    /// Connect a menu widget and register the engine's actions with it
    pub fn attach_context_menu(&mut self, mut menu: Box<dyn ContextMenu>) {
        for item in MenuItem::ALL {
            menu.register_action(item, item.action());
        }
        self.menu = Some(menu);
    }

    /// The attached menu
    pub fn context_menu(&self) -> Option<&dyn ContextMenu> {
        self.menu.as_deref()
    }

    /// Open the menu. A targeted node is selected first.
    pub fn open_context_menu(&mut self, request: MenuRequest) -> bool {
        let Some(menu) = self.menu.as_ref() else {
            tracing::debug!("No context menu attached");
            return false;
        };
        if menu.is_open() && menu.contains(request.pos) {
            return false;
        }

        if let Some(target) = request.target {
            if !self.is_selected(target) {
                self.select_node(target);
            }
        }
        let states = self.menu_item_states();
        let viewport = self.viewport;
        let Some(menu) = self.menu.as_mut() else {
            return false;
        };
        for (item, state) in states {
            menu.set_item_state(item, state);
        }
        menu.open(&request, viewport);
        self.request_render();
        true
    }

    /// Hide the menu if it is open
    pub fn hide_context_menu(&mut self) {
        if let Some(menu) = self.menu.as_mut().filter(|m| m.is_open()) {
            menu.hide();
            self.render.request();
        }
    }

    /// Item states for the current selection and history
    pub fn menu_item_states(&self) -> Vec<(MenuItem, ItemState)> {
        let selected = self.graph.selected_ids().len();
        MenuItem::ALL
            .into_iter()
            .map(|item| {
                let state = match item {
                    MenuItem::Undo => ItemState::visible(!self.history.can_undo()),
                    MenuItem::Redo => ItemState::visible(!self.history.can_redo()),
                    MenuItem::Duplicate | MenuItem::Delete | MenuItem::CreateInvention | MenuItem::ExportImage
                        if selected > 0 =>
                    {
                        ItemState::visible(false)
                    }
                    MenuItem::AboutChip if selected == 1 => ItemState::visible(false),
                    _ => ItemState::HIDDEN,
                };
                (item, state)
            })
            .collect()
    }

    /// The user picked a menu item
    pub fn menu_item_clicked(&mut self, item: MenuItem) -> Option<MenuOutcome> {
        let action = self.menu.as_mut()?.activate(item)?;
        self.request_render();
        Some(self.run_menu_action(action))
    }

    /// Perform a menu action
    pub fn run_menu_action(&mut self, action: MenuAction) -> MenuOutcome {
        tracing::debug!("Menu action {:?}", action);
        let handled = |ok: bool| if ok { MenuOutcome::Handled } else { MenuOutcome::Ignored };
        match action {
            MenuAction::Undo => handled(self.undo().is_ok()),
            MenuAction::Redo => handled(self.redo().is_ok()),
            MenuAction::Delete => handled(self.delete_selected() > 0),
            MenuAction::Duplicate => handled(!self.duplicate_selection().is_empty()),
            MenuAction::CreateInvention => match self.selection_payload() {
                Some(payload) => MenuOutcome::CreateInvention(payload),
                None => MenuOutcome::Ignored,
            },
            MenuAction::AboutChip => match self.selection_payload().filter(|p| p.ids.len() == 1) {
                Some(payload) => MenuOutcome::AboutChip(payload),
                None => MenuOutcome::Ignored,
            },
            MenuAction::ExportImage => {
                let options = self.config.export.clone();
                match self.prepare_export(&options) {
                    Ok(job) => MenuOutcome::Export(job),
                    Err(err) => {
                        tracing::warn!("Export failed to start: {}", err);
                        MenuOutcome::ExportFailed(err)
                    }
                }
            }
        }
    }

    /// Visible menu item under a viewport point
    pub fn menu_item_at(&self, pos: Pos2) -> Option<MenuItem> {
        let menu = self.menu.as_deref()?;
        let bounds = menu.bounds().filter(|b| b.contains(pos))?;
        let row = ((pos.y - bounds.min.y) / MENU_ROW_HEIGHT) as usize;
        MenuItem::ALL
            .into_iter()
            .filter(|item| !menu.item_state(*item).hidden)
            .nth(row)
    }

    /// Ids and payloads of the selected nodes
    pub fn selection_payload(&self) -> Option<SelectionPayload> {
        let nodes: Vec<SelectedChip> = self
            .graph
            .nodes()
            .filter(|n| n.selected)
            .map(|n| SelectedChip {
                id: n.id,
                payload: n.descriptor.clone(),
            })
            .collect();
        if nodes.is_empty() {
            return None;
        }
        Some(SelectionPayload {
            ids: nodes.iter().map(|n| n.id).collect(),
            nodes,
        })
    }
}
