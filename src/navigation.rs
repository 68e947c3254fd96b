use serde::Serialize;

use crate::expand_state::ExpansionState;
use crate::render_tree::visible_order;
use crate::search::{auto_expand_for_search, SearchQuery};
use crate::tree::{VaultTree, ROOT_ID};

/// Which view governs the workspace pane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Mode {
    #[default]
    Empty,
    Preview,
    Details,
}

/// Keys the tree reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

/// A discrete user action coming from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    QueryChange(String),
    /// Row click: folders toggle, files open in preview.
    Activate(String),
    /// Twisty click: folders toggle, focus stays put.
    ToggleExpand(String),
    Key(NavKey),
    OpenMenu(String),
    ChooseViewDetails(String),
    ChooseDelete(String),
    ConfirmDelete,
    CancelDelete,
    ClickOutsideMenu,
}

/// Session-wide navigation state.
///
/// Every intent goes through [`NavState::apply`]; transitions that reference a
/// missing node, or whose precondition does not hold, leave the state alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavState {
    pub expanded: ExpansionState,
    pub selected_file_id: Option<String>,
    pub focused_node_id: Option<String>,
    pub query: String,
    pub mode: Mode,
    pub preview_file_id: Option<String>,
    pub details_file_id: Option<String>,
    pub open_menu_file_id: Option<String>,
    pub pending_delete_id: Option<String>,
}

impl Default for NavState {
    fn default() -> Self {
        Self {
            expanded: ExpansionState::default(),
            selected_file_id: None,
            focused_node_id: Some(ROOT_ID.to_string()),
            query: String::new(),
            mode: Mode::Empty,
            preview_file_id: None,
            details_file_id: None,
            open_menu_file_id: None,
            pending_delete_id: None,
        }
    }
}

impl NavState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery::new(&self.query)
    }

    /// Ids currently on screen, in display order.
    pub fn visible_order(&self, tree: &VaultTree) -> Vec<String> {
        visible_order(tree, &self.expanded, &self.search_query())
    }

    /// Process one intent to completion. Returns whether it had any effect.
    pub fn apply(&mut self, tree: &mut VaultTree, intent: Intent) -> bool {
        tracing::debug!(?intent, "applying intent");
        let handled = match intent {
            Intent::QueryChange(text) => {
                self.set_query(tree, text);
                true
            }
            Intent::Activate(id) => self.activate(tree, &id),
            Intent::ToggleExpand(id) => self.toggle_expand(tree, &id),
            Intent::Key(key) => self.on_key(tree, key),
            Intent::OpenMenu(id) => self.open_menu(tree, &id),
            Intent::ChooseViewDetails(id) => self.choose_view_details(tree, &id),
            Intent::ChooseDelete(id) => self.choose_delete(tree, &id),
            Intent::ConfirmDelete => self.confirm_delete(tree),
            Intent::CancelDelete => self.pending_delete_id.take().is_some(),
            Intent::ClickOutsideMenu => self.open_menu_file_id.take().is_some(),
        };
        self.repair_focus(tree);
        handled
    }

    /// Snap focus to the first visible row when the focused one went away.
    pub fn repair_focus(&mut self, tree: &VaultTree) {
        let order = self.visible_order(tree);
        let still_visible = self
            .focused_node_id
            .as_ref()
            .is_some_and(|id| order.contains(id));
        if !still_visible {
            self.focused_node_id = order.into_iter().next();
        }
    }

    fn set_query(&mut self, tree: &VaultTree, text: String) {
        self.query = text;
        let opened = auto_expand_for_search(tree, &self.search_query(), &mut self.expanded);
        tracing::debug!(query = %self.query, opened, "search updated");
    }

    fn activate(&mut self, tree: &VaultTree, id: &str) -> bool {
        match tree.find_by_id(id) {
            Some(node) if node.is_folder() => {
                self.expanded.toggle(id);
                self.focused_node_id = Some(id.to_string());
                true
            }
            Some(_) => {
                self.open_preview(id);
                true
            }
            None => false,
        }
    }

    fn toggle_expand(&mut self, tree: &VaultTree, id: &str) -> bool {
        if !is_folder(tree, id) {
            return false;
        }
        self.expanded.toggle(id);
        true
    }

    fn open_preview(&mut self, id: &str) {
        self.preview_file_id = Some(id.to_string());
        self.selected_file_id = Some(id.to_string());
        self.mode = Mode::Preview;
        self.open_menu_file_id = None;
        self.focused_node_id = Some(id.to_string());
    }

    fn open_menu(&mut self, tree: &VaultTree, id: &str) -> bool {
        if !is_file(tree, id) {
            return false;
        }
        if self.open_menu_file_id.as_deref() == Some(id) {
            self.open_menu_file_id = None;
        } else {
            self.open_menu_file_id = Some(id.to_string());
        }
        true
    }

    fn menu_open_for(&self, tree: &VaultTree, id: &str) -> bool {
        self.open_menu_file_id.as_deref() == Some(id) && is_file(tree, id)
    }

    fn choose_view_details(&mut self, tree: &VaultTree, id: &str) -> bool {
        if !self.menu_open_for(tree, id) {
            return false;
        }
        self.details_file_id = Some(id.to_string());
        self.selected_file_id = Some(id.to_string());
        self.mode = Mode::Details;
        self.open_menu_file_id = None;
        self.focused_node_id = Some(id.to_string());
        true
    }

    fn choose_delete(&mut self, tree: &VaultTree, id: &str) -> bool {
        if !self.menu_open_for(tree, id) {
            return false;
        }
        self.pending_delete_id = Some(id.to_string());
        self.open_menu_file_id = None;
        true
    }

    fn confirm_delete(&mut self, tree: &mut VaultTree) -> bool {
        let Some(id) = self.pending_delete_id.take() else {
            return false;
        };
        let removed = tree.delete_by_id(&id);
        if removed {
            tracing::info!(id = %id, remaining = tree.len(), "node deleted");
        } else {
            tracing::warn!(id = %id, "delete confirmed for a node that no longer exists");
        }
        self.forget_missing(tree);
        true
    }

    /// Clear every reference into nodes the tree no longer holds.
    fn forget_missing(&mut self, tree: &VaultTree) {
        for slot in [
            &mut self.selected_file_id,
            &mut self.preview_file_id,
            &mut self.details_file_id,
            &mut self.open_menu_file_id,
            &mut self.focused_node_id,
        ] {
            if slot.as_deref().is_some_and(|id| !tree.contains(id)) {
                *slot = None;
            }
        }
        self.expanded.retain(|id| tree.contains(id));

        let target_gone = match self.mode {
            Mode::Empty => false,
            Mode::Preview => self.preview_file_id.is_none(),
            Mode::Details => self.details_file_id.is_none(),
        };
        if target_gone {
            self.mode = Mode::Empty;
        }
    }

    fn on_key(&mut self, tree: &VaultTree, key: NavKey) -> bool {
        let order = self.visible_order(tree);
        let Some(focused) = self.focused_node_id.clone() else {
            return false;
        };
        let Some(pos) = order.iter().position(|id| *id == focused) else {
            return false;
        };

        match key {
            NavKey::Up => self.move_focus(&order, pos.checked_sub(1)),
            NavKey::Down => self.move_focus(&order, Some(pos + 1)),
            NavKey::Right => {
                if is_folder(tree, &focused) && !self.expanded.is_expanded(&focused) {
                    self.expanded.expand(&focused)
                } else {
                    false
                }
            }
            NavKey::Left => {
                if is_folder(tree, &focused) && self.expanded.collapse(&focused) {
                    return true;
                }
                match tree.find_parent_of(&focused) {
                    Some(parent) => {
                        self.focused_node_id = Some(parent.id.clone());
                        true
                    }
                    None => false,
                }
            }
            NavKey::Enter => {
                if is_folder(tree, &focused) {
                    self.toggle_expand(tree, &focused)
                } else {
                    self.open_preview(&focused);
                    true
                }
            }
        }
    }

    /// Clamped: moving past either end keeps the current focus.
    fn move_focus(&mut self, order: &[String], target: Option<usize>) -> bool {
        match target.and_then(|idx| order.get(idx)) {
            Some(id) => {
                self.focused_node_id = Some(id.clone());
                true
            }
            None => false,
        }
    }
}

fn is_folder(tree: &VaultTree, id: &str) -> bool {
    tree.find_by_id(id).is_some_and(|n| n.is_folder())
}

fn is_file(tree: &VaultTree, id: &str) -> bool {
    tree.find_by_id(id).is_some_and(|n| n.is_file())
}
