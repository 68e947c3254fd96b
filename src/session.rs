use crate::error::LoadError;
use crate::navigation::{Intent, NavKey, NavState};
use crate::render_tree::{project, ViewModel};
use crate::tree::VaultTree;

/// A loaded tree plus the navigation state driving it.
///
/// The embedding host calls the `on_*` methods and redraws from [`Explorer::view`].
#[derive(Debug)]
pub struct Explorer {
    tree: VaultTree,
    nav: NavState,
}

impl Explorer {
    pub fn new(tree: VaultTree) -> Self {
        Self {
            tree,
            nav: NavState::new(),
        }
    }

    pub fn tree(&self) -> &VaultTree {
        &self.tree
    }

    pub fn nav(&self) -> &NavState {
        &self.nav
    }

    pub fn dispatch(&mut self, intent: Intent) -> bool {
        self.nav.apply(&mut self.tree, intent)
    }

    pub fn view(&self) -> ViewModel {
        project(&self.tree, &self.nav)
    }

    pub fn on_query_change(&mut self, text: impl Into<String>) -> bool {
        self.dispatch(Intent::QueryChange(text.into()))
    }

    pub fn on_node_activate(&mut self, id: &str) -> bool {
        self.dispatch(Intent::Activate(id.to_string()))
    }

    pub fn on_toggle_expand(&mut self, id: &str) -> bool {
        self.dispatch(Intent::ToggleExpand(id.to_string()))
    }

    pub fn on_key(&mut self, key: NavKey) -> bool {
        self.dispatch(Intent::Key(key))
    }

    pub fn on_open_menu(&mut self, id: &str) -> bool {
        self.dispatch(Intent::OpenMenu(id.to_string()))
    }

    pub fn on_choose_view_details(&mut self, id: &str) -> bool {
        self.dispatch(Intent::ChooseViewDetails(id.to_string()))
    }

    pub fn on_choose_delete(&mut self, id: &str) -> bool {
        self.dispatch(Intent::ChooseDelete(id.to_string()))
    }

    pub fn on_confirm_delete(&mut self) -> bool {
        self.dispatch(Intent::ConfirmDelete)
    }

    pub fn on_cancel_delete(&mut self) -> bool {
        self.dispatch(Intent::CancelDelete)
    }

    pub fn on_click_outside_menu(&mut self) -> bool {
        self.dispatch(Intent::ClickOutsideMenu)
    }
}

/// Lifecycle of one browsing session. `Failed` is terminal.
#[derive(Debug, Default)]
pub enum Session {
    #[default]
    Loading,
    Failed(String),
    Ready(Explorer),
}

impl Session {
    /// Settle the pending load. Later results are ignored.
    pub fn finish_load(&mut self, result: Result<VaultTree, LoadError>) {
        if !matches!(self, Session::Loading) {
            tracing::warn!("load result arrived after the session settled; ignoring");
            return;
        }
        *self = match result {
            Ok(tree) => Session::Ready(Explorer::new(tree)),
            Err(err) => Session::Failed(err.to_string()),
        };
    }

    pub fn explorer(&self) -> Option<&Explorer> {
        match self {
            Session::Ready(explorer) => Some(explorer),
            Session::Loading | Session::Failed(_) => None,
        }
    }

    pub fn explorer_mut(&mut self) -> Option<&mut Explorer> {
        match self {
            Session::Ready(explorer) => Some(explorer),
            Session::Loading | Session::Failed(_) => None,
        }
    }

    /// Intents are dropped until the tree is ready.
    pub fn dispatch(&mut self, intent: Intent) -> bool {
        match self.explorer_mut() {
            Some(explorer) => explorer.dispatch(intent),
            None => false,
        }
    }

    pub fn view(&self) -> Option<ViewModel> {
        self.explorer().map(Explorer::view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::navigation::Mode;
    use crate::tree::tests::{file, folder};
    use crate::tree::ROOT_ID;

    fn explorer() -> Explorer {
        Explorer::new(VaultTree::from_forest(vec![
            folder("a", "FolderA", vec![file("f1", "File1.txt"), file("f2", "File2.txt")]),
            file("top", "top.md"),
        ]))
    }

    #[test]
    fn test_intents_are_ignored_while_loading() {
        let mut session = Session::default();
        assert!(!session.dispatch(Intent::Key(NavKey::Down)));
        assert!(session.view().is_none());
    }

    #[test]
    fn test_failed_load_is_terminal() {
        let mut session = Session::default();
        session.finish_load(Err(ValidationError::DuplicateId { id: "x".into() }.into()));
        match &session {
            Session::Failed(message) => assert!(message.contains("duplicate node id: x")),
            other => panic!("unexpected {other:?}"),
        }

        session.finish_load(Ok(VaultTree::new()));
        assert!(matches!(session, Session::Failed(_)));
        assert!(!session.dispatch(Intent::ConfirmDelete));
    }

    #[test]
    fn test_ready_session_projects() {
        let mut session = Session::default();
        session.finish_load(Ok(VaultTree::new()));
        let view = session.view().unwrap();
        assert_eq!(view.visible_order, vec![ROOT_ID]);
    }

    #[test]
    fn test_arrow_down_at_end_keeps_focus() {
        let mut explorer = explorer();
        while explorer.on_key(NavKey::Down) {}
        let last = explorer.view().visible_order.last().cloned();
        assert_eq!(last.as_deref(), Some("top"));
        assert_eq!(explorer.nav().focused_node_id.as_deref(), Some("top"));

        assert!(!explorer.on_key(NavKey::Down));
        assert_eq!(explorer.nav().focused_node_id.as_deref(), Some("top"));
    }

    #[test]
    fn test_full_delete_flow() {
        let mut explorer = explorer();
        explorer.on_node_activate("a");
        explorer.on_open_menu("f1");
        explorer.on_choose_view_details("f1");
        assert_eq!(explorer.nav().mode, Mode::Details);

        explorer.on_open_menu("f1");
        explorer.on_choose_delete("f1");
        assert!(explorer.on_confirm_delete());

        assert_eq!(explorer.nav().mode, Mode::Empty);
        assert!(explorer.nav().details_file_id.is_none());
        assert!(explorer.tree().find_by_id("f1").is_none());
        assert_eq!(explorer.view().visible_order, vec![ROOT_ID, "a", "f2", "top"]);
    }

    #[test]
    fn test_search_then_menu_dismiss() {
        let mut explorer = explorer();
        explorer.on_query_change("file2");
        assert_eq!(explorer.view().visible_order, vec![ROOT_ID, "a", "f2"]);

        explorer.on_query_change("");
        assert!(explorer.nav().expanded.is_expanded("a"));
        explorer.on_open_menu("top");
        assert_eq!(explorer.view().open_menu.as_deref(), Some("top"));
        assert!(explorer.on_click_outside_menu());
        assert!(!explorer.on_cancel_delete());
    }
}
