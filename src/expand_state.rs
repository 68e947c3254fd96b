use std::collections::HashSet;

use crate::tree::ROOT_ID;

/// Tracks which folders are expanded. The virtual root always is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashSet<String>, // folder ids
}

impl ExpansionState {
    /// Expand a folder. Returns true if it was collapsed before.
    pub fn expand(&mut self, id: &str) -> bool {
        if id == ROOT_ID {
            return false;
        }
        self.expanded.insert(id.to_string())
    }

    /// Collapse a folder. Descendants keep their own state. The root cannot collapse.
    pub fn collapse(&mut self, id: &str) -> bool {
        self.expanded.remove(id)
    }

    /// Flip a folder between expanded and collapsed.
    pub fn toggle(&mut self, id: &str) {
        if self.is_expanded(id) {
            self.collapse(id);
        } else {
            self.expand(id);
        }
    }

    /// Check if a folder is expanded.
    pub fn is_expanded(&self, id: &str) -> bool {
        id == ROOT_ID || self.expanded.contains(id)
    }

    /// Drop ids that no longer resolve, e.g. after a subtree was deleted.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.expanded.retain(|id| keep(id));
    }

    /// Explicitly expanded folders, root excluded.
    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_collapse() {
        let mut state = ExpansionState::default();

        assert!(!state.is_expanded("dir"));

        assert!(state.expand("dir"));
        assert!(!state.expand("dir"));
        assert!(state.is_expanded("dir"));

        assert!(state.collapse("dir"));
        assert!(!state.is_expanded("dir"));
        assert!(!state.collapse("dir"));
    }

    #[test]
    fn test_root_is_always_expanded() {
        let mut state = ExpansionState::default();
        assert!(state.is_expanded(ROOT_ID));

        state.toggle(ROOT_ID);
        assert!(state.is_expanded(ROOT_ID));
        assert!(!state.collapse(ROOT_ID));
        assert!(state.is_empty());
    }

    #[test]
    fn test_toggle() {
        let mut state = ExpansionState::default();
        state.toggle("a");
        assert!(state.is_expanded("a"));
        state.toggle("a");
        assert!(!state.is_expanded("a"));
    }

    #[test]
    fn test_collapse_keeps_descendants() {
        let mut state = ExpansionState::default();
        state.expand("parent");
        state.expand("child");

        state.collapse("parent");

        assert!(!state.is_expanded("parent"));
        assert!(state.is_expanded("child"));
    }

    #[test]
    fn test_retain() {
        let mut state = ExpansionState::default();
        state.expand("a");
        state.expand("b");
        state.expand("c");

        state.retain(|id| id != "b");
        assert_eq!(state.len(), 2);
        assert!(!state.is_expanded("b"));
    }
}
