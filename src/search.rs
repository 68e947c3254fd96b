use std::collections::HashSet;
use std::ops::Range;

use crate::expand_state::ExpansionState;
use crate::tree::VaultTree;

/// Query normalized for matching. Surrounding whitespace is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    needle: Vec<char>,
}

impl SearchQuery {
    pub fn new(input: &str) -> Self {
        Self {
            needle: input.trim().chars().flat_map(char::to_lowercase).collect(),
        }
    }

    /// An empty query shows everything.
    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    /// Case-insensitive substring match on a node name.
    pub fn matches(&self, name: &str) -> bool {
        self.is_empty() || self.find_in(name).is_some()
    }

    /// Byte range of the first match in `name`, on char boundaries.
    pub fn find_in(&self, name: &str) -> Option<Range<usize>> {
        if self.is_empty() {
            return None;
        }
        name.char_indices()
            .find_map(|(start, _)| self.match_at(name, start).map(|end| start..end))
    }

    fn match_at(&self, name: &str, start: usize) -> Option<usize> {
        let mut wanted = self.needle.iter();
        let mut next = wanted.next();
        for (offset, ch) in name[start..].char_indices() {
            for lower in ch.to_lowercase() {
                match next {
                    Some(&c) if c == lower => next = wanted.next(),
                    _ => return None,
                }
            }
            if next.is_none() {
                return Some(start + offset + ch.len_utf8());
            }
        }
        None
    }
}

/// Whether the node survives the filter: it matches, or a descendant does.
///
/// Unknown ids are never visible.
pub fn is_visible(tree: &VaultTree, id: &str, query: &SearchQuery) -> bool {
    tree.descendants_of(id).any(|node| query.matches(&node.name))
}

/// Ids of every visible node, computed bottom-up in one pass.
pub fn visible_set(tree: &VaultTree, query: &SearchQuery) -> HashSet<String> {
    let mut visible = HashSet::new();
    for node in tree.post_order() {
        let keep = query.matches(&node.name)
            || tree
                .children_of(&node.id)
                .iter()
                .any(|child| visible.contains(&child.id));
        if keep {
            visible.insert(node.id.clone());
        }
    }
    visible
}

/// Expand every strict ancestor folder of every matching node.
///
/// Only ever adds to the expanded set. Returns how many folders were newly expanded.
pub fn auto_expand_for_search(
    tree: &VaultTree,
    query: &SearchQuery,
    expanded: &mut ExpansionState,
) -> usize {
    if query.is_empty() {
        return 0;
    }
    let mut opened = 0;
    tree.walk(|node, ancestors| {
        if query.matches(&node.name) {
            for ancestor in ancestors {
                if expanded.expand(&ancestor.id) {
                    opened += 1;
                }
            }
        }
    });
    opened
}

/// Highlighted span for a node name under `query`, if any.
pub fn highlight_span(name: &str, query: &SearchQuery) -> Option<Range<usize>> {
    query.find_in(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{file, folder, sample_tree};
    use crate::tree::ROOT_ID;
    use proptest::prelude::*;

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let q = SearchQuery::new("  REP ");
        assert!(q.matches("Quarterly report.pdf"));
        assert!(!q.matches("r-e-p"));
        assert_eq!(q.find_in("Quarterly report.pdf"), Some(10..13));
        assert!(SearchQuery::new("").matches("anything"));
        assert_eq!(SearchQuery::new("").find_in("anything"), None);
    }

    #[test]
    fn test_highlight_respects_char_boundaries() {
        let q = SearchQuery::new("über");
        let name = "Die ÜBERSICHT.txt";
        let span = highlight_span(name, &q).unwrap();
        assert_eq!(&name[span], "ÜBER");
    }

    #[test]
    fn test_folder_visible_through_descendant() {
        let tree = sample_tree();
        let q = SearchQuery::new("q2");
        assert!(is_visible(&tree, "q2", &q));
        assert!(is_visible(&tree, "reports", &q));
        assert!(is_visible(&tree, "docs", &q));
        assert!(is_visible(&tree, ROOT_ID, &q));
        assert!(!is_visible(&tree, "q1", &q));
        assert!(!is_visible(&tree, "photos", &q));
        assert!(!is_visible(&tree, "missing", &q));
    }

    #[test]
    fn test_deep_chain_visibility_does_not_recurse() {
        let mut node = file("leaf", "needle.txt");
        for depth in 0..20_000 {
            node = folder(&format!("d{depth}"), "dir", vec![node]);
        }
        let tree = VaultTree::from_forest(vec![node]);

        let q = SearchQuery::new("needle");
        assert!(is_visible(&tree, "d19999", &q));
        assert!(is_visible(&tree, "d0", &q));
        assert!(!is_visible(&tree, "d0", &SearchQuery::new("haystack")));
    }

    #[test]
    fn test_folder_name_match_keeps_whole_folder() {
        let tree = sample_tree();
        let q = SearchQuery::new("reports");
        let visible = visible_set(&tree, &q);
        assert!(visible.contains("reports"));
        // Children of a matching folder are filtered on their own names.
        assert!(!visible.contains("q1"));
    }

    #[test]
    fn test_no_match_hides_everything() {
        let tree = sample_tree();
        assert!(visible_set(&tree, &SearchQuery::new("zzz")).is_empty());

        let root_only = visible_set(&tree, &SearchQuery::new("vau"));
        assert_eq!(root_only.len(), 1);
        assert!(root_only.contains(ROOT_ID));
    }

    #[test]
    fn test_visible_set_agrees_with_is_visible() {
        let tree = sample_tree();
        for text in ["", "q", "pdf", "notes", "o", "zzz"] {
            let q = SearchQuery::new(text);
            let set = visible_set(&tree, &q);
            for node in tree.iter() {
                assert_eq!(set.contains(&node.id), is_visible(&tree, &node.id, &q), "{text}");
            }
        }
    }

    #[test]
    fn test_auto_expand_opens_ancestors_only() {
        let tree = VaultTree::from_forest(vec![folder(
            "a",
            "FolderA",
            vec![file("f1", "File1.txt")],
        )]);
        let mut expanded = ExpansionState::default();
        let opened = auto_expand_for_search(&tree, &SearchQuery::new("1"), &mut expanded);

        assert_eq!(opened, 1);
        assert!(expanded.is_expanded("a"));
        assert!(!expanded.is_expanded("f1"));
    }

    #[test]
    fn test_auto_expand_never_collapses() {
        let tree = sample_tree();
        let mut expanded = ExpansionState::default();
        expanded.expand("photos");
        auto_expand_for_search(&tree, &SearchQuery::new("q1"), &mut expanded);
        auto_expand_for_search(&tree, &SearchQuery::new(""), &mut expanded);

        assert!(expanded.is_expanded("photos"));
        assert!(expanded.is_expanded("docs"));
        assert!(expanded.is_expanded("reports"));
    }

    proptest! {
        #[test]
        fn visible_under_query_implies_visible_unfiltered(text in "[a-z0-9. ]{0,4}") {
            let tree = sample_tree();
            let filtered = visible_set(&tree, &SearchQuery::new(&text));
            let all = visible_set(&tree, &SearchQuery::new(""));
            prop_assert!(filtered.is_subset(&all));
        }

        #[test]
        fn matches_have_expanded_ancestors(text in "[a-z0-9.]{1,3}") {
            let tree = sample_tree();
            let q = SearchQuery::new(&text);
            let mut expanded = ExpansionState::default();
            auto_expand_for_search(&tree, &q, &mut expanded);

            for node in tree.iter().filter(|n| q.matches(&n.name)) {
                for ancestor in tree.ancestors_of(&node.id) {
                    prop_assert!(expanded.is_expanded(&ancestor.id));
                }
            }
        }
    }
}
