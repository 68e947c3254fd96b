use indextree::{Arena, NodeEdge, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Id of the synthetic folder wrapping the loaded top-level nodes.
pub const ROOT_ID: &str = "vault-root";
/// Display name of the synthetic root folder.
pub const ROOT_NAME: &str = "Vault";

/// One entry of a file's activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub who: String,
    pub what: String,
    pub when: String,
    pub avatar: String,
}

/// File metadata. Everything is optional until enrichment has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: Option<String>,
    pub owner: Option<String>,
    pub encryption: Option<String>,
    pub checksum: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub accessed: Option<String>,
    pub mime: Option<String>,
    pub permissions: Option<String>,
    pub status: Option<String>,
    pub activity: Option<Vec<ActivityEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    File(FileMeta),
}

/// Represents a node in the vault tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    /// `/`-joined location, filled in by enrichment when the source omits it
    pub path: Option<String>,
    pub kind: NodeKind,
}

impl TreeNode {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File(_))
    }

    pub fn file_meta(&self) -> Option<&FileMeta> {
        match &self.kind {
            NodeKind::File(meta) => Some(meta),
            NodeKind::Folder => None,
        }
    }
}

/// Typed, validated node as produced by the validator, before it is placed in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub node: TreeNode,
    pub children: Vec<RawNode>,
}

/// The loaded hierarchy, stored in an arena with an id index.
///
/// The virtual root is created with the tree and can never be deleted.
#[derive(Debug)]
pub struct VaultTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    id_to_node: HashMap<String, NodeId>,
}

impl VaultTree {
    /// Create a tree holding only the virtual root.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TreeNode {
            id: ROOT_ID.to_string(),
            name: ROOT_NAME.to_string(),
            path: None,
            kind: NodeKind::Folder,
        });
        let mut id_to_node = HashMap::new();
        id_to_node.insert(ROOT_ID.to_string(), root);

        Self {
            arena,
            root,
            id_to_node,
        }
    }

    /// Build a tree from a validated forest, preserving child order.
    pub fn from_forest(forest: Vec<RawNode>) -> Self {
        let mut tree = Self::new();
        let root = tree.root;
        // Explicit stack so depth is bounded by the heap, not the call stack.
        let mut pending: Vec<(NodeId, RawNode)> = forest
            .into_iter()
            .rev()
            .map(|raw| (root, raw))
            .collect();

        while let Some((parent, raw)) = pending.pop() {
            let RawNode { node, children } = raw;
            let id = node.id.clone();
            let node_id = tree.arena.new_node(node);
            parent.append(node_id, &mut tree.arena);
            tree.id_to_node.insert(id, node_id);

            for child in children.into_iter().rev() {
                pending.push((node_id, child));
            }
        }

        tree
    }

    pub fn root(&self) -> &TreeNode {
        self.arena[self.root].get()
    }

    pub fn root_id(&self) -> &str {
        ROOT_ID
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_node.contains_key(id)
    }

    /// Number of nodes including the virtual root.
    pub fn len(&self) -> usize {
        self.id_to_node.len()
    }

    /// True when nothing but the virtual root is loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    pub fn file_count(&self) -> usize {
        self.iter().filter(|node| node.is_file()).count()
    }

    /// Folder count, virtual root excluded.
    pub fn folder_count(&self) -> usize {
        self.iter().filter(|node| node.is_folder()).count() - 1
    }

    pub fn find_by_id(&self, id: &str) -> Option<&TreeNode> {
        let node_id = self.id_to_node.get(id).copied()?;
        self.data(node_id)
    }

    pub(crate) fn find_by_id_mut(&mut self, id: &str) -> Option<&mut TreeNode> {
        let node_id = self.id_to_node.get(id).copied()?;
        self.arena
            .get_mut(node_id)
            .filter(|n| !n.is_removed())
            .map(|n| n.get_mut())
    }

    /// The folder whose children contain `child_id`. The root has no parent.
    pub fn find_parent_of(&self, child_id: &str) -> Option<&TreeNode> {
        let node_id = self.id_to_node.get(child_id).copied()?;
        let parent = node_id.parent(&self.arena)?;
        self.data(parent)
    }

    /// Children of a folder in display order; empty for files and unknown ids.
    pub fn children_of(&self, id: &str) -> Vec<&TreeNode> {
        let Some(node_id) = self.id_to_node.get(id).copied() else {
            return Vec::new();
        };
        node_id
            .children(&self.arena)
            .filter_map(|child| self.data(child))
            .collect()
    }

    /// Strict ancestors of `id`, from the virtual root down.
    pub fn ancestors_of(&self, id: &str) -> Vec<&TreeNode> {
        let Some(node_id) = self.id_to_node.get(id).copied() else {
            return Vec::new();
        };
        let mut chain: Vec<&TreeNode> = node_id
            .ancestors(&self.arena)
            .skip(1)
            .filter_map(|ancestor| self.data(ancestor))
            .collect();
        chain.reverse();
        chain
    }

    /// Remove a node and its whole subtree.
    ///
    /// Unknown ids and the virtual root are left alone and report `false`.
    pub fn delete_by_id(&mut self, id: &str) -> bool {
        if id == ROOT_ID {
            return false;
        }
        let Some(node_id) = self.id_to_node.get(id).copied() else {
            return false;
        };

        let doomed: Vec<String> = node_id
            .descendants(&self.arena)
            .filter_map(|d| self.data(d).map(|n| n.id.clone()))
            .collect();
        for gone in &doomed {
            self.id_to_node.remove(gone);
        }
        node_id.remove_subtree(&mut self.arena);

        tracing::debug!(id, removed = doomed.len(), "deleted subtree");
        true
    }

    /// Pre-order traversal. `ancestors` runs from the virtual root down to,
    /// but excluding, the visited node.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&TreeNode, &[&TreeNode]),
    {
        let mut ancestors: Vec<&TreeNode> = Vec::new();
        for edge in self.root.traverse(&self.arena) {
            match edge {
                NodeEdge::Start(node_id) => {
                    if let Some(node) = self.data(node_id) {
                        visit(node, &ancestors);
                        ancestors.push(node);
                    }
                }
                NodeEdge::End(node_id) => {
                    if self.data(node_id).is_some() {
                        ancestors.pop();
                    }
                }
            }
        }
    }

    /// Pre-order iterator over every node, root first.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.root
            .descendants(&self.arena)
            .filter_map(move |node_id| self.data(node_id))
    }

    /// `id` and everything beneath it, pre-order. Empty for unknown ids.
    pub fn descendants_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a TreeNode> + 'a {
        self.id_to_node
            .get(id)
            .copied()
            .into_iter()
            .flat_map(move |node_id| node_id.descendants(&self.arena))
            .filter_map(move |node_id| self.data(node_id))
    }

    /// Post-order ids, children before their parent. Used for bottom-up passes.
    pub(crate) fn post_order(&self) -> Vec<&TreeNode> {
        self.root
            .traverse(&self.arena)
            .filter_map(|edge| match edge {
                NodeEdge::End(node_id) => self.data(node_id),
                NodeEdge::Start(_) => None,
            })
            .collect()
    }

    fn data(&self, node_id: NodeId) -> Option<&TreeNode> {
        self.arena
            .get(node_id)
            .filter(|n| !n.is_removed())
            .map(|n| n.get())
    }
}

impl Default for VaultTree {
    fn default() -> Self {
        Self::new()
    }
}
