use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;

use crate::enrich::{self, DEFAULT_MIME, DEFAULT_OWNER, DEFAULT_PERMISSIONS, NO_ENCRYPTION};
use crate::expand_state::ExpansionState;
use crate::navigation::{Mode, NavState};
use crate::search::{highlight_span, visible_set, SearchQuery};
use crate::tree::{ActivityEntry, FileMeta, NodeKind, TreeNode, VaultTree, ROOT_ID};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Expander {
    Expanded,
    Collapsed,
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowKind {
    Folder,
    File,
}

/// One rendered line of the tree pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderRow {
    pub id: String,
    pub name: String,
    /// 0 for the virtual root.
    pub depth: usize,
    pub kind: RowKind,
    pub expander: Expander,
    /// Last visible child of its parent (for tree guides).
    pub is_last: bool,
    pub selected: bool,
    pub focused: bool,
    pub menu_open: bool,
    /// Byte range of the query match inside `name`.
    pub highlight: Option<Range<usize>>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PreviewKind {
    Text,
    Image,
    Document,
    Media,
    Encrypted,
    Binary,
}

impl PreviewKind {
    pub fn classify(mime: &str, encryption: &str) -> Self {
        if encryption != NO_ENCRYPTION {
            return PreviewKind::Encrypted;
        }
        match mime {
            m if m.starts_with("text/") => PreviewKind::Text,
            "application/json" | "application/xml" | "application/yaml" | "application/toml" => {
                PreviewKind::Text
            }
            m if m.starts_with("image/") => PreviewKind::Image,
            "application/pdf" => PreviewKind::Document,
            m if m.starts_with("audio/") || m.starts_with("video/") => PreviewKind::Media,
            _ => PreviewKind::Binary,
        }
    }

    pub fn is_previewable(self) -> bool {
        !matches!(self, PreviewKind::Encrypted | PreviewKind::Binary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: String,
    pub mime: String,
    pub kind: PreviewKind,
    pub previewable: bool,
}

/// Fully populated metadata for the inspector and the details view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: String,
    pub owner: String,
    pub encryption: String,
    pub checksum: String,
    pub created: String,
    pub modified: String,
    pub accessed: String,
    pub mime: String,
    pub permissions: String,
    pub status: String,
    pub activity: Vec<ActivityEntry>,
}

impl MetadataRecord {
    /// Falls back to the enrichment defaults for anything still missing.
    pub fn from_file(node: &TreeNode, meta: &FileMeta) -> Self {
        let text = |value: &Option<String>, fallback: &str| {
            value.clone().unwrap_or_else(|| fallback.to_string())
        };
        let encryption = text(&meta.encryption, enrich::encryption_for(&node.name));
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            path: node_path(node),
            size: text(&meta.size, UNKNOWN),
            owner: text(&meta.owner, DEFAULT_OWNER),
            checksum: text(&meta.checksum, UNKNOWN),
            created: text(&meta.created, UNKNOWN),
            modified: text(&meta.modified, UNKNOWN),
            accessed: text(&meta.accessed, UNKNOWN),
            mime: text(&meta.mime, enrich::mime_for(&node.name)),
            permissions: text(&meta.permissions, DEFAULT_PERMISSIONS),
            status: text(&meta.status, enrich::status_for(&encryption)),
            activity: meta.activity.clone().unwrap_or_default(),
            encryption,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteTarget {
    pub id: String,
    pub name: String,
    pub path: String,
    pub is_folder: bool,
    /// Nodes removed along with the target.
    pub descendant_count: usize,
}

/// What the workspace pane shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Workspace {
    Empty,
    FolderPlaceholder {
        id: String,
        name: String,
        child_count: usize,
    },
    FilePreview(FilePreview),
    FileDetails(MetadataRecord),
    /// Confirmation dialog drawn on top of the view underneath.
    ConfirmDelete {
        target: DeleteTarget,
        underlying: Box<Workspace>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Inspector {
    Placeholder,
    Metadata(MetadataRecord),
}

/// Everything the presentation layer needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub query: String,
    pub mode: Mode,
    pub rows: Vec<RenderRow>,
    /// Row ids in display order; the arrow-key navigation domain.
    pub visible_order: Vec<String>,
    pub focused: Option<String>,
    pub open_menu: Option<String>,
    pub workspace: Workspace,
    pub inspector: Inspector,
}

impl ViewModel {
    pub fn row(&self, id: &str) -> Option<&RenderRow> {
        self.rows.iter().find(|row| row.id == id)
    }
}

/// A node placed in display order, before flags are attached.
struct Placed<'a> {
    node: &'a TreeNode,
    depth: usize,
    is_last: bool,
}

/// Pre-order walk from the root, pruned by visibility and by collapsed folders.
fn place_rows<'a>(
    tree: &'a VaultTree,
    expanded: &ExpansionState,
    visible: &HashSet<String>,
) -> Vec<Placed<'a>> {
    let root = tree.root();
    if !visible.contains(&root.id) {
        return Vec::new();
    }

    let mut placed = Vec::with_capacity(visible.len());
    let mut stack = vec![(root, 0usize, true)];
    while let Some((node, depth, is_last)) = stack.pop() {
        placed.push(Placed {
            node,
            depth,
            is_last,
        });

        if node.is_folder() && expanded.is_expanded(&node.id) {
            let kids: Vec<&TreeNode> = tree
                .children_of(&node.id)
                .into_iter()
                .filter(|child| visible.contains(&child.id))
                .collect();
            let count = kids.len();
            for (i, child) in kids.into_iter().enumerate().rev() {
                stack.push((child, depth + 1, i + 1 == count));
            }
        }
    }
    placed
}

/// Ids that would be rendered, in display order.
pub fn visible_order(tree: &VaultTree, expanded: &ExpansionState, query: &SearchQuery) -> Vec<String> {
    let visible = visible_set(tree, query);
    place_rows(tree, expanded, &visible)
        .into_iter()
        .map(|p| p.node.id.clone())
        .collect()
}

/// Build the view-model for the current tree and navigation state.
pub fn project(tree: &VaultTree, nav: &NavState) -> ViewModel {
    let query = nav.search_query();
    let visible = visible_set(tree, &query);
    let placed = place_rows(tree, &nav.expanded, &visible);

    let visible_order: Vec<String> = placed.iter().map(|p| p.node.id.clone()).collect();
    let focused = nav
        .focused_node_id
        .clone()
        .filter(|id| visible_order.contains(id))
        .or_else(|| visible_order.first().cloned());

    let rows = placed
        .iter()
        .map(|p| build_row(p, nav, &query, focused.as_deref()))
        .collect();

    ViewModel {
        query: nav.query.clone(),
        mode: nav.mode,
        rows,
        visible_order,
        workspace: build_workspace(tree, nav, focused.as_deref()),
        inspector: build_inspector(tree, nav),
        open_menu: nav.open_menu_file_id.clone(),
        focused,
    }
}

fn build_row(placed: &Placed<'_>, nav: &NavState, query: &SearchQuery, focused: Option<&str>) -> RenderRow {
    let node = placed.node;
    let (kind, expander, size) = match &node.kind {
        NodeKind::Folder => {
            let expander = if nav.expanded.is_expanded(&node.id) {
                Expander::Expanded
            } else {
                Expander::Collapsed
            };
            (RowKind::Folder, expander, None)
        }
        NodeKind::File(meta) => (RowKind::File, Expander::Leaf, meta.size.clone()),
    };

    RenderRow {
        id: node.id.clone(),
        name: node.name.clone(),
        depth: placed.depth,
        kind,
        expander,
        is_last: placed.is_last,
        selected: nav.selected_file_id.as_deref() == Some(node.id.as_str()),
        focused: focused == Some(node.id.as_str()),
        menu_open: nav.open_menu_file_id.as_deref() == Some(node.id.as_str()),
        highlight: highlight_span(&node.name, query),
        size,
    }
}

fn build_workspace(tree: &VaultTree, nav: &NavState, focused: Option<&str>) -> Workspace {
    let base = match nav.mode {
        Mode::Preview => file_in(tree, nav.preview_file_id.as_deref())
            .map(|(node, meta)| Workspace::FilePreview(file_preview(node, meta)))
            .unwrap_or(Workspace::Empty),
        Mode::Details => file_in(tree, nav.details_file_id.as_deref())
            .map(|(node, meta)| Workspace::FileDetails(MetadataRecord::from_file(node, meta)))
            .unwrap_or(Workspace::Empty),
        Mode::Empty => focused
            .filter(|id| *id != ROOT_ID)
            .and_then(|id| tree.find_by_id(id))
            .filter(|node| node.is_folder())
            .map(|node| Workspace::FolderPlaceholder {
                id: node.id.clone(),
                name: node.name.clone(),
                child_count: tree.children_of(&node.id).len(),
            })
            .unwrap_or(Workspace::Empty),
    };

    let pending = nav
        .pending_delete_id
        .as_deref()
        .and_then(|id| tree.find_by_id(id));
    match pending {
        Some(node) => Workspace::ConfirmDelete {
            target: DeleteTarget {
                id: node.id.clone(),
                name: node.name.clone(),
                path: node_path(node),
                is_folder: node.is_folder(),
                descendant_count: count_descendants(tree, &node.id),
            },
            underlying: Box::new(base),
        },
        None => base,
    }
}

fn build_inspector(tree: &VaultTree, nav: &NavState) -> Inspector {
    if nav.mode != Mode::Details {
        return Inspector::Placeholder;
    }
    file_in(tree, nav.details_file_id.as_deref())
        .map(|(node, meta)| Inspector::Metadata(MetadataRecord::from_file(node, meta)))
        .unwrap_or(Inspector::Placeholder)
}

fn file_preview(node: &TreeNode, meta: &FileMeta) -> FilePreview {
    let mime = meta
        .mime
        .clone()
        .unwrap_or_else(|| enrich::mime_for(&node.name).to_string());
    let encryption = meta
        .encryption
        .as_deref()
        .unwrap_or_else(|| enrich::encryption_for(&node.name));
    let kind = PreviewKind::classify(&mime, encryption);
    FilePreview {
        id: node.id.clone(),
        name: node.name.clone(),
        path: node_path(node),
        size: meta.size.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        previewable: kind.is_previewable(),
        kind,
        mime: if mime.is_empty() { DEFAULT_MIME.to_string() } else { mime },
    }
}

fn file_in<'a>(tree: &'a VaultTree, id: Option<&str>) -> Option<(&'a TreeNode, &'a FileMeta)> {
    let node = tree.find_by_id(id?)?;
    node.file_meta().map(|meta| (node, meta))
}

fn node_path(node: &TreeNode) -> String {
    node.path.clone().unwrap_or_else(|| format!("/{}", node.name))
}

fn count_descendants(tree: &VaultTree, id: &str) -> usize {
    tree.descendants_of(id).count().saturating_sub(1)
}
