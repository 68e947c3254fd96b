use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::ValidationError;
use crate::tree::{ActivityEntry, FileMeta, NodeKind, RawNode, TreeNode, ROOT_ID};

const TOP_LEVEL: &str = "top level";

/// Check raw records against the node schema and turn them into typed nodes.
///
/// Rules apply pre-order across the whole input; the first violation aborts
/// the batch, so a partial tree is never returned.
pub fn validate(raw: &[Value]) -> Result<Vec<RawNode>, ValidationError> {
    let mut seen = HashSet::new();
    seen.insert(ROOT_ID.to_string());

    // Explicit stack of open sibling lists, so nesting depth is bounded by heap only.
    let mut stack = vec![Level::new(raw, TOP_LEVEL.to_string(), None)];
    while let Some(level) = stack.last_mut() {
        let items = level.items;
        if let Some(item) = items.get(level.next) {
            let index = level.next;
            level.next += 1;
            match check_record(item, &level.parent, index, &mut seen)? {
                Checked::File(node) => level.done.push(RawNode {
                    node,
                    children: Vec::new(),
                }),
                Checked::Folder(node, children) => {
                    let parent = node.id.clone();
                    stack.push(Level::new(children, parent, Some(node)));
                }
            }
            continue;
        }

        let Some(Level { done, owner, .. }) = stack.pop() else {
            break;
        };
        match (owner, stack.last_mut()) {
            (Some(node), Some(outer)) => outer.done.push(RawNode {
                node,
                children: done,
            }),
            _ => return Ok(done),
        }
    }
    Ok(Vec::new())
}

/// One sibling list being validated.
struct Level<'a> {
    items: &'a [Value],
    parent: String,
    next: usize,
    done: Vec<RawNode>,
    /// Folder the list belongs to; `None` for the top level.
    owner: Option<TreeNode>,
}

impl<'a> Level<'a> {
    fn new(items: &'a [Value], parent: String, owner: Option<TreeNode>) -> Self {
        Self {
            items,
            parent,
            next: 0,
            done: Vec::with_capacity(items.len()),
            owner,
        }
    }
}

enum Checked<'a> {
    File(TreeNode),
    Folder(TreeNode, &'a [Value]),
}

/// Apply every per-record rule. Folder children are handed back unchecked.
fn check_record<'a>(
    item: &'a Value,
    parent: &str,
    index: usize,
    seen: &mut HashSet<String>,
) -> Result<Checked<'a>, ValidationError> {
    let Some(record) = item.as_object() else {
        return Err(ValidationError::NotARecord {
            parent: parent.to_string(),
            index,
        });
    };

    let id = non_empty_str(record, "id").ok_or_else(|| ValidationError::MissingId {
        parent: parent.to_string(),
        index,
    })?;
    if id == ROOT_ID {
        return Err(ValidationError::ReservedId { id: id.to_string() });
    }
    if !seen.insert(id.to_string()) {
        return Err(ValidationError::DuplicateId { id: id.to_string() });
    }

    let name = non_empty_str(record, "name")
        .ok_or_else(|| ValidationError::MissingName { id: id.to_string() })?;
    let path = optional_str(record, "path", id);

    match record.get("type").and_then(Value::as_str) {
        Some("folder") => {
            let children: &[Value] = match record.get("children") {
                None => &[],
                Some(Value::Array(children)) => children,
                Some(_) => return Err(ValidationError::ChildrenNotArray { id: id.to_string() }),
            };
            let node = TreeNode {
                id: id.to_string(),
                name: name.to_string(),
                path,
                kind: NodeKind::Folder,
            };
            Ok(Checked::Folder(node, children))
        }
        Some("file") => {
            if record.contains_key("children") {
                return Err(ValidationError::FileHasChildren { id: id.to_string() });
            }
            let size = match record.get("size") {
                None => None,
                Some(Value::String(size)) => Some(size.clone()),
                Some(_) => return Err(ValidationError::SizeNotString { id: id.to_string() }),
            };
            Ok(Checked::File(TreeNode {
                id: id.to_string(),
                name: name.to_string(),
                path,
                kind: NodeKind::File(file_meta(record, id, size)),
            }))
        }
        _ => Err(ValidationError::InvalidType {
            id: id.to_string(),
            found: type_label(record.get("type")),
        }),
    }
}

/// Metadata already present in the source is kept so enrichment never overwrites it.
fn file_meta(record: &Map<String, Value>, id: &str, size: Option<String>) -> FileMeta {
    let activity = record.get("activity").and_then(|value| {
        serde_json::from_value::<Vec<ActivityEntry>>(value.clone())
            .map_err(|err| tracing::debug!(id, %err, "ignoring malformed activity"))
            .ok()
    });

    FileMeta {
        size,
        owner: optional_str(record, "owner", id),
        encryption: optional_str(record, "encryption", id),
        checksum: optional_str(record, "checksum", id),
        created: optional_str(record, "created", id),
        modified: optional_str(record, "modified", id),
        accessed: optional_str(record, "accessed", id),
        mime: optional_str(record, "mime", id),
        permissions: optional_str(record, "permissions", id),
        status: optional_str(record, "status", id),
        activity,
    }
}

fn non_empty_str<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn optional_str(record: &Map<String, Value>, key: &str, id: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => {
            tracing::debug!(id, key, kind = value_kind(other), "ignoring non-string metadata");
            None
        }
    }
}

fn type_label(value: Option<&Value>) -> String {
    match value {
        None => "<missing>".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => value_kind(other).to_string(),
    }
}

/// JSON kind name, used in error and log messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
