use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::enrich::enrich;
use crate::error::LoadError;
use crate::tree::VaultTree;
use crate::validate::{validate, value_kind};

/// Supplies the raw tree description.
pub trait DataSource {
    fn fetch(&self) -> Result<Value, LoadError>;

    /// Short label for logs and status lines.
    fn describe(&self) -> String;
}

/// Reads a JSON document from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for JsonFileSource {
    fn fetch(&self) -> Result<Value, LoadError> {
        let text = fs::read_to_string(&self.path)
            .map_err(|err| LoadError::Unavailable(format!("{}: {err}", self.path.display())))?;
        Ok(parse_document(&text)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An already-parsed document, e.g. bundled demo data.
#[derive(Debug, Clone)]
pub struct StaticSource {
    label: String,
    value: Value,
}

impl StaticSource {
    pub fn new(label: impl Into<String>, value: Value) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    /// Parse JSON text up front; malformed text surfaces at fetch time.
    pub fn from_json(label: impl Into<String>, text: &str) -> Result<Self, LoadError> {
        Ok(Self::new(label, parse_document(text)?))
    }
}

impl DataSource for StaticSource {
    fn fetch(&self) -> Result<Value, LoadError> {
        Ok(self.value.clone())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Parse JSON text without serde_json's nesting limit; deep input grows the stack on demand.
pub fn parse_document(text: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Fetch, validate, build and enrich. Nothing partial is ever returned.
pub fn load_tree(source: &dyn DataSource) -> Result<VaultTree, LoadError> {
    let started = Instant::now();
    let result = fetch_and_build(source);
    match &result {
        Ok(tree) => tracing::info!(
            source = %source.describe(),
            nodes = tree.len(),
            files = tree.file_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tree loaded"
        ),
        Err(err) => tracing::warn!(source = %source.describe(), %err, "tree load failed"),
    }
    result
}

fn fetch_and_build(source: &dyn DataSource) -> Result<VaultTree, LoadError> {
    let items = match source.fetch()? {
        Value::Array(items) => items,
        other => {
            return Err(LoadError::NotAnArray {
                found: value_kind(&other),
            })
        }
    };
    let forest = validate(&items);
    dismantle(items);
    let mut tree = VaultTree::from_forest(forest?);
    enrich(&mut tree);
    Ok(tree)
}

/// Drop a parsed document without recursing once per nesting level.
fn dismantle(items: Vec<Value>) {
    let mut stack = items;
    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items),
            Value::Object(map) => stack.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use serde_json::json;

    struct Offline;

    impl DataSource for Offline {
        fn fetch(&self) -> Result<Value, LoadError> {
            Err(LoadError::Unavailable("503 Service Unavailable".into()))
        }

        fn describe(&self) -> String {
            "offline".into()
        }
    }

    #[test]
    fn test_load_static_tree() {
        let source = StaticSource::new(
            "inline",
            json!([
                {"id": "a", "name": "A", "type": "folder", "children": [
                    {"id": "a1", "name": "report.json", "type": "file"}
                ]}
            ]),
        );
        let tree = load_tree(&source).unwrap();
        assert_eq!(tree.len(), 3);
        let meta = tree.find_by_id("a1").and_then(|n| n.file_meta()).unwrap();
        assert_eq!(meta.mime.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_record_path_still_gets_defaults() {
        let source = StaticSource::new(
            "with-path",
            json!([{"id": "r", "name": "report.json", "type": "file", "path": "/custom/report.json"}]),
        );
        let tree = load_tree(&source).unwrap();
        let node = tree.find_by_id("r").unwrap();
        assert_eq!(node.path.as_deref(), Some("/custom/report.json"));

        let meta = node.file_meta().unwrap();
        assert_eq!(meta.mime.as_deref(), Some("application/json"));
        assert_eq!(meta.owner.as_deref(), Some("System"));
        assert!(meta.checksum.is_some() && meta.modified.is_some());
    }

    #[test]
    fn test_deeply_nested_document_loads() {
        let depth = 300;
        let mut text = String::from(r#"{"id": "leaf", "name": "leaf.txt", "type": "file"}"#);
        for level in (0..depth).rev() {
            text = format!(
                r#"{{"id": "d{level}", "name": "D{level}", "type": "folder", "children": [{text}]}}"#
            );
        }
        let source = StaticSource::from_json("deep", &format!("[{text}]")).unwrap();
        let tree = load_tree(&source).unwrap();

        assert_eq!(tree.len(), depth + 2);
        assert_eq!(tree.ancestors_of("leaf").len(), depth + 1);
    }

    #[test]
    fn test_trailing_garbage_is_malformed() {
        assert!(matches!(
            StaticSource::from_json("trailing", "[] []"),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_top_level_must_be_array() {
        let source = StaticSource::new("object", json!({"id": "a"}));
        let err = load_tree(&source).unwrap_err();
        assert!(matches!(err, LoadError::NotAnArray { found: "object" }));
    }

    #[test]
    fn test_validation_failure_is_fatal() {
        let source = StaticSource::new(
            "dupes",
            json!([
                {"id": "x", "name": "X", "type": "file"},
                {"id": "x", "name": "X", "type": "file"}
            ]),
        );
        match load_tree(&source) {
            Err(LoadError::Invalid(ValidationError::DuplicateId { id })) => assert_eq!(id, "x"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unavailable_source() {
        let err = load_tree(&Offline).unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_missing_file() {
        let source = JsonFileSource::new("/definitely/not/here/vault.json");
        assert!(matches!(load_tree(&source), Err(LoadError::Unavailable(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            StaticSource::from_json("broken", "[{"),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_bundled_demo_loads() {
        let source = StaticSource::from_json("demo", include_str!("../demos/vault.json")).unwrap();
        let tree = load_tree(&source).unwrap();
        assert!(tree.file_count() > 5);
    }
}
