use thiserror::Error;

/// A malformed node in the raw tree. The first violation aborts the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("item {index} under {parent} is not an object")]
    NotARecord { parent: String, index: usize },
    #[error("item {index} under {parent} has a missing or empty id")]
    MissingId { parent: String, index: usize },
    #[error("duplicate node id: {id}")]
    DuplicateId { id: String },
    #[error("node id {id} is reserved for the vault root")]
    ReservedId { id: String },
    #[error("node {id} has a missing or empty name")]
    MissingName { id: String },
    #[error("node {id} has invalid type {found:?} (expected \"folder\" or \"file\")")]
    InvalidType { id: String, found: String },
    #[error("folder {id} has a children field that is not an array")]
    ChildrenNotArray { id: String },
    #[error("file {id} must not have a children field")]
    FileHasChildren { id: String },
    #[error("file {id} has a size that is not a string")]
    SizeNotString { id: String },
}

impl ValidationError {
    /// Id of the offending node, when it is known.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ValidationError::NotARecord { .. } | ValidationError::MissingId { .. } => None,
            ValidationError::DuplicateId { id }
            | ValidationError::ReservedId { id }
            | ValidationError::MissingName { id }
            | ValidationError::InvalidType { id, .. }
            | ValidationError::ChildrenNotArray { id }
            | ValidationError::FileHasChildren { id }
            | ValidationError::SizeNotString { id } => Some(id),
        }
    }
}

/// Everything that can stop a session from reaching the ready state.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("tree source unavailable: {0}")]
    Unavailable(String),
    #[error("tree data is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("tree data must be an array at the top level, found {found}")]
    NotAnArray { found: &'static str },
    #[error("invalid tree: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_node() {
        let err = LoadError::from(ValidationError::DuplicateId { id: "f-1".into() });
        assert_eq!(err.to_string(), "invalid tree: duplicate node id: f-1");

        let err = ValidationError::InvalidType {
            id: "x".into(),
            found: "link".into(),
        };
        assert!(err.to_string().contains("\"link\""));
        assert_eq!(err.node_id(), Some("x"));
    }

    #[test]
    fn test_unknown_id_for_shape_errors() {
        let err = ValidationError::NotARecord {
            parent: "top level".into(),
            index: 2,
        };
        assert_eq!(err.node_id(), None);
        assert_eq!(err.to_string(), "item 2 under top level is not an object");
    }
}
