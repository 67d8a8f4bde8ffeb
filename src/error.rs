//! Error types for the CRDT core
//!
//! Only conditions that indicate caller misuse (bad anchors, unknown local
//! targets) or corrupt persisted state surface as errors. Everything a peer
//! can cause - duplicate delivery, missing causal predecessors, unknown
//! actions - is a soft skip reported through [`crate::op::ApplyOutcome`],
//! never an error.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, DocError>;

/// Errors surfaced by the document facade
#[derive(Debug, Error)]
pub enum DocError {
    /// A locally issued edit referenced a sequence node that does not exist
    #[error("unknown sequence node: {0}")]
    UnknownNode(String),

    /// An anchor on addMark referenced a node that does not exist
    #[error("invalid anchor position: {0}")]
    InvalidAnchor(String),

    /// A locally issued removeMark referenced an unknown mark
    #[error("unknown mark: {0}")]
    UnknownMark(String),

    /// A locally minted operation id collided with an existing node
    #[error("operation id already in use: {0}")]
    DuplicateId(String),

    /// An operation could not be encoded for the wire
    #[error("wire encoding error: {0}")]
    Wire(String),

    /// A persisted snapshot could not be decoded or is internally inconsistent
    #[error("corrupt snapshot: {0}")]
    Snapshot(String),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for DocError {
    fn from(err: serde_json::Error) -> Self {
        DocError::Snapshot(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DocError::UnknownNode("3@alice".to_string());
        assert_eq!(err.to_string(), "unknown sequence node: 3@alice");

        let err = DocError::DuplicateId("1@bob".to_string());
        assert_eq!(err.to_string(), "operation id already in use: 1@bob");

        let err = DocError::Wire("truncated".to_string());
        assert_eq!(err.to_string(), "wire encoding error: truncated");
    }

    #[test]
    fn test_json_error_converts_to_snapshot() {
        let json_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: DocError = json_err.into();
        assert!(matches!(err, DocError::Snapshot(_)));
    }
}
