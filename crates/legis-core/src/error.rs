//! Error types for the core document model.

use thiserror::Error;

use crate::types::NodeStatus;

/// Error types that can occur while indexing a document or manipulating
/// a hierarchy tree.
///
/// Indexing errors are fatal: nothing downstream is trustworthy without a
/// valid [`LineIndex`](crate::LineIndex), so no partial index is ever
/// produced.
#[derive(Error, Debug)]
pub enum LegisError {
    /// A page marker line could not be parsed as `[PAGE:<number>]`.
    #[error("malformed page marker: {0:?}")]
    MalformedPageMarker(String),

    /// A line range query fell outside the indexed extent, or had
    /// `start > end`.
    #[error("line range {start}..={end} invalid for document with {max} lines")]
    OutOfRange { start: u32, end: u32, max: u32 },

    /// A review status change that the state machine does not permit.
    #[error("invalid review transition: {from} -> {to}")]
    InvalidTransition { from: NodeStatus, to: NodeStatus },

    /// A node id that does not exist in the tree.
    #[error("unknown node id: {0}")]
    UnknownNode(String),

    /// File I/O error while reading or writing an artifact.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Type alias for [`Result<T, LegisError>`].
pub type Result<T> = std::result::Result<T, LegisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_marker_display() {
        let error = LegisError::MalformedPageMarker("[PAGE:abc]".to_string());
        let display = format!("{error}");
        assert!(display.contains("malformed page marker"));
        assert!(display.contains("[PAGE:abc]"));
    }

    #[test]
    fn test_out_of_range_display() {
        let error = LegisError::OutOfRange {
            start: 10,
            end: 5,
            max: 100,
        };
        let display = format!("{error}");
        assert_eq!(display, "line range 10..=5 invalid for document with 100 lines");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LegisError = io_err.into();
        match err {
            LegisError::IoError(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected IoError variant"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ bad").unwrap_err();
        let err: LegisError = json_err.into();
        assert!(matches!(err, LegisError::JsonError(_)));
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<()> {
            Err(LegisError::UnknownNode("n-1".to_string()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        match outer() {
            Err(LegisError::UnknownNode(id)) => assert_eq!(id, "n-1"),
            _ => panic!("Expected UnknownNode to propagate"),
        }
    }
}
