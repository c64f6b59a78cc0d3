use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for branchdoc operations
#[derive(Debug, Error)]
pub enum BranchDocError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Snapshot transport errors
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // CRDT errors
    #[error("CRDT error: {0}")]
    Crdt(String),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Row store errors
    #[error("Document row '{0}' not found")]
    RowNotFound(String),

    #[error("Row store error: {0}")]
    Store(String),

    // Branch precondition errors
    #[error("Branch '{0}' not found")]
    BranchNotFound(String),

    #[error("Branch '{0}' already exists")]
    BranchExists(String),
}

/// Result type alias for branchdoc operations
pub type Result<T> = std::result::Result<T, BranchDocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BranchDocError::RowNotFound("notes/a.md".to_string());
        assert_eq!(err.to_string(), "Document row 'notes/a.md' not found");

        let err = BranchDocError::Crdt("bad update".to_string());
        assert_eq!(err.to_string(), "CRDT error: bad update");
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BranchDocError = json_err.into();
        assert!(matches!(err, BranchDocError::Json(_)));
    }
}
