//! Identity of a live document: which file, which branch.

use std::fmt;

/// Separator used by the legacy string form of a [`DocKey`].
pub const KEY_DELIMITER: &str = "::";

/// Stable identity of a document row.
///
/// A numeric row id is preferred because it survives renames; the path is
/// the fallback for rows that have not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentId {
    /// Stable numeric row id
    Id(i64),
    /// File path, used when no id is available
    Path(String),
}

impl DocumentId {
    /// Choose the identity for a row: the id when present, otherwise the path.
    pub fn for_row(id: Option<i64>, path: &str) -> Self {
        match id {
            Some(id) => DocumentId::Id(id),
            None => DocumentId::Path(path.to_string()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Id(id) => write!(f, "{}", id),
            DocumentId::Path(path) => f.write_str(path),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(id: i64) -> Self {
        DocumentId::Id(id)
    }
}

impl From<&str> for DocumentId {
    fn from(path: &str) -> Self {
        DocumentId::Path(path.to_string())
    }
}

/// Composite key of a live document: (document, branch).
///
/// Kept as a structured pair so paths or branch names containing `::`
/// never collide. The `"<document>::<branch>"` string form exists only for
/// logging and for interop with hosts that key by string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocKey {
    /// Document identity
    pub document: DocumentId,
    /// Branch name
    pub branch: String,
}

impl DocKey {
    /// Create a key for a document and branch.
    pub fn new(document: impl Into<DocumentId>, branch: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            branch: branch.into(),
        }
    }

    /// Parse the `"<document>::<branch>"` string form.
    ///
    /// Splits on the last delimiter, so a path containing `::` survives but
    /// a branch name containing it does not. A document part made only of
    /// digits is read as a numeric id. Returns `None` without a delimiter.
    pub fn parse(key: &str) -> Option<Self> {
        let (document, branch) = key.rsplit_once(KEY_DELIMITER)?;
        let document = match document.parse::<i64>() {
            Ok(id) => DocumentId::Id(id),
            Err(_) => DocumentId::Path(document.to_string()),
        };
        Some(Self {
            document,
            branch: branch.to_string(),
        })
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.document, KEY_DELIMITER, self.branch)
    }
}
