//! The persisted document row as seen by the branching core.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::branch::{self, BranchesMetadata};
use crate::crdt::DocumentId;
use crate::error::{BranchDocError, Result};

/// Keys of the row metadata owned by branching.
const BRANCH_METADATA_KEYS: [&str; 3] = ["branches", "activeBranch", "recentSnapshots"];

/// A document row from the external sync layer.
///
/// `metadata` is opaque JSON shared with other features; branching only
/// reads and writes its own keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRow {
    /// Stable numeric id, when the row has one
    #[serde(default)]
    pub id: Option<i64>,

    /// File path of the document
    pub path: String,

    /// Free-form metadata (contains the branch metadata once migrated)
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl DocumentRow {
    /// Create a row without metadata.
    pub fn new(id: Option<i64>, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            metadata: None,
        }
    }

    /// Identity of this row: the id when present, otherwise the path.
    pub fn document_id(&self) -> DocumentId {
        DocumentId::for_row(self.id, &self.path)
    }

    /// Branch metadata of this row, if migrated and readable.
    pub fn branches_metadata(&self) -> Option<BranchesMetadata> {
        branch::get_branches_metadata(self)
    }

    /// Branch metadata of this row for a read-modify-write.
    ///
    /// `Ok(None)` means the row is not migrated yet. Unreadable metadata is
    /// an error, so a mutator can abort instead of overwriting it.
    pub fn read_branches_metadata(&self) -> Result<Option<BranchesMetadata>> {
        branch::read_branches_metadata(self)
    }

    /// Write branch metadata into the row, preserving unrelated keys.
    pub fn set_branches_metadata(&mut self, metadata: &BranchesMetadata) -> Result<()> {
        let fields = match serde_json::to_value(metadata)? {
            Value::Object(fields) => fields,
            other => {
                return Err(BranchDocError::Store(format!(
                    "branch metadata serialized to non-object: {}",
                    other
                )));
            }
        };

        let mut target = match self.metadata.take() {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        for key in BRANCH_METADATA_KEYS {
            target.remove(key);
        }
        target.extend(fields);

        self.metadata = Some(Value::Object(target));
        Ok(())
    }
}
