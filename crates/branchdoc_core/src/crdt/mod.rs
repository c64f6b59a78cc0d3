#![doc = include_str!(concat!(env!("OUT_DIR"), "/crdt_README.md"))]

mod key;
mod registry;
mod snapshot_doc;

pub use key::{DocKey, DocumentId, KEY_DELIMITER};
pub use registry::{DocRegistry, RemoteApplyGuard};
pub use snapshot_doc::{
    BLOCKS_CONTAINER_NAME, BlockNode, PARAGRAPH_TAG, SharedDoc, SnapshotDoc, TEXT_CONTAINER_NAME,
};
