#![doc = include_str!(concat!(env!("OUT_DIR"), "/README.md"))]
#![warn(missing_docs)]

/// Branch metadata (pure functions over the persisted branch map)
pub mod branch;

/// Base64 transport for snapshots
pub mod codec;

/// Configuration options
pub mod config;

/// Branch operations on an open document
pub mod controller;

/// Live CRDT documents and their registry
pub mod crdt;

/// Merge and diff over snapshots
pub mod diff;

/// Error (common error types)
pub mod error;

/// Persisted row store contract
pub mod store;

/// Snapshot sync engine (import/export scheduling)
pub mod sync;

pub use controller::BranchController;
pub use error::{BranchDocError, Result};

#[cfg(test)]
pub mod test_utils;
