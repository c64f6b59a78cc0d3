//! Persisted row store contract.
//!
//! Rows are owned by an external sync layer. The core reads them through
//! [`RowStore::get_row`] and changes them only through atomic
//! read-modify-write mutations ([`RowStore::update_row`]).

mod memory_store;
mod row;
mod row_store;

pub use memory_store::MemoryRowStore;
pub use row::DocumentRow;
pub use row_store::{BoxFuture, RowMutator, RowStore, row_mutator};

#[cfg(test)]
pub(crate) use row_store::block_on_test;
