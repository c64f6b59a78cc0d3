//! Async contract of the external row store.
//!
//! The branching core never talks to the network itself. It reads the
//! current row and submits read-modify-write mutations through
//! [`RowStore`]; the store decides when (and whether) the change becomes
//! visible to other observers.
//!
//! ## Object safety
//!
//! `RowStore` is used behind `Arc<dyn RowStore>`, so its methods return
//! boxed futures.

use std::future::Future;
use std::pin::Pin;

use super::row::DocumentRow;
use crate::crdt::DocumentId;
use crate::error::Result;

#[cfg(test)]
pub(crate) fn block_on_test<F: Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}

/// Future returned by [`RowStore`] methods.
///
/// Row stores may be polled from a worker thread, so the future is `Send`.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Future returned by [`RowStore`] methods.
///
/// Browser-backed stores hold `!Send` handles, so no `Send` bound here.
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Mutation applied to a row inside one read-modify-write.
///
/// Returning an error aborts the write; nothing is committed.
pub type RowMutator<'a> = Box<dyn FnOnce(&mut DocumentRow) -> Result<()> + Send + 'a>;

/// Box a closure as a [`RowMutator`].
pub fn row_mutator<'a, F>(f: F) -> RowMutator<'a>
where
    F: FnOnce(&mut DocumentRow) -> Result<()> + Send + 'a,
{
    Box::new(f)
}

/// Persisted row store (the external sync/transport layer).
///
/// # Example
///
/// ```ignore
/// use branchdoc_core::store::{row_mutator, RowStore};
///
/// async fn rename(store: &dyn RowStore, id: &DocumentId) -> Result<()> {
///     store
///         .update_row(id, row_mutator(|row| {
///             row.path = "renamed.md".to_string();
///             Ok(())
///         }))
///         .await
/// }
/// ```
pub trait RowStore: Send + Sync {
    /// Current value of a row, or `None` if it does not exist.
    fn get_row<'a>(&'a self, id: &'a DocumentId) -> BoxFuture<'a, Result<Option<DocumentRow>>>;

    /// Apply `mutator` to the current value of a row and commit it.
    ///
    /// Implementations must run the mutator against the latest committed
    /// value so that names computed inside it (e.g. unique branch names)
    /// cannot race with concurrent writers.
    ///
    /// # Errors
    ///
    /// Fails if the row does not exist, the mutator fails, or the commit
    /// fails.
    fn update_row<'a>(
        &'a self,
        id: &'a DocumentId,
        mutator: RowMutator<'a>,
    ) -> BoxFuture<'a, Result<()>>;
}
