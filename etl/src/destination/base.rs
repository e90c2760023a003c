use std::future::Future;

use crate::error::EtlResult;
use crate::types::RowBatch;

/// A warehouse transformed batches are appended to.
///
/// Loads are append-only: rows already present are never updated or deleted. A destination
/// creates missing tables and adds columns that appear in a batch but not in the table.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Appends `batch` to `table` and returns the number of rows loaded.
    ///
    /// An empty batch loads nothing and must not fail.
    fn write_batch(
        &self,
        table: &str,
        batch: RowBatch,
    ) -> impl Future<Output = EtlResult<u64>> + Send;
}
