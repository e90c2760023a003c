use std::future::Future;

use crate::error::EtlResult;
use crate::source::ExtractQuery;
use crate::types::RowBatch;

/// A database rows are extracted from.
///
/// A source is opened once per run, used for every table, and closed when the run ends,
/// whether it succeeded or not.
pub trait Source {
    /// Returns the name of the source.
    fn name() -> &'static str;

    /// Runs `query` and returns the complete result set.
    ///
    /// Incremental queries must return rows in ascending primary key order.
    fn extract(&self, query: &ExtractQuery) -> impl Future<Output = EtlResult<RowBatch>> + Send;

    /// Releases the connection. Calling it more than once is a no-op.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
