use std::future::Future;

use tracing::{error, info, warn};

use crate::error::EtlResult;

/// Persists the highest primary key already loaded for each incremental table.
///
/// Implementations only need to provide the fallible primitives. The pipeline goes through
/// [`WatermarkStore::get_watermark`] and [`WatermarkStore::set_watermark`], which never fail:
/// a watermark that cannot be read counts as zero and a watermark that cannot be written is
/// logged and left behind, so the next run reprocesses the same rows.
pub trait WatermarkStore: Sync {
    /// Creates the backing table if it does not exist yet.
    fn ensure_watermark_table(&self) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns the stored watermark of `table_name`, if any.
    fn read_watermark(
        &self,
        table_name: &str,
    ) -> impl Future<Output = EtlResult<Option<i64>>> + Send;

    /// Inserts or updates the watermark of `table_name`.
    fn write_watermark(
        &self,
        table_name: &str,
        last_processed_id: i64,
    ) -> impl Future<Output = EtlResult<()>> + Send;

    /// Returns the watermark of `table_name`, falling back to `0` when none is stored or the
    /// read fails.
    fn get_watermark(&self, table_name: &str) -> impl Future<Output = i64> + Send {
        async move {
            match self.read_watermark(table_name).await {
                Ok(Some(watermark)) => watermark,
                Ok(None) => {
                    info!(table_name, "no watermark stored, starting from 0");
                    0
                }
                Err(err) => {
                    warn!(table_name, error = %err, "failed to read watermark, starting from 0");
                    0
                }
            }
        }
    }

    /// Stores the watermark of `table_name`, logging instead of failing.
    fn set_watermark(
        &self,
        table_name: &str,
        last_processed_id: i64,
    ) -> impl Future<Output = ()> + Send {
        async move {
            match self.write_watermark(table_name, last_processed_id).await {
                Ok(()) => info!(table_name, last_processed_id, "watermark updated"),
                Err(err) => error!(
                    table_name,
                    last_processed_id,
                    error = %err,
                    "failed to update watermark"
                ),
            }
        }
    }
}
