use gcp_bigquery_client::model::query_request::QueryRequest;
use tracing::info;

use crate::bigquery::{BigQueryClient, int64_parameter, parameterized, string_parameter};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::store::watermark::WatermarkStore;

/// Name of the table holding one watermark row per incremental table.
pub const WATERMARK_TABLE_NAME: &str = "etl_metadata";

/// Stores watermarks in the `etl_metadata` table of the destination dataset.
///
/// The table has one row per source table. Writes are a single `merge` statement, so a row is
/// either inserted with both timestamps set or updated with only `updated_at` refreshed.
#[derive(Debug, Clone)]
pub struct BigQueryWatermarkStore {
    client: BigQueryClient,
    dataset_id: String,
    location: String,
}

impl BigQueryWatermarkStore {
    pub fn new(client: BigQueryClient, dataset_id: String, location: String) -> Self {
        Self {
            client,
            dataset_id,
            location,
        }
    }

    fn table_name(&self) -> EtlResult<String> {
        self.client
            .full_table_name(&self.dataset_id, WATERMARK_TABLE_NAME)
    }
}

fn with_kind(kind: ErrorKind, description: &'static str, err: EtlError) -> EtlError {
    etl_error!(kind, description, err.to_string(), source: err)
}

impl WatermarkStore for BigQueryWatermarkStore {
    async fn ensure_watermark_table(&self) -> EtlResult<()> {
        self.client
            .create_dataset_if_missing(&self.dataset_id, &self.location)
            .await?;

        let table_name = self.table_name()?;
        let query = format!(
            "create table if not exists {table_name} (\
             table_name string not null, \
             last_processed_id int64 not null, \
             created_at timestamp not null, \
             updated_at timestamp not null)"
        );

        self.client
            .query(QueryRequest::new(query))
            .await
            .map_err(|err| {
                with_kind(
                    ErrorKind::WatermarkTableFailed,
                    "Failed to create the watermark table",
                    err,
                )
            })?;

        info!(%table_name, "watermark table ready");

        Ok(())
    }

    async fn read_watermark(&self, table_name: &str) -> EtlResult<Option<i64>> {
        let metadata_table = self.table_name()?;
        let query = format!(
            "select last_processed_id from {metadata_table} where table_name = @table_name limit 1"
        );
        let request = parameterized(query, vec![string_parameter("table_name", table_name)]);

        let mut result_set = self.client.query(request).await.map_err(|err| {
            with_kind(
                ErrorKind::WatermarkReadFailed,
                "Failed to read watermark",
                err,
            )
        })?;

        if !result_set.next_row() {
            return Ok(None);
        }

        Ok(result_set.get_i64_by_name("last_processed_id")?)
    }

    async fn write_watermark(&self, table_name: &str, last_processed_id: i64) -> EtlResult<()> {
        let metadata_table = self.table_name()?;
        let query = format!(
            "merge {metadata_table} t \
             using (select @table_name as table_name, @last_processed_id as last_processed_id) s \
             on t.table_name = s.table_name \
             when matched then update set \
             last_processed_id = s.last_processed_id, updated_at = current_timestamp() \
             when not matched then insert (table_name, last_processed_id, created_at, updated_at) \
             values (s.table_name, s.last_processed_id, current_timestamp(), current_timestamp())"
        );
        let request = parameterized(
            query,
            vec![
                string_parameter("table_name", table_name),
                int64_parameter("last_processed_id", last_processed_id),
            ],
        );

        self.client.query(request).await.map_err(|err| {
            with_kind(
                ErrorKind::WatermarkWriteFailed,
                "Failed to write watermark",
                err,
            )
        })?;

        Ok(())
    }
}
