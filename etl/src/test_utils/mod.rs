//! Builders shared by unit and integration tests.

use etl_config::shared::{PipelineConfig, TableErrorPolicy};

use crate::destination::MemoryDestination;
use crate::pipeline::Pipeline;
use crate::source::MemorySource;
use crate::store::watermark::MemoryWatermarkStore;
use crate::types::{Cell, RowBatch, TableRow, TableSpec};

/// Builds a batch from column names and rows of cells.
pub fn batch(columns: &[&str], rows: Vec<Vec<Cell>>) -> RowBatch {
    RowBatch::new(
        columns.iter().map(|column| (*column).to_owned()).collect(),
        rows.into_iter().map(TableRow::new).collect(),
    )
}

/// Returns the value of `column` in every row of `batch`.
pub fn column(batch: &RowBatch, column: &str) -> Vec<Cell> {
    let Some(index) = batch.column_index(column) else {
        panic!("column `{column}` missing from batch");
    };

    batch
        .rows()
        .iter()
        .map(|row| row.get(index).cloned().unwrap_or(Cell::Null))
        .collect()
}

pub fn pipeline_config(tables: Vec<TableSpec>, policy: TableErrorPolicy) -> PipelineConfig {
    PipelineConfig {
        tables,
        table_error_policy: policy,
    }
}

pub type MemoryPipeline = Pipeline<MemorySource, MemoryDestination, MemoryWatermarkStore>;

/// Builds a pipeline over clones of in-memory components so the test keeps handles to inspect.
pub fn memory_pipeline(
    config: PipelineConfig,
    source: &MemorySource,
    destination: &MemoryDestination,
    store: &MemoryWatermarkStore,
) -> MemoryPipeline {
    Pipeline::new(config, source.clone(), destination.clone(), store.clone())
}
