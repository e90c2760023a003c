use std::fmt;

use etl_config::shared::{PipelineConfig, TableErrorPolicy};
use tracing::{error, info};

use crate::destination::Destination;
use crate::error::{EtlError, EtlResult};
use crate::source::{Source, extract_table};
use crate::store::watermark::WatermarkStore;
use crate::transform::transform;
use crate::types::TableSpec;

/// Where a [`Pipeline`] is in its run.
///
/// Connections are opened before the pipeline is built, so a run starts at
/// [`PipelinePhase::EnsuringMetadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    EnsuringMetadata,
    ProcessingTables,
    Done { success: bool },
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelinePhase::Idle => f.write_str("idle"),
            PipelinePhase::EnsuringMetadata => f.write_str("ensuring_metadata"),
            PipelinePhase::ProcessingTables => f.write_str("processing_tables"),
            PipelinePhase::Done { success: true } => f.write_str("done_success"),
            PipelinePhase::Done { success: false } => f.write_str("done_failure"),
        }
    }
}

/// Outcome of one table in a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRunSummary {
    pub table: String,
    pub rows_extracted: usize,
    pub rows_loaded: u64,
    /// Largest primary key loaded, handed to the watermark store. `None` when nothing advanced.
    pub watermark: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tables: Vec<TableRunSummary>,
}

impl RunSummary {
    pub fn rows_loaded(&self) -> u64 {
        self.tables.iter().map(|table| table.rows_loaded).sum()
    }
}

/// Moves every configured table from the source to the destination, one table at a time.
///
/// For each table the pipeline extracts the rows above its watermark (or all rows), applies the
/// table's transformations, appends the result, and advances the watermark to the largest
/// primary key loaded. The source is closed at the end of every run.
#[derive(Debug)]
pub struct Pipeline<S, D, W> {
    config: PipelineConfig,
    source: S,
    destination: D,
    store: W,
    phase: PipelinePhase,
}

impl<S, D, W> Pipeline<S, D, W>
where
    S: Source + Sync,
    D: Destination + Sync,
    W: WatermarkStore,
{
    pub fn new(config: PipelineConfig, source: S, destination: D, store: W) -> Self {
        Self {
            config,
            source,
            destination,
            store,
            phase: PipelinePhase::Idle,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Runs the pipeline once.
    ///
    /// Fails if the watermark table cannot be created or a table fails. With
    /// [`TableErrorPolicy::Abort`] the first failing table stops the run; with
    /// [`TableErrorPolicy::Continue`] the remaining tables are processed and all failures are
    /// returned together.
    pub async fn run(&mut self) -> EtlResult<RunSummary> {
        info!(
            source = S::name(),
            destination = D::name(),
            tables = self.config.tables.len(),
            "starting pipeline run"
        );

        let result = self.run_tables().await;

        self.source.close().await;
        self.phase = PipelinePhase::Done {
            success: result.is_ok(),
        };

        match &result {
            Ok(summary) => info!(
                tables = summary.tables.len(),
                rows_loaded = summary.rows_loaded(),
                "pipeline run completed"
            ),
            Err(err) => error!(error = %err, "pipeline run failed"),
        }

        result
    }

    async fn run_tables(&mut self) -> EtlResult<RunSummary> {
        self.phase = PipelinePhase::EnsuringMetadata;
        self.store.ensure_watermark_table().await?;

        self.phase = PipelinePhase::ProcessingTables;
        let mut summary = RunSummary::default();
        let mut errors: Vec<EtlError> = Vec::new();

        for table in &self.config.tables {
            match self.process_table(table).await {
                Ok(table_summary) => summary.tables.push(table_summary),
                Err(err) => {
                    error!(
                        table = %table.source_table,
                        error = %err,
                        "table processing failed"
                    );

                    match self.config.table_error_policy {
                        TableErrorPolicy::Abort => return Err(err),
                        TableErrorPolicy::Continue => errors.push(err),
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(summary)
    }

    async fn process_table(&self, table: &TableSpec) -> EtlResult<TableRunSummary> {
        let mut table_summary = TableRunSummary {
            table: table.source_table.clone(),
            rows_extracted: 0,
            rows_loaded: 0,
            watermark: None,
        };

        let batch = extract_table(&self.source, &self.store, table).await?;
        if batch.is_empty() {
            info!(table = %table.source_table, "no new rows, skipping table");
            return Ok(table_summary);
        }
        table_summary.rows_extracted = batch.len();

        let batch = transform(batch, &table.transformations)?;

        // Read before the batch is handed to the destination.
        let max_id = if table.incremental {
            batch.max_i64(&table.primary_key)?
        } else {
            None
        };

        table_summary.rows_loaded = self
            .destination
            .write_batch(&table.destination_table, batch)
            .await?;
        info!(
            source_table = %table.source_table,
            destination_table = %table.destination_table,
            rows = table_summary.rows_loaded,
            "table loaded"
        );

        if let Some(max_id) = max_id {
            if table_summary.rows_loaded > 0 {
                self.store.set_watermark(table.watermark_key(), max_id).await;
                table_summary.watermark = Some(max_id);
            }
        }

        Ok(table_summary)
    }
}
