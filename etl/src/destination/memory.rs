use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, RowBatch, TableRow};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, RowBatch>,
    /// Table and row count of every successful write, in order.
    writes: Vec<(String, usize)>,
    failing_tables: HashSet<String>,
}

/// In-memory destination for tests and local runs.
///
/// Appended batches are merged per table. Columns missing from a batch are filled with nulls
/// and columns new to a table are added, with nulls for the rows already there.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything loaded into `table` so far.
    pub async fn table(&self, table: &str) -> Option<RowBatch> {
        self.inner.lock().await.tables.get(table).cloned()
    }

    pub async fn writes(&self) -> Vec<(String, usize)> {
        self.inner.lock().await.writes.clone()
    }

    /// Makes every write to `table` fail.
    pub async fn fail_on(&self, table: &str) {
        self.inner
            .lock()
            .await
            .failing_tables
            .insert(table.to_owned());
    }
}

fn append(existing: &mut RowBatch, batch: RowBatch) {
    let positions: Vec<usize> = batch
        .column_names()
        .iter()
        .map(|name| existing.ensure_column(name))
        .collect();
    let width = existing.column_names().len();

    let (column_names, mut rows) = std::mem::take(existing).into_parts();
    for row in batch.into_rows() {
        let mut values = vec![Cell::Null; width];
        for (position, value) in positions.iter().zip(row.into_values()) {
            values[*position] = value;
        }
        rows.push(TableRow::new(values));
    }

    *existing = RowBatch::new(column_names, rows);
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn write_batch(&self, table: &str, batch: RowBatch) -> EtlResult<u64> {
        let mut inner = self.inner.lock().await;

        if inner.failing_tables.contains(table) {
            bail!(
                ErrorKind::DestinationError,
                "Failed to load batch",
                format!("injected failure for table `{table}`")
            );
        }

        let loaded = batch.len();
        if loaded == 0 {
            return Ok(0);
        }

        append(inner.tables.entry(table.to_owned()).or_default(), batch);
        inner.writes.push((table.to_owned(), loaded));

        let total_rows = inner.tables.get(table).map_or(0, RowBatch::len);
        info!(table, loaded, total_rows, "rows loaded into memory destination");

        Ok(loaded as u64)
    }
}
