use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::source::{ExtractQuery, Source};
use crate::types::{Cell, RowBatch};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, RowBatch>,
    failing_tables: HashSet<String>,
    queries: Vec<ExtractQuery>,
    close_calls: usize,
}

/// A source serving tables held in memory.
///
/// Incremental queries behave like the MySQL ones: rows with a key above the bound, in
/// ascending key order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content of `table`.
    pub async fn insert_table(&self, table: &str, batch: RowBatch) {
        self.inner.lock().await.tables.insert(table.to_owned(), batch);
    }

    /// Makes every extraction of `table` fail.
    pub async fn fail_on(&self, table: &str) {
        self.inner
            .lock()
            .await
            .failing_tables
            .insert(table.to_owned());
    }

    pub async fn queries(&self) -> Vec<ExtractQuery> {
        self.inner.lock().await.queries.clone()
    }

    pub async fn close_calls(&self) -> usize {
        self.inner.lock().await.close_calls
    }
}

impl Source for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn extract(&self, query: &ExtractQuery) -> EtlResult<RowBatch> {
        let mut inner = self.inner.lock().await;
        inner.queries.push(query.clone());

        let table = query.table();
        if inner.failing_tables.contains(table) {
            bail!(
                ErrorKind::SourceQueryFailed,
                "MySQL extraction query failed",
                format!("{query}: injected failure")
            );
        }

        let Some(batch) = inner.tables.get(table) else {
            bail!(
                ErrorKind::SourceQueryFailed,
                "MySQL extraction query failed",
                format!("table `{table}` doesn't exist")
            );
        };

        let ExtractQuery::Incremental {
            primary_key, after, ..
        } = query
        else {
            return Ok(batch.clone());
        };

        let Some(key) = batch.column_index(primary_key) else {
            bail!(
                ErrorKind::SourceQueryFailed,
                "MySQL extraction query failed",
                format!("unknown column `{primary_key}` in table `{table}`")
            );
        };

        let mut rows: Vec<_> = batch
            .rows()
            .iter()
            .filter(|row| row.get(key).and_then(Cell::as_i64).is_some_and(|id| id > *after))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.get(key).and_then(Cell::as_i64));

        if rows.is_empty() {
            return Ok(RowBatch::empty());
        }

        Ok(RowBatch::new(batch.column_names().to_vec(), rows))
    }

    async fn close(&self) {
        self.inner.lock().await.close_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableRow;

    fn orders() -> RowBatch {
        RowBatch::new(
            vec!["order_id".into(), "quantity".into()],
            vec![
                TableRow::new(vec![Cell::I64(7), Cell::I64(1)]),
                TableRow::new(vec![Cell::I64(3), Cell::I64(2)]),
                TableRow::new(vec![Cell::I64(6), Cell::I64(3)]),
            ],
        )
    }

    #[tokio::test]
    async fn incremental_extraction_is_bounded_and_ordered() {
        let source = MemorySource::new();
        source.insert_table("orders", orders()).await;

        let batch = source
            .extract(&ExtractQuery::Incremental {
                table: "orders".into(),
                primary_key: "order_id".into(),
                after: 5,
            })
            .await
            .unwrap();

        let ids: Vec<_> = batch.rows().iter().map(|row| row.get(0).cloned()).collect();
        assert_eq!(ids, vec![Some(Cell::I64(6)), Some(Cell::I64(7))]);
    }

    #[tokio::test]
    async fn nothing_above_the_bound_is_empty() {
        let source = MemorySource::new();
        source.insert_table("orders", orders()).await;

        let batch = source
            .extract(&ExtractQuery::Incremental {
                table: "orders".into(),
                primary_key: "order_id".into(),
                after: 7,
            })
            .await
            .unwrap();

        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn unknown_table_fails() {
        let source = MemorySource::new();

        let err = source
            .extract(&ExtractQuery::Full {
                table: "missing".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    }
}
