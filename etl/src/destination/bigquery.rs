use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::bail;
use crate::bigquery::{BigQueryClient, BigQueryColumn, BigQueryType, coerce_cell};
use crate::destination::Destination;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{RowBatch, TableRow};

/// Appends batches to tables of one BigQuery dataset through the Storage Write API.
///
/// The dataset is created on first use. A missing table is created from the column types of
/// the first batch written to it, and columns that later batches bring are added as nullable.
/// Existing columns keep their type and values are coerced into it.
#[derive(Debug)]
pub struct BigQueryDestination {
    client: BigQueryClient,
    dataset_id: String,
    location: String,
    dataset_ready: OnceCell<()>,
}

impl BigQueryDestination {
    pub fn new(client: BigQueryClient, dataset_id: String, location: String) -> Self {
        Self {
            client,
            dataset_id,
            location,
            dataset_ready: OnceCell::new(),
        }
    }

    async fn ensure_dataset(&self) -> EtlResult<()> {
        self.dataset_ready
            .get_or_try_init(|| {
                self.client
                    .create_dataset_if_missing(&self.dataset_id, &self.location)
            })
            .await?;

        Ok(())
    }

    /// Creates or evolves `table` so it can hold `batch` and returns the load type of every
    /// batch column, in batch order.
    async fn prepare_table(
        &self,
        table: &str,
        batch: &RowBatch,
    ) -> EtlResult<Vec<(String, BigQueryType)>> {
        let inferred = infer_column_types(batch);

        let Some(existing) = self.client.table_columns(&self.dataset_id, table).await? else {
            self.client
                .create_table(&self.dataset_id, table, &inferred)
                .await?;
            return Ok(inferred);
        };

        let (columns, missing) = reconcile_columns(table, &existing, inferred)?;
        if !missing.is_empty() {
            self.client
                .add_columns(&self.dataset_id, table, &missing)
                .await?;
        }

        Ok(columns)
    }
}

/// Widest type seen in each column. Columns holding only nulls default to string.
fn infer_column_types(batch: &RowBatch) -> Vec<(String, BigQueryType)> {
    batch
        .column_names()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let typ = batch
                .rows()
                .iter()
                .filter_map(|row| row.get(index).and_then(BigQueryType::infer))
                .reduce(BigQueryType::widen)
                .unwrap_or(BigQueryType::String);
            (name.clone(), typ)
        })
        .collect()
}

/// Matches batch columns to table columns by case-insensitive name.
///
/// Returns the load types of all batch columns and the subset missing from the table.
fn reconcile_columns(
    table: &str,
    existing: &[BigQueryColumn],
    inferred: Vec<(String, BigQueryType)>,
) -> EtlResult<(Vec<(String, BigQueryType)>, Vec<(String, BigQueryType)>)> {
    let mut columns = Vec::with_capacity(inferred.len());
    let mut missing = Vec::new();

    for (name, inferred_type) in inferred {
        match existing
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(&name))
        {
            Some(BigQueryColumn { typ: Some(typ), .. }) => columns.push((name, *typ)),
            Some(BigQueryColumn { typ: None, .. }) => bail!(
                ErrorKind::UnsupportedValueInDestination,
                "Destination column type is not supported",
                format!("column `{name}` of table `{table}`")
            ),
            None => {
                missing.push((name.clone(), inferred_type));
                columns.push((name, inferred_type));
            }
        }
    }

    Ok((columns, missing))
}

fn coerce_rows(
    rows: Vec<TableRow>,
    columns: &[(String, BigQueryType)],
) -> EtlResult<Vec<TableRow>> {
    rows.into_iter()
        .map(|row| {
            row.into_values()
                .into_iter()
                .zip(columns)
                .map(|(cell, (_, typ))| coerce_cell(cell, *typ))
                .collect::<EtlResult<Vec<_>>>()
                .map(TableRow::new)
        })
        .collect()
}

impl Destination for BigQueryDestination {
    fn name() -> &'static str {
        "bigquery"
    }

    async fn write_batch(&self, table: &str, batch: RowBatch) -> EtlResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        batch.validate()?;
        self.ensure_dataset().await?;

        let columns = self.prepare_table(table, &batch).await?;
        let rows = coerce_rows(batch.into_rows(), &columns)?;
        let descriptor = Arc::new(BigQueryClient::table_descriptor(&columns));

        let loaded = self
            .client
            .append_rows(&self.dataset_id, table, descriptor, rows)
            .await?;

        match self.client.row_count(&self.dataset_id, table).await {
            Ok(total_rows) => info!(table, loaded, total_rows, "rows loaded into bigquery"),
            Err(err) => warn!(
                table,
                loaded,
                error = %err,
                "rows loaded, failed to count table rows"
            ),
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    #[test]
    fn column_types_are_widened_across_rows() {
        let batch = RowBatch::new(
            vec!["price".into(), "note".into(), "id".into()],
            vec![
                TableRow::new(vec![Cell::I64(20), Cell::Null, Cell::I64(1)]),
                TableRow::new(vec![Cell::F64(5.12), Cell::Null, Cell::I64(2)]),
            ],
        );

        assert_eq!(
            infer_column_types(&batch),
            vec![
                ("price".to_owned(), BigQueryType::Float64),
                ("note".to_owned(), BigQueryType::String),
                ("id".to_owned(), BigQueryType::Int64),
            ]
        );
    }

    #[test]
    fn existing_types_win_and_new_columns_are_reported() {
        let existing = vec![
            BigQueryColumn {
                name: "ORDER_ID".into(),
                typ: Some(BigQueryType::Int64),
            },
            BigQueryColumn {
                name: "total_amount".into(),
                typ: Some(BigQueryType::Numeric),
            },
        ];
        let inferred = vec![
            ("order_id".to_owned(), BigQueryType::Int64),
            ("total_amount".to_owned(), BigQueryType::Float64),
            ("order_size".to_owned(), BigQueryType::String),
        ];

        let (columns, missing) = reconcile_columns("orders", &existing, inferred).unwrap();

        assert_eq!(
            columns,
            vec![
                ("order_id".to_owned(), BigQueryType::Int64),
                ("total_amount".to_owned(), BigQueryType::Numeric),
                ("order_size".to_owned(), BigQueryType::String),
            ]
        );
        assert_eq!(missing, vec![("order_size".to_owned(), BigQueryType::String)]);
    }

    #[test]
    fn unsupported_existing_column_fails() {
        let existing = vec![BigQueryColumn {
            name: "tags".into(),
            typ: None,
        }];

        let err = reconcile_columns(
            "products",
            &existing,
            vec![("tags".to_owned(), BigQueryType::String)],
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedValueInDestination);
    }

    #[test]
    fn rows_are_coerced_to_column_types() {
        let rows = vec![TableRow::new(vec![Cell::I64(20), Cell::from("7")])];
        let columns = vec![
            ("price".to_owned(), BigQueryType::Float64),
            ("stock".to_owned(), BigQueryType::Int64),
        ];

        let coerced = coerce_rows(rows, &columns).unwrap();

        assert_eq!(
            coerced,
            vec![TableRow::new(vec![Cell::F64(20.0), Cell::I64(7)])]
        );
    }
}
