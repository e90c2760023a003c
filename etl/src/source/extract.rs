use tracing::info;

use crate::error::EtlResult;
use crate::source::{ExtractQuery, Source};
use crate::store::watermark::WatermarkStore;
use crate::types::{RowBatch, TableSpec};

/// Extracts the rows of `table` that still need loading.
///
/// Incremental tables read only rows above their stored watermark, which counts as `0` when
/// missing or unreadable. Other tables are read in full and never touch the watermark store.
pub async fn extract_table<S, W>(source: &S, store: &W, table: &TableSpec) -> EtlResult<RowBatch>
where
    S: Source,
    W: WatermarkStore,
{
    let query = if table.incremental {
        let after = store.get_watermark(table.watermark_key()).await;
        ExtractQuery::Incremental {
            table: table.source_table.clone(),
            primary_key: table.primary_key.clone(),
            after,
        }
    } else {
        ExtractQuery::Full {
            table: table.source_table.clone(),
        }
    };

    info!(source = S::name(), %query, "extracting table");
    let batch = source.extract(&query).await?;
    info!(
        table = %table.source_table,
        rows = batch.len(),
        "extracted rows"
    );

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::store::watermark::MemoryWatermarkStore;
    use crate::types::{Cell, TableRow};

    fn table(incremental: bool) -> TableSpec {
        TableSpec::new("orders", "orders", "order_id", incremental, vec![])
    }

    async fn source() -> MemorySource {
        let source = MemorySource::new();
        source
            .insert_table(
                "orders",
                RowBatch::new(
                    vec!["order_id".into()],
                    (1..=4).map(|id| TableRow::new(vec![Cell::I64(id)])).collect(),
                ),
            )
            .await;
        source
    }

    #[tokio::test]
    async fn incremental_table_starts_after_watermark() {
        let source = source().await;
        let store = MemoryWatermarkStore::new();
        store.insert("orders", 2).await;

        let batch = extract_table(&source, &store, &table(true)).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(
            source.queries().await,
            vec![ExtractQuery::Incremental {
                table: "orders".into(),
                primary_key: "order_id".into(),
                after: 2,
            }]
        );
    }

    #[tokio::test]
    async fn full_table_skips_the_watermark_store() {
        let source = source().await;
        let store = MemoryWatermarkStore::new();
        store.insert("orders", 2).await;

        let batch = extract_table(&source, &store, &table(false)).await.unwrap();

        assert_eq!(batch.len(), 4);
        assert!(store.reads().await.is_empty());
    }
}
