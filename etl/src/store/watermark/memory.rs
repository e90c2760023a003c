use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::store::watermark::WatermarkStore;
use crate::types::Watermark;

#[derive(Debug, Default)]
struct Inner {
    watermarks: HashMap<String, Watermark>,
    /// Table names in the order they were read.
    reads: Vec<String>,
    /// Every successful write, in order.
    writes: Vec<(String, i64)>,
    table_ensured: bool,
    fail_ensure: bool,
    fail_reads: bool,
    fail_writes: bool,
}

/// Keeps watermarks in memory. Used by tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryWatermarkStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the watermark of `table_name`.
    pub async fn insert(&self, table_name: &str, last_processed_id: i64) {
        let mut inner = self.inner.lock().await;
        upsert(&mut inner, table_name, last_processed_id);
    }

    pub async fn watermark(&self, table_name: &str) -> Option<Watermark> {
        self.inner.lock().await.watermarks.get(table_name).cloned()
    }

    pub async fn last_processed_id(&self, table_name: &str) -> Option<i64> {
        self.watermark(table_name)
            .await
            .map(|watermark| watermark.last_processed_id)
    }

    pub async fn reads(&self) -> Vec<String> {
        self.inner.lock().await.reads.clone()
    }

    pub async fn writes(&self) -> Vec<(String, i64)> {
        self.inner.lock().await.writes.clone()
    }

    pub async fn table_ensured(&self) -> bool {
        self.inner.lock().await.table_ensured
    }

    /// Makes creating the watermark table fail.
    pub async fn fail_ensure(&self, fail: bool) {
        self.inner.lock().await.fail_ensure = fail;
    }

    /// Makes every following read fail.
    pub async fn fail_reads(&self, fail: bool) {
        self.inner.lock().await.fail_reads = fail;
    }

    /// Makes every following write fail.
    pub async fn fail_writes(&self, fail: bool) {
        self.inner.lock().await.fail_writes = fail;
    }
}

fn upsert(inner: &mut Inner, table_name: &str, last_processed_id: i64) {
    let now = Utc::now();
    inner
        .watermarks
        .entry(table_name.to_owned())
        .and_modify(|watermark| {
            watermark.last_processed_id = last_processed_id;
            watermark.updated_at = now;
        })
        .or_insert_with(|| Watermark {
            table_name: table_name.to_owned(),
            last_processed_id,
            created_at: now,
            updated_at: now,
        });
}

impl WatermarkStore for MemoryWatermarkStore {
    async fn ensure_watermark_table(&self) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.fail_ensure {
            bail!(
                ErrorKind::WatermarkTableFailed,
                "Failed to create the watermark table"
            );
        }

        inner.table_ensured = true;

        Ok(())
    }

    async fn read_watermark(&self, table_name: &str) -> EtlResult<Option<i64>> {
        let mut inner = self.inner.lock().await;
        inner.reads.push(table_name.to_owned());

        if inner.fail_reads {
            bail!(
                ErrorKind::WatermarkReadFailed,
                "Failed to read watermark",
                table_name
            );
        }

        Ok(inner
            .watermarks
            .get(table_name)
            .map(|watermark| watermark.last_processed_id))
    }

    async fn write_watermark(&self, table_name: &str, last_processed_id: i64) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.fail_writes {
            bail!(
                ErrorKind::WatermarkWriteFailed,
                "Failed to write watermark",
                table_name
            );
        }

        upsert(&mut inner, table_name, last_processed_id);
        inner.writes.push((table_name.to_owned(), last_processed_id));

        Ok(())
    }
}
