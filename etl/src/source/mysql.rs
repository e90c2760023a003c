use std::time::Duration;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use etl_config::shared::MySqlConnectionConfig;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use tracing::{debug, info};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::source::{ExtractQuery, Source};
use crate::types::{Cell, RowBatch, TableRow};

/// Connections kept open to MySQL. Tables are read one after another.
const MAX_CONNECTIONS: u32 = 2;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Reads tables from a MySQL database through a small connection pool.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Opens the pool and checks that the server is reachable.
    pub async fn connect(config: &MySqlConnectionConfig) -> EtlResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(config.with_db())
            .await
            .map_err(|err| {
                etl_error!(
                    ErrorKind::SourceConnectionFailed,
                    "Failed to connect to MySQL",
                    format!("{}:{}/{}: {err}", config.host, config.port, config.name),
                    source: err
                )
            })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "connected to mysql"
        );

        Ok(Self { pool })
    }
}

impl Source for MySqlSource {
    fn name() -> &'static str {
        "mysql"
    }

    async fn extract(&self, query: &ExtractQuery) -> EtlResult<RowBatch> {
        let sql = query.to_sql();
        debug!(%sql, "running extraction query");

        let statement = sqlx::query(&sql);
        let statement = match query {
            ExtractQuery::Full { .. } => statement,
            ExtractQuery::Incremental { after, .. } => statement.bind(*after),
        };

        let rows = statement.fetch_all(&self.pool).await.map_err(|err| {
            etl_error!(
                ErrorKind::SourceQueryFailed,
                "MySQL extraction query failed",
                format!("{query}: {err}"),
                source: err
            )
        })?;

        rows_to_batch(&rows)
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("mysql connection closed");
        }
    }
}

fn rows_to_batch(rows: &[MySqlRow]) -> EtlResult<RowBatch> {
    let Some(first) = rows.first() else {
        return Ok(RowBatch::empty());
    };

    let column_names = first
        .columns()
        .iter()
        .map(|column| column.name().to_owned())
        .collect();

    let table_rows = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|index| decode_cell(row, index))
                .collect::<EtlResult<Vec<_>>>()
                .map(TableRow::new)
        })
        .collect::<EtlResult<Vec<_>>>()?;

    Ok(RowBatch::new(column_names, table_rows))
}

/// Decodes one value by its MySQL column type.
///
/// Types without a dedicated mapping (`VARCHAR`, `TEXT`, `ENUM`, `SET`, ...) are read as text.
fn decode_cell(row: &MySqlRow, index: usize) -> EtlResult<Cell> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();

    let cell = match type_name {
        "NULL" => Cell::Null,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.into(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index)?.into()
        }
        name if name.ends_with("UNSIGNED") => row
            .try_get::<Option<u64>, _>(index)?
            .map_or(Cell::Null, Cell::U64),
        "YEAR" => row
            .try_get_unchecked::<Option<u16>, _>(index)?
            .map_or(Cell::Null, |year| Cell::I64(i64::from(year))),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)?
            .map_or(Cell::Null, |value| Cell::F64(f64::from(value))),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.into(),
        "DECIMAL" => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map_or(Cell::Null, Cell::Numeric),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map_or(Cell::Null, Cell::Date),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map_or(Cell::Null, Cell::Time),
        "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map_or(Cell::Null, Cell::Timestamp),
        "TIMESTAMP" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map_or(Cell::Null, Cell::TimestampTz),
        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map_or(Cell::Null, Cell::Json),
        "BIT" | "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
        | "GEOMETRY" => row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map_or(Cell::Null, Cell::Bytes),
        _ => row.try_get_unchecked::<Option<String>, _>(index)?.into(),
    };

    Ok(cell)
}
