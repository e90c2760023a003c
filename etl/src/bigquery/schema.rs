use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{NaiveTime, TimeZone, Utc};
use gcp_bigquery_client::storage::ColumnType;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::transform::parse_timestamp;
use crate::types::Cell;

/// Column types the loader creates or understands in existing tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigQueryType {
    Bool,
    Int64,
    Float64,
    Numeric,
    BigNumeric,
    String,
    Bytes,
    Date,
    Time,
    Datetime,
    Timestamp,
    Json,
}

impl BigQueryType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BigQueryType::Bool => "bool",
            BigQueryType::Int64 => "int64",
            BigQueryType::Float64 => "float64",
            BigQueryType::Numeric => "numeric",
            BigQueryType::BigNumeric => "bignumeric",
            BigQueryType::String => "string",
            BigQueryType::Bytes => "bytes",
            BigQueryType::Date => "date",
            BigQueryType::Time => "time",
            BigQueryType::Datetime => "datetime",
            BigQueryType::Timestamp => "timestamp",
            BigQueryType::Json => "json",
        }
    }

    /// Parses a `data_type` from `INFORMATION_SCHEMA.COLUMNS`.
    ///
    /// Parameterized types such as `STRING(10)` or `NUMERIC(10, 2)` map to their base type.
    /// Returns `None` for types values are never loaded into (arrays, structs, geography).
    pub fn from_data_type(data_type: &str) -> Option<BigQueryType> {
        let base = data_type
            .split('(')
            .next()
            .unwrap_or(data_type)
            .trim()
            .to_ascii_uppercase();

        let typ = match base.as_str() {
            "BOOL" | "BOOLEAN" => BigQueryType::Bool,
            "INT64" | "INT" | "INTEGER" | "SMALLINT" | "BIGINT" | "TINYINT" | "BYTEINT" => {
                BigQueryType::Int64
            }
            "FLOAT64" | "FLOAT" => BigQueryType::Float64,
            "NUMERIC" | "DECIMAL" => BigQueryType::Numeric,
            "BIGNUMERIC" | "BIGDECIMAL" => BigQueryType::BigNumeric,
            "STRING" => BigQueryType::String,
            "BYTES" => BigQueryType::Bytes,
            "DATE" => BigQueryType::Date,
            "TIME" => BigQueryType::Time,
            "DATETIME" => BigQueryType::Datetime,
            "TIMESTAMP" => BigQueryType::Timestamp,
            "JSON" => BigQueryType::Json,
            _ => return None,
        };

        Some(typ)
    }

    /// Column type for a value when a new column is created. `None` for nulls.
    pub fn infer(cell: &Cell) -> Option<BigQueryType> {
        let typ = match cell {
            Cell::Null => return None,
            Cell::Bool(_) => BigQueryType::Bool,
            Cell::String(_) => BigQueryType::String,
            Cell::I64(_) => BigQueryType::Int64,
            Cell::U64(value) if i64::try_from(*value).is_ok() => BigQueryType::Int64,
            Cell::U64(_) => BigQueryType::Numeric,
            Cell::F64(_) => BigQueryType::Float64,
            Cell::Numeric(_) => BigQueryType::BigNumeric,
            Cell::Date(_) => BigQueryType::Date,
            Cell::Time(_) => BigQueryType::Time,
            Cell::Timestamp(_) | Cell::TimestampTz(_) => BigQueryType::Timestamp,
            Cell::Bytes(_) => BigQueryType::Bytes,
            Cell::Json(_) => BigQueryType::Json,
        };

        Some(typ)
    }

    /// Smallest type holding values of both `self` and `other`. Falls back to string.
    pub fn widen(self, other: BigQueryType) -> BigQueryType {
        use BigQueryType::*;

        match (self, other) {
            (a, b) if a == b => a,
            (Int64, Float64) | (Float64, Int64) => Float64,
            (Int64 | Numeric, Numeric) | (Numeric, Int64) => Numeric,
            (Int64 | Numeric | BigNumeric, BigNumeric) | (BigNumeric, Int64 | Numeric) => {
                BigNumeric
            }
            (Float64, Numeric | BigNumeric) | (Numeric | BigNumeric, Float64) => Float64,
            (Date | Datetime | Timestamp, Timestamp) | (Timestamp, Date | Datetime) => Timestamp,
            (Date, Datetime) | (Datetime, Date) => Datetime,
            _ => String,
        }
    }

    /// Type of the field in the Storage Write API descriptor.
    ///
    /// Types without a native wire encoding are sent as text and parsed by BigQuery.
    pub fn column_type(&self) -> ColumnType {
        match self {
            BigQueryType::Bool => ColumnType::Bool,
            BigQueryType::Int64 => ColumnType::Int64,
            BigQueryType::Float64 => ColumnType::Double,
            BigQueryType::Bytes => ColumnType::Bytes,
            _ => ColumnType::String,
        }
    }
}

impl fmt::Display for BigQueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Converts `cell` into the representation loaded into a column of type `typ`.
///
/// Fails with [`ErrorKind::UnsupportedValueInDestination`] when the value cannot be
/// represented, for example text that is not a number going into an `int64` column.
pub fn coerce_cell(cell: Cell, typ: BigQueryType) -> EtlResult<Cell> {
    if cell.is_null() {
        return Ok(Cell::Null);
    }

    let source_type = cell.type_name();
    let coerced = match typ {
        BigQueryType::String => Some(match cell {
            Cell::String(value) => Cell::String(value),
            other => Cell::String(other.to_string()),
        }),
        BigQueryType::Bool => to_bool(&cell).map(Cell::Bool),
        BigQueryType::Int64 => to_i64(&cell).map(Cell::I64),
        BigQueryType::Float64 => to_f64(&cell).map(Cell::F64),
        BigQueryType::Numeric | BigQueryType::BigNumeric => to_decimal(&cell).map(Cell::Numeric),
        BigQueryType::Bytes => match cell {
            Cell::Bytes(value) => Some(Cell::Bytes(value)),
            Cell::String(value) => Some(Cell::Bytes(value.into_bytes())),
            _ => None,
        },
        BigQueryType::Date => match &cell {
            Cell::Date(_) => Some(cell.clone()),
            Cell::Timestamp(value) => Some(Cell::Date(value.date())),
            Cell::TimestampTz(value) => Some(Cell::Date(value.date_naive())),
            Cell::String(_) => parse_timestamp(&cell).map(|value| Cell::Date(value.date_naive())),
            _ => None,
        },
        BigQueryType::Time => match &cell {
            Cell::Time(_) => Some(cell.clone()),
            Cell::Timestamp(value) => Some(Cell::Time(value.time())),
            Cell::TimestampTz(value) => Some(Cell::Time(value.time())),
            Cell::String(value) => NaiveTime::from_str(value.trim()).ok().map(Cell::Time),
            _ => None,
        },
        BigQueryType::Datetime => match &cell {
            Cell::Timestamp(_) => Some(cell.clone()),
            Cell::TimestampTz(value) => Some(Cell::Timestamp(value.naive_utc())),
            Cell::Date(value) => Some(Cell::Timestamp(value.and_time(NaiveTime::MIN))),
            Cell::String(_) => {
                parse_timestamp(&cell).map(|value| Cell::Timestamp(value.naive_utc()))
            }
            _ => None,
        },
        BigQueryType::Timestamp => match &cell {
            Cell::TimestampTz(_) => Some(cell.clone()),
            Cell::Timestamp(value) => Some(Cell::TimestampTz(Utc.from_utc_datetime(value))),
            Cell::Date(_) | Cell::String(_) => parse_timestamp(&cell).map(Cell::TimestampTz),
            _ => None,
        },
        BigQueryType::Json => Some(match cell {
            Cell::Json(value) => Cell::Json(value),
            Cell::String(value) => match serde_json::from_str(&value) {
                Ok(json) => Cell::Json(json),
                Err(_) => Cell::Json(serde_json::Value::String(value)),
            },
            other => Cell::Json(serde_json::Value::String(other.to_string())),
        }),
    };

    coerced.ok_or_else(|| {
        etl_error!(
            ErrorKind::UnsupportedValueInDestination,
            "Value does not fit the destination column type",
            format!("cannot load a {source_type} value into a {typ} column")
        )
    })
}

fn to_bool(cell: &Cell) -> Option<bool> {
    match cell {
        Cell::Bool(value) => Some(*value),
        Cell::I64(0) | Cell::U64(0) => Some(false),
        Cell::I64(1) | Cell::U64(1) => Some(true),
        Cell::String(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::I64(value) => Some(*value),
        Cell::U64(value) => i64::try_from(*value).ok(),
        Cell::Bool(value) => Some(i64::from(*value)),
        Cell::F64(value) if value.fract() == 0.0 => {
            let value = *value;
            (value >= i64::MIN as f64 && value < i64::MAX as f64).then_some(value as i64)
        }
        Cell::Numeric(value) if value.is_integer() => value.to_i64(),
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::F64(value) => Some(*value),
        Cell::I64(value) => Some(*value as f64),
        Cell::U64(value) => Some(*value as f64),
        Cell::Bool(value) => Some(f64::from(u8::from(*value))),
        Cell::Numeric(value) => value.to_f64(),
        Cell::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn to_decimal(cell: &Cell) -> Option<BigDecimal> {
    match cell {
        Cell::Numeric(value) => Some(value.clone()),
        Cell::I64(value) => Some(BigDecimal::from(*value)),
        Cell::U64(value) => Some(BigDecimal::from(*value)),
        Cell::F64(value) => BigDecimal::try_from(*value).ok(),
        Cell::String(value) => BigDecimal::from_str(value.trim()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    #[test]
    fn data_types_from_information_schema() {
        assert_eq!(
            BigQueryType::from_data_type("INT64"),
            Some(BigQueryType::Int64)
        );
        assert_eq!(
            BigQueryType::from_data_type("STRING(255)"),
            Some(BigQueryType::String)
        );
        assert_eq!(
            BigQueryType::from_data_type("NUMERIC(10, 2)"),
            Some(BigQueryType::Numeric)
        );
        assert_eq!(BigQueryType::from_data_type("ARRAY<INT64>"), None);
    }

    #[test]
    fn widening() {
        assert_eq!(
            BigQueryType::Int64.widen(BigQueryType::Float64),
            BigQueryType::Float64
        );
        assert_eq!(
            BigQueryType::Int64.widen(BigQueryType::BigNumeric),
            BigQueryType::BigNumeric
        );
        assert_eq!(
            BigQueryType::Date.widen(BigQueryType::Timestamp),
            BigQueryType::Timestamp
        );
        assert_eq!(
            BigQueryType::Bool.widen(BigQueryType::Int64),
            BigQueryType::String
        );
    }

    #[test]
    fn numbers_coerce_into_numeric_columns() {
        assert_eq!(
            coerce_cell(Cell::from("42"), BigQueryType::Int64).unwrap(),
            Cell::I64(42)
        );
        assert_eq!(
            coerce_cell(Cell::F64(3.0), BigQueryType::Int64).unwrap(),
            Cell::I64(3)
        );
        assert_eq!(
            coerce_cell(Cell::I64(2), BigQueryType::Float64).unwrap(),
            Cell::F64(2.0)
        );
        assert_eq!(
            coerce_cell(Cell::I64(7), BigQueryType::BigNumeric).unwrap(),
            Cell::Numeric(BigDecimal::from(7))
        );
    }

    #[test]
    fn naive_timestamps_are_loaded_as_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 15, 30)
            .unwrap();

        let coerced = coerce_cell(Cell::Timestamp(naive), BigQueryType::Timestamp).unwrap();

        assert_eq!(coerced, Cell::TimestampTz(Utc.from_utc_datetime(&naive)));
    }

    #[test]
    fn strings_take_any_value() {
        let naive = NaiveDateTime::parse_from_str("2024-03-01 10:15:30", "%Y-%m-%d %H:%M:%S")
            .unwrap();

        assert_eq!(
            coerce_cell(Cell::Timestamp(naive), BigQueryType::String).unwrap(),
            Cell::from("2024-03-01 10:15:30")
        );
        assert_eq!(
            coerce_cell(Cell::I64(5), BigQueryType::String).unwrap(),
            Cell::from("5")
        );
    }

    #[test]
    fn unrepresentable_values_are_rejected() {
        let err = coerce_cell(Cell::from("abc"), BigQueryType::Int64).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedValueInDestination);
        assert_eq!(
            coerce_cell(Cell::Null, BigQueryType::Int64).unwrap(),
            Cell::Null
        );
    }
}
