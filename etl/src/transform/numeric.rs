use std::cmp::Ordering;

use bigdecimal::{BigDecimal, ToPrimitive};

use crate::transform::{
    ORDER_SIZE_COLUMN, PRICE_COLUMN, QUANTITY_COLUMN, TOTAL_AMOUNT_COLUMN, UNIT_PRICE_COLUMN,
};
use crate::types::{Cell, RowBatch};

/// Upper bound (inclusive) of a small order.
const SMALL_ORDER_MAX: i64 = 50;
/// Upper bound (inclusive) of a medium order.
const MEDIUM_ORDER_MAX: i64 = 200;

/// A numeric view of a [`Cell`].
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int(i64),
    Decimal(BigDecimal),
    Float(f64),
}

impl Number {
    /// Reads a number from a cell, parsing text. Returns `None` for nulls and non-numbers.
    pub fn from_cell(cell: &Cell) -> Option<Number> {
        match cell {
            Cell::I64(value) => Some(Number::Int(*value)),
            Cell::U64(value) => Some(match i64::try_from(*value) {
                Ok(value) => Number::Int(value),
                Err(_) => Number::Decimal(BigDecimal::from(*value)),
            }),
            Cell::F64(value) => Some(Number::Float(*value)),
            Cell::Numeric(value) => Some(Number::Decimal(value.clone())),
            Cell::Bool(value) => Some(Number::Int(i64::from(*value))),
            Cell::String(value) => Self::parse(value.trim()),
            _ => None,
        }
    }

    fn parse(value: &str) -> Option<Number> {
        if let Ok(value) = value.parse::<i64>() {
            return Some(Number::Int(value));
        }

        value
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Number::Float)
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Number::Int(value) => Some(*value as f64),
            Number::Decimal(value) => value.to_f64(),
            Number::Float(value) => Some(*value),
        }
    }

    fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Number::Int(value) => Some(BigDecimal::from(*value)),
            Number::Decimal(value) => Some(value.clone()),
            Number::Float(value) => BigDecimal::try_from(*value).ok(),
        }
    }

    /// Multiplies two numbers, staying exact for integers and decimals.
    pub fn multiply(&self, other: &Number) -> Option<Number> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(match a.checked_mul(*b) {
                Some(product) => Number::Int(product),
                None => Number::Decimal(BigDecimal::from(*a) * BigDecimal::from(*b)),
            }),
            (Number::Float(_), _) | (_, Number::Float(_)) => {
                Some(Number::Float(self.to_f64()? * other.to_f64()?))
            }
            _ => Some(Number::Decimal(self.to_decimal()? * other.to_decimal()?)),
        }
    }

    /// Compares against an integer threshold. `None` for NaN.
    pub fn cmp_i64(&self, threshold: i64) -> Option<Ordering> {
        match self {
            Number::Int(value) => Some(value.cmp(&threshold)),
            Number::Decimal(value) => Some(value.cmp(&BigDecimal::from(threshold))),
            Number::Float(value) => value.partial_cmp(&(threshold as f64)),
        }
    }

    pub fn into_cell(self) -> Cell {
        match self {
            Number::Int(value) => Cell::I64(value),
            Number::Decimal(value) => Cell::Numeric(value),
            Number::Float(value) => Cell::F64(value),
        }
    }
}

/// Adds `total_amount = quantity * unit_price` when both inputs exist.
pub(super) fn calculate_totals(batch: &mut RowBatch) {
    let (Some(quantity), Some(unit_price)) = (
        batch.column_index(QUANTITY_COLUMN),
        batch.column_index(UNIT_PRICE_COLUMN),
    ) else {
        return;
    };

    let total = batch.ensure_column(TOTAL_AMOUNT_COLUMN);
    for row in batch.rows_mut() {
        let values = row.values_mut();
        let product = Number::from_cell(&values[quantity])
            .zip(Number::from_cell(&values[unit_price]))
            .and_then(|(quantity, unit_price)| quantity.multiply(&unit_price));
        values[total] = product.map_or(Cell::Null, Number::into_cell);
    }
}

/// Adds `order_size` bucketed from `total_amount`.
pub(super) fn categorize_orders(batch: &mut RowBatch) {
    let Some(total) = batch.column_index(TOTAL_AMOUNT_COLUMN) else {
        return;
    };

    let size = batch.ensure_column(ORDER_SIZE_COLUMN);
    for row in batch.rows_mut() {
        let values = row.values_mut();
        values[size] = Number::from_cell(&values[total])
            .and_then(|amount| order_size(&amount))
            .map_or(Cell::Null, Cell::from);
    }
}

/// Buckets an order total: up to 50 is small, up to 200 medium, anything above large.
fn order_size(amount: &Number) -> Option<&'static str> {
    if amount.cmp_i64(SMALL_ORDER_MAX)? != Ordering::Greater {
        Some("Small")
    } else if amount.cmp_i64(MEDIUM_ORDER_MAX)? != Ordering::Greater {
        Some("Medium")
    } else {
        Some("Large")
    }
}

/// Coerces `price` to a number rounded to two decimals. Non-numeric values become null.
pub(super) fn format_prices(batch: &mut RowBatch) {
    let Some(index) = batch.column_index(PRICE_COLUMN) else {
        return;
    };

    batch.map_column(index, |cell| match Number::from_cell(&cell) {
        Some(Number::Int(value)) => Cell::I64(value),
        Some(number) => number
            .to_f64()
            .map_or(Cell::Null, |value| Cell::F64(round_cents(value))),
        None => Cell::Null,
    });
}

/// Rounds half to even at two decimals.
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
