//! Column-level rules applied to an extracted batch before it is loaded.
//!
//! Every rule is a no-op when the columns it reads are absent and turns malformed values into
//! nulls instead of failing. The only failure is a structurally broken batch.

mod dates;
mod numeric;
mod text;

use tracing::debug;

use crate::error::EtlResult;
use crate::types::{RowBatch, Transformation};

pub use dates::parse_timestamp;
pub use numeric::Number;

/// Column read by [`Transformation::CleanEmails`].
pub const EMAIL_COLUMN: &str = "email";
/// Columns read by [`Transformation::CalculateTotals`].
pub const QUANTITY_COLUMN: &str = "quantity";
pub const UNIT_PRICE_COLUMN: &str = "unit_price";
/// Column written by [`Transformation::CalculateTotals`] and read by
/// [`Transformation::CategorizeOrders`].
pub const TOTAL_AMOUNT_COLUMN: &str = "total_amount";
/// Column written by [`Transformation::CategorizeOrders`].
pub const ORDER_SIZE_COLUMN: &str = "order_size";
/// Column read by [`Transformation::StandardizeCategories`].
pub const CATEGORY_COLUMN: &str = "category";
/// Column read by [`Transformation::FormatPrices`].
pub const PRICE_COLUMN: &str = "price";

/// Applies `transformations` to `batch` in order.
///
/// An empty batch is returned untouched.
pub fn transform(mut batch: RowBatch, transformations: &[Transformation]) -> EtlResult<RowBatch> {
    if batch.is_empty() {
        return Ok(batch);
    }

    batch.validate()?;

    for transformation in transformations {
        apply(&mut batch, *transformation);
        debug!(%transformation, rows = batch.len(), "applied transformation");
    }

    Ok(batch)
}

/// Applies a single rule.
pub fn apply(batch: &mut RowBatch, transformation: Transformation) {
    match transformation {
        Transformation::CleanEmails => text::clean_emails(batch),
        Transformation::StandardizeDates => dates::standardize_dates(batch),
        Transformation::CalculateTotals => numeric::calculate_totals(batch),
        Transformation::CategorizeOrders => numeric::categorize_orders(batch),
        Transformation::StandardizeCategories => text::standardize_categories(batch),
        Transformation::FormatPrices => numeric::format_prices(batch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{Cell, TableRow};

    const ALL: [Transformation; 6] = [
        Transformation::CleanEmails,
        Transformation::StandardizeDates,
        Transformation::CalculateTotals,
        Transformation::CategorizeOrders,
        Transformation::StandardizeCategories,
        Transformation::FormatPrices,
    ];

    #[test]
    fn rules_without_their_columns_leave_batch_unchanged() {
        let batch = RowBatch::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                TableRow::new(vec![Cell::I64(1), Cell::from(" Ada ")]),
                TableRow::new(vec![Cell::I64(2), Cell::Null]),
            ],
        );

        let transformed = transform(batch.clone(), &ALL).unwrap();

        assert_eq!(transformed, batch);
    }

    #[test]
    fn empty_batch_is_returned_unchanged() {
        let batch = RowBatch::new(vec!["quantity".into(), "unit_price".into()], vec![]);

        let transformed = transform(batch.clone(), &ALL).unwrap();

        assert_eq!(transformed, batch);
        assert!(!transformed.has_column(TOTAL_AMOUNT_COLUMN));
    }

    #[test]
    fn later_rules_see_columns_added_by_earlier_ones() {
        let batch = RowBatch::new(
            vec!["order_id".into(), "quantity".into(), "unit_price".into()],
            vec![
                TableRow::new(vec![Cell::I64(6), Cell::I64(2), Cell::I64(25)]),
                TableRow::new(vec![Cell::I64(7), Cell::I64(3), Cell::F64(80.5)]),
            ],
        );

        let transformed = transform(
            batch,
            &[
                Transformation::CalculateTotals,
                Transformation::CategorizeOrders,
            ],
        )
        .unwrap();

        let total = transformed.column_index(TOTAL_AMOUNT_COLUMN).unwrap();
        let size = transformed.column_index(ORDER_SIZE_COLUMN).unwrap();
        assert_eq!(transformed.cell(0, total), Some(&Cell::I64(50)));
        assert_eq!(transformed.cell(0, size), Some(&Cell::from("Small")));
        assert_eq!(transformed.cell(1, total), Some(&Cell::F64(241.5)));
        assert_eq!(transformed.cell(1, size), Some(&Cell::from("Large")));
    }

    #[test]
    fn order_of_rules_matters() {
        let batch = RowBatch::new(
            vec!["quantity".into(), "unit_price".into()],
            vec![TableRow::new(vec![Cell::I64(1), Cell::I64(10)])],
        );

        let transformed = transform(
            batch,
            &[
                Transformation::CategorizeOrders,
                Transformation::CalculateTotals,
            ],
        )
        .unwrap();

        assert!(!transformed.has_column(ORDER_SIZE_COLUMN));
        assert!(transformed.has_column(TOTAL_AMOUNT_COLUMN));
    }

    #[test]
    fn ragged_batch_is_a_structural_error() {
        let batch = RowBatch::new(
            vec!["email".into(), "id".into()],
            vec![TableRow::new(vec![Cell::from("A@B.COM")])],
        );

        let err = transform(batch, &[Transformation::CleanEmails]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
