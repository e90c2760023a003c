use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::cell::Cell;
use crate::types::table_row::TableRow;

/// The complete result set of one table's extraction, held in memory.
///
/// Rows are expected to have exactly one value per column; [`RowBatch::validate`] checks it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowBatch {
    column_names: Vec<String>,
    rows: Vec<TableRow>,
}

impl RowBatch {
    pub fn new(column_names: Vec<String>, rows: Vec<TableRow>) -> Self {
        Self { column_names, rows }
    }

    /// A batch with no rows and no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [TableRow] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<TableRow> {
        self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<TableRow>) {
        (self.column_names, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Returns the index of `name`, appending it as an all-null column when missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }

        self.column_names.push(name.to_owned());
        for row in &mut self.rows {
            row.values_mut().push(Cell::Null);
        }

        self.column_names.len() - 1
    }

    /// Returns the value at `row` and `column`.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|row| row.get(column))
    }

    /// Applies `f` to every value of the column at `index`.
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(Cell) -> Cell,
    {
        for row in &mut self.rows {
            if let Some(cell) = row.values_mut().get_mut(index) {
                let value = std::mem::replace(cell, Cell::Null);
                *cell = f(value);
            }
        }
    }

    /// Fails when a row does not have exactly one value per column.
    pub fn validate(&self) -> EtlResult<()> {
        let expected = self.column_names.len();
        for (position, row) in self.rows.iter().enumerate() {
            if row.len() != expected {
                bail!(
                    ErrorKind::InvalidData,
                    "Row does not match the batch columns",
                    format!(
                        "row {position} has {} values but the batch has {expected} columns",
                        row.len()
                    )
                );
            }
        }

        Ok(())
    }

    /// Returns the largest value of an integer column, or `None` for an empty batch.
    ///
    /// Fails when the column is missing or holds a null or non-integer value.
    pub fn max_i64(&self, column: &str) -> EtlResult<Option<i64>> {
        let Some(index) = self.column_index(column) else {
            bail!(
                ErrorKind::InvalidData,
                "Primary key column missing from batch",
                column
            );
        };

        let mut max = None;
        for row in &self.rows {
            let cell = row.get(index).unwrap_or(&Cell::Null);
            let Some(value) = cell.as_i64() else {
                bail!(
                    ErrorKind::InvalidData,
                    "Primary key value is not an integer",
                    format!("column `{column}` holds a {} value", cell.type_name())
                );
            };
            max = Some(max.map_or(value, |current: i64| current.max(value)));
        }

        Ok(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> RowBatch {
        RowBatch::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                TableRow::new(vec![Cell::I64(3), Cell::from("a")]),
                TableRow::new(vec![Cell::I64(9), Cell::from("b")]),
                TableRow::new(vec![Cell::I64(5), Cell::Null]),
            ],
        )
    }

    #[test]
    fn max_of_integer_column() {
        assert_eq!(batch().max_i64("id").unwrap(), Some(9));
        assert_eq!(RowBatch::new(vec!["id".into()], vec![]).max_i64("id").unwrap(), None);
    }

    #[test]
    fn max_of_missing_or_non_integer_column_fails() {
        assert_eq!(
            batch().max_i64("missing").unwrap_err().kind(),
            ErrorKind::InvalidData
        );
        assert_eq!(
            batch().max_i64("name").unwrap_err().kind(),
            ErrorKind::InvalidData
        );
    }

    #[test]
    fn ensure_column_appends_nulls_once() {
        let mut batch = batch();

        let index = batch.ensure_column("extra");
        assert_eq!(index, 2);
        assert_eq!(batch.ensure_column("extra"), 2);
        assert!(batch.rows().iter().all(|row| row.values()[2].is_null()));
        batch.validate().unwrap();
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let batch = RowBatch::new(
            vec!["id".to_string()],
            vec![TableRow::new(vec![Cell::I64(1), Cell::I64(2)])],
        );

        assert_eq!(batch.validate().unwrap_err().kind(), ErrorKind::InvalidData);
    }
}
