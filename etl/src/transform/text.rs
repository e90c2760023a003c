use crate::transform::{CATEGORY_COLUMN, EMAIL_COLUMN};
use crate::types::{Cell, RowBatch};

/// Lowercases and trims `email`. Non-text values become null.
pub(super) fn clean_emails(batch: &mut RowBatch) {
    let Some(index) = batch.column_index(EMAIL_COLUMN) else {
        return;
    };

    batch.map_column(index, |cell| match cell {
        Cell::String(value) => Cell::String(value.to_lowercase().trim().to_owned()),
        _ => Cell::Null,
    });
}

/// Title-cases and trims `category`. Non-text values become null.
pub(super) fn standardize_categories(batch: &mut RowBatch) {
    let Some(index) = batch.column_index(CATEGORY_COLUMN) else {
        return;
    };

    batch.map_column(index, |cell| match cell {
        Cell::String(value) => Cell::String(title_case(&value).trim().to_owned()),
        _ => Cell::Null,
    });
}

/// Uppercases the first letter of every run of letters and lowercases the rest.
///
/// Any non-letter starts a new word, so `"o'neil"` becomes `"O'Neil"` and `"3d"` becomes `"3D"`.
fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut in_word = false;

    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }

    result
}
