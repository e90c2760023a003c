use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::types::{Cell, RowBatch};

/// Substrings marking a column as holding dates.
const DATE_COLUMN_MARKERS: [&str; 3] = ["date", "created", "updated"];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Normalizes every date-like column to UTC timestamps. Unparsable values become null.
pub(super) fn standardize_dates(batch: &mut RowBatch) {
    let indexes: Vec<usize> = batch
        .column_names()
        .iter()
        .enumerate()
        .filter(|(_, name)| is_date_column(name))
        .map(|(index, _)| index)
        .collect();

    for index in indexes {
        batch.map_column(index, |cell| {
            parse_timestamp(&cell).map_or(Cell::Null, Cell::TimestampTz)
        });
    }
}

fn is_date_column(name: &str) -> bool {
    let name = name.to_lowercase();
    DATE_COLUMN_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

/// Interprets a value as a point in time. Naive values are taken as UTC.
pub fn parse_timestamp(cell: &Cell) -> Option<DateTime<Utc>> {
    match cell {
        Cell::TimestampTz(value) => Some(*value),
        Cell::Timestamp(value) => Some(value.and_utc()),
        Cell::Date(value) => Some(value.and_time(NaiveTime::MIN).and_utc()),
        Cell::String(value) => parse_timestamp_str(value.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(parsed.and_utc());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::TableRow;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Cell {
        Cell::TimestampTz(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap())
    }

    #[test]
    fn date_like_columns_are_parsed() {
        let mut batch = RowBatch::new(
            vec![
                "signup_date".into(),
                "Created_At".into(),
                "last_updated".into(),
                "name".into(),
            ],
            vec![TableRow::new(vec![
                Cell::from("2024-03-01"),
                Cell::from("2024-03-01T10:15:00+02:00"),
                Cell::Timestamp(
                    NaiveDate::from_ymd_opt(2024, 3, 2)
                        .unwrap()
                        .and_hms_opt(8, 0, 0)
                        .unwrap(),
                ),
                Cell::from("2024-03-01"),
            ])],
        );

        standardize_dates(&mut batch);

        assert_eq!(batch.cell(0, 0), Some(&utc(2024, 3, 1, 0, 0, 0)));
        assert_eq!(batch.cell(0, 1), Some(&utc(2024, 3, 1, 8, 15, 0)));
        assert_eq!(batch.cell(0, 2), Some(&utc(2024, 3, 2, 8, 0, 0)));
        assert_eq!(batch.cell(0, 3), Some(&Cell::from("2024-03-01")));
    }

    #[test]
    fn unparsable_values_become_null() {
        let mut batch = RowBatch::new(
            vec!["created_at".into()],
            vec![
                TableRow::new(vec![Cell::from("not a date")]),
                TableRow::new(vec![Cell::from("")]),
                TableRow::new(vec![Cell::I64(20240301)]),
                TableRow::new(vec![Cell::Null]),
                TableRow::new(vec![Cell::from("2024-02-30")]),
            ],
        );

        standardize_dates(&mut batch);

        assert!(batch.rows().iter().all(|row| row.values()[0].is_null()));
    }

    #[test]
    fn common_text_formats_are_accepted() {
        for (input, expected) in [
            ("2024-03-01 10:15:30", utc(2024, 3, 1, 10, 15, 30)),
            ("2024-03-01 10:15:30.250", {
                let base = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap();
                Cell::TimestampTz(base + chrono::Duration::milliseconds(250))
            }),
            ("2024/03/01", utc(2024, 3, 1, 0, 0, 0)),
            ("03/01/2024", utc(2024, 3, 1, 0, 0, 0)),
            (" 2024-03-01T10:15:30Z ", utc(2024, 3, 1, 10, 15, 30)),
        ] {
            let parsed = parse_timestamp(&Cell::from(input)).map(Cell::TimestampTz);
            assert_eq!(parsed, Some(expected), "input {input:?}");
        }
    }
}
