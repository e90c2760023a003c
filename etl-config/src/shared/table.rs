use std::fmt;

use serde::{Deserialize, Serialize};

/// A named column-level rule applied to an extracted batch.
///
/// The set is closed: an unknown name fails configuration deserialization instead of being
/// skipped at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformation {
    /// Lowercases and trims `email`.
    CleanEmails,
    /// Parses every column whose name contains `date`, `created` or `updated`.
    StandardizeDates,
    /// Adds `total_amount = quantity * unit_price`.
    CalculateTotals,
    /// Adds `order_size` from `total_amount`.
    CategorizeOrders,
    /// Trims and title-cases `category`.
    StandardizeCategories,
    /// Coerces `price` to a number rounded to two decimals.
    FormatPrices,
}

impl Transformation {
    /// Returns the configuration name of the rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transformation::CleanEmails => "clean_emails",
            Transformation::StandardizeDates => "standardize_dates",
            Transformation::CalculateTotals => "calculate_totals",
            Transformation::CategorizeOrders => "categorize_orders",
            Transformation::StandardizeCategories => "standardize_categories",
            Transformation::FormatPrices => "format_prices",
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of one table moved by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TableSpec {
    /// Table read from the source database.
    pub source_table: String,
    /// Table appended to in the destination dataset.
    pub destination_table: String,
    /// Monotonic integer column bounding incremental extraction.
    pub primary_key: String,
    /// When `false` the table is fully extracted on every run and has no watermark.
    pub incremental: bool,
    /// Rules applied in order; later rules may read columns added by earlier ones.
    #[serde(default)]
    pub transformations: Vec<Transformation>,
}

impl TableSpec {
    pub fn new(
        source_table: impl Into<String>,
        destination_table: impl Into<String>,
        primary_key: impl Into<String>,
        incremental: bool,
        transformations: Vec<Transformation>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            destination_table: destination_table.into(),
            primary_key: primary_key.into(),
            incremental,
            transformations,
        }
    }

    /// Name under which the table's watermark is stored.
    pub fn watermark_key(&self) -> &str {
        &self.source_table
    }
}

/// The built-in table registry used when the configuration lists no tables.
pub fn default_tables() -> Vec<TableSpec> {
    vec![
        TableSpec::new(
            "users",
            "users",
            "user_id",
            true,
            vec![
                Transformation::CleanEmails,
                Transformation::StandardizeDates,
            ],
        ),
        TableSpec::new(
            "orders",
            "orders",
            "order_id",
            true,
            vec![
                Transformation::CalculateTotals,
                Transformation::CategorizeOrders,
            ],
        ),
        TableSpec::new(
            "products",
            "products",
            "product_id",
            false,
            vec![
                Transformation::StandardizeCategories,
                Transformation::FormatPrices,
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_expected_tables() {
        let tables = default_tables();
        let names: Vec<_> = tables.iter().map(|t| t.source_table.as_str()).collect();

        assert_eq!(names, ["users", "orders", "products"]);
        for table in &tables {
            assert_eq!(table.source_table, table.destination_table);
            assert!(!table.primary_key.is_empty());
            assert!(!table.transformations.is_empty());
        }
    }

    #[test]
    fn default_registry_incremental_flags() {
        let tables = default_tables();

        assert!(tables[0].incremental);
        assert_eq!(tables[0].primary_key, "user_id");
        assert!(tables[1].incremental);
        assert_eq!(tables[1].primary_key, "order_id");
        assert!(!tables[2].incremental);
        assert_eq!(tables[2].primary_key, "product_id");
    }

    #[test]
    fn transformation_names_round_trip_through_serde() {
        let spec: TableSpec = serde_json::from_str(
            r#"{
                "source_table": "orders",
                "destination_table": "orders_v2",
                "primary_key": "order_id",
                "incremental": true,
                "transformations": ["calculate_totals", "categorize_orders"]
            }"#,
        )
        .unwrap();

        assert_eq!(
            spec.transformations,
            [
                Transformation::CalculateTotals,
                Transformation::CategorizeOrders
            ]
        );
        assert_eq!(spec.transformations[1].to_string(), "categorize_orders");
    }

    #[test]
    fn unknown_transformation_is_rejected() {
        let result = serde_json::from_str::<TableSpec>(
            r#"{
                "source_table": "orders",
                "destination_table": "orders",
                "primary_key": "order_id",
                "incremental": true,
                "transformations": ["explode"]
            }"#,
        );

        assert!(result.is_err());
    }
}
