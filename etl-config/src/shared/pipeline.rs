use std::collections::HashSet;

use serde::Deserialize;

use crate::shared::base::ValidationError;
use crate::shared::table::{TableSpec, default_tables};

/// What the orchestrator does when one table fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableErrorPolicy {
    /// Stop at the first failing table; later tables are not processed.
    #[default]
    Abort,
    /// Log the failure, process the remaining tables and report failure at the end.
    Continue,
}

/// Pipeline level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Tables processed in order.
    #[serde(default = "default_tables")]
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub table_error_policy: TableErrorPolicy,
}

impl PipelineConfig {
    /// Checks that every table is fully named and reads a distinct source table.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        let mut source_tables = HashSet::new();
        for (index, table) in self.tables.iter().enumerate() {
            for (field, value) in [
                ("source_table", &table.source_table),
                ("destination_table", &table.destination_table),
                ("primary_key", &table.primary_key),
            ] {
                if value.trim().is_empty() {
                    return Err(ValidationError::EmptyTableField { index, field });
                }
            }

            if !source_tables.insert(table.source_table.as_str()) {
                return Err(ValidationError::DuplicateSourceTable(
                    table.source_table.clone(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            table_error_policy: TableErrorPolicy::default(),
        }
    }
}
