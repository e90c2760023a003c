use chrono::{DateTime, Utc};

/// Persisted progress of an incremental table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub table_name: String,
    /// Highest primary key already loaded.
    pub last_processed_id: i64,
    /// Set when the row is first inserted, never changed afterwards.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every write.
    pub updated_at: DateTime<Utc>,
}
