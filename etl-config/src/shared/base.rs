use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No table is configured.
    #[error("`pipeline.tables` cannot be empty")]
    NoTables,
    /// A table entry has an empty name field.
    #[error("table #{index}: `{field}` cannot be empty")]
    EmptyTableField { index: usize, field: &'static str },
    /// Two entries read the same source table, so they would share a watermark.
    #[error("source table `{0}` is configured more than once")]
    DuplicateSourceTable(String),
    /// Secret Manager lookups need a project.
    #[error("`secrets.gcp_project_id` is required in the {0} environment")]
    MissingSecretsProject(&'static str),
    /// The HTTP trigger port is zero.
    #[error("`server.port` cannot be zero")]
    ServerPortZero,
}
