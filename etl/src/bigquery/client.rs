use std::fmt;
use std::sync::Arc;

use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::query_parameter::QueryParameter;
use gcp_bigquery_client::model::query_parameter_type::QueryParameterType;
use gcp_bigquery_client::model::query_parameter_value::QueryParameterValue;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::{QueryResponse, ResultSet};
use gcp_bigquery_client::storage::{
    BatchAppendResult, ColumnMode, FieldDescriptor, StreamName, TableBatch, TableDescriptor,
};
use tracing::{debug, error, info};

use crate::bigquery::encoding::BigQueryTableRow;
use crate::bigquery::schema::BigQueryType;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::types::TableRow;

/// Trace identifier attached to Storage Write API appends.
const ETL_TRACE_ID: &str = "mysql-bigquery-etl";

/// How long `jobs.query` waits for a job before answering without results.
const QUERY_TIMEOUT_MS: i32 = 60_000;

/// A column of an existing BigQuery table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigQueryColumn {
    pub name: String,
    /// `None` when the column has a type values are never loaded into.
    pub typ: Option<BigQueryType>,
}

/// Client for the BigQuery jobs API and the Storage Write API, bound to one project.
#[derive(Clone)]
pub struct BigQueryClient {
    project_id: String,
    client: Client,
}

impl BigQueryClient {
    /// Creates a client authenticated with the service account key file at `sa_key_file`.
    pub async fn new_with_key_path(project_id: String, sa_key_file: &str) -> EtlResult<Self> {
        let client = ClientBuilder::new()
            .build_from_service_account_key_file(sa_key_file)
            .await
            .map_err(connection_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Creates a client using Application Default Credentials.
    pub async fn new_with_adc(project_id: String) -> EtlResult<Self> {
        let client = ClientBuilder::new()
            .build_from_application_default_credentials()
            .await
            .map_err(connection_error)?;

        Ok(BigQueryClient { project_id, client })
    }

    /// Returns `` `project.dataset.table` `` with every part sanitized.
    pub fn full_table_name(&self, dataset_id: &str, table_id: &str) -> EtlResult<String> {
        let project_id = sanitize_identifier(&self.project_id, "BigQuery project id")?;
        let dataset_id = sanitize_identifier(dataset_id, "BigQuery dataset id")?;
        let table_id = sanitize_identifier(table_id, "BigQuery table id")?;

        Ok(format!("`{project_id}.{dataset_id}.{table_id}`"))
    }

    fn full_dataset_name(&self, dataset_id: &str) -> EtlResult<String> {
        let project_id = sanitize_identifier(&self.project_id, "BigQuery project id")?;
        let dataset_id = sanitize_identifier(dataset_id, "BigQuery dataset id")?;

        Ok(format!("`{project_id}.{dataset_id}`"))
    }

    /// Executes a query and returns its result set.
    ///
    /// Fails when the job is still running once the query timeout elapses, since its result
    /// set would be empty rather than final.
    pub async fn query(&self, mut request: QueryRequest) -> EtlResult<ResultSet> {
        request.timeout_ms.get_or_insert(QUERY_TIMEOUT_MS);
        let query_response = self.client.job().query(&self.project_id, request).await?;
        ensure_job_complete(&query_response)?;

        Ok(ResultSet::new_from_query_response(query_response))
    }

    /// Creates the dataset in `location` unless it already exists.
    pub async fn create_dataset_if_missing(
        &self,
        dataset_id: &str,
        location: &str,
    ) -> EtlResult<()> {
        if location.is_empty()
            || !location
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(etl_error!(
                ErrorKind::ConfigError,
                "Invalid BigQuery location",
                location
            ));
        }

        let full_dataset_name = self.full_dataset_name(dataset_id)?;
        info!(%full_dataset_name, location, "ensuring bigquery dataset exists");

        let query = format!(
            "create schema if not exists {full_dataset_name} options (location = '{location}')"
        );
        self.query(QueryRequest::new(query)).await?;

        Ok(())
    }

    /// Returns the columns of a table in ordinal order, or `None` when the table does not exist.
    pub async fn table_columns(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> EtlResult<Option<Vec<BigQueryColumn>>> {
        let full_dataset_name = self.full_dataset_name(dataset_id)?;
        let query = format!(
            "select column_name, data_type from {full_dataset_name}.INFORMATION_SCHEMA.COLUMNS \
             where table_name = @table_name order by ordinal_position"
        );
        let request = parameterized(query, vec![string_parameter("table_name", table_id)]);

        let mut result_set = self.query(request).await?;
        let mut columns = Vec::new();
        while result_set.next_row() {
            let (Some(name), Some(data_type)) = (
                result_set.get_string_by_name("column_name")?,
                result_set.get_string_by_name("data_type")?,
            ) else {
                continue;
            };

            columns.push(BigQueryColumn {
                typ: BigQueryType::from_data_type(&data_type),
                name,
            });
        }

        if columns.is_empty() {
            return Ok(None);
        }

        Ok(Some(columns))
    }

    /// Creates a table whose columns are all nullable.
    pub async fn create_table(
        &self,
        dataset_id: &str,
        table_id: &str,
        columns: &[(String, BigQueryType)],
    ) -> EtlResult<()> {
        let full_table_name = self.full_table_name(dataset_id, table_id)?;
        let columns_spec = columns
            .iter()
            .map(|(name, typ)| column_spec(name, *typ))
            .collect::<EtlResult<Vec<_>>>()?
            .join(", ");

        info!(%full_table_name, "creating table in bigquery");

        let query = format!("create table if not exists {full_table_name} ({columns_spec})");
        self.query(QueryRequest::new(query)).await?;

        Ok(())
    }

    /// Adds nullable columns to an existing table.
    pub async fn add_columns(
        &self,
        dataset_id: &str,
        table_id: &str,
        columns: &[(String, BigQueryType)],
    ) -> EtlResult<()> {
        if columns.is_empty() {
            return Ok(());
        }

        let full_table_name = self.full_table_name(dataset_id, table_id)?;
        let additions = columns
            .iter()
            .map(|(name, typ)| {
                column_spec(name, *typ).map(|spec| format!("add column if not exists {spec}"))
            })
            .collect::<EtlResult<Vec<_>>>()?
            .join(", ");

        info!(%full_table_name, added = columns.len(), "adding columns to bigquery table");

        let query = format!("alter table {full_table_name} {additions}");
        self.query(QueryRequest::new(query)).await?;

        Ok(())
    }

    /// Appends `rows` to the default stream of a table and returns how many were sent.
    ///
    /// Rows must already hold values matching `descriptor`. Any row error fails the whole append.
    pub async fn append_rows(
        &self,
        dataset_id: &str,
        table_id: &str,
        descriptor: Arc<TableDescriptor>,
        rows: Vec<TableRow>,
    ) -> EtlResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let row_count = rows.len() as u64;
        let stream_name = StreamName::new_default(
            self.project_id.clone(),
            dataset_id.to_owned(),
            table_id.to_owned(),
        );
        let rows = rows.into_iter().map(BigQueryTableRow::from).collect();
        let batch = TableBatch::new(stream_name, descriptor, rows);

        let results = self
            .client
            .storage()
            .append_table_batches_concurrent(vec![batch], 1, ETL_TRACE_ID)
            .await?;

        let mut errors = Vec::new();
        for result in results {
            if let Err(err) = process_append_result(result) {
                errors.push(err);
            }
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        debug!(dataset_id, table_id, row_count, "rows appended to bigquery");

        Ok(row_count)
    }

    /// Returns the number of rows currently in a table.
    pub async fn row_count(&self, dataset_id: &str, table_id: &str) -> EtlResult<i64> {
        let full_table_name = self.full_table_name(dataset_id, table_id)?;
        let query = format!("select count(*) as row_count from {full_table_name}");

        let mut result_set = self.query(QueryRequest::new(query)).await?;
        if !result_set.next_row() {
            return Ok(0);
        }

        Ok(result_set.get_i64_by_name("row_count")?.unwrap_or(0))
    }

    /// Builds the Storage Write API descriptor for columns in load order.
    pub fn table_descriptor(columns: &[(String, BigQueryType)]) -> TableDescriptor {
        let field_descriptors = (1..)
            .zip(columns)
            .map(|(number, (name, typ))| FieldDescriptor {
                number,
                name: name.clone(),
                typ: typ.column_type(),
                mode: ColumnMode::Nullable,
            })
            .collect();

        TableDescriptor { field_descriptors }
    }
}

impl fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Wraps a failure to build the client.
fn ensure_job_complete(response: &QueryResponse) -> EtlResult<()> {
    if response.job_complete == Some(false) {
        let job_id = response
            .job_reference
            .as_ref()
            .and_then(|reference| reference.job_id.clone())
            .unwrap_or_default();

        return Err(etl_error!(
            ErrorKind::DestinationQueryFailed,
            "BigQuery query did not complete in time",
            format!("job `{job_id}` still running after {QUERY_TIMEOUT_MS}ms")
        ));
    }

    Ok(())
}

fn connection_error(err: BQError) -> EtlError {
    etl_error!(
        ErrorKind::DestinationConnectionFailed,
        "Failed to connect to BigQuery",
        err.to_string(),
        source: err
    )
}

fn process_append_result(result: BatchAppendResult) -> EtlResult<()> {
    let mut row_errors = Vec::new();
    for response in result.responses {
        let response = response.map_err(BQError::from)?;
        row_errors.extend(response.row_errors);
    }

    if row_errors.is_empty() {
        return Ok(());
    }

    error!(
        batch_index = result.batch_index,
        error_count = row_errors.len(),
        "bigquery rejected rows"
    );

    let errors: Vec<EtlError> = row_errors
        .into_iter()
        .map(|row_error| {
            etl_error!(
                ErrorKind::DestinationError,
                "BigQuery row error",
                format!("{row_error:?}")
            )
        })
        .collect();

    Err(errors.into())
}

/// Escapes an identifier so it can be wrapped in backticks.
///
/// Rejects empty identifiers and identifiers with control characters.
pub fn sanitize_identifier(identifier: &str, context: &str) -> EtlResult<String> {
    if identifier.is_empty() {
        return Err(etl_error!(
            ErrorKind::DestinationTableNameInvalid,
            "Invalid BigQuery identifier",
            format!("{context} cannot be empty")
        ));
    }

    if identifier.chars().any(char::is_control) {
        return Err(etl_error!(
            ErrorKind::DestinationTableNameInvalid,
            "Invalid BigQuery identifier",
            format!("{context} contains control characters")
        ));
    }

    let mut escaped = String::with_capacity(identifier.len());
    for ch in identifier.chars() {
        match ch {
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }

    Ok(escaped)
}

fn column_spec(name: &str, typ: BigQueryType) -> EtlResult<String> {
    let name = sanitize_identifier(name, "BigQuery column name")?;

    Ok(format!("`{name}` {}", typ.as_sql()))
}

/// Builds a query request using named parameters.
pub fn parameterized(query: String, parameters: Vec<QueryParameter>) -> QueryRequest {
    let mut request = QueryRequest::new(query);
    request.parameter_mode = Some("NAMED".to_owned());
    request.query_parameters = Some(parameters);

    request
}

pub fn string_parameter(name: &str, value: &str) -> QueryParameter {
    scalar_parameter(name, "STRING", value.to_owned())
}

pub fn int64_parameter(name: &str, value: i64) -> QueryParameter {
    scalar_parameter(name, "INT64", value.to_string())
}

fn scalar_parameter(name: &str, typ: &str, value: String) -> QueryParameter {
    QueryParameter {
        name: Some(name.to_owned()),
        parameter_type: Some(QueryParameterType {
            array_type: None,
            struct_types: None,
            r#type: typ.to_owned(),
        }),
        parameter_value: Some(QueryParameterValue {
            array_values: None,
            struct_values: None,
            value: Some(value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use gcp_bigquery_client::storage::ColumnType;

    use super::*;

    #[test]
    fn unfinished_jobs_are_rejected() {
        let running: QueryResponse = serde_json::from_value(serde_json::json!({
            "jobComplete": false,
            "jobReference": {"projectId": "analytics", "jobId": "job_42"}
        }))
        .unwrap();
        let finished: QueryResponse =
            serde_json::from_value(serde_json::json!({"jobComplete": true})).unwrap();

        let err = ensure_job_complete(&running).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
        assert!(err.detail().unwrap().contains("job_42"));
        assert!(ensure_job_complete(&finished).is_ok());
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(sanitize_identifier("orders", "table").unwrap(), "orders");
        assert_eq!(
            sanitize_identifier("we`ird\\name", "table").unwrap(),
            "we\\`ird\\\\name"
        );
        assert_eq!(
            sanitize_identifier("", "table").unwrap_err().kind(),
            ErrorKind::DestinationTableNameInvalid
        );
        assert_eq!(
            sanitize_identifier("bad\nname", "table").unwrap_err().kind(),
            ErrorKind::DestinationTableNameInvalid
        );
    }

    #[test]
    fn column_specs_are_nullable() {
        assert_eq!(
            column_spec("total_amount", BigQueryType::Float64).unwrap(),
            "`total_amount` float64"
        );
    }

    #[test]
    fn descriptor_numbers_follow_column_order() {
        let descriptor = BigQueryClient::table_descriptor(&[
            ("id".to_owned(), BigQueryType::Int64),
            ("price".to_owned(), BigQueryType::Float64),
            ("created_at".to_owned(), BigQueryType::Timestamp),
        ]);

        let fields: Vec<_> = descriptor
            .field_descriptors
            .iter()
            .map(|field| (field.number, field.name.as_str()))
            .collect();
        assert_eq!(fields, vec![(1, "id"), (2, "price"), (3, "created_at")]);
        assert!(matches!(
            descriptor.field_descriptors[2].typ,
            ColumnType::String
        ));
    }

    #[test]
    fn named_parameters() {
        let request = parameterized(
            "select 1 where x = @table_name".to_owned(),
            vec![string_parameter("table_name", "orders"), int64_parameter("id", 7)],
        );

        assert_eq!(request.parameter_mode.as_deref(), Some("NAMED"));
        let parameters = request.query_parameters.unwrap();
        assert_eq!(
            parameters[1]
                .parameter_value
                .as_ref()
                .and_then(|value| value.value.as_deref()),
            Some("7")
        );
        assert_eq!(
            parameters[0]
                .parameter_type
                .as_ref()
                .map(|typ| typ.r#type.as_str()),
            Some("STRING")
        );
    }
}
