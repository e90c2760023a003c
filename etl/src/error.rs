//! Error types and result definitions for pipeline operations.
//!
//! [`EtlError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, the originating error and the call site. Several errors can be aggregated
//! into one, which is how a run that skipped failing tables reports all of them.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use etl_config::provider::ConfigProviderError;

/// Result type used throughout the crate.
pub type EtlResult<T> = Result<T, EtlError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the pipeline.
#[derive(Debug, Clone)]
pub struct EtlError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors of several tables collected by a run that continued past failures.
    Many {
        errors: Vec<EtlError>,
        location: &'static Location<'static>,
    },
}

/// Classification of pipeline errors.
///
/// Connection kinds abort a run before any table is touched, query and data kinds fail the
/// table being processed, watermark kinds are logged and never abort.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connections
    SourceConnectionFailed,
    DestinationConnectionFailed,
    AuthenticationError,

    // Queries
    SourceQueryFailed,
    DestinationQueryFailed,
    DestinationTableNameInvalid,

    // Data
    ConversionError,
    InvalidData,
    UnsupportedValueInDestination,

    // Watermarks
    WatermarkReadFailed,
    WatermarkWriteFailed,
    WatermarkTableFailed,

    // Configuration
    ConfigError,
    MissingSecret,

    // I/O and serialization
    IoError,
    DestinationIoError,
    DeserializationError,

    DestinationError,

    Unknown,
}

impl EtlError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description, or `None` for aggregated errors.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the dynamic detail, or the first detail found among aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, if this error is an aggregate.
    pub fn errors(&self) -> Option<&[EtlError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the backtrace captured on construction.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the call site that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error. Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        EtlError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        EtlError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for EtlError {
    fn eq(&self, other: &EtlError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for EtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail:", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_indented(f, "Backtrace:", &backtrace)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

/// Writes `body` under `heading`, indented by one level.
fn write_indented(f: &mut fmt::Formatter<'_>, heading: &str, body: &str) -> fmt::Result {
    if body.trim().is_empty() {
        return write!(f, "\n  {heading} <empty>");
    }

    write!(f, "\n  {heading}")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for EtlError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for EtlError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for EtlError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> EtlError {
        EtlError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for EtlError
where
    E: Into<EtlError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> EtlError {
        let location = Location::caller();
        let mut errors: Vec<EtlError> = errors.into_iter().map(Into::into).collect();

        match errors.len() {
            1 => errors.remove(0),
            _ => EtlError {
                repr: ErrorRepr::Many { errors, location },
            },
        }
    }
}

impl From<std::io::Error> for EtlError {
    #[track_caller]
    fn from(err: std::io::Error) -> EtlError {
        EtlError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for EtlError {
    #[track_caller]
    fn from(err: serde_json::Error) -> EtlError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<chrono::ParseError> for EtlError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> EtlError {
        EtlError::wrap(ErrorKind::ConversionError, "Datetime parsing failed", err)
    }
}

/// Maps MySQL driver errors. Pool failures are connection failures, everything else is a
/// failed source query.
impl From<sqlx::Error> for EtlError {
    #[track_caller]
    fn from(err: sqlx::Error) -> EtlError {
        let (kind, description) = match &err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                (ErrorKind::SourceConnectionFailed, "MySQL connection failed")
            }
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => (
                ErrorKind::SourceConnectionFailed,
                "MySQL connection pool unavailable",
            ),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                (ErrorKind::ConversionError, "MySQL value decoding failed")
            }
            _ => (ErrorKind::SourceQueryFailed, "MySQL query failed"),
        };

        EtlError::wrap(kind, description, err)
    }
}

impl From<ConfigProviderError> for EtlError {
    #[track_caller]
    fn from(err: ConfigProviderError) -> EtlError {
        let (kind, description) = match &err {
            ConfigProviderError::Missing(_) => {
                (ErrorKind::MissingSecret, "Required configuration value missing")
            }
            ConfigProviderError::InvalidValue { .. }
            | ConfigProviderError::MalformedPayload { .. } => {
                (ErrorKind::ConfigError, "Invalid configuration value")
            }
            ConfigProviderError::Request { .. } | ConfigProviderError::Token(_) => {
                (ErrorKind::ConfigError, "Secret retrieval failed")
            }
        };

        EtlError::wrap(kind, description, err)
    }
}

#[cfg(feature = "bigquery")]
impl From<gcp_bigquery_client::error::BQError> for EtlError {
    #[track_caller]
    fn from(err: gcp_bigquery_client::error::BQError) -> EtlError {
        use gcp_bigquery_client::error::BQError;

        let (kind, description) = match &err {
            BQError::InvalidServiceAccountKey(_) | BQError::NoToken => (
                ErrorKind::AuthenticationError,
                "BigQuery authentication failed",
            ),
            BQError::RequestError(_) | BQError::TonicTransportError(_) => {
                (ErrorKind::DestinationIoError, "BigQuery request failed")
            }
            BQError::ResponseError { .. } | BQError::TonicStatusError(_) => {
                (ErrorKind::DestinationQueryFailed, "BigQuery returned an error")
            }
            _ => (ErrorKind::DestinationError, "BigQuery operation failed"),
        };

        EtlError::wrap(kind, description, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, etl_error};

    #[test]
    fn single_error_keeps_kind_and_detail() {
        let err = etl_error!(ErrorKind::InvalidData, "Bad batch", "row 3 has 2 values");

        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(err.description(), Some("Bad batch"));
        assert_eq!(err.detail(), Some("row 3 has 2 values"));
        assert!(err.to_string().starts_with("[InvalidData] Bad batch @"));
    }

    #[test]
    fn aggregating_one_error_returns_it_unwrapped() {
        let err = EtlError::from(vec![etl_error!(
            ErrorKind::SourceQueryFailed,
            "Query failed"
        )]);

        assert!(err.errors().is_none());
        assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    }

    #[test]
    fn aggregated_errors_expose_all_kinds() {
        let err = EtlError::from(vec![
            etl_error!(ErrorKind::SourceQueryFailed, "Query failed"),
            etl_error!(ErrorKind::DestinationQueryFailed, "Append failed"),
        ]);

        assert_eq!(
            err.kinds(),
            [ErrorKind::SourceQueryFailed, ErrorKind::DestinationQueryFailed]
        );
        assert_eq!(err.errors().map(<[_]>::len), Some(2));
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn source_is_exposed() {
        let io = std::io::Error::other("disk gone");
        let err = etl_error!(ErrorKind::IoError, "Write failed", source: io);

        let source = error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk gone");
    }

    #[test]
    fn missing_secret_maps_to_its_own_kind() {
        let err = EtlError::from(ConfigProviderError::Missing(
            etl_config::provider::ConfigKey::MysqlHost,
        ));

        assert_eq!(err.kind(), ErrorKind::MissingSecret);
        assert!(err.detail().unwrap().contains("MYSQL_HOST"));
    }

    #[test]
    fn bail_returns_early() {
        fn check(value: i64) -> EtlResult<i64> {
            if value < 0 {
                bail!(ErrorKind::InvalidData, "Negative value", value);
            }
            Ok(value)
        }

        assert_eq!(check(1).unwrap(), 1);
        assert_eq!(check(-1).unwrap_err().kind(), ErrorKind::InvalidData);
    }
}
