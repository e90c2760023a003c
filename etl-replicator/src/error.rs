use etl::error::EtlError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for replicator operations.
pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Backtrace captured when a non-pipeline error is created.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    /// Captures a new backtrace for an error variant.
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    /// Renders the wrapped backtrace for debugging output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type of the replicator binary.
///
/// Pipeline failures keep their [`EtlError`]; problems that happen before a pipeline could
/// start are configuration or I/O errors.
#[derive(Debug)]
pub enum ReplicatorError {
    /// The pipeline, or one of its connections, failed.
    Etl(EtlError),
    /// Configuration could not be loaded, validated or resolved.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// Binding or running the HTTP server failed.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReplicatorError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            ReplicatorError::Etl(_) => "pipeline error",
            ReplicatorError::Config(_, _) => "configuration error",
            ReplicatorError::Io(_, _) => "i/o error",
        }
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReplicatorError::Etl(err) => err.backtrace(),
            ReplicatorError::Config(_, cb) => Some(&cb.0),
            ReplicatorError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error type.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReplicatorError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a multi-line report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("etl-replicator failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        if !matches!(self, ReplicatorError::Etl(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for ReplicatorError {
    /// Renders a one-line description for terminal and log output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorError::Etl(err) => write!(f, "{err}"),
            ReplicatorError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReplicatorError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReplicatorError {
    /// Returns the direct cause for this error variant.
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplicatorError::Etl(err) => err.source(),
            ReplicatorError::Config(source, _) => Some(source.as_ref()),
            ReplicatorError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ReplicatorError {
    /// Converts an I/O error into an I/O error variant.
    fn from(err: std::io::Error) -> Self {
        ReplicatorError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<EtlError> for ReplicatorError {
    /// Wraps a pipeline error without changing it.
    fn from(err: EtlError) -> Self {
        ReplicatorError::Etl(err)
    }
}

#[cfg(test)]
mod tests {
    use etl::error::ErrorKind;
    use etl_config::shared::ValidationError;

    use super::*;

    #[test]
    fn config_report_lists_category_and_message() {
        let err = ReplicatorError::config(ValidationError::NoTables);
        let report = err.render_report();

        assert!(report.contains("category: configuration error"));
        assert!(report.contains("error: configuration error: `pipeline.tables` cannot be empty"));
        assert!(report.contains("cause 1: `pipeline.tables` cannot be empty"));
    }

    #[test]
    fn pipeline_errors_keep_their_kind() {
        let err: ReplicatorError =
            EtlError::from((ErrorKind::SourceConnectionFailed, "Failed to connect to MySQL"))
                .into();

        assert_eq!(err.category(), "pipeline error");
        assert!(matches!(
            err,
            ReplicatorError::Etl(ref inner) if inner.kind() == ErrorKind::SourceConnectionFailed
        ));
    }
}
