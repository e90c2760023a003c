use std::sync::Once;

use etl_config::Environment;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global subscriber for `app_name`.
///
/// Logs are human readable in development and JSON in production. `RUST_LOG` overrides the
/// default filter, which logs `app_name` and the `etl` crate at `info`.
pub fn init_tracing(app_name: &str, environment: Environment) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(app_name)));
    let registry = tracing_subscriber::registry().with(filter);

    match environment {
        Environment::Prod => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()?,
        Environment::Dev => registry.with(fmt::layer().with_target(true)).try_init()?,
    }

    ::tracing::info!(app_name, %environment, "tracing initialized");

    Ok(())
}

fn default_filter(app_name: &str) -> String {
    format!("{}=info,etl=info", app_name.replace('-', "_"))
}

/// Installs a subscriber writing to the test harness output. Safe to call from every test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("etl=debug,etl_replicator=debug"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_uses_crate_target_names() {
        assert_eq!(
            default_filter("etl-replicator"),
            "etl_replicator=info,etl=info"
        );
    }
}
