//! HTTP trigger for pipeline runs.

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use etl::pipeline::RunSummary;
use etl_config::Environment;
use etl_config::shared::ReplicatorConfig;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;

use crate::core::run_pipeline;
use crate::error::{ReplicatorError, ReplicatorResult};

const SUCCESS_MESSAGE: &str = "ETL pipeline completed successfully";
const FAILURE_MESSAGE: &str = "ETL pipeline failed";

/// Starts one pipeline run.
pub type PipelineRunner =
    Arc<dyn Fn() -> LocalBoxFuture<'static, ReplicatorResult<RunSummary>> + Send + Sync>;

/// Shared state of the trigger endpoints.
pub struct TriggerState {
    runner: PipelineRunner,
    run_lock: Mutex<()>,
}

impl TriggerState {
    pub fn new(runner: PipelineRunner) -> Self {
        Self {
            runner,
            run_lock: Mutex::new(()),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunResponse {
    status: &'static str,
    message: String,
}

/// Runs the pipeline and waits for it to finish.
///
/// Requests that arrive while a run is in progress wait for it instead of starting a second
/// run against the same watermarks.
#[get("/")]
async fn trigger_pipeline(state: web::Data<TriggerState>) -> impl Responder {
    let _guard = state.run_lock.lock().await;
    info!("pipeline run triggered over http");

    match (state.runner)().await {
        Ok(summary) => {
            info!(
                tables = summary.tables.len(),
                rows_loaded = summary.rows_loaded(),
                "http triggered run succeeded"
            );
            HttpResponse::Ok().json(RunResponse {
                status: "success",
                message: SUCCESS_MESSAGE.to_string(),
            })
        }
        Err(err) => {
            error!(error = %err, category = err.category(), "http triggered run failed");
            let message = match err {
                ReplicatorError::Etl(_) => FAILURE_MESSAGE.to_string(),
                other => other.to_string(),
            };
            HttpResponse::InternalServerError().json(RunResponse {
                status: "error",
                message,
            })
        }
    }
}

#[get("/health_check")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(trigger_pipeline).service(health_check);
}

/// Serves the trigger endpoints on `server.host:server.port` until the process is stopped.
pub async fn serve(config: ReplicatorConfig, environment: Environment) -> ReplicatorResult<()> {
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))?;
    info!(address = %listener.local_addr()?, "http trigger listening");

    let config = Arc::new(config);
    let runner: PipelineRunner = Arc::new(move || {
        let config = config.clone();
        async move { run_pipeline(&config, environment).await }.boxed_local()
    });
    let state = web::Data::new(TriggerState::new(runner));

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .listen(listener)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::test;
    use etl::error::{ErrorKind, EtlError};
    use etl_config::shared::ValidationError;
    use serde_json::{Value, json};

    use super::*;

    fn runner_returning(
        result: impl Fn() -> ReplicatorResult<RunSummary> + Send + Sync + 'static,
    ) -> PipelineRunner {
        let result = Arc::new(result);
        Arc::new(move || {
            let result = result.clone();
            async move { result() }.boxed_local()
        })
    }

    async fn get_root(runner: PipelineRunner) -> (StatusCode, Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(TriggerState::new(runner)))
                .configure(configure),
        )
        .await;

        let response =
            test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let status = response.status();
        let body: Value = test::read_body_json(response).await;

        (status, body)
    }

    #[actix_web::test]
    async fn successful_run_returns_200() {
        let (status, body) = get_root(runner_returning(|| Ok(RunSummary::default()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "success", "message": "ETL pipeline completed successfully"})
        );
    }

    #[actix_web::test]
    async fn failed_run_returns_500() {
        let (status, body) = get_root(runner_returning(|| {
            Err(EtlError::from((ErrorKind::DestinationError, "BigQuery append failed")).into())
        }))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"status": "error", "message": "ETL pipeline failed"})
        );
    }

    #[actix_web::test]
    async fn configuration_failure_reports_its_message() {
        let (status, body) = get_root(runner_returning(|| {
            Err(ReplicatorError::config(
                ValidationError::MissingSecretsProject("prod"),
            ))
        }))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(
            body["message"],
            "configuration error: `secrets.gcp_project_id` is required in the prod environment"
        );
    }

    #[actix_web::test]
    async fn health_check_does_not_run_the_pipeline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let runner = runner_returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RunSummary::default())
        });
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(TriggerState::new(runner)))
                .configure(configure),
        )
        .await;

        let response = test::call_service(
            &app,
            test::TestRequest::get().uri("/health_check").to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn overlapping_requests_run_one_at_a_time() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let runner: PipelineRunner = {
            let active = active.clone();
            let max_active = max_active.clone();
            Arc::new(move || {
                let active = active.clone();
                let max_active = max_active.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ReplicatorError>(RunSummary::default())
                }
                .boxed_local()
            })
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(TriggerState::new(runner)))
                .configure(configure),
        )
        .await;

        let (first, second) = futures::join!(
            test::call_service(&app, test::TestRequest::get().uri("/").to_request()),
            test::call_service(&app, test::TestRequest::get().uri("/").to_request()),
        );

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }
}
