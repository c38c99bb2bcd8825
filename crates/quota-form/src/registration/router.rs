use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use super::domain::{QuestionDraft, SubmissionRequest};
use super::engine::RejectionReason;
use super::service::{RegistrationError, RegistrationService};
use super::store::{SchemaStore, SubmissionLedger};

/// Router builder exposing the form, availability and submission endpoints.
pub fn registration_router<S, L>(service: Arc<RegistrationService<S, L>>) -> Router
where
    S: SchemaStore + 'static,
    L: SubmissionLedger + 'static,
{
    Router::new()
        .route(
            "/api/v1/schema",
            get(schema_handler::<S, L>).put(save_schema_handler::<S, L>),
        )
        .route("/api/v1/availability", get(availability_handler::<S, L>))
        .route("/api/v1/submissions", post(submit_handler::<S, L>))
        .with_state(service)
}

pub(crate) async fn schema_handler<S, L>(
    State(service): State<Arc<RegistrationService<S, L>>>,
) -> Response
where
    S: SchemaStore + 'static,
    L: SubmissionLedger + 'static,
{
    run_blocking(move || service.get_schema()).await
}

pub(crate) async fn save_schema_handler<S, L>(
    State(service): State<Arc<RegistrationService<S, L>>>,
    Json(drafts): Json<Vec<QuestionDraft>>,
) -> Response
where
    S: SchemaStore + 'static,
    L: SubmissionLedger + 'static,
{
    run_blocking(move || service.save_schema(drafts)).await
}

pub(crate) async fn availability_handler<S, L>(
    State(service): State<Arc<RegistrationService<S, L>>>,
) -> Response
where
    S: SchemaStore + 'static,
    L: SubmissionLedger + 'static,
{
    run_blocking(move || service.availability()).await
}

pub(crate) async fn submit_handler<S, L>(
    State(service): State<Arc<RegistrationService<S, L>>>,
    Json(request): Json<SubmissionRequest>,
) -> Response
where
    S: SchemaStore + 'static,
    L: SubmissionLedger + 'static,
{
    run_blocking(move || service.submit(request.choices)).await
}

/// Run a service call on the blocking pool; gate waits and file I/O stay off the
/// async workers.
async fn run_blocking<T, F>(call: F) -> Response
where
    F: FnOnce() -> Result<T, RegistrationError> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => {
            error!(error = %err, "registration task did not complete");
            let payload = json!({
                "reason": "internal",
                "error": "registration task did not complete",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) fn error_response(err: RegistrationError) -> Response {
    let message = err.to_string();
    let retryable = err.is_retryable();

    match err {
        RegistrationError::Rejected(RejectionReason::InvalidSelection(detail)) => {
            let payload = json!({
                "reason": "invalid_selection",
                "error": message,
                "detail": detail,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        RegistrationError::Rejected(RejectionReason::QuotaExceeded(option_id)) => {
            let payload = json!({
                "reason": "quota_exceeded",
                "error": message,
                "option_id": option_id,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        RegistrationError::SchemaValidation(_) => {
            let payload = json!({
                "reason": "schema_validation",
                "error": message,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        RegistrationError::Busy(_) => {
            let payload = json!({
                "reason": "busy",
                "error": message,
                "retryable": retryable,
            });
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, "1")],
                Json(payload),
            )
                .into_response()
        }
        RegistrationError::Storage(_) => {
            let status = if retryable {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let payload = json!({
                "reason": "storage_failure",
                "error": message,
                "retryable": retryable,
            });
            (status, Json(payload)).into_response()
        }
    }
}
