use super::AppState;
use super::error::ApiError;
use super::session::Caller;
use crate::application::payments::{ReconcileOutcome, SignalOutcome};
use crate::domain::application::{Application, ApplicationId, Decision};
use crate::domain::payment::PaymentSession;
use crate::error::LendingError;
use crate::infrastructure::stripe::SIGNATURE_HEADER;
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub loan_title: String,
    /// Everything else the client sends is kept as opaque payload.
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub action: Decision,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

pub async fn health() -> &'static str {
    "LoanLink API running"
}

pub async fn submit(
    State(state): State<AppState>,
    Caller(caller): Caller,
    request: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Application>)> {
    let Json(request) = request?;
    let application = state
        .lifecycle
        .submit(
            &caller,
            &request.loan_title,
            serde_json::Value::Object(request.payload),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn list_applications(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<Application>>> {
    Ok(Json(state.lifecycle.list(&caller).await?))
}

pub async fn get_application(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Application>> {
    let id: ApplicationId = id.parse()?;
    Ok(Json(state.lifecycle.get(id, &caller).await?))
}

pub async fn decide(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    request: Result<Json<DecisionRequest>, JsonRejection>,
) -> ApiResult<Json<Application>> {
    let id: ApplicationId = id.parse()?;
    let Json(request) = request?;
    Ok(Json(
        state.lifecycle.decide(id, request.action, &caller).await?,
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Application>> {
    let id: ApplicationId = id.parse()?;
    Ok(Json(state.lifecycle.cancel(id, &caller).await?))
}

pub async fn payment_session(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<PaymentSession>> {
    let id: ApplicationId = id.parse()?;
    Ok(Json(state.payments.initiate_payment(id, &caller).await?))
}

/// Processor callback. Authenticated by signature, not by session token.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(LendingError::InvalidSignal)?;

    let outcome = match state.payments.handle_signal(&body, signature).await? {
        SignalOutcome::Reconciled(ReconcileOutcome::Reconciled(_)) => "reconciled",
        SignalOutcome::Reconciled(ReconcileOutcome::AlreadyReconciled(_)) => "duplicate",
        SignalOutcome::Ignored { .. } => "ignored",
    };
    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}
