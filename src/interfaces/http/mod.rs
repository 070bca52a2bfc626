//! Inbound HTTP surface.
//!
//! Handlers only map requests and responses; authorization and state changes
//! live in the application layer.

pub mod error;
pub mod handlers;
pub mod session;

use crate::application::auth::SessionAuthenticator;
use crate::application::lifecycle::LifecycleManager;
use crate::application::payments::PaymentCoordinator;
use crate::error::{LendingError, Result};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<SessionAuthenticator>,
    pub lifecycle: Arc<LifecycleManager>,
    pub payments: Arc<PaymentCoordinator>,
}

/// Browser access from the front-end origin only, with the session cookie.
pub fn cors_layer(client_origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(client_origin.trim_end_matches('/'))
        .map_err(|_| LendingError::Validation(format!("invalid client origin {client_origin}")))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route(
            "/applications",
            post(handlers::submit).get(handlers::list_applications),
        )
        .route("/applications/{id}", get(handlers::get_application))
        .route("/applications/{id}/decision", post(handlers::decide))
        .route(
            "/applications/{id}/cancel",
            post(handlers::cancel).patch(handlers::cancel),
        )
        .route(
            "/applications/{id}/payment-session",
            post(handlers::payment_session),
        )
        .route("/payments/webhook", post(handlers::payment_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
