use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};

use super::handlers::page_router;
use super::response::{PageError, expose_error_detail};
use crate::auth::{PasswordManager, session_layer};
use crate::config::ServerConfig;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: ServerConfig,
    pub passwords: PasswordManager,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Self {
        Self {
            store,
            config,
            passwords: PasswordManager::new(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> Response {
    PageError::not_found("Not Found").into_response()
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .merge(page_router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), session_layer));

    if state.config.is_development() {
        router = router.layer(middleware::from_fn(expose_error_detail));
    }

    router
        .route("/health", get(health))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
