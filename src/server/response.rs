use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::auth::{Flash, Viewer};
use crate::error::{Error, Result as StoreResult};

/// A rendered page: template name plus its context.
///
/// Templating happens outside this service, so a view is serialized as JSON
/// `{view, data, messages, viewer}`.
#[derive(Debug, Serialize)]
pub struct View {
    pub view: &'static str,
    pub data: Value,
    pub messages: Vec<Flash>,
    pub viewer: Viewer,
    #[serde(skip)]
    pub status: StatusCode,
}

impl View {
    #[must_use]
    pub fn new(view: &'static str, data: Value, messages: Vec<Flash>, viewer: Viewer) -> Self {
        Self {
            view,
            data,
            messages,
            viewer,
            status: StatusCode::OK,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for View {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Page error that renders the `error` view.
///
/// `detail` carries the internal cause. It is always logged and only shown
/// to the client when the server runs in development.
#[derive(Debug, Clone)]
pub struct PageError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl PageError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn body(&self, show_detail: bool) -> Value {
        let mut error = json!({ "status": self.status.as_u16() });
        if show_detail {
            if let Some(detail) = &self.detail {
                error["detail"] = Value::String(detail.clone());
            }
        }
        json!({
            "view": "error",
            "data": { "message": self.message, "error": error },
        })
    }

    fn render(&self, show_detail: bool) -> Response {
        (self.status, Json(self.body(show_detail))).into_response()
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match (&self.detail, self.status.is_server_error()) {
            (Some(detail), true) => tracing::error!("{}: {detail}", self.message),
            (Some(detail), false) => tracing::warn!("{}: {detail}", self.message),
            (None, _) => {}
        }

        let mut response = self.render(false);
        response.extensions_mut().insert(self);
        response
    }
}

/// Development-only layer that re-renders error pages with their detail.
pub async fn expose_error_detail(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let Some(error) = response.extensions_mut().remove::<PageError>() else {
        return response;
    };
    // Keep the original headers (session cookie included).
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, error.render(true).into_body())
}

/// Extension trait for converting store results to page errors with a custom message.
pub trait StoreResultExt<T> {
    fn page_err(self, message: &'static str) -> Result<T, PageError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn page_err(self, message: &'static str) -> Result<T, PageError> {
        self.map_err(|e| {
            let base = match e {
                Error::NotFound => PageError::not_found(message),
                Error::BadRequest(_) | Error::Validation(_) => PageError::bad_request(message),
                _ => PageError::internal(message),
            };
            base.with_detail(e.to_string())
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, PageError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, PageError> {
        self.ok_or_else(|| PageError::not_found(message))
    }
}

/// Body of the JSON login endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginResponse {
    #[must_use]
    pub fn success(redirect_url: String) -> Self {
        Self {
            success: Some(true),
            redirect_url: Some(redirect_url),
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: None,
            redirect_url: None,
            error: Some(message.into()),
        }
    }
}
