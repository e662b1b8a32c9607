use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::Value;

use super::session::{FlashLevel, SessionHandle};
use crate::server::AppState;
use crate::server::response::{PageError, View};
use crate::types::Actor;

const LOGIN_REQUIRED: &str = "You must be signed in to view this page.";
const ADMIN_REQUIRED: &str = "You do not have permission to access the Manage Clues page.";

/// Who is looking at the page, as exposed to every view.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub signed_in: bool,
    pub username: Option<String>,
    pub is_admin: bool,
}

/// Per-request context: the session plus what views need to know about the
/// viewer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: SessionHandle,
    pub viewer: Viewer,
    pub dev_mode: bool,
}

impl RequestContext {
    /// Builds a view, draining any queued flash messages into it.
    #[must_use]
    pub fn render(&self, name: &'static str, data: Value) -> View {
        View::new(name, data, self.session.take_flash(), self.viewer.clone())
    }

    pub fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        self.session.flash(level, message);
    }

    #[must_use]
    pub fn actor(&self) -> Option<Actor> {
        self.session.read(|data| match (data.signed_in, data.user_id) {
            (true, Some(user_id)) => Some(Actor {
                user_id,
                is_admin: data.is_admin,
            }),
            _ => None,
        })
    }
}

/// Extractor for pages that need a signed-in user.
pub struct RequireSignedIn {
    pub ctx: RequestContext,
    pub actor: Actor,
}

/// Extractor for admin-only pages.
pub struct RequireAdmin {
    pub ctx: RequestContext,
    pub actor: Actor,
}

#[derive(Debug)]
pub enum AuthRejection {
    MissingSession,
    LoginRequired,
    NotAdmin,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::MissingSession => {
                PageError::internal("An unexpected error occurred.")
                    .with_detail("session layer is not installed")
                    .into_response()
            }
            AuthRejection::LoginRequired => Redirect::to("/login").into_response(),
            AuthRejection::NotAdmin => PageError::forbidden(ADMIN_REQUIRED).into_response(),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(AuthRejection::MissingSession)?;

        let viewer = session.read(|data| Viewer {
            signed_in: data.signed_in,
            username: data.username.clone(),
            is_admin: data.is_admin,
        });

        Ok(RequestContext {
            session,
            viewer,
            dev_mode: state.config.is_development(),
        })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireSignedIn {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;

        let Some(actor) = ctx.actor() else {
            let return_to = parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
            ctx.session.update(|data| data.return_to = Some(return_to));
            ctx.flash(FlashLevel::Error, LOGIN_REQUIRED);
            return Err(AuthRejection::LoginRequired);
        };

        Ok(RequireSignedIn { ctx, actor })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireSignedIn { ctx, actor } =
            RequireSignedIn::from_request_parts(parts, state).await?;

        if !actor.is_admin {
            return Err(AuthRejection::NotAdmin);
        }

        Ok(RequireAdmin { ctx, actor })
    }
}
