use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::redirect;
use crate::auth::{FlashLevel, RequestContext};
use crate::error::Error;
use crate::server::AppState;
use crate::server::form::FormData;
use crate::server::response::LoginResponse;
use crate::server::validation::validate_credentials;
use crate::types::NewUser;

const UNEXPECTED: &str = "An unexpected error occurred. Please try again.";

pub async fn login_page(ctx: RequestContext) -> impl IntoResponse {
    ctx.render("login", json!({}))
}

pub async fn login(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    form: FormData,
) -> impl IntoResponse {
    let username = form.text("username").trim();
    let password = form.text("password");

    let user = match state.store.get_user_by_username(username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(LoginResponse::error("No user found with the given username.")),
            );
        }
        Err(e) => {
            tracing::error!("Login lookup failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse::error(UNEXPECTED)),
            );
        }
    };

    match state.passwords.verify(password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(LoginResponse::error("Invalid password. Please try again.")),
            );
        }
        Err(e) => {
            tracing::error!("Password verification failed for {}: {e}", user.username);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoginResponse::error(UNEXPECTED)),
            );
        }
    }

    ctx.session.sign_in(&user);
    let redirect_url = ctx
        .session
        .update(|data| data.return_to.take())
        .unwrap_or_else(|| "/".to_string());

    tracing::info!("User {} signed in", user.username);
    (StatusCode::OK, Json(LoginResponse::success(redirect_url)))
}

pub async fn register_page(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ctx.render(
        "register",
        json!({ "adminSignup": state.config.admin_signup_code.is_some() }),
    )
}

pub async fn register(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    form: FormData,
) -> Response {
    let username = form.text("username").trim().to_string();
    let password = form.text("password");
    let admin_code = form.text("adminPassword");

    let rerender = |message: &str| {
        ctx.flash(FlashLevel::Error, message);
        ctx.render("register", json!({ "username": username }))
            .with_status(StatusCode::BAD_REQUEST)
            .into_response()
    };

    if let Err(message) = validate_credentials(&username, password) {
        return rerender(&message);
    }

    let is_admin = state
        .config
        .admin_signup_code
        .as_deref()
        .is_some_and(|code| !admin_code.is_empty() && code == admin_code);

    let password_hash = match state.passwords.hash(password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("Registration hashing failed: {e}");
            return rerender("Error registering user, please try again.");
        }
    };

    let new_user = NewUser {
        username: username.clone(),
        password_hash,
        is_admin,
    };

    let user = match state.store.create_user(&new_user) {
        Ok(user) => user,
        Err(Error::AlreadyExists) => {
            return rerender("Username already taken, please choose another one.");
        }
        Err(e) => {
            tracing::error!("Registration failed: {e}");
            return rerender("Error registering user, please try again.");
        }
    };

    tracing::info!("Registered user {} (admin: {})", user.username, user.is_admin);
    ctx.session.sign_in(&user);
    ctx.flash(FlashLevel::Success, "Registration successful");
    redirect("/")
}

pub async fn logout(ctx: RequestContext) -> Response {
    ctx.session.destroy();
    redirect("/login")
}
