use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::redirect;
use crate::auth::{FlashLevel, RequireAdmin};
use crate::error::Error;
use crate::server::AppState;
use crate::server::form::FormData;
use crate::server::pagination::{Page, PageQuery, requested_page};
use crate::server::response::{PageError, StoreOptionExt, StoreResultExt, View};
use crate::server::validation::validate_clue_name;
use crate::store::reconcile::parse_id;

const CLUES_PER_PAGE: i64 = 10;
const MANAGE_URL: &str = "/clues/manage";
const INVALID_ID: &str = "Invalid clue ID.";

pub async fn manage_clues(
    auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let ctx = &auth.ctx;
    let current = requested_page(query.page.as_deref())?;
    let store = state.store.as_ref();

    let total = match store.count_clues() {
        Ok(total) => total,
        Err(e) => {
            tracing::error!("Failed to count clues: {e}");
            ctx.flash(FlashLevel::Error, "Failed to load clues.");
            return Ok(redirect("/"));
        }
    };
    let page = Page::new(current, CLUES_PER_PAGE, total)?;
    let clues = store
        .list_clues(page.per_page, page.offset)
        .page_err("Failed to load clues.")?;

    Ok(ctx
        .render("manage-clues", json!({ "clues": clues, "page": page }))
        .into_response())
}

pub async fn add_clue(
    auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    form: FormData,
) -> Response {
    let ctx = &auth.ctx;
    let name = form.text("name").trim();

    if let Err(message) = validate_clue_name(name) {
        ctx.flash(FlashLevel::Error, message);
        return redirect(MANAGE_URL);
    }

    match state.store.create_clue(name) {
        Ok(clue) => {
            tracing::info!("Created clue {} ({})", clue.name, clue.id);
            ctx.flash(FlashLevel::Success, "Clue added successfully.");
        }
        Err(Error::AlreadyExists) => {
            ctx.flash(FlashLevel::Error, "Failed to add clue. It may already exist.");
        }
        Err(e) => {
            tracing::error!("Failed to add clue: {e}");
            ctx.flash(FlashLevel::Error, "Failed to add clue.");
        }
    }
    redirect(MANAGE_URL)
}

pub async fn edit_clue_page(
    auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<View, PageError> {
    let id = parse_id(&raw_id).ok_or_else(|| PageError::bad_request(INVALID_ID))?;

    let clue = state
        .store
        .get_clue(id)
        .page_err("Failed to load clue.")?
        .or_not_found("Clue not found.")?;

    Ok(auth.ctx.render("edit-clue", json!({ "clue": clue })))
}

pub async fn update_clue(
    auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    form: FormData,
) -> Result<Response, PageError> {
    let ctx = &auth.ctx;
    let id = parse_id(&raw_id).ok_or_else(|| PageError::bad_request(INVALID_ID))?;
    let name = form.text("name").trim();

    if let Err(message) = validate_clue_name(name) {
        ctx.flash(FlashLevel::Error, message);
        return Ok(redirect(MANAGE_URL));
    }

    match state.store.update_clue(id, name) {
        Ok(true) => ctx.flash(FlashLevel::Success, "Clue updated successfully."),
        Ok(false) => ctx.flash(FlashLevel::Error, "Clue not found."),
        Err(Error::AlreadyExists) => {
            ctx.flash(FlashLevel::Error, "A clue with that name already exists.");
        }
        Err(e) => {
            tracing::error!("Failed to update clue {id}: {e}");
            ctx.flash(FlashLevel::Error, "Failed to update clue.");
        }
    }
    Ok(redirect(MANAGE_URL))
}

pub async fn delete_clue(
    auth: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let ctx = &auth.ctx;

    let result = match parse_id(&raw_id) {
        Some(id) => state.store.delete_clue(id),
        None => Err(Error::BadRequest(INVALID_ID.to_string())),
    };

    match result {
        Ok(true) => ctx.flash(FlashLevel::Success, "Clue deleted successfully."),
        Ok(false) => ctx.flash(FlashLevel::Error, "Clue not found."),
        Err(e) => {
            tracing::error!("Failed to delete clue {raw_id}: {e}");
            ctx.flash(FlashLevel::Error, "Failed to delete clue.");
        }
    }
    redirect(MANAGE_URL)
}
