use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use super::redirect;
use crate::auth::{FlashLevel, RequestContext, RequireSignedIn};
use crate::error::Error;
use crate::server::AppState;
use crate::server::form::FormData;
use crate::server::response::{PageError, StoreOptionExt, StoreResultExt, View};
use crate::server::validation::validate_title;
use crate::store::reconcile::parse_id;
use crate::store::{AssociationOutcome, ClueSubmission, Reconciliation, SkipReason};
use crate::types::{Clue, MysteryEdit, NewMystery, Quantity, QuantityError};

const INVALID_ID: &str = "Invalid mystery ID.";
const EDIT_NOT_FOUND: &str =
    "Mystery not found. The mystery you are trying to edit does not exist.";
const FETCH_FAILED: &str = "An unexpected error occurred while fetching the mystery.";

fn edit_url(id: i64) -> String {
    format!("/mysteries/{id}/edit")
}

/// A session-staged clue shown on the edit page before it is saved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingClue {
    clue_id: String,
    name: Option<String>,
    quantity: String,
}

pub async fn list_redirect() -> Response {
    redirect("/")
}

fn new_mystery_view(
    ctx: &RequestContext,
    clues: &[Clue],
    title: &str,
    description: &str,
) -> View {
    ctx.render(
        "new-mystery",
        json!({ "title": title, "description": description, "clues": clues }),
    )
}

pub async fn new_mystery_page(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
) -> Response {
    let ctx = &auth.ctx;
    match state.store.list_all_clues() {
        Ok(clues) => new_mystery_view(ctx, &clues, "", "").into_response(),
        Err(e) => {
            tracing::error!("Failed to load clues: {e}");
            ctx.flash(FlashLevel::Error, "Error loading clues.");
            redirect("/")
        }
    }
}

/// Flashes one warning if any checked entry had to be skipped.
fn flash_skipped(ctx: &RequestContext, reconciliation: &Reconciliation) {
    let rejected = reconciliation
        .skipped()
        .filter(|s| s.reason != SkipReason::Unchecked)
        .count();
    if rejected > 0 {
        ctx.flash(FlashLevel::Error, "Invalid clue or quantity provided.");
    }
}

pub async fn create_mystery(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    form: FormData,
) -> Result<Response, PageError> {
    let ctx = &auth.ctx;
    let store = state.store.as_ref();
    let title = form.text("title");
    let description = form.text("description");

    let rerender = |message: &str| -> Result<Response, PageError> {
        ctx.flash(FlashLevel::Error, message);
        let clues = store.list_all_clues().page_err("Error loading clues.")?;
        Ok(new_mystery_view(ctx, &clues, title, description)
            .with_status(StatusCode::BAD_REQUEST)
            .into_response())
    };

    if let Err(message) = validate_title(title) {
        return rerender(&message);
    }

    let new_mystery = NewMystery {
        title: title.trim().to_string(),
        description: description.to_string(),
        author_id: auth.actor.user_id,
    };
    let submissions = form.clue_submissions(false);

    match store.create_mystery_with_clues(&new_mystery, &submissions) {
        Ok(reconciliation) => {
            flash_skipped(ctx, &reconciliation);
            ctx.flash(FlashLevel::Success, "Mystery added successfully.");
            Ok(redirect(&format!("/mysteries/{}", reconciliation.mystery_id)))
        }
        Err(Error::Validation(message)) => rerender(&message),
        Err(e) => Err(PageError::internal("Failed to add mystery due to a server error.")
            .with_detail(e.to_string())),
    }
}

pub async fn show_mystery(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let ctx = &auth.ctx;

    let Some(id) = parse_id(&raw_id) else {
        ctx.flash(FlashLevel::Error, INVALID_ID);
        return redirect("/");
    };

    match state.store.get_mystery_with_clues(id) {
        Ok(Some(mystery)) => {
            let can_delete =
                auth.actor.is_admin || mystery.mystery.author_id == auth.actor.user_id;
            ctx.render(
                "mystery",
                json!({ "mystery": mystery, "canDelete": can_delete }),
            )
            .into_response()
        }
        Ok(None) => {
            ctx.flash(FlashLevel::Error, "Mystery not found.");
            redirect("/")
        }
        Err(e) => {
            tracing::error!("Failed to fetch mystery {id}: {e}");
            ctx.flash(FlashLevel::Error, FETCH_FAILED);
            redirect("/")
        }
    }
}

pub async fn edit_mystery_page(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<View, PageError> {
    let ctx = &auth.ctx;
    let id = parse_id(&raw_id).ok_or_else(|| {
        PageError::bad_request("Invalid mystery ID. Please provide a valid numeric mystery ID.")
    })?;
    let store = state.store.as_ref();

    let mystery = store
        .get_mystery_with_clues(id)
        .page_err(FETCH_FAILED)?
        .or_not_found(EDIT_NOT_FOUND)?;
    let all_clues = store.list_all_clues().page_err(FETCH_FAILED)?;

    let pending: Vec<PendingClue> = ctx
        .session
        .read(|data| data.pending_clues.get(&id).cloned())
        .unwrap_or_default()
        .into_iter()
        .filter(|p| {
            parse_id(&p.clue_id)
                .is_none_or(|clue_id| !mystery.clues.iter().any(|c| c.clue_id == clue_id))
        })
        .map(|p| PendingClue {
            name: parse_id(&p.clue_id)
                .and_then(|clue_id| all_clues.iter().find(|c| c.id == clue_id))
                .map(|c| c.name.clone()),
            clue_id: p.clue_id,
            quantity: p.quantity,
        })
        .collect();

    Ok(ctx.render(
        "edit",
        json!({ "mystery": mystery, "allClues": all_clues, "pendingClues": pending }),
    ))
}

pub async fn update_mystery(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    form: FormData,
) -> Result<Response, PageError> {
    let ctx = &auth.ctx;
    let id = parse_id(&raw_id).ok_or_else(|| PageError::bad_request(INVALID_ID))?;

    let title = form.text("title");
    if let Err(message) = validate_title(title) {
        ctx.flash(FlashLevel::Error, message);
        return Ok(redirect(&edit_url(id)));
    }

    let edit = MysteryEdit {
        title: title.trim().to_string(),
        description: form.text("description").to_string(),
    };
    let submissions = form.clue_submissions(true);
    let pending = ctx
        .session
        .read(|data| data.pending_clues.get(&id).cloned())
        .unwrap_or_default();

    match state
        .store
        .update_mystery_with_clues(id, &edit, &submissions, &pending)
    {
        Ok(reconciliation) => {
            ctx.session.update(|data| data.pending_clues.remove(&id));
            flash_skipped(ctx, &reconciliation);
            ctx.flash(FlashLevel::Success, "Mystery updated successfully.");
            Ok(redirect(&format!("/mysteries/{id}")))
        }
        Err(Error::NotFound) => Err(PageError::not_found(EDIT_NOT_FOUND)),
        Err(e) => {
            tracing::error!("Failed to update mystery {id}: {e}");
            ctx.flash(
                FlashLevel::Error,
                "Failed to update mystery due to a server error.",
            );
            Ok(redirect(&edit_url(id)))
        }
    }
}

pub async fn delete_mystery(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let ctx = &auth.ctx;
    let Some(id) = parse_id(&raw_id) else {
        ctx.flash(FlashLevel::Error, INVALID_ID);
        return redirect("/");
    };

    match state.store.delete_mystery(id, auth.actor) {
        Ok(true) => {
            ctx.session.update(|data| data.pending_clues.remove(&id));
            ctx.flash(FlashLevel::Success, "Mystery deleted successfully.");
            redirect("/")
        }
        result => {
            if let Err(e) = result {
                tracing::error!("Failed to delete mystery {id}: {e}");
            }
            ctx.flash(
                FlashLevel::Error,
                "Failed to delete mystery. You might not have permission.",
            );
            redirect(&format!("/mysteries/{id}"))
        }
    }
}

/// Adds one clue from the edit page. With `defer` set the clue is staged in
/// the session and written on the next save.
pub async fn add_clue(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    form: FormData,
) -> Response {
    let ctx = &auth.ctx;
    let Some(mystery_id) = parse_id(&raw_id) else {
        ctx.flash(FlashLevel::Error, INVALID_ID);
        return redirect("/");
    };
    let back = edit_url(mystery_id);

    let Some((raw_clue_id, raw_quantity)) = form.new_clue() else {
        ctx.flash(FlashLevel::Error, "Clue and quantity are required.");
        return redirect(&back);
    };

    let quantity = match Quantity::parse(&raw_quantity) {
        Ok(quantity) => quantity,
        Err(QuantityError::NotPositive) => {
            ctx.flash(
                FlashLevel::Error,
                "Quantity must be greater than zero if it is a numeric value.",
            );
            return redirect(&back);
        }
        Err(QuantityError::Empty) => {
            ctx.flash(FlashLevel::Error, "Invalid clue or quantity provided.");
            return redirect(&back);
        }
    };
    let Some(clue_id) = parse_id(&raw_clue_id) else {
        ctx.flash(FlashLevel::Error, "Invalid clue or quantity provided.");
        return redirect(&back);
    };

    if matches!(form.text("defer"), "true" | "on" | "1") {
        match state.store.get_clue(clue_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                ctx.flash(FlashLevel::Error, "Invalid clue or quantity provided.");
                return redirect(&back);
            }
            Err(e) => {
                tracing::error!("Failed to look up clue {clue_id}: {e}");
                ctx.flash(FlashLevel::Error, "Failed to add clue.");
                return redirect(&back);
            }
        }
        ctx.session.update(|data| {
            data.pending_clues
                .entry(mystery_id)
                .or_default()
                .push(ClueSubmission::new(clue_id.to_string(), true, quantity.to_string()));
        });
        ctx.flash(
            FlashLevel::Info,
            "Clue staged. It will be saved with the mystery.",
        );
        return redirect(&back);
    }

    match state
        .store
        .upsert_mystery_clue(mystery_id, clue_id, &quantity)
    {
        Ok(AssociationOutcome::Inserted) => {
            ctx.flash(FlashLevel::Success, "Clue added to the mystery.");
        }
        Ok(AssociationOutcome::Updated) => {
            ctx.flash(FlashLevel::Success, "Clue quantity updated.");
        }
        Err(e) => {
            tracing::error!("Failed to add clue {clue_id} to mystery {mystery_id}: {e}");
            ctx.flash(FlashLevel::Error, "Failed to add clue.");
        }
    }
    redirect(&back)
}

pub async fn remove_clues_page(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<View, PageError> {
    let id = parse_id(&raw_id).ok_or_else(|| PageError::bad_request(INVALID_ID))?;

    let mystery = state
        .store
        .get_mystery_with_clues(id)
        .page_err(FETCH_FAILED)?
        .or_not_found("Mystery not found.")?;

    Ok(auth.ctx.render("delete-clues", json!({ "mystery": mystery })))
}

pub async fn remove_clues(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    form: FormData,
) -> Response {
    let ctx = &auth.ctx;
    let Some(mystery_id) = parse_id(&raw_id) else {
        ctx.flash(FlashLevel::Error, INVALID_ID);
        return redirect("/");
    };

    let clue_ids: Vec<i64> = form
        .all("cluesToRemove")
        .into_iter()
        .filter_map(parse_id)
        .collect();

    if clue_ids.is_empty() {
        ctx.flash(FlashLevel::Error, "No clues were selected to remove.");
    } else {
        match state.store.remove_mystery_clues(mystery_id, &clue_ids) {
            Ok(removed) => {
                tracing::info!("Removed {removed} clue(s) from mystery {mystery_id}");
                ctx.flash(FlashLevel::Success, "Selected clues removed successfully.");
            }
            Err(e) => {
                tracing::error!("Failed to remove clues from mystery {mystery_id}: {e}");
                ctx.flash(FlashLevel::Error, "Failed to remove clues.");
            }
        }
    }

    redirect(&format!("/mysteries/{mystery_id}/remove-clues"))
}
