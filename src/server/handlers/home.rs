use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::redirect;
use crate::auth::{FlashLevel, RequestContext, RequireSignedIn};
use crate::server::AppState;
use crate::server::pagination::{Page, PageQuery, requested_page};
use crate::server::response::{PageError, StoreResultExt, View};
use crate::types::SearchKind;

const MYSTERIES_PER_PAGE: i64 = 5;
const RESULTS_PER_PAGE: i64 = 5;

pub async fn index(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<View, PageError> {
    if !ctx.viewer.signed_in {
        ctx.flash(FlashLevel::Error, "You must be signed in to view mysteries.");
        return Ok(ctx.render("index", json!({ "promptLogin": true })));
    }

    let current = requested_page(query.page.as_deref())?;
    let store = state.store.as_ref();

    let total = store
        .count_mysteries()
        .page_err("An unexpected error occurred while fetching mysteries.")?;
    let page = Page::new(current, MYSTERIES_PER_PAGE, total)?;
    let mysteries = store
        .list_mysteries(page.per_page, page.offset)
        .page_err("An unexpected error occurred while fetching mysteries.")?;

    Ok(ctx.render(
        "index",
        json!({ "promptLogin": false, "mysteries": mysteries, "page": page }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub search_type: Option<String>,
    #[serde(default)]
    pub query: String,
    pub page: Option<String>,
}

pub async fn search(
    auth: RequireSignedIn,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> Result<Response, PageError> {
    let ctx = &auth.ctx;

    let Some(kind) = SearchKind::parse(params.search_type.as_deref()) else {
        ctx.flash(FlashLevel::Error, "Invalid search type selected.");
        return Ok(redirect("/"));
    };

    let current = requested_page(params.page.as_deref())?;
    let store = state.store.as_ref();

    let total = store
        .count_search(kind, &params.query)
        .page_err("Failed to execute search.")?;
    let page = Page::new(current, RESULTS_PER_PAGE, total)?;
    let results = store
        .search(kind, &params.query, page.per_page, page.offset)
        .page_err("Failed to execute search.")?;

    Ok(ctx
        .render(
            "search-results",
            json!({
                "searchType": kind,
                "query": params.query,
                "results": results,
                "page": page,
            }),
        )
        .into_response())
}
