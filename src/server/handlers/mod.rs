mod auth;
mod clues;
mod home;
mod minigame;
mod mysteries;

use std::sync::Arc;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::server::AppState;

pub fn page_router() -> Router<Arc<AppState>> {
    Router::new()
        // Accounts
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        // Listing and search
        .route("/", get(home::index))
        .route("/search", get(home::search))
        // Mysteries
        .route(
            "/mysteries",
            get(mysteries::list_redirect).post(mysteries::create_mystery),
        )
        .route(
            "/mysteries/new",
            get(mysteries::new_mystery_page).post(mysteries::create_mystery),
        )
        .route("/mysteries/{id}", get(mysteries::show_mystery))
        .route(
            "/mysteries/{id}/edit",
            get(mysteries::edit_mystery_page).post(mysteries::update_mystery),
        )
        .route("/mysteries/{id}/delete", post(mysteries::delete_mystery))
        .route("/mysteries/{id}/add-clue", post(mysteries::add_clue))
        .route(
            "/mysteries/{id}/remove-clues",
            get(mysteries::remove_clues_page),
        )
        .route("/mysteries/{id}/remove-clue", post(mysteries::remove_clues))
        // Clues (admin)
        .route("/clues/manage", get(clues::manage_clues))
        .route("/clues/add", post(clues::add_clue))
        .route(
            "/clues/{id}/edit",
            get(clues::edit_clue_page).post(clues::update_clue),
        )
        .route("/clues/{id}/delete", post(clues::delete_clue))
        // Minigame
        .route("/minigames", get(minigame::game_page))
        .route("/minigames/guess", post(minigame::guess))
}

fn redirect(to: &str) -> Response {
    Redirect::to(to).into_response()
}
