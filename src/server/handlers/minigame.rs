use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::redirect;
use crate::auth::RequestContext;
use crate::game::{self, Game, Outcome};
use crate::server::AppState;
use crate::server::form::FormData;
use crate::server::response::{PageError, View};

const WIN_SCREEN_WORDS: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct GameQuery {
    pub reset: Option<String>,
}

fn new_game(words: &[String]) -> Option<Game> {
    game::pick_word(words, &mut rand::thread_rng()).map(Game::new)
}

fn board(game: &Game) -> Value {
    let mixed = game::mix(&game.target, &mut rand::thread_rng());
    let mut data = json!({
        "attempts": game.attempts,
        "attemptsLeft": game.attempts_left(),
        "outcome": game.outcome,
        "mixedSymbols": mixed,
    });
    if game.outcome != Outcome::InProgress {
        data["correctWord"] = Value::String(game.target.clone());
    }
    data
}

pub async fn game_page(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    Query(query): Query<GameQuery>,
) -> Result<View, PageError> {
    let existing = ctx.session.read(|data| data.game.clone());

    let game = match existing {
        Some(game) if query.reset.is_none() => game,
        _ => {
            let game = new_game(&state.config.words())
                .ok_or_else(|| PageError::internal("The word list is empty."))?;
            ctx.session.update(|data| data.game = Some(game.clone()));
            game
        }
    };

    Ok(ctx.render("games/hacking", board(&game)))
}

pub async fn guess(
    ctx: RequestContext,
    State(state): State<Arc<AppState>>,
    form: FormData,
) -> Response {
    let guess = form.text("guess");

    let Some(game) = ctx.session.update(|data| {
        let game = data.game.as_mut()?;
        game.guess(guess);
        Some(game.clone())
    }) else {
        return redirect("/minigames");
    };

    match game.outcome {
        Outcome::Won => {
            let words = state.config.words();
            let shown = &words[..words.len().min(WIN_SCREEN_WORDS)];
            let mixed = game::mix_words(shown, &game.target, &mut rand::thread_rng());
            ctx.render(
                "win",
                json!({ "correctWord": game.target, "mixedSymbols": mixed }),
            )
            .into_response()
        }
        Outcome::Lost => ctx.render("lose", board(&game)).into_response(),
        Outcome::InProgress => redirect("/minigames"),
    }
}
