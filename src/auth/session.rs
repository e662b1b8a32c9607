//! Server-side sessions.
//!
//! The browser only holds a random session id in an `HttpOnly` cookie; the
//! session data lives in the store under the SHA-256 of that id. The
//! [`session_layer`] middleware loads the session before the handler runs,
//! exposes it as a [`SessionHandle`] request extension, and writes it back
//! (setting the cookie) only if the handler changed it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::SessionConfig;
use crate::game::Game;
use crate::server::AppState;
use crate::store::ClueSubmission;
use crate::types::User;

const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Everything remembered between requests for one browser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub signed_in: bool,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub is_admin: bool,
    /// Where to send the user after signing in.
    pub return_to: Option<String>,
    pub flash: Vec<Flash>,
    /// Clue additions staged per mystery, applied with the next edit save.
    pub pending_clues: BTreeMap<i64, Vec<ClueSubmission>>,
    pub game: Option<Game>,
}

impl SessionData {
    pub fn sign_in(&mut self, user: &User) {
        self.signed_in = true;
        self.user_id = Some(user.id);
        self.username = Some(user.username.clone());
        self.is_admin = user.is_admin;
    }
}

#[derive(Debug)]
struct SessionState {
    data: SessionData,
    dirty: bool,
    destroyed: bool,
    regenerate: bool,
}

/// Shared, per-request access to the session.
///
/// Never hold the lock across an `.await`.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                data,
                dirty: false,
                destroyed: false,
                regenerate: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn read<T>(&self, f: impl FnOnce(&SessionData) -> T) -> T {
        f(&self.lock().data)
    }

    /// Mutates the session and marks it for saving.
    pub fn update<T>(&self, f: impl FnOnce(&mut SessionData) -> T) -> T {
        let mut state = self.lock();
        state.dirty = true;
        f(&mut state.data)
    }

    pub fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        let message = message.into();
        self.update(|data| data.flash.push(Flash { level, message }));
    }

    /// Drains queued flash messages.
    pub fn take_flash(&self) -> Vec<Flash> {
        let mut state = self.lock();
        if state.data.flash.is_empty() {
            return Vec::new();
        }
        state.dirty = true;
        std::mem::take(&mut state.data.flash)
    }

    /// Signs the user in under a fresh session id.
    pub fn sign_in(&self, user: &User) {
        let mut state = self.lock();
        state.data.sign_in(user);
        state.dirty = true;
        state.regenerate = true;
    }

    /// Drops the session entirely and expires the cookie.
    pub fn destroy(&self) {
        let mut state = self.lock();
        state.data = SessionData::default();
        state.destroyed = true;
    }
}

/// Generates a new random session id (base64url, no padding).
#[must_use]
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The store key for a session id.
#[must_use]
pub fn hash_session_id(id: &str) -> String {
    hex::encode(Sha256::digest(id.as_bytes()))
}

/// Finds a cookie value in the request headers.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[must_use]
pub fn session_cookie(config: &SessionConfig, id: &str) -> String {
    let max_age = Duration::days(config.max_age_days).num_seconds();
    let mut cookie = format!(
        "{}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        config.cookie_name
    );
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[must_use]
pub fn expired_cookie(config: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name
    )
}

fn load_session(state: &AppState, id: &str) -> Option<SessionData> {
    let stored = match state.store.load_session(&hash_session_id(id)) {
        Ok(stored) => stored?,
        Err(e) => {
            tracing::warn!("Failed to load session: {e}");
            return None;
        }
    };

    match serde_json::from_str(&stored) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!("Discarding unreadable session: {e}");
            None
        }
    }
}

fn set_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid session cookie header: {e}"),
    }
}

/// Loads the session for the request and saves it afterwards if modified.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let config = &state.config.session;
    let existing_id = read_cookie(request.headers(), &config.cookie_name);
    let data = existing_id
        .as_deref()
        .and_then(|id| load_session(&state, id));
    // A cookie pointing at a missing or expired session is treated as new.
    let existing_id = existing_id.filter(|_| data.is_some());

    let handle = SessionHandle::new(data.unwrap_or_default());
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let session = handle.lock();

    if session.destroyed {
        if let Some(id) = &existing_id {
            if let Err(e) = state.store.delete_session(&hash_session_id(id)) {
                tracing::warn!("Failed to delete session: {e}");
            }
        }
        set_cookie(&mut response, &expired_cookie(config));
        return response;
    }

    if !session.dirty {
        return response;
    }

    let id = match (&existing_id, session.regenerate) {
        (Some(id), false) => id.clone(),
        (Some(old), true) => {
            if let Err(e) = state.store.delete_session(&hash_session_id(old)) {
                tracing::warn!("Failed to delete replaced session: {e}");
            }
            generate_session_id()
        }
        (None, _) => generate_session_id(),
    };

    let payload = match serde_json::to_string(&session.data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!("Failed to serialize session: {e}");
            return response;
        }
    };
    let expires_at = Utc::now() + Duration::days(config.max_age_days);

    match state
        .store
        .save_session(&hash_session_id(&id), &payload, expires_at)
    {
        Ok(()) => set_cookie(&mut response, &session_cookie(config, &id)),
        Err(e) => tracing::error!("Failed to save session: {e}"),
    }

    response
}
