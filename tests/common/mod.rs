//! In-process test harness: drives the router with `oneshot` against an
//! in-memory store and carries the session cookie between requests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use cluebook::auth::session::hash_session_id;
use cluebook::auth::{PasswordManager, SessionData};
use cluebook::config::ServerConfig;
use cluebook::server::{AppState, create_router};
use cluebook::store::{ClueSubmission, SqliteStore, Store};
use cluebook::types::{Clue, NewMystery, NewUser, User};

pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub config: ServerConfig,
    cookie: Option<String>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().expect("open store"));
        store.initialize().expect("initialize schema");

        let state = Arc::new(AppState::new(store.clone(), config.clone()));
        Self {
            router: create_router(state),
            store,
            config,
            cookie: None,
        }
    }

    /// A second browser against the same server, without cookies.
    pub fn fresh_client(&self) -> Self {
        Self {
            router: self.router.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            cookie: None,
        }
    }

    pub fn seed_user(&self, username: &str, is_admin: bool) -> User {
        let password_hash = PasswordManager::new().hash(PASSWORD).expect("hash password");
        self.store
            .create_user(&NewUser {
                username: username.to_string(),
                password_hash,
                is_admin,
            })
            .expect("create user")
    }

    pub fn seed_clue(&self, name: &str) -> Clue {
        self.store.create_clue(name).expect("create clue")
    }

    pub fn seed_mystery(&self, title: &str, author: &User, clue: &Clue) -> i64 {
        self.store
            .create_mystery_with_clues(
                &NewMystery {
                    title: title.to_string(),
                    description: format!("About {title}"),
                    author_id: author.id,
                },
                &[ClueSubmission::new(clue.id.to_string(), true, "1")],
            )
            .expect("create mystery")
            .mystery_id
    }

    pub async fn request(&mut self, method: &str, uri: &str, form: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(
                header::COOKIE,
                format!("{}={cookie}", self.config.session.cookie_name),
            );
        }
        if form.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        }
        let request = builder
            .body(Body::from(form.unwrap_or_default().to_string()))
            .expect("build request");

        let response = self.router.clone().oneshot(request).await.expect("oneshot");
        self.remember_cookie(&response);
        response
    }

    fn remember_cookie(&mut self, response: &Response<Body>) {
        let prefix = format!("{}=", self.config.session.cookie_name);
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let Some(rest) = value.strip_prefix(&prefix) else { continue };
            let id = rest.split(';').next().unwrap_or_default();
            self.cookie = if id.is_empty() { None } else { Some(id.to_string()) };
        }
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.request("GET", uri, None).await
    }

    pub async fn post(&mut self, uri: &str, form: &str) -> Response<Body> {
        self.request("POST", uri, Some(form)).await
    }

    pub async fn login(&mut self, username: &str) -> Value {
        let response = self
            .post("/login", &format!("username={username}&password=correct+horse"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    /// Reads this client's session straight from the store.
    pub fn session(&self) -> SessionData {
        let id = self.cookie.as_deref().expect("no session cookie");
        let stored = self
            .store
            .load_session(&hash_session_id(id))
            .expect("load session")
            .expect("session exists");
        serde_json::from_str(&stored).expect("parse session")
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
}

pub fn messages(view: &Value) -> Vec<String> {
    view["messages"]
        .as_array()
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m["message"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
