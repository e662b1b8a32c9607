//! # Cluebook
//!
//! A mystery board server: users sign in, write mysteries, and tag them with
//! clues (each with a free-form quantity). Admins curate the clue catalogue.
//! A small word-guessing minigame rides along.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cluebook::config::ServerConfig;
//! use cluebook::server::{AppState, create_router};
//! use cluebook::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! Pages are rendered as JSON views (template name plus context) so any
//! template engine can sit in front of the server.
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `cluebook` binary.

pub mod auth;
pub mod config;
pub mod error;
pub mod game;
pub mod server;
pub mod store;
pub mod types;
