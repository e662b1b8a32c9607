use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Quantity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mystery {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMystery {
    pub title: String,
    pub description: String,
    pub author_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysteryEdit {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clue {
    pub id: i64,
    pub name: String,
}

/// A clue attached to a mystery, as shown on the detail and edit pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysteryClue {
    pub clue_id: i64,
    pub name: String,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysteryWithClues {
    #[serde(flatten)]
    pub mystery: Mystery,
    pub clues: Vec<MysteryClue>,
}

/// The session actor performing a destructive operation.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: i64,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchKind {
    #[serde(rename = "mysteries")]
    Mysteries,
    #[serde(rename = "clues")]
    Clues,
    #[serde(rename = "mysteriesByClue")]
    MysteriesByClue,
}

impl SearchKind {
    /// Parses the `searchType` query parameter; a missing value means
    /// mysteries.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            None | Some("") | Some("mysteries") => Some(SearchKind::Mysteries),
            Some("clues") => Some(SearchKind::Clues),
            Some("mysteriesByClue") => Some(SearchKind::MysteriesByClue),
            Some(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Mysteries => "mysteries",
            SearchKind::Clues => "clues",
            SearchKind::MysteriesByClue => "mysteriesByClue",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchResults {
    Mysteries(Vec<Mystery>),
    Clues(Vec<Clue>),
}

impl SearchResults {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            SearchResults::Mysteries(m) => m.len(),
            SearchResults::Clues(c) => c.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
