pub mod executor;
pub mod reconcile;
mod schema;
mod sqlite;

pub use executor::{QueryExecutor, QueryResult, Record, SqlParam};
pub use reconcile::{
    AssociationOutcome, ClueSubmission, EntryOutcome, Reconciliation, SkipReason, SkippedEntry,
};
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn count_users(&self) -> Result<i64>;

    // Mystery operations
    fn get_mystery(&self, id: i64) -> Result<Option<Mystery>>;
    fn get_mystery_with_clues(&self, id: i64) -> Result<Option<MysteryWithClues>>;
    fn list_mysteries(&self, limit: i64, offset: i64) -> Result<Vec<Mystery>>;
    fn count_mysteries(&self) -> Result<i64>;
    fn delete_mystery(&self, id: i64, actor: Actor) -> Result<bool>;

    // Association maintenance (mystery <-> clue, many-to-many)
    fn create_mystery_with_clues(
        &self,
        mystery: &NewMystery,
        submissions: &[ClueSubmission],
    ) -> Result<Reconciliation>;
    fn update_mystery_with_clues(
        &self,
        id: i64,
        edit: &MysteryEdit,
        submissions: &[ClueSubmission],
        pending: &[ClueSubmission],
    ) -> Result<Reconciliation>;
    fn upsert_mystery_clue(
        &self,
        mystery_id: i64,
        clue_id: i64,
        quantity: &Quantity,
    ) -> Result<AssociationOutcome>;
    fn remove_mystery_clues(&self, mystery_id: i64, clue_ids: &[i64]) -> Result<usize>;

    // Clue operations
    fn create_clue(&self, name: &str) -> Result<Clue>;
    fn get_clue(&self, id: i64) -> Result<Option<Clue>>;
    fn list_all_clues(&self) -> Result<Vec<Clue>>;
    fn list_clues(&self, limit: i64, offset: i64) -> Result<Vec<Clue>>;
    fn count_clues(&self) -> Result<i64>;
    fn update_clue(&self, id: i64, name: &str) -> Result<bool>;
    fn delete_clue(&self, id: i64) -> Result<bool>;

    // Search
    fn search(
        &self,
        kind: SearchKind,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<SearchResults>;
    fn count_search(&self, kind: SearchKind, query: &str) -> Result<i64>;

    // Session operations (data is opaque JSON)
    fn load_session(&self, id_hash: &str) -> Result<Option<String>>;
    fn save_session(&self, id_hash: &str, data: &str, expires_at: DateTime<Utc>) -> Result<()>;
    fn delete_session(&self, id_hash: &str) -> Result<bool>;
    fn purge_expired_sessions(&self) -> Result<usize>;
}
