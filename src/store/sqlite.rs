use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use super::executor::{self, QueryExecutor, SqlParam};
use super::reconcile::{
    AssociationOutcome, ClueSubmission, EntryOutcome, NO_VALID_CLUES, Reconciliation, SkipReason,
    SkippedEntry, ValidEntry, classify, parse_id,
};
use super::schema::SCHEMA;
use super::Store;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    executor: QueryExecutor,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Ok(Self {
            executor: QueryExecutor::open(db_path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            executor: QueryExecutor::open_in_memory()?,
        })
    }

    /// Returns the statement executor.
    /// This allows consuming applications to execute custom SQL.
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Wraps a search term for `LIKE ... ESCAPE '\'` so `%` and `_` match
/// literally.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const USER_COLUMNS: &str = "id, username, password_hash, is_admin, created_at";
const MYSTERY_COLUMNS: &str = "id, title, description, author_id, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        is_admin: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn mystery_from_row(row: &Row<'_>) -> rusqlite::Result<Mystery> {
    Ok(Mystery {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        author_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn clue_from_row(row: &Row<'_>) -> rusqlite::Result<Clue> {
    Ok(Clue {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn count(conn: &Connection, statement: &str, params: &[SqlParam]) -> Result<i64> {
    executor::query_one(conn, statement, params, |row| row.get(0))
}

/// Writes one association with insert-on-conflict-update. Callers hold an
/// immediate transaction, so the existence probe cannot race the write.
fn upsert_association(
    conn: &Connection,
    mystery_id: i64,
    entry: &ValidEntry,
) -> Result<AssociationOutcome> {
    let existed = executor::query_opt(
        conn,
        "SELECT 1 FROM mystery_clues WHERE mystery_id = ?1 AND clue_id = ?2",
        &[mystery_id.into(), entry.clue_id.into()],
        |_| Ok(()),
    )?
    .is_some();

    executor::execute(
        conn,
        "INSERT INTO mystery_clues (mystery_id, clue_id, quantity) VALUES (?1, ?2, ?3)
         ON CONFLICT(mystery_id, clue_id) DO UPDATE SET quantity = excluded.quantity",
        &[
            mystery_id.into(),
            entry.clue_id.into(),
            entry.quantity.to_string().into(),
        ],
    )?;

    Ok(if existed {
        AssociationOutcome::Updated
    } else {
        AssociationOutcome::Inserted
    })
}

/// Separates submissions whose clue no longer exists. Unparseable ids are
/// kept so `classify` reports them.
fn split_missing_clues(
    conn: &Connection,
    submissions: &[ClueSubmission],
) -> Result<(Vec<ClueSubmission>, Vec<SkippedEntry>)> {
    let mut known = Vec::with_capacity(submissions.len());
    let mut missing = Vec::new();

    for submission in submissions {
        if let Some(clue_id) = parse_id(&submission.clue_id) {
            let exists = executor::query_opt(
                conn,
                "SELECT 1 FROM clues WHERE id = ?1",
                &[clue_id.into()],
                |_| Ok(()),
            )?
            .is_some();
            if !exists {
                missing.push(SkippedEntry {
                    clue_id: submission.clue_id.clone(),
                    reason: SkipReason::UnknownClue,
                });
                continue;
            }
        }
        known.push(submission.clone());
    }

    Ok((known, missing))
}

fn apply_entries(
    conn: &Connection,
    mystery_id: i64,
    entries: &[ValidEntry],
    outcomes: &mut Vec<EntryOutcome>,
) -> Result<()> {
    for entry in entries {
        let outcome = match upsert_association(conn, mystery_id, entry)? {
            AssociationOutcome::Inserted => EntryOutcome::Inserted {
                clue_id: entry.clue_id,
            },
            AssociationOutcome::Updated => EntryOutcome::Updated {
                clue_id: entry.clue_id,
            },
        };
        outcomes.push(outcome);
    }
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.executor.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.executor.conn();
        executor::query_one(
            &conn,
            &format!(
                "INSERT INTO users (username, password_hash, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4) RETURNING {USER_COLUMNS}"
            ),
            &[
                user.username.as_str().into(),
                SqlParam::Secret(user.password_hash.clone()),
                user.is_admin.into(),
                format_datetime(&Utc::now()).into(),
            ],
            user_from_row,
        )
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        executor::query_opt(
            &self.executor.conn(),
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            &[id.into()],
            user_from_row,
        )
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        executor::query_opt(
            &self.executor.conn(),
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            &[username.into()],
            user_from_row,
        )
    }

    fn count_users(&self) -> Result<i64> {
        count(&self.executor.conn(), "SELECT COUNT(*) FROM users", &[])
    }

    // Mystery operations

    fn get_mystery(&self, id: i64) -> Result<Option<Mystery>> {
        executor::query_opt(
            &self.executor.conn(),
            &format!("SELECT {MYSTERY_COLUMNS} FROM mysteries WHERE id = ?1"),
            &[id.into()],
            mystery_from_row,
        )
    }

    fn get_mystery_with_clues(&self, id: i64) -> Result<Option<MysteryWithClues>> {
        let conn = self.executor.conn();
        let Some(mystery) = executor::query_opt(
            &conn,
            &format!("SELECT {MYSTERY_COLUMNS} FROM mysteries WHERE id = ?1"),
            &[id.into()],
            mystery_from_row,
        )?
        else {
            return Ok(None);
        };

        let clues = executor::query_map(
            &conn,
            "SELECT c.id, c.name, mc.quantity
             FROM mystery_clues mc
             JOIN clues c ON c.id = mc.clue_id
             WHERE mc.mystery_id = ?1
             ORDER BY c.name ASC",
            &[id.into()],
            |row| {
                Ok(MysteryClue {
                    clue_id: row.get(0)?,
                    name: row.get(1)?,
                    quantity: Quantity::from(row.get::<_, String>(2)?),
                })
            },
        )?;

        Ok(Some(MysteryWithClues { mystery, clues }))
    }

    fn list_mysteries(&self, limit: i64, offset: i64) -> Result<Vec<Mystery>> {
        executor::query_map(
            &self.executor.conn(),
            &format!(
                "SELECT {MYSTERY_COLUMNS} FROM mysteries ORDER BY title ASC, id ASC LIMIT ?1 OFFSET ?2"
            ),
            &[limit.into(), offset.into()],
            mystery_from_row,
        )
    }

    fn count_mysteries(&self) -> Result<i64> {
        count(&self.executor.conn(), "SELECT COUNT(*) FROM mysteries", &[])
    }

    fn delete_mystery(&self, id: i64, actor: Actor) -> Result<bool> {
        self.executor.transaction(|tx| {
            let Some(author_id) = executor::query_opt(
                tx,
                "SELECT author_id FROM mysteries WHERE id = ?1",
                &[id.into()],
                |row| row.get::<_, i64>(0),
            )?
            else {
                return Ok(false);
            };

            if author_id != actor.user_id && !actor.is_admin {
                tracing::warn!(
                    "User {} attempted to delete mystery {} owned by {}",
                    actor.user_id,
                    id,
                    author_id
                );
                return Ok(false);
            }

            executor::execute(
                tx,
                "DELETE FROM mystery_clues WHERE mystery_id = ?1",
                &[id.into()],
            )?;
            let deleted = executor::execute(tx, "DELETE FROM mysteries WHERE id = ?1", &[id.into()])?;
            Ok(deleted.row_count > 0)
        })
    }

    // Association maintenance

    fn create_mystery_with_clues(
        &self,
        mystery: &NewMystery,
        submissions: &[ClueSubmission],
    ) -> Result<Reconciliation> {
        let classified = classify(submissions);
        if classified.valid.is_empty() {
            return Err(Error::Validation(NO_VALID_CLUES.to_string()));
        }

        for skipped in &classified.skipped {
            tracing::warn!(
                "Skipping clue '{}': {}",
                skipped.clue_id,
                skipped.reason.message()
            );
        }

        self.executor.transaction(|tx| {
            let mystery_id: i64 = executor::query_one(
                tx,
                "INSERT INTO mysteries (title, description, author_id, created_at)
                 VALUES (?1, ?2, ?3, ?4) RETURNING id",
                &[
                    mystery.title.as_str().into(),
                    mystery.description.as_str().into(),
                    mystery.author_id.into(),
                    format_datetime(&Utc::now()).into(),
                ],
                |row| row.get(0),
            )?;

            let mut outcomes = Vec::with_capacity(submissions.len());
            apply_entries(tx, mystery_id, &classified.valid, &mut outcomes)?;
            outcomes.extend(classified.skipped.iter().cloned().map(EntryOutcome::Skipped));

            Ok(Reconciliation {
                mystery_id,
                outcomes,
            })
        })
    }

    fn update_mystery_with_clues(
        &self,
        id: i64,
        edit: &MysteryEdit,
        submissions: &[ClueSubmission],
        pending: &[ClueSubmission],
    ) -> Result<Reconciliation> {
        if id <= 0 {
            return Err(Error::BadRequest(format!("invalid mystery id: {id}")));
        }

        self.executor.transaction(|tx| {
            let updated = executor::execute(
                tx,
                "UPDATE mysteries SET title = ?1, description = ?2 WHERE id = ?3",
                &[
                    edit.title.as_str().into(),
                    edit.description.as_str().into(),
                    id.into(),
                ],
            )?;
            if updated.row_count == 0 {
                return Err(Error::NotFound);
            }

            // Staged clues may have been deleted since they were added to the session.
            let (known, missing) = split_missing_clues(tx, pending)?;
            let combined: Vec<ClueSubmission> = submissions.iter().chain(&known).cloned().collect();
            let mut classified = classify(&combined);
            classified.skipped.extend(missing);

            for skipped in &classified.skipped {
                tracing::warn!(
                    "Skipping clue '{}' for mystery {}: {}",
                    skipped.clue_id,
                    id,
                    skipped.reason.message()
                );
            }

            let mut outcomes = Vec::with_capacity(combined.len());
            apply_entries(tx, id, &classified.valid, &mut outcomes)?;
            outcomes.extend(classified.skipped.iter().cloned().map(EntryOutcome::Skipped));

            Ok(Reconciliation {
                mystery_id: id,
                outcomes,
            })
        })
    }

    fn upsert_mystery_clue(
        &self,
        mystery_id: i64,
        clue_id: i64,
        quantity: &Quantity,
    ) -> Result<AssociationOutcome> {
        let entry = ValidEntry {
            clue_id,
            quantity: quantity.clone(),
        };
        self.executor
            .transaction(|tx| upsert_association(tx, mystery_id, &entry))
    }

    fn remove_mystery_clues(&self, mystery_id: i64, clue_ids: &[i64]) -> Result<usize> {
        self.executor.transaction(|tx| {
            let mut removed = 0;
            for clue_id in clue_ids {
                removed += executor::execute(
                    tx,
                    "DELETE FROM mystery_clues WHERE mystery_id = ?1 AND clue_id = ?2",
                    &[mystery_id.into(), (*clue_id).into()],
                )?
                .row_count;
            }
            Ok(removed)
        })
    }

    // Clue operations

    fn create_clue(&self, name: &str) -> Result<Clue> {
        executor::query_one(
            &self.executor.conn(),
            "INSERT INTO clues (name) VALUES (?1) RETURNING id, name",
            &[name.into()],
            clue_from_row,
        )
    }

    fn get_clue(&self, id: i64) -> Result<Option<Clue>> {
        executor::query_opt(
            &self.executor.conn(),
            "SELECT id, name FROM clues WHERE id = ?1",
            &[id.into()],
            clue_from_row,
        )
    }

    fn list_all_clues(&self) -> Result<Vec<Clue>> {
        executor::query_map(
            &self.executor.conn(),
            "SELECT id, name FROM clues ORDER BY name ASC",
            &[],
            clue_from_row,
        )
    }

    fn list_clues(&self, limit: i64, offset: i64) -> Result<Vec<Clue>> {
        executor::query_map(
            &self.executor.conn(),
            "SELECT id, name FROM clues ORDER BY name ASC LIMIT ?1 OFFSET ?2",
            &[limit.into(), offset.into()],
            clue_from_row,
        )
    }

    fn count_clues(&self) -> Result<i64> {
        count(&self.executor.conn(), "SELECT COUNT(*) FROM clues", &[])
    }

    fn update_clue(&self, id: i64, name: &str) -> Result<bool> {
        let result = self.executor.execute(
            "UPDATE clues SET name = ?1 WHERE id = ?2",
            &[name.into(), id.into()],
        )?;
        Ok(result.row_count > 0)
    }

    fn delete_clue(&self, id: i64) -> Result<bool> {
        let result = self
            .executor
            .execute("DELETE FROM clues WHERE id = ?1", &[id.into()])?;
        Ok(result.row_count > 0)
    }

    // Search

    fn search(
        &self,
        kind: SearchKind,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<SearchResults> {
        let conn = self.executor.conn();
        let params: [SqlParam; 3] = [like_pattern(query).into(), limit.into(), offset.into()];

        match kind {
            SearchKind::Mysteries => executor::query_map(
                &conn,
                &format!(
                    "SELECT {MYSTERY_COLUMNS} FROM mysteries
                     WHERE title LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'
                     ORDER BY title ASC, id ASC LIMIT ?2 OFFSET ?3"
                ),
                &params,
                mystery_from_row,
            )
            .map(SearchResults::Mysteries),
            SearchKind::Clues => executor::query_map(
                &conn,
                "SELECT id, name FROM clues WHERE name LIKE ?1 ESCAPE '\\'
                 ORDER BY name ASC LIMIT ?2 OFFSET ?3",
                &params,
                clue_from_row,
            )
            .map(SearchResults::Clues),
            SearchKind::MysteriesByClue => executor::query_map(
                &conn,
                "SELECT DISTINCT m.id, m.title, m.description, m.author_id, m.created_at
                 FROM mysteries m
                 JOIN mystery_clues mc ON m.id = mc.mystery_id
                 JOIN clues c ON mc.clue_id = c.id
                 WHERE c.name LIKE ?1 ESCAPE '\\'
                 ORDER BY m.title ASC, m.id ASC LIMIT ?2 OFFSET ?3",
                &params,
                mystery_from_row,
            )
            .map(SearchResults::Mysteries),
        }
    }

    fn count_search(&self, kind: SearchKind, query: &str) -> Result<i64> {
        let statement = match kind {
            SearchKind::Mysteries => {
                "SELECT COUNT(*) FROM mysteries
                 WHERE title LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\'"
            }
            SearchKind::Clues => "SELECT COUNT(*) FROM clues WHERE name LIKE ?1 ESCAPE '\\'",
            SearchKind::MysteriesByClue => {
                "SELECT COUNT(DISTINCT m.id) FROM mysteries m
                 JOIN mystery_clues mc ON m.id = mc.mystery_id
                 JOIN clues c ON mc.clue_id = c.id
                 WHERE c.name LIKE ?1 ESCAPE '\\'"
            }
        };
        count(&self.executor.conn(), statement, &[like_pattern(query).into()])
    }

    // Session operations

    fn load_session(&self, id_hash: &str) -> Result<Option<String>> {
        let result = self.executor.execute(
            "SELECT data FROM sessions WHERE id_hash = ?1 AND expires_at > ?2",
            &[id_hash.into(), format_datetime(&Utc::now()).into()],
        )?;
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get("data"))
            .and_then(|data| data.as_str())
            .map(str::to_string))
    }

    fn save_session(&self, id_hash: &str, data: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.executor.execute(
            "INSERT INTO sessions (id_hash, data, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id_hash) DO UPDATE SET data = excluded.data, expires_at = excluded.expires_at",
            &[
                id_hash.into(),
                SqlParam::Secret(data.to_string()),
                format_datetime(&expires_at).into(),
            ],
        )?;
        Ok(())
    }

    fn delete_session(&self, id_hash: &str) -> Result<bool> {
        let result = self
            .executor
            .execute("DELETE FROM sessions WHERE id_hash = ?1", &[id_hash.into()])?;
        Ok(result.row_count > 0)
    }

    fn purge_expired_sessions(&self) -> Result<usize> {
        let result = self.executor.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            &[format_datetime(&Utc::now()).into()],
        )?;
        Ok(result.row_count)
    }
}
