pub const SCHEMA: &str = r#"
-- Accounts; passwords are argon2id PHC strings
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Mysteries are the user-authored entries
CREATE TABLE IF NOT EXISTS mysteries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    author_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT DEFAULT (datetime('now'))
);

-- Clues are curated by admins and shared between mysteries
CREATE TABLE IF NOT EXISTS clues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Many-to-many relationship between mysteries and clues
CREATE TABLE IF NOT EXISTS mystery_clues (
    mystery_id INTEGER NOT NULL REFERENCES mysteries(id) ON DELETE CASCADE,
    clue_id INTEGER NOT NULL REFERENCES clues(id) ON DELETE CASCADE,
    quantity TEXT NOT NULL,
    PRIMARY KEY (mystery_id, clue_id)
);

-- Server-side sessions; only a hash of the cookie value is kept
CREATE TABLE IF NOT EXISTS sessions (
    id_hash TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mysteries_title ON mysteries(title);
CREATE INDEX IF NOT EXISTS idx_mysteries_author ON mysteries(author_id);
CREATE INDEX IF NOT EXISTS idx_mystery_clues_clue ON mystery_clues(clue_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
"#;
