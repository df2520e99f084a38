//! SQL schema for the Keti SQLite store.
//!
//! Executed at connection startup. The layout version is recorded in
//! `PRAGMA user_version`; future migrations will be gated on it.

/// Layout version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS profiles (
    user_id     TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    name        TEXT,
    role        TEXT NOT NULL DEFAULT 'user',   -- 'admin' | 'user'
    avatar_path TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'preparing',
    owner_id      TEXT REFERENCES profiles(user_id),
    kickoff_date  TEXT,            -- YYYY-MM-DD or NULL
    deadline_date TEXT,            -- YYYY-MM-DD or NULL
    created_at    TEXT NOT NULL,   -- RFC 3339, fixed microsecond precision
    version       INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS achievements (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id  INTEGER NOT NULL REFERENCES subjects(id),
    title       TEXT NOT NULL,
    kind        TEXT,
    doc_path    TEXT,
    pdf_path    TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subjects_created  ON subjects(created_at);
CREATE INDEX IF NOT EXISTS idx_subjects_owner    ON subjects(owner_id);
CREATE INDEX IF NOT EXISTS idx_achievements_subj ON achievements(subject_id);
";
