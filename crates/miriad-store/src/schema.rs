/// SQL DDL for the miriad database.
/// WAL mode + foreign keys enabled at connection time. The whole batch is
/// idempotent so migrations can run on every startup.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS temporal_messages (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    tokens INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS temporal_summaries (
    id TEXT PRIMARY KEY,
    ord INTEGER NOT NULL,
    start_id TEXT NOT NULL,
    end_id TEXT NOT NULL,
    narrative TEXT NOT NULL,
    observations TEXT NOT NULL DEFAULT '[]',
    tags TEXT NOT NULL DEFAULT '[]',
    tokens INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS present_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    mission TEXT,
    status TEXT,
    tasks TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ltm_entries (
    slug TEXT PRIMARY KEY,
    parent_slug TEXT,
    path TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    links TEXT NOT NULL DEFAULT '[]',
    version INTEGER NOT NULL DEFAULT 1,
    created_by TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    archived_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workers (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    error TEXT
);

CREATE TABLE IF NOT EXISTS session_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_summaries_range ON temporal_summaries(start_id, end_id);
CREATE INDEX IF NOT EXISTS idx_ltm_parent ON ltm_entries(parent_slug);
CREATE INDEX IF NOT EXISTS idx_workers_status ON workers(status);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Content-linked full-text indexes, kept in sync by triggers.
/// One over temporal message content, one over LTM title+body.
pub const CREATE_FTS: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS temporal_messages_fts USING fts5(
    content,
    content='temporal_messages',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS temporal_messages_ai AFTER INSERT ON temporal_messages BEGIN
    INSERT INTO temporal_messages_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS temporal_messages_ad AFTER DELETE ON temporal_messages BEGIN
    INSERT INTO temporal_messages_fts(temporal_messages_fts, rowid, content)
    VALUES ('delete', old.rowid, old.content);
END;

CREATE TRIGGER IF NOT EXISTS temporal_messages_au AFTER UPDATE ON temporal_messages BEGIN
    INSERT INTO temporal_messages_fts(temporal_messages_fts, rowid, content)
    VALUES ('delete', old.rowid, old.content);
    INSERT INTO temporal_messages_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE VIRTUAL TABLE IF NOT EXISTS ltm_entries_fts USING fts5(
    title,
    body,
    content='ltm_entries',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS ltm_entries_ai AFTER INSERT ON ltm_entries BEGIN
    INSERT INTO ltm_entries_fts(rowid, title, body) VALUES (new.rowid, new.title, new.body);
END;

CREATE TRIGGER IF NOT EXISTS ltm_entries_ad AFTER DELETE ON ltm_entries BEGIN
    INSERT INTO ltm_entries_fts(ltm_entries_fts, rowid, title, body)
    VALUES ('delete', old.rowid, old.title, old.body);
END;

CREATE TRIGGER IF NOT EXISTS ltm_entries_au AFTER UPDATE ON ltm_entries BEGIN
    INSERT INTO ltm_entries_fts(ltm_entries_fts, rowid, title, body)
    VALUES ('delete', old.rowid, old.title, old.body);
    INSERT INTO ltm_entries_fts(rowid, title, body) VALUES (new.rowid, new.title, new.body);
END;
"#;

/// Rebuild both FTS indexes from their content tables. Safe to run
/// repeatedly; migrations call this after schema creation.
pub const REBUILD_FTS: &str = r#"
INSERT INTO temporal_messages_fts(temporal_messages_fts) VALUES('rebuild');
INSERT INTO ltm_entries_fts(ltm_entries_fts) VALUES('rebuild');
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
