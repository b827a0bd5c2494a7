//! SQLite schema definitions

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- Files: digest <-> identifier registry
-- =============================================================================
CREATE TABLE IF NOT EXISTS files (
    identifier TEXT NOT NULL PRIMARY KEY CHECK(length(identifier) >= 1),
    digest TEXT NOT NULL UNIQUE CHECK(length(digest) >= 1),
    uploader TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    CHECK(substr(digest, 1, length(identifier)) = identifier)
);

CREATE INDEX IF NOT EXISTS idx_files_uploader ON files(uploader);
"#;
