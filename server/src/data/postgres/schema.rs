//! PostgreSQL schema definitions
//!
//! Same table shape as the SQLite schema. Constraints are named so that
//! unique violations can be attributed to a column.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

pub const FILES_IDENTIFIER_CONSTRAINT: &str = "files_identifier_pkey";
pub const FILES_DIGEST_CONSTRAINT: &str = "files_digest_key";

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at BIGINT NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success BOOLEAN NOT NULL DEFAULT TRUE
);

-- =============================================================================
-- Files: digest <-> identifier registry
-- =============================================================================
CREATE TABLE IF NOT EXISTS files (
    identifier TEXT NOT NULL,
    digest TEXT NOT NULL,
    uploader TEXT NOT NULL DEFAULT '',
    created_at BIGINT NOT NULL,
    CONSTRAINT files_identifier_pkey PRIMARY KEY (identifier),
    CONSTRAINT files_digest_key UNIQUE (digest),
    CONSTRAINT files_identifier_prefix_check CHECK (
        length(identifier) >= 1 AND left(digest, length(identifier)) = identifier
    )
);

CREATE INDEX IF NOT EXISTS idx_files_uploader ON files(uploader);
"#;

/// Detects a `files` table created by the previous generation of the
/// service (`id`, `hash`, `uploader`, `uploaded_when`).
pub const LEGACY_FILES_PROBE: &str = r#"
SELECT EXISTS (
    SELECT FROM information_schema.columns
    WHERE table_schema = 'public'
    AND table_name = 'files'
    AND column_name = 'hash'
)
"#;

pub const LEGACY_FILES_RENAME: &str = "ALTER TABLE files RENAME TO legacy_files";

/// Copies legacy rows into the current table. Runs after `SCHEMA`.
pub const LEGACY_FILES_IMPORT: &str = r#"
INSERT INTO files (identifier, digest, uploader, created_at)
SELECT
    id,
    hash,
    COALESCE(uploader, ''),
    COALESCE(EXTRACT(EPOCH FROM uploaded_when)::BIGINT, 0)
FROM legacy_files
WHERE hash IS NOT NULL
  AND length(id) >= 1
  AND left(hash, length(id)) = id
ON CONFLICT DO NOTHING
"#;
