//! File registry repository for PostgreSQL operations
//!
//! PostgreSQL reports the name of the violated constraint, so conflicts are
//! attributed by constraint name rather than by message text. When a row
//! violates both unique constraints only the first one checked is reported.

use sqlx::PgPool;
use sqlx::error::ErrorKind;

use crate::data::postgres::PostgresError;
use crate::data::postgres::schema::{FILES_DIGEST_CONSTRAINT, FILES_IDENTIFIER_CONSTRAINT};
use crate::data::types::{ConflictField, FileRow, InsertOutcome, NewFileRow};

/// Insert a file record unless its identifier or digest is already taken
pub async fn insert_if_absent(
    pool: &PgPool,
    row: NewFileRow<'_>,
) -> Result<InsertOutcome, PostgresError> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT INTO files (identifier, digest, uploader, created_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(row.identifier)
    .bind(row.digest)
    .bind(row.uploader)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(FileRow {
            identifier: row.identifier.to_string(),
            digest: row.digest.to_string(),
            uploader: row.uploader.to_string(),
            created_at: now,
        })),
        Err(sqlx::Error::Database(db_err)) => match db_err.kind() {
            ErrorKind::UniqueViolation => match constraint_conflict_field(db_err.constraint()) {
                Some(field) => Ok(InsertOutcome::Conflict(field)),
                None => Err(PostgresError::Constraint(db_err.message().to_string())),
            },
            ErrorKind::Other => Err(PostgresError::Database(sqlx::Error::Database(db_err))),
            _ => Err(PostgresError::Constraint(db_err.message().to_string())),
        },
        Err(e) => Err(e.into()),
    }
}

fn constraint_conflict_field(constraint: Option<&str>) -> Option<ConflictField> {
    match constraint? {
        FILES_IDENTIFIER_CONSTRAINT => Some(ConflictField::Identifier),
        FILES_DIGEST_CONSTRAINT => Some(ConflictField::Digest),
        _ => None,
    }
}

/// Get a file record by its full digest
pub async fn find_by_digest(pool: &PgPool, digest: &str) -> Result<Option<FileRow>, PostgresError> {
    let row = sqlx::query_as::<_, (String, String, String, i64)>(
        "SELECT identifier, digest, uploader, created_at FROM files WHERE digest = $1",
    )
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_file_row))
}

/// Get a file record by its identifier
pub async fn find_by_identifier(
    pool: &PgPool,
    identifier: &str,
) -> Result<Option<FileRow>, PostgresError> {
    let row = sqlx::query_as::<_, (String, String, String, i64)>(
        "SELECT identifier, digest, uploader, created_at FROM files WHERE identifier = $1",
    )
    .bind(identifier)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_file_row))
}

/// Count registered files
pub async fn count_files(pool: &PgPool) -> Result<i64, PostgresError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

fn into_file_row(
    (identifier, digest, uploader, created_at): (String, String, String, i64),
) -> FileRow {
    FileRow {
        identifier,
        digest,
        uploader,
        created_at,
    }
}
