//! File registry repository for SQLite operations
//!
//! Each claim is one `INSERT` against the `files` table. The primary key on
//! `identifier` and the unique index on `digest` decide the race; this module
//! only translates the resulting error into an [`InsertOutcome`].

use sqlx::SqlitePool;
use sqlx::error::ErrorKind;

use crate::data::sqlite::SqliteError;
use crate::data::types::{ConflictField, FileRow, InsertOutcome, NewFileRow};

const UNIQUE_FAILED_PREFIX: &str = "UNIQUE constraint failed: ";

/// Insert a file record unless its identifier or digest is already taken
pub async fn insert_if_absent(
    pool: &SqlitePool,
    row: NewFileRow<'_>,
) -> Result<InsertOutcome, SqliteError> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        "INSERT INTO files (identifier, digest, uploader, created_at) VALUES (?, ?, ?, ?)",
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
            ErrorKind::UniqueViolation => match unique_conflict_field(db_err.message()) {
                Some(field) => Ok(InsertOutcome::Conflict(field)),
                None => Err(SqliteError::Constraint(db_err.message().to_string())),
            },
            ErrorKind::Other => Err(SqliteError::Database(sqlx::Error::Database(db_err))),
            _ => Err(SqliteError::Constraint(db_err.message().to_string())),
        },
        Err(e) => Err(e.into()),
    }
}

/// Map `UNIQUE constraint failed: files.<column>` to the conflicting field
///
/// A message naming more than one column is not attributable and yields None.
fn unique_conflict_field(message: &str) -> Option<ConflictField> {
    let columns = message.strip_prefix(UNIQUE_FAILED_PREFIX)?;
    match columns.trim() {
        "files.identifier" => Some(ConflictField::Identifier),
        "files.digest" => Some(ConflictField::Digest),
        _ => None,
    }
}

/// Get a file record by its full digest
pub async fn find_by_digest(
    pool: &SqlitePool,
    digest: &str,
) -> Result<Option<FileRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, String, i64)>(
        "SELECT identifier, digest, uploader, created_at FROM files WHERE digest = ?",
    )
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_file_row))
}

/// Get a file record by its identifier
pub async fn find_by_identifier(
    pool: &SqlitePool,
    identifier: &str,
) -> Result<Option<FileRow>, SqliteError> {
    let row = sqlx::query_as::<_, (String, String, String, i64)>(
        "SELECT identifier, digest, uploader, created_at FROM files WHERE identifier = ?",
    )
    .bind(identifier)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(into_file_row))
}

/// Count registered files
pub async fn count_files(pool: &SqlitePool) -> Result<i64, SqliteError> {
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

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();

        for statement in crate::data::sqlite::schema::SCHEMA
            .split(';')
            .filter(|s| !s.trim().is_empty())
        {
            sqlx::query(statement.trim()).execute(&pool).await.unwrap();
        }

        pool
    }

    fn new_row<'a>(identifier: &'a str, digest: &'a str) -> NewFileRow<'a> {
        NewFileRow {
            identifier,
            digest,
            uploader: "alice",
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let pool = setup_test_pool().await;

        let outcome = insert_if_absent(&pool, new_row("a", "a1")).await.unwrap();
        let InsertOutcome::Inserted(row) = outcome else {
            panic!("expected insert, got {:?}", outcome);
        };
        assert_eq!(row.identifier, "a");
        assert_eq!(row.uploader, "alice");

        let by_digest = find_by_digest(&pool, "a1").await.unwrap().unwrap();
        assert_eq!(by_digest, row);
        let by_identifier = find_by_identifier(&pool, "a").await.unwrap().unwrap();
        assert_eq!(by_identifier, row);
        assert_eq!(count_files(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_missing() {
        let pool = setup_test_pool().await;
        assert!(find_by_digest(&pool, "ff").await.unwrap().is_none());
        assert!(find_by_identifier(&pool, "f").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identifier_conflict() {
        let pool = setup_test_pool().await;
        insert_if_absent(&pool, new_row("a", "ab")).await.unwrap();

        let outcome = insert_if_absent(&pool, new_row("a", "ac")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Conflict(ConflictField::Identifier));
        assert_eq!(count_files(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_digest_conflict() {
        let pool = setup_test_pool().await;
        insert_if_absent(&pool, new_row("a", "ab")).await.unwrap();

        let outcome = insert_if_absent(&pool, new_row("ab", "ab")).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Conflict(ConflictField::Digest));
    }

    #[tokio::test]
    async fn test_identifier_must_prefix_digest() {
        let pool = setup_test_pool().await;

        let result = insert_if_absent(&pool, new_row("b", "a1")).await;
        assert!(matches!(result, Err(SqliteError::Constraint(_))));

        let result = insert_if_absent(&pool, new_row("", "a1")).await;
        assert!(matches!(result, Err(SqliteError::Constraint(_))));
        assert_eq!(count_files(&pool).await.unwrap(), 0);
    }

    #[test]
    fn test_unique_conflict_field() {
        assert_eq!(
            unique_conflict_field("UNIQUE constraint failed: files.identifier"),
            Some(ConflictField::Identifier)
        );
        assert_eq!(
            unique_conflict_field("UNIQUE constraint failed: files.digest"),
            Some(ConflictField::Digest)
        );
        assert_eq!(
            unique_conflict_field("UNIQUE constraint failed: files.identifier, files.digest"),
            None
        );
        assert_eq!(unique_conflict_field("CHECK constraint failed"), None);
    }
}
