//! SQLite implementation of the RejectedFixStore.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FixKey, RejectedFixRecord};
use crate::domain::ports::RejectedFixStore;

#[derive(Clone)]
pub struct SqliteRejectedFixStore {
    pool: SqlitePool,
}

impl SqliteRejectedFixStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RejectedFixStore for SqliteRejectedFixStore {
    async fn get(&self, key: &FixKey) -> DomainResult<Option<RejectedFixRecord>> {
        let row: Option<RejectedFixRow> = sqlx::query_as(
            "SELECT fix_hash, repo_name, file_path, reason, created_at, updated_at FROM rejected_fixes WHERE fix_hash = ?",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn upsert(&self, record: &RejectedFixRecord) -> DomainResult<()> {
        // Single-row upsert keyed on the hash; concurrent writers of the same
        // key converge on one row.
        sqlx::query(
            r#"INSERT INTO rejected_fixes (fix_hash, repo_name, file_path, reason, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(fix_hash) DO UPDATE SET
                   reason = excluded.reason,
                   updated_at = excluded.updated_at"#,
        )
        .bind(record.key.as_str())
        .bind(&record.repo)
        .bind(&record.file_path)
        .bind(&record.reason)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rejected_fixes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[derive(sqlx::FromRow)]
struct RejectedFixRow {
    fix_hash: String,
    repo_name: String,
    file_path: String,
    reason: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RejectedFixRow> for RejectedFixRecord {
    type Error = DomainError;

    fn try_from(row: RejectedFixRow) -> Result<Self, Self::Error> {
        Ok(RejectedFixRecord {
            key: FixKey::from_hex(row.fix_hash),
            repo: row.repo_name,
            file_path: row.file_path,
            reason: row.reason,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::{Duration, Utc};

    async fn setup_store() -> SqliteRejectedFixStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteRejectedFixStore::new(pool)
    }

    fn record(reason: &str) -> RejectedFixRecord {
        let now = Utc::now();
        RejectedFixRecord {
            key: FixKey::compute("o/r", "app.py", "a", "b"),
            repo: "o/r".to_string(),
            file_path: "app.py".to_string(),
            reason: reason.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = setup_store().await;
        let key = FixKey::compute("o/r", "app.py", "a", "b");
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_and_first_created_at() {
        let store = setup_store().await;
        let first = record("no_match: original text not found in file");
        store.upsert(&first).await.unwrap();

        let mut second = record("syntax_invalid: line 3");
        second.created_at = first.created_at + Duration::hours(1);
        second.updated_at = first.updated_at + Duration::hours(1);
        store.upsert(&second).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let stored = store.get(&first.key).await.unwrap().unwrap();
        assert_eq!(stored.reason, "syntax_invalid: line 3");
        assert_eq!(stored.created_at.timestamp(), first.created_at.timestamp());
        assert_eq!(stored.updated_at.timestamp(), second.updated_at.timestamp());
    }
}
