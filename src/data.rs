use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::fmt::Display;

/// A single SQLite table keyed by a text `id`.
#[async_trait::async_trait]
pub trait Table {
    type Record<'a>;

    fn get_name(&self) -> &str;
    fn get_pool(&self) -> &SqlitePool;

    async fn create(&self) -> Result<(), sqlx::Error>;
    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error>;

    async fn is_exist<I: AsRef<str> + Display + Send + Sync>(
        &self,
        id: I,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("SELECT id FROM {} WHERE id = ?", self.get_name());
        Ok(sqlx::query(&query)
            .bind(id.as_ref())
            .fetch_optional(self.get_pool())
            .await?
            .is_some())
    }

    async fn delete<I: AsRef<str> + Send + Sync>(&self, id: I) -> Result<(), sqlx::Error> {
        let query = format!(r#"DELETE FROM {} WHERE id = ?"#, self.get_name());
        sqlx::query(&query)
            .bind(id.as_ref())
            .execute(self.get_pool())
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.get_name());
        Ok(sqlx::query(&query)
            .fetch_one(self.get_pool())
            .await?
            .try_get(0)?)
    }
}

pub(crate) async fn is_table_exists(
    pool: &SqlitePool,
    table_name: &str,
) -> Result<bool, sqlx::Error> {
    Ok(
        sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?
            .is_some(),
    )
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
