use super::{JobBoard, JobPosting};
use crate::data::{is_table_exists, now};
use crate::{CrawlerError, Storage, Table};
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::Path;

pub const TABLE_PREFIX: &str = "fakejobs";

pub struct UrlTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for UrlTable {
    type Record<'a> = &'a str;

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !is_table_exists(self.get_pool(), &self.name).await? {
            let query = format!(
                "CREATE TABLE {} (
                    id TEXT PRIMARY KEY,
                    created_at DATETIME
                 )",
                &self.name
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }
        Ok(())
    }

    async fn insert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT OR IGNORE INTO {} (id, created_at) VALUES (?, ?)",
            &self.name
        );
        sqlx::query(&query)
            .bind(record)
            .bind(now())
            .execute(self.get_pool())
            .await?;
        Ok(())
    }
}

impl UrlTable {
    async fn get_n(&self, n: Option<u32>) -> Result<Vec<String>, sqlx::Error> {
        let query = format!("SELECT id FROM {} ORDER BY rowid LIMIT ?", self.name);
        let limit = n.map_or(-1, i64::from);
        let mut urls = vec![];
        for row in sqlx::query(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        {
            urls.push(row.try_get("id")?);
        }
        Ok(urls)
    }
}

/// One row per posting, keyed by `{page url}#{position on the page}`.
pub struct JobPostingTable {
    name: String,
    pool: SqlitePool,
}

#[async_trait::async_trait]
impl Table for JobPostingTable {
    type Record<'a> = (&'a str, JobBoard);

    fn get_name(&self) -> &str {
        self.name.as_str()
    }

    fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create(&self) -> Result<(), sqlx::Error> {
        if !is_table_exists(self.get_pool(), &self.name).await? {
            let query = format!(
                r#"
                        CREATE TABLE {} (
                            id TEXT PRIMARY KEY,
                            created_at DATETIME,
                            page_url TEXT,
                            title TEXT NOT NULL,
                            company TEXT,
                            location TEXT,
                            posted DATE,
                            apply_url TEXT
                        )
                    "#,
                &self.name
            );
            sqlx::query(query.as_str()).execute(self.get_pool()).await?;
        }
        Ok(())
    }

    async fn insert<'a>(&self, (url, board): Self::Record<'a>) -> Result<(), sqlx::Error> {
        let url = url.trim();
        let mut tx = self.get_pool().begin().await?;
        let query = format!(
            r#"INSERT OR IGNORE INTO {} (
                id,
                page_url,
                title,
                company,
                location,
                posted,
                apply_url,
                created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            self.name
        );
        let created_at = now();
        for (i, posting) in board.postings.into_iter().enumerate() {
            sqlx::query(&query)
                .bind(format!("{}#{}", url, i))
                .bind(url)
                .bind(posting.title)
                .bind(posting.company)
                .bind(posting.location)
                .bind(posting.posted)
                .bind(posting.apply_url)
                .bind(created_at)
                .execute(&mut tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl JobPostingTable {
    async fn get_all(&self) -> Result<Vec<(String, JobPosting)>, sqlx::Error> {
        let query = format!(
            "SELECT page_url, title, company, location, posted, apply_url FROM {} ORDER BY rowid",
            self.name
        );
        let mut postings = vec![];
        for row in sqlx::query(&query).fetch_all(&self.pool).await? {
            let page_url: String = row.try_get("page_url")?;
            let posted: Option<NaiveDate> = row.try_get("posted")?;
            postings.push((
                page_url,
                JobPosting {
                    title: row.try_get("title")?,
                    company: row.try_get("company")?,
                    location: row.try_get("location")?,
                    posted,
                    apply_url: row.try_get("apply_url")?,
                },
            ));
        }
        Ok(postings)
    }
}

/// Crawl state and extracted postings in a SQLite file, so an interrupted
/// crawl can be resumed.
pub struct JobData {
    pub name: String,
    pub queued: UrlTable,
    pub running: UrlTable,
    pub visited: UrlTable,
    pub warned: UrlTable,
    pub results: JobPostingTable,
    pool: SqlitePool,
}

impl JobData {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<JobData, CrawlerError> {
        let opt = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opt).await?;
        let name = TABLE_PREFIX;
        let p = JobData {
            name: name.to_string(),
            queued: UrlTable {
                name: format!("{}_queued", name),
                pool: pool.clone(),
            },
            running: UrlTable {
                name: format!("{}_running", name),
                pool: pool.clone(),
            },
            visited: UrlTable {
                name: format!("{}_visited", name),
                pool: pool.clone(),
            },
            warned: UrlTable {
                name: format!("{}_warned", name),
                pool: pool.clone(),
            },
            results: JobPostingTable {
                name: format!("{}_results", name),
                pool: pool.clone(),
            },
            pool,
        };

        for table in &[&p.queued, &p.running, &p.visited, &p.warned] {
            tracing::debug!("Open table {}", table.name);
            table.create().await?;
        }
        tracing::debug!("Open table {}", p.results.name);
        p.results.create().await?;

        Ok(p)
    }

    pub async fn results_get(&self) -> Result<Vec<(String, JobPosting)>, CrawlerError> {
        Ok(self.results.get_all().await?)
    }

    /// Drops queued urls that were already visited, returning how many went.
    pub async fn prune_queued(&self) -> Result<u32, CrawlerError> {
        let mut pruned = 0;
        for q in self.queued.get_n(None).await? {
            if self.visited.is_exist(q.as_str()).await? {
                self.queued.delete(q.as_str()).await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

#[async_trait::async_trait]
impl Storage for JobData {
    type Record = JobBoard;

    async fn queued_get(&self) -> Result<Vec<String>, CrawlerError> {
        Ok(self.queued.get_n(None).await?)
    }

    async fn queued_get_n(&self, n: u32) -> Result<Vec<String>, CrawlerError> {
        Ok(self.queued.get_n(Some(n)).await?)
    }

    async fn queued_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.queued.insert(item.as_str()).await?)
    }

    async fn queued_delete<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.queued.delete(item).await?)
    }

    async fn queued_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.queued.is_exist(item).await?)
    }

    async fn running_get(&self) -> Result<Vec<String>, CrawlerError> {
        Ok(self.running.get_n(None).await?)
    }

    async fn running_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.running.insert(item.as_str()).await?)
    }

    async fn running_delete<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.running.delete(item).await?)
    }

    async fn running_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.running.is_exist(item).await?)
    }

    async fn visited_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.visited.is_exist(item).await?)
    }

    async fn visited_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.visited.insert(item.as_str()).await?)
    }

    async fn results_count(&self) -> Result<u32, CrawlerError> {
        Ok(self.results.count().await?)
    }

    async fn results_insert<I: AsRef<str> + Send>(
        &self,
        (url, record): (I, Self::Record),
    ) -> Result<(), CrawlerError> {
        let url = url.as_ref().to_owned();
        Ok(self.results.insert((url.as_str(), record)).await?)
    }

    async fn warned_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        let item = item.as_ref().to_owned();
        Ok(self.warned.insert(item.as_str()).await?)
    }
}
