use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::article::Article;
use crate::error::PipelineResult;

/// SQLite extended result codes for PRIMARY KEY / UNIQUE violations.
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Durable log of article titles already turned into a video.
///
/// Append-only from the pipeline's point of view: records are never updated or removed here.
#[async_trait::async_trait]
pub trait TitleStore: Send + Sync {
    /// True if at least one of `titles` is already recorded.
    async fn contains_any(&self, titles: &[String]) -> PipelineResult<bool>;

    /// Record every article of `batch`, or none of them.
    ///
    /// Returns `Ok(false)` without writing anything when any title is already
    /// recorded, including one recorded concurrently by another run.
    async fn insert_if_absent(&self, batch: &[Article]) -> PipelineResult<bool>;
}

/// Ensure the `processed_articles` table exists. Idempotent, called at startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    info!("storage: ensuring DB schema (CREATE TABLE IF NOT EXISTS ...)");
    let stmts = [
        r#"
        CREATE TABLE IF NOT EXISTS processed_articles (
            title TEXT PRIMARY KEY NOT NULL,
            link TEXT NOT NULL,
            summary TEXT,
            date TEXT,
            source TEXT,
            engagement TEXT,
            selected_at TIMESTAMP NOT NULL
        );
        "#,
        "CREATE INDEX IF NOT EXISTS idx_processed_articles_selected_at ON processed_articles(selected_at);",
    ];

    for stmt in stmts {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .with_context(|| format!("failed to execute schema statement: {}", stmt.trim()))?;
    }
    Ok(())
}

pub struct SqliteTitleStore {
    pool: SqlitePool,
}

impl SqliteTitleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> PipelineResult<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM processed_articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code_matches = db_err
                .code()
                .map(|c| c == SQLITE_CONSTRAINT_PRIMARYKEY || c == SQLITE_CONSTRAINT_UNIQUE)
                .unwrap_or(false);
            code_matches || db_err.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

#[async_trait::async_trait]
impl TitleStore for SqliteTitleStore {
    async fn contains_any(&self, titles: &[String]) -> PipelineResult<bool> {
        if titles.is_empty() {
            return Ok(false);
        }
        let placeholders = vec!["?"; titles.len()].join(", ");
        let sql = format!(
            "SELECT COUNT(*) FROM processed_articles WHERE title IN ({})",
            placeholders
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for title in titles {
            query = query.bind(title);
        }
        let existing = query.fetch_one(&self.pool).await?;
        Ok(existing > 0)
    }

    async fn insert_if_absent(&self, batch: &[Article]) -> PipelineResult<bool> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for article in batch {
            let res = sqlx::query(
                r#"
                INSERT INTO processed_articles (title, link, summary, date, source, engagement, selected_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.title)
            .bind(&article.link)
            .bind(&article.summary)
            .bind(&article.date)
            .bind(&article.source)
            .bind(&article.engagement)
            .bind(now)
            .execute(&mut tx)
            .await;

            match res {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    debug!(title = %article.title, "title already recorded, rolling back batch");
                    tx.rollback().await?;
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(true)
    }
}

/// In-process store for tests and dry runs. Nothing survives the process.
#[derive(Default)]
pub struct MemoryTitleStore {
    records: Mutex<Vec<Article>>,
}

impl MemoryTitleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `titles`, as if earlier runs had used them.
    pub fn with_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = titles
            .into_iter()
            .map(|t| Article::new(t, "seeded"))
            .collect();
        Self { records: Mutex::new(records) }
    }

    pub async fn titles(&self) -> Vec<String> {
        self.records.lock().await.iter().map(|a| a.title.clone()).collect()
    }
}

#[async_trait::async_trait]
impl TitleStore for MemoryTitleStore {
    async fn contains_any(&self, titles: &[String]) -> PipelineResult<bool> {
        let records = self.records.lock().await;
        Ok(records.iter().any(|a| titles.contains(&a.title)))
    }

    async fn insert_if_absent(&self, batch: &[Article]) -> PipelineResult<bool> {
        let mut records = self.records.lock().await;
        let known: HashSet<&str> = records.iter().map(|a| a.title.as_str()).collect();
        let mut incoming = HashSet::new();
        for article in batch {
            if known.contains(article.title.as_str()) || !incoming.insert(article.title.as_str()) {
                return Ok(false);
            }
        }
        records.extend(batch.iter().cloned());
        Ok(true)
    }
}
