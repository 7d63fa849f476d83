use async_trait::async_trait;
use ar_core::{ArticleStore, Error, NewArticle, Result, SeedArticle};
use chrono::NaiveDate;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePool}, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use crate::validation::validate_new_article;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        excerpt TEXT,
        url TEXT,
        author TEXT,
        published_date TEXT,
        is_updated INTEGER NOT NULL DEFAULT 0,
        "references" TEXT,
        original_article_id INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // Add future migrations here
];

pub struct SQLiteArticleStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SQLiteArticleStore {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| Error::Storage(format!("Invalid database path: {}", e)))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM articles WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("Failed to look up article {}: {}", id, e)))?;
        Ok(row.get::<i64, _>("n") > 0)
    }
}

#[async_trait]
impl ArticleStore for SQLiteArticleStore {
    async fn latest_unprocessed(&self) -> Result<Option<SeedArticle>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, author, published_date FROM articles
            WHERE is_updated = 0
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to fetch latest article: {}", e)))?;

        Ok(row.map(|row| SeedArticle {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            author: row.get::<Option<String>, _>("author"),
            published_date: row
                .get::<Option<String>, _>("published_date")
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        }))
    }

    async fn create_article(&self, article: &NewArticle) -> Result<i64> {
        let original_exists = match article.original_article_id {
            Some(id) => self.exists(id).await?,
            None => true,
        };
        let errors = validate_new_article(article, |_| original_exists);
        if !errors.is_empty() {
            return Err(Error::Rejected(errors));
        }

        let references = serde_json::to_string(&article.references)?;
        let result = sqlx::query(
            r#"
            INSERT INTO articles
            (title, content, excerpt, url, author, published_date, is_updated, "references", original_article_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.excerpt.as_deref())
        .bind(article.url.as_deref())
        .bind(article.author.as_deref())
        .bind(article.published_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(article.is_updated)
        .bind(references)
        .bind(article.original_article_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("Failed to store article: {}", e)))?;

        Ok(result.last_insert_rowid())
    }
}
