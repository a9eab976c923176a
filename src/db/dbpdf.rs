use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    parse_blob_id, AccessMetadata, AnnotationStore, BlobMetadata, BlobStore, HighlightFilter,
    HighlightRecord, HistoryRecord, HistoryStore, NewBlob, NewHighlight, StoreError,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pdf_blobs (
        id UUID PRIMARY KEY,
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        size BIGINT NOT NULL,
        uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        content BYTEA NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS highlights (
        id UUID PRIMARY KEY,
        pdf_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        highlight JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS highlights_pdf_id_idx ON highlights (pdf_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS pdf_history (
        pdf_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        access_count BIGINT NOT NULL DEFAULT 1,
        last_accessed TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (pdf_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS pdf_history_recent_idx ON pdf_history (user_id, last_accessed DESC)",
];

#[derive(sqlx::FromRow)]
struct BlobRow {
    filename: String,
    content_type: String,
    size: i64,
    uploaded_at: DateTime<Utc>,
}

impl From<BlobRow> for BlobMetadata {
    fn from(row: BlobRow) -> Self {
        Self {
            filename: row.filename,
            content_type: row.content_type,
            size: row.size,
            uploaded_at: row.uploaded_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HighlightRow {
    id: Uuid,
    pdf_id: String,
    user_id: String,
    highlight: Json<Value>,
    created_at: DateTime<Utc>,
}

impl From<HighlightRow> for HighlightRecord {
    fn from(row: HighlightRow) -> Self {
        Self {
            id: row.id,
            pdf_id: row.pdf_id,
            user_id: row.user_id,
            highlight: row.highlight.0,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    pdf_id: String,
    user_id: String,
    filename: String,
    access_count: i64,
    last_accessed: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryRecord {
    fn from(row: HistoryRow) -> Self {
        Self {
            pdf_id: row.pdf_id,
            user_id: row.user_id,
            filename: row.filename,
            access_count: row.access_count,
            last_accessed: row.last_accessed,
        }
    }
}

/// Postgres-backed blob, highlight and history store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    ///
    /// # Returns
    /// * `Result<Self, SqlxError>` - Database connection pool or error
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create the tables and indexes if they do not exist yet
    pub async fn init_schema(&self) -> Result<(), SqlxError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    fn log_pool(&self, operation: &str) {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        debug!(
            "{}. Pool connections: {} idle, {} in use",
            operation,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );
    }
}

#[async_trait]
impl BlobStore for PgStore {
    async fn put(&self, content: Vec<u8>, metadata: NewBlob) -> Result<String, StoreError> {
        self.log_pool("Storing blob");
        let id = Uuid::new_v4();
        let size = content.len() as i64;

        sqlx::query(
            r#"
            INSERT INTO pdf_blobs (id, filename, content_type, size, content)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&metadata.filename)
        .bind(&metadata.content_type)
        .bind(size)
        .bind(content)
        .execute(&self.pool)
        .await?;

        info!("Blob stored: {} ({} bytes)", id, size);
        Ok(id.to_string())
    }

    async fn get(&self, id: &str) -> Result<(Vec<u8>, BlobMetadata), StoreError> {
        let blob_id = parse_blob_id(id)?;
        self.log_pool("Loading blob");

        let row = sqlx::query_as::<_, (Vec<u8>, String, String, i64, DateTime<Utc>)>(
            r#"
            SELECT content, filename, content_type, size, uploaded_at
            FROM pdf_blobs
            WHERE id = $1
            "#,
        )
        .bind(blob_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((content, filename, content_type, size, uploaded_at)) => Ok((
                content,
                BlobMetadata {
                    filename,
                    content_type,
                    size,
                    uploaded_at,
                },
            )),
            None => Err(StoreError::NotFound),
        }
    }

    async fn metadata(&self, id: &str) -> Result<BlobMetadata, StoreError> {
        let blob_id = parse_blob_id(id)?;

        let row = sqlx::query_as::<_, BlobRow>(
            r#"
            SELECT filename, content_type, size, uploaded_at
            FROM pdf_blobs
            WHERE id = $1
            "#,
        )
        .bind(blob_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(BlobMetadata::from).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl AnnotationStore for PgStore {
    async fn insert(&self, pdf_id: &str, record: NewHighlight) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO highlights (id, pdf_id, user_id, highlight)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(pdf_id)
        .bind(&record.user_id)
        .bind(Json(&record.highlight))
        .execute(&self.pool)
        .await?;

        debug!("Highlight {} saved for pdf {}", id, pdf_id);
        Ok(id)
    }

    async fn query(&self, pdf_id: &str) -> Result<Vec<HighlightRecord>, StoreError> {
        let rows = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, pdf_id, user_id, highlight, created_at
            FROM highlights
            WHERE pdf_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(pdf_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HighlightRecord::from).collect())
    }

    async fn update_matching(
        &self,
        pdf_id: &str,
        filter: &HighlightFilter,
        patch: &Value,
    ) -> Result<u64, StoreError> {
        if !patch.is_object() {
            return Err(StoreError::InvalidInput("patch must be a JSON object".to_string()));
        }

        let result = sqlx::query(
            r#"
            UPDATE highlights
            SET highlight = highlight || $3
            WHERE pdf_id = $1
                AND ($2::TEXT IS NULL OR highlight->>'timestamp' = $2)
            "#,
        )
        .bind(pdf_id)
        .bind(filter.timestamp())
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_matching(&self, pdf_id: &str, filter: &HighlightFilter) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM highlights
            WHERE pdf_id = $1
                AND ($2::TEXT IS NULL OR highlight->>'timestamp' = $2)
            "#,
        )
        .bind(pdf_id)
        .bind(filter.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn upsert_increment(
        &self,
        pdf_id: &str,
        user_id: &str,
        metadata: AccessMetadata,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pdf_history (pdf_id, user_id, filename, access_count, last_accessed)
            VALUES ($1, $2, $3, 1, NOW())
            ON CONFLICT (pdf_id, user_id) DO UPDATE
            SET access_count = pdf_history.access_count + 1,
                last_accessed = NOW(),
                filename = EXCLUDED.filename
            "#,
        )
        .bind(pdf_id)
        .bind(user_id)
        .bind(&metadata.filename)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_recent(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryRecord>, StoreError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT pdf_id, user_id, filename, access_count, last_accessed
            FROM pdf_history
            WHERE user_id = $1
            ORDER BY last_accessed DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistoryRecord::from).collect())
    }

    async fn clear(&self, user_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM pdf_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!("Cleared {} history entries for user {}", result.rows_affected(), user_id);
        Ok(result.rows_affected())
    }
}
