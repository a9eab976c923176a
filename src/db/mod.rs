//! Persistence collaborators of the HTTP layer.
//!
//! The realtime core never touches these; handlers do. Each store is a trait
//! with a Postgres implementation ([`dbpdf::PgStore`]) and an in-memory one
//! ([`memory::MemoryStore`]) used when no database is configured.

pub mod dbpdf;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Metadata supplied by the uploader.
#[derive(Debug, Clone)]
pub struct NewBlob {
    pub filename: String,
    pub content_type: String,
}

/// Metadata of a stored blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `content` and return its new identifier.
    async fn put(&self, content: Vec<u8>, metadata: NewBlob) -> Result<String, StoreError>;

    /// Fetch content and metadata. Absent and malformed ids are both `NotFound`.
    async fn get(&self, id: &str) -> Result<(Vec<u8>, BlobMetadata), StoreError>;

    async fn metadata(&self, id: &str) -> Result<BlobMetadata, StoreError>;
}

/// One persisted highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRecord {
    pub id: Uuid,
    pub pdf_id: String,
    pub user_id: String,
    pub highlight: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHighlight {
    pub user_id: String,
    pub highlight: Value,
}

/// Which highlights of a document an update or delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightFilter {
    All,
    /// Highlights whose `timestamp` field equals the value.
    Timestamp(String),
}

impl HighlightFilter {
    pub fn matches(&self, highlight: &Value) -> bool {
        match self {
            HighlightFilter::All => true,
            HighlightFilter::Timestamp(ts) => match highlight.get("timestamp") {
                Some(Value::String(s)) => s == ts,
                Some(Value::Number(n)) => n.to_string() == *ts,
                _ => false,
            },
        }
    }

    fn timestamp(&self) -> Option<&str> {
        match self {
            HighlightFilter::All => None,
            HighlightFilter::Timestamp(ts) => Some(ts),
        }
    }
}

#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn insert(&self, pdf_id: &str, record: NewHighlight) -> Result<Uuid, StoreError>;

    /// Highlights of `pdf_id`, oldest first.
    async fn query(&self, pdf_id: &str) -> Result<Vec<HighlightRecord>, StoreError>;

    /// Shallow-merge the `patch` object into every matching highlight.
    async fn update_matching(
        &self,
        pdf_id: &str,
        filter: &HighlightFilter,
        patch: &Value,
    ) -> Result<u64, StoreError>;

    async fn delete_matching(&self, pdf_id: &str, filter: &HighlightFilter) -> Result<u64, StoreError>;
}

/// Per-(document, user) visit counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub pdf_id: String,
    pub user_id: String,
    pub filename: String,
    pub access_count: i64,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AccessMetadata {
    pub filename: String,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record one visit: insert with a count of 1 or bump the count.
    async fn upsert_increment(
        &self,
        pdf_id: &str,
        user_id: &str,
        metadata: AccessMetadata,
    ) -> Result<(), StoreError>;

    /// Most recently accessed first.
    async fn query_recent(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryRecord>, StoreError>;

    async fn clear(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// The three store handles the HTTP layer works with.
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub highlights: Arc<dyn AnnotationStore>,
    pub history: Arc<dyn HistoryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            blobs: store.clone(),
            highlights: store.clone(),
            history: store,
        }
    }

    /// Connect to Postgres and make sure the schema exists.
    pub async fn postgres(database_url: &str) -> Result<Self, StoreError> {
        let store = dbpdf::PgStore::new(database_url).await?;
        store.init_schema().await?;
        let store = Arc::new(store);
        Ok(Self {
            blobs: store.clone(),
            highlights: store.clone(),
            history: store,
        })
    }
}

/// Blob ids are UUIDs; anything else cannot name a stored blob.
pub(crate) fn parse_blob_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::NotFound)
}
