use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    parse_blob_id, AccessMetadata, AnnotationStore, BlobMetadata, BlobStore, HighlightFilter,
    HighlightRecord, HistoryRecord, HistoryStore, NewBlob, NewHighlight, StoreError,
};

struct HistoryEntry {
    record: HistoryRecord,
    // Tie-breaker for accesses within the same clock tick.
    seq: u64,
}

#[derive(Default)]
struct HistoryTable {
    entries: HashMap<(String, String), HistoryEntry>,
    next_seq: u64,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<Uuid, (Vec<u8>, BlobMetadata)>>,
    highlights: RwLock<HashMap<String, Vec<HighlightRecord>>>,
    history: RwLock<HistoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, content: Vec<u8>, metadata: NewBlob) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        let stored = BlobMetadata {
            filename: metadata.filename,
            content_type: metadata.content_type,
            size: content.len() as i64,
            uploaded_at: Utc::now(),
        };
        self.blobs.write().await.insert(id, (content, stored));
        Ok(id.to_string())
    }

    async fn get(&self, id: &str) -> Result<(Vec<u8>, BlobMetadata), StoreError> {
        let blob_id = parse_blob_id(id)?;
        self.blobs
            .read()
            .await
            .get(&blob_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn metadata(&self, id: &str) -> Result<BlobMetadata, StoreError> {
        let blob_id = parse_blob_id(id)?;
        self.blobs
            .read()
            .await
            .get(&blob_id)
            .map(|(_, metadata)| metadata.clone())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn insert(&self, pdf_id: &str, record: NewHighlight) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let stored = HighlightRecord {
            id,
            pdf_id: pdf_id.to_string(),
            user_id: record.user_id,
            highlight: record.highlight,
            created_at: Utc::now(),
        };
        self.highlights
            .write()
            .await
            .entry(pdf_id.to_string())
            .or_default()
            .push(stored);
        Ok(id)
    }

    async fn query(&self, pdf_id: &str) -> Result<Vec<HighlightRecord>, StoreError> {
        Ok(self
            .highlights
            .read()
            .await
            .get(pdf_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_matching(
        &self,
        pdf_id: &str,
        filter: &HighlightFilter,
        patch: &Value,
    ) -> Result<u64, StoreError> {
        let Some(patch) = patch.as_object() else {
            return Err(StoreError::InvalidInput("patch must be a JSON object".to_string()));
        };

        let mut highlights = self.highlights.write().await;
        let Some(records) = highlights.get_mut(pdf_id) else {
            return Ok(0);
        };

        let mut updated = 0;
        for record in records.iter_mut().filter(|r| filter.matches(&r.highlight)) {
            if let Value::Object(fields) = &mut record.highlight {
                for (key, value) in patch {
                    fields.insert(key.clone(), value.clone());
                }
            } else {
                record.highlight = Value::Object(patch.clone());
            }
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_matching(&self, pdf_id: &str, filter: &HighlightFilter) -> Result<u64, StoreError> {
        let mut highlights = self.highlights.write().await;
        let Some(records) = highlights.get_mut(pdf_id) else {
            return Ok(0);
        };

        let before = records.len();
        records.retain(|r| !filter.matches(&r.highlight));
        let removed = (before - records.len()) as u64;
        if records.is_empty() {
            highlights.remove(pdf_id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn upsert_increment(
        &self,
        pdf_id: &str,
        user_id: &str,
        metadata: AccessMetadata,
    ) -> Result<(), StoreError> {
        let mut history = self.history.write().await;
        history.next_seq += 1;
        let seq = history.next_seq;
        let now = Utc::now();

        history
            .entries
            .entry((pdf_id.to_string(), user_id.to_string()))
            .and_modify(|entry| {
                entry.record.access_count += 1;
                entry.record.last_accessed = now;
                entry.record.filename = metadata.filename.clone();
                entry.seq = seq;
            })
            .or_insert_with(|| HistoryEntry {
                record: HistoryRecord {
                    pdf_id: pdf_id.to_string(),
                    user_id: user_id.to_string(),
                    filename: metadata.filename.clone(),
                    access_count: 1,
                    last_accessed: now,
                },
                seq,
            });
        Ok(())
    }

    async fn query_recent(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryRecord>, StoreError> {
        let history = self.history.read().await;
        let mut entries: Vec<&HistoryEntry> = history
            .entries
            .values()
            .filter(|entry| entry.record.user_id == user_id)
            .collect();
        entries.sort_by(|a, b| {
            b.record
                .last_accessed
                .cmp(&a.record.last_accessed)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(entries
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn clear(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut history = self.history.write().await;
        let before = history.entries.len();
        history.entries.retain(|(_, user), _| user != user_id);
        Ok((before - history.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn highlight(user: &str, highlight: Value) -> NewHighlight {
        NewHighlight {
            user_id: user.to_string(),
            highlight,
        }
    }

    #[tokio::test]
    async fn blobs_round_trip_with_metadata() {
        let store = MemoryStore::new();
        let id = store
            .put(
                b"%PDF-1.7".to_vec(),
                NewBlob {
                    filename: "paper.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                },
            )
            .await
            .unwrap();

        let (content, metadata) = store.get(&id).await.unwrap();
        assert_eq!(content, b"%PDF-1.7");
        assert_eq!(metadata.filename, "paper.pdf");
        assert_eq!(metadata.size, 8);
        assert_eq!(store.metadata(&id).await.unwrap(), metadata);
    }

    #[tokio::test]
    async fn missing_and_malformed_blob_ids_are_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get(&Uuid::new_v4().to_string()).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(store.get("xyz").await, Err(StoreError::NotFound)));
        assert!(matches!(store.metadata("xyz").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn highlights_are_scoped_by_document() {
        let store = MemoryStore::new();
        store.insert("doc1", highlight("u1", json!({"text": "a"}))).await.unwrap();
        store.insert("doc1", highlight("u2", json!({"text": "b"}))).await.unwrap();
        store.insert("doc2", highlight("u1", json!({"text": "c"}))).await.unwrap();

        let doc1 = store.query("doc1").await.unwrap();
        assert_eq!(doc1.len(), 2);
        assert_eq!(doc1[0].highlight["text"], "a");
        assert_eq!(doc1[1].highlight["text"], "b");
        assert!(store.query("doc3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_by_timestamp() {
        let store = MemoryStore::new();
        store
            .insert("doc1", highlight("u1", json!({"timestamp": "t1", "color": "yellow"})))
            .await
            .unwrap();
        store
            .insert("doc1", highlight("u1", json!({"timestamp": "t2", "color": "yellow"})))
            .await
            .unwrap();

        let filter = HighlightFilter::Timestamp("t1".to_string());
        let updated = store
            .update_matching("doc1", &filter, &json!({"color": "green"}))
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let records = store.query("doc1").await.unwrap();
        assert_eq!(records[0].highlight["color"], "green");
        assert_eq!(records[0].highlight["timestamp"], "t1");
        assert_eq!(records[1].highlight["color"], "yellow");

        assert_eq!(store.delete_matching("doc1", &filter).await.unwrap(), 1);
        assert_eq!(store.delete_matching("doc1", &filter).await.unwrap(), 0);
        assert_eq!(store.query("doc1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_rejects_non_object_patch() {
        let store = MemoryStore::new();
        let result = store
            .update_matching("doc1", &HighlightFilter::All, &json!(["not", "an", "object"]))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn history_counts_visits_and_orders_by_recency() {
        let store = MemoryStore::new();
        let meta = |name: &str| AccessMetadata {
            filename: name.to_string(),
        };
        store.upsert_increment("doc1", "u1", meta("one.pdf")).await.unwrap();
        store.upsert_increment("doc2", "u1", meta("two.pdf")).await.unwrap();
        store.upsert_increment("doc1", "u1", meta("one.pdf")).await.unwrap();
        store.upsert_increment("doc3", "u2", meta("three.pdf")).await.unwrap();

        let recent = store.query_recent("u1", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].pdf_id, "doc1");
        assert_eq!(recent[0].access_count, 2);
        assert_eq!(recent[1].pdf_id, "doc2");
        assert_eq!(recent[1].access_count, 1);

        assert_eq!(store.query_recent("u1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_only_touches_one_user() {
        let store = MemoryStore::new();
        let meta = AccessMetadata {
            filename: "a.pdf".to_string(),
        };
        store.upsert_increment("doc1", "u1", meta.clone()).await.unwrap();
        store.upsert_increment("doc2", "u1", meta.clone()).await.unwrap();
        store.upsert_increment("doc1", "u2", meta).await.unwrap();

        assert_eq!(store.clear("u1").await.unwrap(), 2);
        assert_eq!(store.clear("u1").await.unwrap(), 0);
        assert!(store.query_recent("u1", 10).await.unwrap().is_empty());
        assert_eq!(store.query_recent("u2", 10).await.unwrap().len(), 1);
    }
}
