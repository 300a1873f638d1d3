//! In-memory [`SegmentStore`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Vector
//! listing is a brute-force scan; everything is ordered explicitly so
//! results are deterministic.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{content_hash, LawSegment, Scope, SegmentRecord, SegmentState, SegmentVector};

use super::{
    GenerationStatus, SegmentStore, UpsertDisposition, UpsertOutcome, VectorEntry,
};

/// In-memory store for tests.
pub struct MemoryStore {
    segments: RwLock<Vec<SegmentRecord>>,
    vectors: RwLock<Vec<SegmentVector>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            segments: RwLock::new(Vec::new()),
            vectors: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl SegmentStore for MemoryStore {
    async fn upsert_segments(&self, segments: &[LawSegment]) -> Result<Vec<UpsertOutcome>> {
        let mut stored = self.segments.write().unwrap();
        let ts = now();
        let mut outcomes = Vec::with_capacity(segments.len());

        for segment in segments {
            let existing = stored
                .iter_mut()
                .find(|r| r.segment.law_name == segment.law_name && r.segment.path == segment.path);

            let outcome = match existing {
                Some(record) => {
                    if record.segment.content == segment.content {
                        UpsertOutcome {
                            id: record.id.clone(),
                            disposition: UpsertDisposition::Unchanged,
                        }
                    } else {
                        record.segment.content = segment.content.clone();
                        record.segment.token_count = segment.token_count;
                        record.segment.key_concepts = segment.key_concepts.clone();
                        record.state = SegmentState::Segmented;
                        record.updated_at = ts;
                        UpsertOutcome {
                            id: record.id.clone(),
                            disposition: UpsertDisposition::Replaced,
                        }
                    }
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    stored.push(SegmentRecord {
                        id: id.clone(),
                        segment: segment.clone(),
                        state: SegmentState::Segmented,
                        created_at: ts,
                        updated_at: ts,
                    });
                    UpsertOutcome {
                        id,
                        disposition: UpsertDisposition::Inserted,
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn get_segment(&self, segment_id: &str) -> Result<Option<SegmentRecord>> {
        let stored = self.segments.read().unwrap();
        Ok(stored.iter().find(|r| r.id == segment_id).cloned())
    }

    async fn list_segments(&self, scope: &Scope) -> Result<Vec<SegmentRecord>> {
        let stored = self.segments.read().unwrap();
        let mut records: Vec<SegmentRecord> = stored
            .iter()
            .filter(|r| scope.matches(&r.segment))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.segment
                .law_name
                .cmp(&b.segment.law_name)
                .then(a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn remove_law(&self, law_name: &str) -> Result<u64> {
        let mut stored = self.segments.write().unwrap();
        let before = stored.len();
        let removed_ids: Vec<String> = stored
            .iter()
            .filter(|r| r.segment.law_name == law_name)
            .map(|r| r.id.clone())
            .collect();
        stored.retain(|r| r.segment.law_name != law_name);

        // Cascade, as the SQLite foreign key does.
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|v| !removed_ids.contains(&v.segment_id));

        Ok((before - stored.len()) as u64)
    }

    async fn claim_for_vectorization(&self, segment_id: &str) -> Result<bool> {
        let mut stored = self.segments.write().unwrap();
        match stored.iter_mut().find(|r| r.id == segment_id) {
            Some(record) if record.state != SegmentState::Vectorizing => {
                record.state = SegmentState::Vectorizing;
                record.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claims(&self) -> Result<u64> {
        let mut stored = self.segments.write().unwrap();
        let mut released = 0u64;
        for record in stored.iter_mut() {
            if record.state == SegmentState::Vectorizing {
                record.state = SegmentState::Segmented;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn set_state(&self, segment_id: &str, state: SegmentState) -> Result<()> {
        let mut stored = self.segments.write().unwrap();
        match stored.iter_mut().find(|r| r.id == segment_id) {
            Some(record) => {
                record.state = state;
                record.updated_at = now();
                Ok(())
            }
            None => Err(Error::NotFound(format!("segment '{segment_id}'")).into()),
        }
    }

    async fn upsert_vector(
        &self,
        segment_id: &str,
        vector: &[f32],
        embedding_model: &str,
        content_hash: &str,
    ) -> Result<()> {
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|v| !(v.segment_id == segment_id && v.embedding_model == embedding_model));
        vectors.push(SegmentVector {
            segment_id: segment_id.to_string(),
            vector: vector.to_vec(),
            embedding_model: embedding_model.to_string(),
            content_hash: content_hash.to_string(),
            created_at: now(),
        });
        Ok(())
    }

    async fn established_dims(&self, embedding_model: &str) -> Result<Option<usize>> {
        let vectors = self.vectors.read().unwrap();
        Ok(vectors
            .iter()
            .find(|v| v.embedding_model == embedding_model)
            .map(|v| v.vector.len()))
    }

    async fn vectors_for_model(
        &self,
        embedding_model: &str,
        scope: &Scope,
    ) -> Result<Vec<VectorEntry>> {
        let segments = self.segments.read().unwrap();
        let vectors = self.vectors.read().unwrap();
        let mut entries = Vec::new();
        for vector in vectors.iter().filter(|v| v.embedding_model == embedding_model) {
            let record = segments
                .iter()
                .find(|r| r.id == vector.segment_id && scope.matches(&r.segment));
            if let Some(record) = record {
                entries.push(VectorEntry {
                    record: record.clone(),
                    vector: vector.clone(),
                });
            }
        }
        entries.sort_by(|a, b| a.record.id.cmp(&b.record.id));
        Ok(entries)
    }

    async fn pending_for_model(
        &self,
        embedding_model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SegmentRecord>> {
        let segments = self.segments.read().unwrap();
        let vectors = self.vectors.read().unwrap();

        let mut pending: Vec<SegmentRecord> = segments
            .iter()
            .filter(|r| {
                if r.state == SegmentState::Vectorizing {
                    return false;
                }
                let fresh = vectors.iter().any(|v| {
                    v.segment_id == r.id
                        && v.embedding_model == embedding_model
                        && v.content_hash == content_hash(&r.segment.content)
                });
                !fresh || r.state.is_vectorize_eligible()
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.segment
                .law_name
                .cmp(&b.segment.law_name)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        pending.truncate(limit.unwrap_or(usize::MAX));
        Ok(pending)
    }

    async fn list_generations(&self) -> Result<Vec<GenerationStatus>> {
        let segments = self.segments.read().unwrap();
        let vectors = self.vectors.read().unwrap();

        let mut models: Vec<&str> = vectors.iter().map(|v| v.embedding_model.as_str()).collect();
        models.sort();
        models.dedup();

        Ok(models
            .into_iter()
            .map(|model| {
                let of_model: Vec<&SegmentVector> = vectors
                    .iter()
                    .filter(|v| v.embedding_model == model)
                    .collect();
                GenerationStatus {
                    embedding_model: model.to_string(),
                    dims: of_model.first().map(|v| v.vector.len()).unwrap_or(0),
                    populated: of_model.len() as u64,
                    total_segments: segments.len() as u64,
                }
            })
            .collect())
    }

    async fn retire_generation(&self, embedding_model: &str) -> Result<u64> {
        let mut vectors = self.vectors.write().unwrap();
        let before = vectors.len();
        vectors.retain(|v| v.embedding_model != embedding_model);
        Ok((before - vectors.len()) as u64)
    }
}
