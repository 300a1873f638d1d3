//! Storage abstraction for the statute index.
//!
//! The [`SegmentStore`] trait defines all storage operations needed by
//! the ingestion, vectorization, and retrieval pipeline, enabling
//! pluggable backends (SQLite in the application crate, in-memory here
//! for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{LawSegment, Scope, SegmentRecord, SegmentState, SegmentVector};

/// What an upsert did to one segment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDisposition {
    /// A new `(law_name, path)` identity was created.
    Inserted,
    /// The path existed and its content changed; the segment state was
    /// reset to `segmented` so stale vectors get recomputed.
    Replaced,
    /// The path existed with identical content; nothing to revectorize.
    Unchanged,
}

/// Outcome of upserting one segment.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub id: String,
    pub disposition: UpsertDisposition,
}

/// Population status of one embedding-model generation.
#[derive(Debug, Clone)]
pub struct GenerationStatus {
    pub embedding_model: String,
    pub dims: usize,
    /// Segments holding a vector under this generation.
    pub populated: u64,
    /// Total segments in the store; a generation is safe to activate
    /// once `populated == total_segments`.
    pub total_segments: u64,
}

/// A stored vector joined with its owning segment, ready for scoring.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub record: SegmentRecord,
    pub vector: SegmentVector,
}

/// Abstract storage backend for the statute index.
///
/// All operations are async (via `async-trait`); the in-memory
/// implementation returns immediately-ready futures.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_segments`](SegmentStore::upsert_segments) | Replace-by-path upsert of one document's segments |
/// | [`get_segment`](SegmentStore::get_segment) | Fetch one segment by id |
/// | [`list_segments`](SegmentStore::list_segments) | List segments in a scope |
/// | [`remove_law`](SegmentStore::remove_law) | Delete a law's segments, cascading vectors |
/// | [`claim_for_vectorization`](SegmentStore::claim_for_vectorization) | Per-segment exclusive claim |
/// | [`release_claims`](SegmentStore::release_claims) | Recover claims stranded by a cancelled batch |
/// | [`set_state`](SegmentStore::set_state) | Ingestion state transition |
/// | [`upsert_vector`](SegmentStore::upsert_vector) | Store one vector per `(segment, model)` |
/// | [`established_dims`](SegmentStore::established_dims) | Dimension established for a generation |
/// | [`vectors_for_model`](SegmentStore::vectors_for_model) | In-scope vectors of one generation |
/// | [`pending_for_model`](SegmentStore::pending_for_model) | Segments missing a fresh vector |
/// | [`list_generations`](SegmentStore::list_generations) | Population status per generation |
/// | [`retire_generation`](SegmentStore::retire_generation) | Delete a generation's vectors |
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Insert or update segments by their `(law_name, path)` identity,
    /// atomically for the whole slice. Re-ingesting an unchanged path
    /// keeps its id, state, and timestamps; changed content resets the
    /// state to `segmented`.
    async fn upsert_segments(&self, segments: &[LawSegment]) -> Result<Vec<UpsertOutcome>>;

    /// Fetch one segment by id.
    async fn get_segment(&self, segment_id: &str) -> Result<Option<SegmentRecord>>;

    /// List segments matching a scope, ordered by `(law_name, id)`.
    async fn list_segments(&self, scope: &Scope) -> Result<Vec<SegmentRecord>>;

    /// Delete every segment of a law, cascading vector deletion.
    /// Returns the number of segments removed (0 for an unknown law).
    async fn remove_law(&self, law_name: &str) -> Result<u64>;

    /// Atomically claim a segment for vectorization: any state but
    /// `vectorizing` transitions to `vectorizing` and yields `true`; a
    /// segment already claimed yields `false`. This is the per-segment
    /// exclusive section guarding duplicate concurrent embedding.
    async fn claim_for_vectorization(&self, segment_id: &str) -> Result<bool>;

    /// Move every `vectorizing` segment back to `segmented`. A claim can
    /// only be stranded by a cancelled or crashed batch, so the engine
    /// calls this before starting a new one.
    async fn release_claims(&self) -> Result<u64>;

    /// Transition a segment's ingestion state.
    async fn set_state(&self, segment_id: &str, state: SegmentState) -> Result<()>;

    /// Store or replace the vector of `(segment_id, embedding_model)`.
    async fn upsert_vector(
        &self,
        segment_id: &str,
        vector: &[f32],
        embedding_model: &str,
        content_hash: &str,
    ) -> Result<()>;

    /// The vector length established for a model generation, or `None`
    /// when the generation holds no vectors yet.
    async fn established_dims(&self, embedding_model: &str) -> Result<Option<usize>>;

    /// Every in-scope vector of one generation joined with its segment.
    async fn vectors_for_model(
        &self,
        embedding_model: &str,
        scope: &Scope,
    ) -> Result<Vec<VectorEntry>>;

    /// Segments needing (re)vectorization under a model: no vector for
    /// that generation, a stale vector (content hash mismatch), or a
    /// retry-eligible state. Never returns claimed (`vectorizing`) rows.
    /// Ordered by `(law_name, created_at, id)` for deterministic batches.
    async fn pending_for_model(
        &self,
        embedding_model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SegmentRecord>>;

    /// Population status of every generation present in the store.
    async fn list_generations(&self) -> Result<Vec<GenerationStatus>>;

    /// Delete every vector of a generation (after a migration has fully
    /// populated its replacement). Returns the number of vectors removed.
    async fn retire_generation(&self, embedding_model: &str) -> Result<u64>;
}
