//! Nearest-neighbor retrieval over one model generation.
//!
//! The retrieval algorithm operates entirely through the
//! [`SegmentStore`] trait and an [`Embedder`], with no database or
//! configuration dependencies. The calling application constructs the
//! scope, chooses the active generation, and passes both in.
//!
//! # Algorithm
//!
//! 1. Embed the query with the active generation's [`Embedder`].
//! 2. Verify the query vector against the generation's established
//!    dimension (a mismatch is fatal for the generation).
//! 3. Score every in-scope vector by cosine similarity — an exact
//!    brute-force scan, no approximation.
//! 4. Sort by score (desc), created_at (desc), segment id (asc).
//! 5. Truncate to `top_k`, capped at `max_top_k`.
//!
//! Identical `(query, scope, top_k, store state)` always yields an
//! identical ordered result; raising `top_k` only appends entries.

use anyhow::Result;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::Error;
use crate::models::{Scope, SegmentRecord};
use crate::store::SegmentStore;

/// One ranked retrieval result.
#[derive(Debug, Clone)]
pub struct Hit {
    pub record: SegmentRecord,
    /// Cosine similarity against the query vector, in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    /// Requested number of results.
    pub top_k: usize,
    /// Hard ceiling on `top_k`; over-asking is capped, never an error.
    pub max_top_k: usize,
}

/// Rank in-scope segments of the embedder's generation against a query.
///
/// An empty or blank query yields an empty result, as does a scope
/// matching nothing (an unknown law is not an error). A query vector
/// whose length disagrees with the generation's established dimension
/// fails with [`Error::DimensionMismatch`].
pub async fn retrieve<S: SegmentStore + ?Sized>(
    store: &S,
    embedder: &dyn Embedder,
    query: &str,
    scope: &Scope,
    params: &RetrievalParams,
) -> Result<Vec<Hit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embedder.embed(query).await?;
    let model = embedder.model_name();
    if let Some(expected) = store.established_dims(model).await? {
        if query_vec.len() != expected {
            return Err(Error::DimensionMismatch {
                model: model.to_string(),
                expected,
                actual: query_vec.len(),
            }
            .into());
        }
    }

    let entries = store.vectors_for_model(model, scope).await?;
    let mut hits: Vec<Hit> = entries
        .into_iter()
        .map(|entry| Hit {
            score: cosine_similarity(&query_vec, &entry.vector.vector),
            record: entry.record,
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.record.created_at.cmp(&a.record.created_at))
            .then(a.record.id.cmp(&b.record.id))
    });
    hits.truncate(params.top_k.min(params.max_top_k));
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HierarchyLevel, HierarchyPath, LawSegment};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;

    /// Maps each query to a fixed vector; text absent from the script
    /// embeds to the zero-adjacent fallback.
    struct ScriptedEmbedder {
        model: String,
        dims: usize,
        script: Vec<(&'static str, Vec<f32>)>,
    }

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        fn model_name(&self) -> &str {
            &self.model
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
            Ok(self
                .script
                .iter()
                .find(|(t, _)| *t == text)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| vec![0.01; self.dims]))
        }
    }

    fn seg(law: &str, article: &str, content: &str) -> LawSegment {
        LawSegment {
            law_name: law.to_string(),
            path: HierarchyPath::from_pairs(vec![(
                HierarchyLevel::Article,
                article.to_string(),
            )])
            .unwrap(),
            content: content.to_string(),
            token_count: 10,
            key_concepts: Vec::new(),
        }
    }

    async fn seeded_store() -> (MemoryStore, ScriptedEmbedder) {
        let store = MemoryStore::new();
        let outcomes = store
            .upsert_segments(&[
                seg("民法典", "第1条", "甲"),
                seg("民法典", "第2条", "乙"),
                seg("民法典", "第3条", "丙"),
            ])
            .await
            .unwrap();
        let vectors = [
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.7, 0.7, 0.0],
        ];
        for (outcome, vector) in outcomes.iter().zip(vectors.iter()) {
            store
                .upsert_vector(&outcome.id, vector, "m1", "h")
                .await
                .unwrap();
        }
        let embedder = ScriptedEmbedder {
            model: "m1".to_string(),
            dims: 3,
            script: vec![("q", vec![1.0, 0.2, 0.0])],
        };
        (store, embedder)
    }

    #[tokio::test]
    async fn test_ranks_by_cosine_descending() {
        let (store, embedder) = seeded_store().await;
        let params = RetrievalParams {
            top_k: 3,
            max_top_k: 10,
        };
        let hits = retrieve(&store, &embedder, "q", &Scope::all(), &params)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
        assert_eq!(
            hits[0].record.segment.path.get(HierarchyLevel::Article),
            Some("第1条")
        );
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty() {
        let (store, embedder) = seeded_store().await;
        let params = RetrievalParams {
            top_k: 3,
            max_top_k: 10,
        };
        let hits = retrieve(&store, &embedder, "   ", &Scope::all(), &params)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_law_scope_is_empty_not_error() {
        let (store, embedder) = seeded_store().await;
        let params = RetrievalParams {
            top_k: 3,
            max_top_k: 10,
        };
        let hits = retrieve(&store, &embedder, "q", &Scope::for_law("刑法"), &params)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_capped_at_max() {
        let (store, embedder) = seeded_store().await;
        let params = RetrievalParams {
            top_k: 50,
            max_top_k: 2,
        };
        let hits = retrieve(&store, &embedder, "q", &Scope::all(), &params)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_fatal() {
        let (store, _) = seeded_store().await;
        let short = ScriptedEmbedder {
            model: "m1".to_string(),
            dims: 2,
            script: vec![("q", vec![1.0, 0.0])],
        };
        let params = RetrievalParams {
            top_k: 3,
            max_top_k: 10,
        };
        let err = retrieve(&store, &short, "q", &Scope::all(), &params)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DimensionMismatch { .. })
        ));
    }
}
