//! Batch vectorization engine.
//!
//! Drives the `segmented → vectorizing → vectorized → indexed` state
//! machine: claims each pending segment, embeds it under bounded
//! concurrency, enforces the dimension invariant, and records a
//! per-segment outcome. One segment's failure never blocks its
//! siblings; a dimension mismatch is fatal for the whole generation.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use lexindex_core::embedding::Embedder;
use lexindex_core::error::Error;
use lexindex_core::models::{content_hash, SegmentState};
use lexindex_core::store::SegmentStore;

/// What happened to one segment during a batch.
#[derive(Debug, Clone)]
pub enum SegmentOutcome {
    /// Embedded and indexed.
    Vectorized,
    /// Embedding failed after retries; the segment is `vectorization_failed`
    /// and retry-eligible.
    Failed { reason: String },
    /// Another worker held the claim; nothing was done.
    Skipped,
}

/// Per-segment outcome row, citation included for reporting.
#[derive(Debug, Clone)]
pub struct OutcomeRow {
    pub segment_id: String,
    pub law_name: String,
    pub citation: String,
    pub outcome: SegmentOutcome,
}

/// Summary of one vectorization batch.
#[derive(Debug, Default)]
pub struct VectorizeReport {
    pub total: usize,
    pub vectorized: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<OutcomeRow>,
}

/// Embed every segment pending under the embedder's model generation.
///
/// Embedding calls run concurrently, bounded by `concurrency`. A
/// returned vector whose length disagrees with the generation's
/// established dimension aborts the batch with
/// [`Error::DimensionMismatch`] so a new generation can be created
/// instead of corrupting the index; claims are released and the batch
/// stays resumable.
pub async fn vectorize_pending(
    store: Arc<dyn SegmentStore>,
    embedder: Arc<dyn Embedder>,
    concurrency: usize,
    limit: Option<usize>,
) -> Result<VectorizeReport> {
    // Claims can only be stranded by a cancelled or crashed batch.
    let released = store.release_claims().await?;
    if released > 0 {
        eprintln!("Warning: released {released} stale vectorization claims");
    }

    let model = embedder.model_name().to_string();
    let pending = store.pending_for_model(&model, limit).await?;
    let expected_dims = store
        .established_dims(&model)
        .await?
        .unwrap_or_else(|| embedder.dims());

    let mut report = VectorizeReport {
        total: pending.len(),
        ..Default::default()
    };

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<Result<OutcomeRow>> = JoinSet::new();

    for record in pending {
        let store = store.clone();
        let embedder = embedder.clone();
        let semaphore = semaphore.clone();
        let model = model.clone();

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| anyhow::anyhow!("vectorization semaphore closed"))?;

            let law_name = record.segment.law_name.clone();
            let citation = record.segment.path.citation();
            if !store.claim_for_vectorization(&record.id).await? {
                return Ok(OutcomeRow {
                    segment_id: record.id,
                    law_name,
                    citation,
                    outcome: SegmentOutcome::Skipped,
                });
            }

            match embedder.embed(&record.segment.content).await {
                Ok(vector) => {
                    if vector.len() != expected_dims {
                        store.set_state(&record.id, SegmentState::Segmented).await?;
                        return Err(Error::DimensionMismatch {
                            model,
                            expected: expected_dims,
                            actual: vector.len(),
                        }
                        .into());
                    }
                    let hash = content_hash(&record.segment.content);
                    store
                        .upsert_vector(&record.id, &vector, &model, &hash)
                        .await?;
                    store
                        .set_state(&record.id, SegmentState::Vectorized)
                        .await?;
                    // The vector is immediately searchable once stored.
                    store.set_state(&record.id, SegmentState::Indexed).await?;
                    Ok(OutcomeRow {
                        segment_id: record.id,
                        law_name,
                        citation,
                        outcome: SegmentOutcome::Vectorized,
                    })
                }
                Err(e) => {
                    store
                        .set_state(&record.id, SegmentState::VectorizationFailed)
                        .await?;
                    Ok(OutcomeRow {
                        segment_id: record.id,
                        law_name,
                        citation,
                        outcome: SegmentOutcome::Failed {
                            reason: e.to_string(),
                        },
                    })
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let row = match joined {
            Ok(Ok(row)) => row,
            Ok(Err(e)) => {
                // Generation-fatal: stop the batch and leave it resumable.
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                store.release_claims().await?;
                return Err(e);
            }
            Err(e) if e.is_cancelled() => continue,
            Err(e) => return Err(e.into()),
        };
        match &row.outcome {
            SegmentOutcome::Vectorized => report.vectorized += 1,
            SegmentOutcome::Failed { .. } => report.failed += 1,
            SegmentOutcome::Skipped => report.skipped += 1,
        }
        report.outcomes.push(row);
    }

    // Join order is completion order; report in citation order.
    report
        .outcomes
        .sort_by(|a, b| (&a.law_name, &a.citation).cmp(&(&b.law_name, &b.citation)));
    Ok(report)
}
