//! Document ingestion orchestration.
//!
//! Coordinates the full flow: read document → hierarchy segmentation →
//! key-concept annotation → replace-by-path upsert → inline
//! vectorization (non-fatal on failure). Validation failures abort the
//! document before anything is written.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use lexindex_core::extract::extract;
use lexindex_core::segment::{segment, MarkerSet, SegmentOptions};
use lexindex_core::store::{SegmentStore, UpsertDisposition};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;
use crate::taxonomy::load_taxonomy;
use crate::vectorize;

pub async fn run_ingest(
    config: &Config,
    file: &Path,
    law_name: &str,
    subject: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let options = SegmentOptions {
        max_tokens: config.segmentation.max_tokens,
        min_tokens: config.segmentation.min_tokens,
    };
    // Validation errors (malformed hierarchy, empty articles) abort here,
    // before any write.
    let mut segments = segment(&text, &MarkerSet::default(), law_name, &options)?;

    if let Some(subject) = subject {
        let taxonomy_dir = config
            .extraction
            .taxonomy_dir
            .as_deref()
            .context("extraction.taxonomy_dir must be set to annotate key concepts")?;
        let taxonomy = load_taxonomy(taxonomy_dir, subject)?;
        for seg in &mut segments {
            seg.key_concepts = extract(&seg.content, &taxonomy, config.extraction.max_points)
                .into_iter()
                .map(|p| p.concept)
                .collect();
        }
    }

    if dry_run {
        println!("ingest {} (dry-run)", law_name);
        println!("  segments parsed: {}", segments.len());
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let outcomes = store.upsert_segments(&segments).await?;

    let inserted = outcomes
        .iter()
        .filter(|o| o.disposition == UpsertDisposition::Inserted)
        .count();
    let replaced = outcomes
        .iter()
        .filter(|o| o.disposition == UpsertDisposition::Replaced)
        .count();
    let unchanged = outcomes
        .iter()
        .filter(|o| o.disposition == UpsertDisposition::Unchanged)
        .count();

    // Inline vectorization (non-fatal): a provider or batch failure
    // leaves segments pending for `lexi embed pending`.
    let mut vectorized = 0usize;
    let mut failed = 0usize;
    if config.embedding.is_enabled() {
        match embedding::create_provider(&config.embedding) {
            Ok(provider) => {
                match vectorize::vectorize_pending(
                    store.clone(),
                    Arc::from(provider),
                    config.embedding.concurrency,
                    None,
                )
                .await
                {
                    Ok(report) => {
                        vectorized = report.vectorized;
                        failed = report.failed;
                    }
                    Err(e) => eprintln!("Warning: vectorization failed: {e}"),
                }
            }
            Err(e) => eprintln!("Warning: could not create embedding provider: {e}"),
        }
    }

    println!("ingest {}", law_name);
    println!("  segments written: {}", outcomes.len());
    println!("  new: {}", inserted);
    println!("  replaced: {}", replaced);
    println!("  unchanged: {}", unchanged);
    if config.embedding.is_enabled() {
        println!("  vectorized: {}", vectorized);
        println!("  failed: {}", failed);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

pub async fn run_remove(config: &Config, law_name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let removed = store.remove_law(law_name).await?;

    if removed == 0 {
        println!("No segments found for law '{law_name}'.");
    } else {
        println!("remove {law_name}");
        println!("  segments removed: {removed}");
        println!("ok");
    }

    pool.close().await;
    Ok(())
}
