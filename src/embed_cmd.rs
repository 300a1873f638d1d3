//! Embedding management commands: backfill, rebuild, generations.

use std::sync::Arc;

use anyhow::{bail, Result};

use lexindex_core::store::SegmentStore;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, OpenAIProvider};
use crate::sqlite_store::SqliteStore;
use crate::vectorize::{self, SegmentOutcome};

/// Build the provider, honoring a `--model`/`--dims` generation override.
fn provider_for(
    config: &Config,
    model_override: Option<&str>,
    dims_override: Option<usize>,
) -> Result<Arc<dyn lexindex_core::embedding::Embedder>> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    match model_override {
        Some(model) => Ok(Arc::new(OpenAIProvider::with_model(
            &config.embedding,
            model,
            dims_override,
        )?)),
        None => Ok(Arc::from(embedding::create_provider(&config.embedding)?)),
    }
}

/// Embed segments missing a fresh vector under one model generation.
pub async fn run_embed_pending(
    config: &Config,
    model_override: Option<&str>,
    dims_override: Option<usize>,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let provider = provider_for(config, model_override, dims_override)?;
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));

    if dry_run {
        let pending = store
            .pending_for_model(provider.model_name(), limit)
            .await?;
        println!("embed pending (dry-run)");
        println!("  model: {}", provider.model_name());
        println!("  segments needing vectors: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    let report = vectorize::vectorize_pending(
        store,
        provider.clone(),
        config.embedding.concurrency,
        limit,
    )
    .await?;

    if report.total == 0 {
        println!("embed pending");
        println!("  all segments up to date");
        pool.close().await;
        return Ok(());
    }

    for row in &report.outcomes {
        if let SegmentOutcome::Failed { reason } = &row.outcome {
            eprintln!(
                "Warning: vectorization failed for {} {}: {}",
                row.law_name, row.citation, reason
            );
        }
    }

    println!("embed pending");
    println!("  model: {}", provider.model_name());
    println!("  total pending: {}", report.total);
    println!("  vectorized: {}", report.vectorized);
    println!("  failed: {}", report.failed);

    pool.close().await;
    Ok(())
}

/// Delete one generation's vectors and regenerate them all.
pub async fn run_embed_rebuild(
    config: &Config,
    model_override: Option<&str>,
    dims_override: Option<usize>,
) -> Result<()> {
    let provider = provider_for(config, model_override, dims_override)?;
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));

    let cleared = store.retire_generation(provider.model_name()).await?;
    println!(
        "embed rebuild — cleared {} vectors for '{}'",
        cleared,
        provider.model_name()
    );

    let report =
        vectorize::vectorize_pending(store, provider, config.embedding.concurrency, None).await?;

    println!("  total segments: {}", report.total);
    println!("  vectorized: {}", report.vectorized);
    println!("  failed: {}", report.failed);

    pool.close().await;
    Ok(())
}

/// Retire a model generation after its replacement is fully populated.
pub async fn run_embed_retire(config: &Config, model: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let removed = store.retire_generation(model).await?;
    if removed == 0 {
        println!("No vectors found for generation '{model}'.");
    } else {
        println!("embed retire {model}");
        println!("  vectors removed: {removed}");
        println!("ok");
    }

    pool.close().await;
    Ok(())
}

/// Report population status per model generation, so an operator flips
/// the active model only once its generation is fully populated.
pub async fn run_generations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let generations = store.list_generations().await?;
    if generations.is_empty() {
        println!("No generations. Run `lexi embed pending` after ingesting.");
        pool.close().await;
        return Ok(());
    }

    let active = config.embedding.model.as_deref().unwrap_or("");
    for gen in &generations {
        let marker = if gen.embedding_model == active {
            " (active)"
        } else {
            ""
        };
        println!(
            "{}{}  dims: {}  populated: {}/{}",
            gen.embedding_model, marker, gen.dims, gen.populated, gen.total_segments
        );
    }

    pool.close().await;
    Ok(())
}
