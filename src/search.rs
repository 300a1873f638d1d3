//! CLI semantic search over the statute index.

use anyhow::{bail, Result};

use lexindex_core::models::{HierarchyLevel, HierarchyPath, Scope};
use lexindex_core::retrieve::{retrieve, RetrievalParams};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::sqlite_store::SqliteStore;

/// Hierarchy filter flags as passed on the command line.
#[derive(Debug, Default)]
pub struct ScopeArgs {
    pub law: Option<String>,
    pub book: Option<String>,
    pub chapter: Option<String>,
    pub section: Option<String>,
    pub article: Option<String>,
}

impl ScopeArgs {
    /// Build a retrieval scope. Level order is enforced by
    /// [`HierarchyPath`], so a malformed combination is rejected here.
    pub fn to_scope(&self) -> Result<Scope> {
        let mut path_filter = HierarchyPath::new();
        let levels = [
            (HierarchyLevel::Book, &self.book),
            (HierarchyLevel::Chapter, &self.chapter),
            (HierarchyLevel::Section, &self.section),
            (HierarchyLevel::Article, &self.article),
        ];
        for (level, value) in levels {
            if let Some(value) = value {
                path_filter.push(level, value.clone())?;
            }
        }
        Ok(Scope {
            law_name: self.law.clone(),
            path_filter,
        })
    }
}

pub async fn run_search(
    config: &Config,
    query: &str,
    scope_args: &ScopeArgs,
    top_k: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let scope = scope_args.to_scope()?;
    let provider = embedding::create_provider(&config.embedding)?;
    let params = RetrievalParams {
        top_k: top_k.unwrap_or(config.retrieval.top_k),
        max_top_k: config.retrieval.max_top_k,
    };

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let hits = retrieve(&store, provider.as_ref(), query, &scope, &params).await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let segment = &hit.record.segment;
        println!(
            "{}. [{:.4}] {} · {}",
            i + 1,
            hit.score,
            segment.law_name,
            segment.path.citation()
        );
        if !segment.key_concepts.is_empty() {
            println!("    concepts: {}", segment.key_concepts.join(", "));
        }
        println!("    excerpt: \"{}\"", excerpt(&segment.content));
        println!("    id: {}", hit.record.id);
        println!();
    }

    pool.close().await;
    Ok(())
}

fn excerpt(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let mut chars = flat.trim().chars();
    let out: String = chars.by_ref().take(120).collect();
    if chars.next().is_some() {
        format!("{out}…")
    } else {
        out
    }
}
