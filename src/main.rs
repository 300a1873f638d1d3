//! # Lexindex CLI (`lexi`)
//!
//! The `lexi` binary is the primary interface for Lexindex. It provides
//! commands for database initialization, statute ingestion, semantic
//! search, embedding management, and knowledge-point extraction.
//!
//! ## Usage
//!
//! ```bash
//! lexi --config ./config/lexi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexi init` | Create the SQLite database and run schema migrations |
//! | `lexi ingest <file> --law <name>` | Segment a statute and store it |
//! | `lexi remove <law>` | Delete a law's segments (and their vectors) |
//! | `lexi search "<query>"` | Rank in-scope segments against a query |
//! | `lexi embed pending` | Backfill missing or stale vectors |
//! | `lexi embed rebuild` | Delete and regenerate a generation's vectors |
//! | `lexi embed retire <model>` | Drop a retired model generation |
//! | `lexi generations` | Show population status per model generation |
//! | `lexi extract --subject <s>` | Extract knowledge points from an answer |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! lexi init --config ./config/lexi.toml
//!
//! # Ingest the Civil Code, annotating key concepts from the 民法 taxonomy
//! lexi ingest minfadian.txt --law 民法典 --subject 民法
//!
//! # Backfill embeddings, then search within one chapter
//! lexi embed pending
//! lexi search "欺诈 民事行为 效力" --law 民法典 --chapter 第六章
//!
//! # Extract knowledge points and hand them to the chat-history store
//! lexi extract --text "本案涉及诚实信用原则..." --subject 民法 --chat-id 42
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use lexindex::search::ScopeArgs;
use lexindex::{config, embed_cmd, extract_cmd, ingest, migrate, search};

/// Lexindex CLI — a semantic index for legal texts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lexi.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lexi",
    about = "Lexindex — a semantic index for legal texts",
    version,
    long_about = "Lexindex segments statutes along their citation hierarchy (book, chapter, \
    section, article), embeds each segment under a tracked model generation, and serves \
    deterministic nearest-neighbor retrieval plus knowledge-point extraction from answer text."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lexi.toml`. Database, segmentation,
    /// embedding, retrieval, and extraction settings are read from it.
    #[arg(long, global = true, default_value = "./config/lexi.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `law_segments` and
    /// `law_segment_vectors` tables. This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Segment a statute document and store it.
    ///
    /// Parses the document's hierarchy markers, emits one segment per
    /// article (or paragraph/item for oversized articles), and upserts
    /// by citation path: re-ingesting replaces changed segments in
    /// place and leaves unchanged ones untouched. With an embedding
    /// provider configured, new and changed segments are vectorized
    /// inline (failures leave them pending, never abort the ingest).
    Ingest {
        /// Path to the statute text file (UTF-8).
        file: PathBuf,

        /// Law name the segments are filed under (e.g. `民法典`).
        #[arg(long)]
        law: String,

        /// Annotate each segment's key concepts from this subject's
        /// taxonomy (requires `extraction.taxonomy_dir`).
        #[arg(long)]
        subject: Option<String>,

        /// Parse and report counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete a law's segments.
    ///
    /// The only deletion path: removes every segment filed under the
    /// law, cascading deletion of their vectors in all generations.
    Remove {
        /// Law name to remove.
        law: String,
    },

    /// Rank in-scope segments against a query.
    ///
    /// Embeds the query with the active model generation and scores
    /// every in-scope segment by cosine similarity. Output ordering is
    /// deterministic for a fixed query, scope, and index state.
    Search {
        /// The search query string.
        query: String,

        /// Restrict to one law.
        #[arg(long)]
        law: Option<String>,

        /// Restrict to one book (e.g. `第一编`).
        #[arg(long)]
        book: Option<String>,

        /// Restrict to one chapter (e.g. `第六章`).
        #[arg(long)]
        chapter: Option<String>,

        /// Restrict to one section (e.g. `第三节`).
        #[arg(long)]
        section: Option<String>,

        /// Restrict to one article (e.g. `第148条`).
        #[arg(long)]
        article: Option<String>,

        /// Number of results to return (capped at `retrieval.max_top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Manage embedding vectors and model generations.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Show population status per embedding-model generation.
    ///
    /// A new generation is safe to activate (by setting
    /// `embedding.model` in config) once it is fully populated.
    Generations,

    /// Extract knowledge points from an answer text.
    ///
    /// Matches the answer against the subject's concept taxonomy and
    /// prints the deduplicated, ranked knowledge points as JSON. With
    /// `--chat-id` and a configured chat-history store, the points are
    /// also handed off best-effort after the result is printed.
    Extract {
        /// The answer text to extract from.
        #[arg(long)]
        text: Option<String>,

        /// Read the answer text from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Subject whose taxonomy to match against (e.g. `民法`).
        #[arg(long)]
        subject: String,

        /// Chat record to attach the knowledge points to.
        #[arg(long)]
        chat_id: Option<String>,
    },
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed segments that are missing or have stale vectors.
    ///
    /// Finds segments without a vector under the target generation (or
    /// whose content changed since vectorization) and embeds them with
    /// bounded concurrency. One segment's failure never blocks the
    /// rest; failed segments stay retry-eligible.
    Pending {
        /// Populate this model generation instead of the configured one.
        #[arg(long)]
        model: Option<String>,

        /// Vector dimensionality of the override model.
        #[arg(long)]
        dims: Option<usize>,

        /// Maximum number of segments to embed in this run.
        #[arg(long)]
        limit: Option<usize>,

        /// Show counts without performing any embedding.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete and regenerate one generation's vectors.
    ///
    /// Useful after a dimension mismatch or a provider-side model
    /// change. Clears the generation and re-embeds every segment.
    Rebuild {
        /// Rebuild this model generation instead of the configured one.
        #[arg(long)]
        model: Option<String>,

        /// Vector dimensionality of the override model.
        #[arg(long)]
        dims: Option<usize>,
    },

    /// Drop a model generation's vectors.
    ///
    /// Run after a migration: once the new generation is fully
    /// populated and active, the old one can be retired.
    Retire {
        /// Model generation to retire.
        model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            file,
            law,
            subject,
            dry_run,
        } => {
            ingest::run_ingest(&cfg, &file, &law, subject.as_deref(), dry_run).await?;
        }
        Commands::Remove { law } => {
            ingest::run_remove(&cfg, &law).await?;
        }
        Commands::Search {
            query,
            law,
            book,
            chapter,
            section,
            article,
            top_k,
        } => {
            let scope_args = ScopeArgs {
                law,
                book,
                chapter,
                section,
                article,
            };
            search::run_search(&cfg, &query, &scope_args, top_k).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending {
                model,
                dims,
                limit,
                dry_run,
            } => {
                embed_cmd::run_embed_pending(&cfg, model.as_deref(), dims, limit, dry_run).await?;
            }
            EmbedAction::Rebuild { model, dims } => {
                embed_cmd::run_embed_rebuild(&cfg, model.as_deref(), dims).await?;
            }
            EmbedAction::Retire { model } => {
                embed_cmd::run_embed_retire(&cfg, &model).await?;
            }
        },
        Commands::Generations => {
            embed_cmd::run_generations(&cfg).await?;
        }
        Commands::Extract {
            text,
            file,
            subject,
            chat_id,
        } => {
            extract_cmd::run_extract(&cfg, text, file.as_deref(), &subject, chat_id).await?;
        }
    }

    Ok(())
}
