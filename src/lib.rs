//! # Lexindex
//!
//! A semantic index for legal texts: hierarchy-aware segmentation,
//! per-generation embeddings, deterministic nearest-neighbor retrieval,
//! and knowledge-point extraction from answer text.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Document  │──▶│  Segmenter   │──▶│  SQLite   │
//! │ (statute)  │   │ + Embeddings │   │  vectors  │
//! └────────────┘   └──────────────┘   └─────┬─────┘
//!                                           │
//!                        ┌──────────────────┤
//!                        ▼                  ▼
//!                  ┌───────────┐     ┌────────────┐
//!                  │ Retriever │     │ Extractor  │
//!                  │ (search)  │     │ (concepts) │
//!                  └───────────┘     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lexi init                                 # create database
//! lexi ingest minfadian.txt --law 民法典     # segment and store a statute
//! lexi embed pending                        # generate embeddings
//! lexi search "欺诈 民事行为 效力"
//! lexi extract --text "..." --subject 民法   # knowledge points from an answer
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration loading and validation |
//! | [`db`] / [`migrate`] | SQLite pool and schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core store trait |
//! | [`embedding`] | Embedding providers (disabled, OpenAI-compatible HTTP) |
//! | [`vectorize`] | Batch vectorization engine with per-segment outcomes |
//! | [`ingest`] | Document ingestion and removal |
//! | [`search`] | CLI semantic search |
//! | [`embed_cmd`] | Embedding backfill, rebuild, and generation management |
//! | [`taxonomy`] | Subject taxonomy loading |
//! | [`extract_cmd`] / [`chat_history`] | Extraction and best-effort hand-off |
//!
//! Core algorithms (segmenter, retrieval, extraction, store trait) live
//! in the runtime-free [`lexindex_core`] crate.

pub mod chat_history;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod extract_cmd;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod taxonomy;
pub mod vectorize;
