//! # Lexindex Core
//!
//! Shared, runtime-free logic for Lexindex: statute data models, the
//! hierarchy-aware segmenter, the embedding trait, the store abstraction,
//! the retrieval algorithm, and knowledge-point extraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything here is deterministic given its
//! inputs; the application crate supplies the collaborators (embedding
//! service, SQLite store, taxonomy files) and the batch orchestration.

pub mod embedding;
pub mod error;
pub mod extract;
pub mod models;
pub mod retrieve;
pub mod segment;
pub mod store;

pub use error::{Error, Result};
