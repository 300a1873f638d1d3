//! Error taxonomy shared by every pipeline component.
//!
//! Variants map one-to-one onto how a failure propagates:
//!
//! | Variant | Propagation |
//! |---------|-------------|
//! | [`Error::Validation`] | Fatal to the affected document or scope |
//! | [`Error::EmbeddingService`] | Retried, then isolated to the failing segment |
//! | [`Error::DimensionMismatch`] | Fatal to the whole model generation |
//! | [`Error::NotFound`] | Usually mapped to an empty result by the caller |
//! | [`Error::Persistence`] | Logged, never surfaced past a computed result |

use thiserror::Error;

/// Failure modes of the segmentation, vectorization, retrieval, and
/// extraction pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed hierarchy or empty content. Aborts the affected document
    /// before anything is written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Transient failure of the embedding collaborator (timeout, rate
    /// limit, network). Isolated to the segment being embedded.
    #[error("embedding service: {0}")]
    EmbeddingService(String),

    /// A vector's length disagrees with the established length for its
    /// model generation. Fatal for that generation: the index must not be
    /// mixed, so the caller creates a new generation instead.
    #[error("dimension mismatch for model '{model}': expected {expected}, got {actual}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    /// A referenced segment, law, or generation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A best-effort side-channel write failed. The computed result the
    /// caller already holds stays valid.
    #[error("persistence: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, Error>;
