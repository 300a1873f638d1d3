//! Core data models for the statute indexing pipeline.
//!
//! These types represent the segments, vectors, and knowledge points that
//! flow through ingestion, retrieval, and extraction.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// One level of a statute's citation hierarchy, coarsest first.
///
/// Depth varies by document: a short regulation may carry only articles,
/// a full code runs book → chapter → section → article, and oversized
/// articles subdivide into paragraphs and items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Book,
    Chapter,
    Section,
    Article,
    Paragraph,
    Item,
}

impl HierarchyLevel {
    /// All levels in hierarchy order, coarsest first.
    pub const ALL: [HierarchyLevel; 6] = [
        HierarchyLevel::Book,
        HierarchyLevel::Chapter,
        HierarchyLevel::Section,
        HierarchyLevel::Article,
        HierarchyLevel::Paragraph,
        HierarchyLevel::Item,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Book => "book",
            HierarchyLevel::Chapter => "chapter",
            HierarchyLevel::Section => "section",
            HierarchyLevel::Article => "article",
            HierarchyLevel::Paragraph => "paragraph",
            HierarchyLevel::Item => "item",
        }
    }
}

/// A variable-depth citation path: an ordered list of `(level, value)`
/// pairs with strictly descending levels, e.g.
/// `[(Chapter, "第六章"), (Article, "第148条")]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HierarchyPath(Vec<(HierarchyLevel, String)>);

impl HierarchyPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a path from pairs, rejecting duplicate or out-of-order levels.
    pub fn from_pairs(pairs: Vec<(HierarchyLevel, String)>) -> Result<Self> {
        let mut path = Self::new();
        for (level, value) in pairs {
            path.push(level, value)?;
        }
        Ok(path)
    }

    /// Append one level. The new level must be finer than every level
    /// already present.
    pub fn push(&mut self, level: HierarchyLevel, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::Validation(format!(
                "empty value for hierarchy level '{}'",
                level.as_str()
            )));
        }
        if let Some((last, _)) = self.0.last() {
            if *last >= level {
                return Err(Error::Validation(format!(
                    "hierarchy level '{}' cannot follow '{}'",
                    level.as_str(),
                    last.as_str()
                )));
            }
        }
        self.0.push((level, value));
        Ok(())
    }

    pub fn get(&self, level: HierarchyLevel) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(HierarchyLevel, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The finest level present, if any.
    pub fn depth(&self) -> Option<HierarchyLevel> {
        self.0.last().map(|(l, _)| *l)
    }

    /// True when every `(level, value)` pair of `filter` is present in
    /// this path with an equal value. An empty filter matches everything.
    pub fn matches(&self, filter: &HierarchyPath) -> bool {
        filter
            .0
            .iter()
            .all(|(level, value)| self.get(*level) == Some(value.as_str()))
    }

    /// Human-readable citation, e.g. `第一编/第六章/第148条`.
    pub fn citation(&self) -> String {
        self.0
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// A hierarchy-addressed excerpt of a legal text: the atomic retrievable
/// unit. Identity is `(law_name, path)`; re-ingesting the same path
/// replaces content in place.
#[derive(Debug, Clone, PartialEq)]
pub struct LawSegment {
    pub law_name: String,
    pub path: HierarchyPath,
    pub content: String,
    /// Approximate, model-agnostic token count. Advisory, used for
    /// chunk-size decisions only.
    pub token_count: u32,
    pub key_concepts: Vec<String>,
}

/// Ingestion state of a stored segment.
///
/// `Vectorizing` is a transient claim that guards a segment against
/// duplicate concurrent embedding; it resolves to `Indexed` or
/// `VectorizationFailed` before a batch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Segmented,
    Vectorizing,
    Vectorized,
    Indexed,
    VectorizationFailed,
}

impl SegmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentState::Segmented => "segmented",
            SegmentState::Vectorizing => "vectorizing",
            SegmentState::Vectorized => "vectorized",
            SegmentState::Indexed => "indexed",
            SegmentState::VectorizationFailed => "vectorization_failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "segmented" => Ok(SegmentState::Segmented),
            "vectorizing" => Ok(SegmentState::Vectorizing),
            "vectorized" => Ok(SegmentState::Vectorized),
            "indexed" => Ok(SegmentState::Indexed),
            "vectorization_failed" => Ok(SegmentState::VectorizationFailed),
            other => Err(Error::Validation(format!("unknown segment state '{other}'"))),
        }
    }

    /// Failed segments are retry-eligible alongside freshly segmented ones.
    pub fn is_vectorize_eligible(&self) -> bool {
        matches!(
            self,
            SegmentState::Segmented | SegmentState::VectorizationFailed
        )
    }
}

/// A stored segment with its storage identity and lifecycle fields.
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    pub id: String,
    pub segment: LawSegment,
    pub state: SegmentState,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The embedding of one segment under one model generation.
#[derive(Debug, Clone)]
pub struct SegmentVector {
    pub segment_id: String,
    pub vector: Vec<f32>,
    pub embedding_model: String,
    /// Hash of the segment content this vector was computed from. A
    /// mismatch against the segment's current content marks the vector
    /// stale and the segment pending for revectorization.
    pub content_hash: String,
    pub created_at: i64,
}

/// A normalized concept derived from an answer text. Transient: computed
/// per extraction call, persisted only by the external chat-history
/// collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub concept: String,
    pub category: String,
    pub confidence: f64,
    /// The substring of the answer that triggered the match, with a small
    /// surrounding window.
    pub source_excerpt: String,
}

/// Retrieval scope: an optional law name plus an optional hierarchy
/// sub-path filter. An empty scope covers the whole index.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub law_name: Option<String>,
    pub path_filter: HierarchyPath,
}

impl Scope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_law(law_name: impl Into<String>) -> Self {
        Self {
            law_name: Some(law_name.into()),
            path_filter: HierarchyPath::new(),
        }
    }

    pub fn matches(&self, segment: &LawSegment) -> bool {
        if let Some(law) = &self.law_name {
            if segment.law_name != *law {
                return false;
            }
        }
        segment.path.matches(&self.path_filter)
    }
}

/// SHA-256 hex digest of a segment's content, used to detect stale
/// vectors after re-ingestion.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rejects_out_of_order_levels() {
        let mut path = HierarchyPath::new();
        path.push(HierarchyLevel::Article, "第148条").unwrap();
        assert!(path.push(HierarchyLevel::Chapter, "第六章").is_err());
    }

    #[test]
    fn test_path_rejects_duplicate_level() {
        let mut path = HierarchyPath::new();
        path.push(HierarchyLevel::Article, "第1条").unwrap();
        assert!(path.push(HierarchyLevel::Article, "第2条").is_err());
    }

    #[test]
    fn test_path_matches_filter_by_level() {
        let path = HierarchyPath::from_pairs(vec![
            (HierarchyLevel::Chapter, "第六章".to_string()),
            (HierarchyLevel::Article, "第148条".to_string()),
        ])
        .unwrap();

        let filter =
            HierarchyPath::from_pairs(vec![(HierarchyLevel::Chapter, "第六章".to_string())])
                .unwrap();
        assert!(path.matches(&filter));

        let other =
            HierarchyPath::from_pairs(vec![(HierarchyLevel::Chapter, "第一章".to_string())])
                .unwrap();
        assert!(!path.matches(&other));
    }

    #[test]
    fn test_citation_joins_values() {
        let path = HierarchyPath::from_pairs(vec![
            (HierarchyLevel::Book, "第一编".to_string()),
            (HierarchyLevel::Article, "第148条".to_string()),
        ])
        .unwrap();
        assert_eq!(path.citation(), "第一编/第148条");
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            SegmentState::Segmented,
            SegmentState::Vectorizing,
            SegmentState::Vectorized,
            SegmentState::Indexed,
            SegmentState::VectorizationFailed,
        ] {
            assert_eq!(SegmentState::parse(state.as_str()).unwrap(), state);
        }
        assert!(SegmentState::parse("embedded").is_err());
    }
}
