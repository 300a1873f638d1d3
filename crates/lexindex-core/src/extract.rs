//! Knowledge-point extraction from answer text.
//!
//! Matches an answer against a subject-scoped concept taxonomy using
//! literal pattern matching: the canonical concept name matches at full
//! confidence, alternate patterns at reduced confidence. Candidates are
//! deduplicated by normalized concept name and truncated to a maximum
//! list length.
//!
//! Extraction is pure: identical `(answer_text, taxonomy)` input yields
//! an identical ordered result, and nothing here persists anything —
//! durable storage of the returned list belongs to the caller.

use std::collections::HashMap;

use crate::models::KnowledgePoint;

/// Confidence assigned to a literal match of the concept name itself.
const CONFIDENCE_EXACT: f64 = 1.0;
/// Confidence assigned to a match of an alternate pattern.
const CONFIDENCE_PATTERN: f64 = 0.7;
/// Characters of surrounding context captured on each side of a match.
const EXCERPT_WINDOW: usize = 24;

/// One canonical concept and how to recognize it in free text.
#[derive(Debug, Clone)]
pub struct TaxonomyEntry {
    pub concept: String,
    pub category: String,
    /// Alternate surface forms; the concept name itself is always an
    /// implicit exact-match pattern.
    pub patterns: Vec<String>,
}

/// A subject-scoped catalog of canonical concepts.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    pub subject: String,
    pub version: String,
    pub entries: Vec<TaxonomyEntry>,
}

/// Case-normalize and collapse whitespace for concept deduplication.
pub fn normalize_concept(concept: &str) -> String {
    concept
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

struct Candidate {
    point: KnowledgePoint,
    /// Byte offset of the match, the tie-break after confidence.
    position: usize,
}

/// Extract a deduplicated, ranked list of knowledge points.
///
/// Candidates are ordered by confidence (desc), then earliest occurrence
/// in the text, then concept name; the list is truncated to
/// `max_points`. Within one result, normalized concept names are unique.
pub fn extract(answer_text: &str, taxonomy: &Taxonomy, max_points: usize) -> Vec<KnowledgePoint> {
    let mut best: HashMap<String, Candidate> = HashMap::new();

    for entry in &taxonomy.entries {
        let candidate = match_entry(answer_text, entry);
        let Some(candidate) = candidate else {
            continue;
        };
        let key = normalize_concept(&entry.concept);
        // Keep the higher-confidence occurrence; on equal confidence,
        // the earlier one.
        let replaces = best.get(&key).map_or(true, |existing| {
            candidate.point.confidence > existing.point.confidence
                || (candidate.point.confidence == existing.point.confidence
                    && candidate.position < existing.position)
        });
        if replaces {
            best.insert(key, candidate);
        }
    }

    let mut candidates: Vec<Candidate> = best.into_values().collect();
    candidates.sort_by(|a, b| {
        b.point
            .confidence
            .partial_cmp(&a.point.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.position.cmp(&b.position))
            .then(a.point.concept.cmp(&b.point.concept))
    });
    candidates.truncate(max_points);
    candidates.into_iter().map(|c| c.point).collect()
}

/// Match one taxonomy entry: the concept name first (exact confidence),
/// then alternate patterns in order.
fn match_entry(text: &str, entry: &TaxonomyEntry) -> Option<Candidate> {
    let exact = find_match(text, &entry.concept).map(|(pos, len)| (pos, len, CONFIDENCE_EXACT));
    let matched = exact.or_else(|| {
        entry
            .patterns
            .iter()
            .filter_map(|p| find_match(text, p))
            .min_by_key(|(pos, _)| *pos)
            .map(|(pos, len)| (pos, len, CONFIDENCE_PATTERN))
    })?;

    let (position, len, confidence) = matched;
    Some(Candidate {
        point: KnowledgePoint {
            concept: entry.concept.clone(),
            category: entry.category.clone(),
            confidence,
            source_excerpt: excerpt_around(text, position, len),
        },
        position,
    })
}

fn find_match(text: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.trim().is_empty() {
        return None;
    }
    text.find(needle).map(|pos| (pos, needle.len()))
}

/// The matched text with up to [`EXCERPT_WINDOW`] characters of context
/// on each side, cut on char boundaries.
fn excerpt_around(text: &str, start: usize, len: usize) -> String {
    let before: String = text[..start]
        .chars()
        .rev()
        .take(EXCERPT_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let matched_chars = text[start..start + len].chars().count();
    let after: String = text[start..]
        .chars()
        .take(matched_chars + EXCERPT_WINDOW)
        .collect();
    format!("{before}{after}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn civil_law_taxonomy() -> Taxonomy {
        let entry = |concept: &str, category: &str, patterns: &[&str]| TaxonomyEntry {
            concept: concept.to_string(),
            category: category.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };
        Taxonomy {
            subject: "民法".to_string(),
            version: "2024.1".to_string(),
            entries: vec![
                entry("诚实信用原则", "基本原则", &["诚信原则", "诚实信用"]),
                entry("欺诈", "民事法律行为", &["欺诈手段", "欺骗"]),
                entry("可撤销民事法律行为", "民事法律行为", &["有权请求撤销", "予以撤销"]),
                entry("善意取得", "物权", &["善意第三人取得"]),
            ],
        }
    }

    #[test]
    fn test_single_concept_match() {
        let taxonomy = civil_law_taxonomy();
        let points = extract("民法的基石之一是诚实信用原则。", &taxonomy, 8);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].concept, "诚实信用原则");
        assert_eq!(points[0].category, "基本原则");
        assert_eq!(points[0].confidence, 1.0);
        assert!(points[0].source_excerpt.contains("诚实信用原则"));
    }

    #[test]
    fn test_pattern_match_has_lower_confidence() {
        let taxonomy = civil_law_taxonomy();
        let points = extract("当事人以欺骗方式订立合同。", &taxonomy, 8);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].concept, "欺诈");
        assert_eq!(points[0].confidence, 0.7);
        assert!(points[0].source_excerpt.contains("欺骗"));
    }

    #[test]
    fn test_exact_match_beats_earlier_pattern() {
        let taxonomy = civil_law_taxonomy();
        // The alternate pattern 诚信原则 appears first, the canonical
        // name later; the canonical match wins on confidence.
        let points = extract("诚信原则，即诚实信用原则。", &taxonomy, 8);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].confidence, 1.0);
    }

    #[test]
    fn test_concepts_are_unique_per_result() {
        let taxonomy = civil_law_taxonomy();
        let text = "欺诈无处不在：欺诈手段、欺骗，都构成欺诈。";
        let points = extract(text, &taxonomy, 8);
        let fraud: Vec<_> = points.iter().filter(|p| p.concept == "欺诈").collect();
        assert_eq!(fraud.len(), 1);
        assert_eq!(fraud[0].confidence, 1.0);
    }

    #[test]
    fn test_ranked_by_confidence_then_position() {
        let taxonomy = civil_law_taxonomy();
        // 予以撤销 (pattern, 0.7) appears before 欺诈 (exact, 1.0).
        let text = "该行为可予以撤销，因为存在欺诈。";
        let points = extract(text, &taxonomy, 8);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].concept, "欺诈");
        assert_eq!(points[1].concept, "可撤销民事法律行为");
    }

    #[test]
    fn test_truncates_to_max_points() {
        let taxonomy = civil_law_taxonomy();
        let text = "诚实信用原则、欺诈、予以撤销、善意取得都出现了。";
        let points = extract(text, &taxonomy, 2);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.confidence == 1.0));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let taxonomy = civil_law_taxonomy();
        let text = "涉及欺诈与诚实信用原则，行为可予以撤销。";
        let a = extract(text, &taxonomy, 8);
        let b = extract(text, &taxonomy, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_match_yields_empty() {
        let taxonomy = civil_law_taxonomy();
        let points = extract("与税法完全无关的内容。", &taxonomy, 8);
        assert!(points.is_empty());
    }

    #[test]
    fn test_normalize_concept_collapses_case_and_whitespace() {
        assert_eq!(normalize_concept("Good  Faith"), "good faith");
        assert_eq!(normalize_concept(" 诚实信用原则 "), "诚实信用原则");
    }
}
