//! Subject-scoped concept taxonomy loading.
//!
//! A taxonomy lives at `<taxonomy_dir>/<subject>.toml`:
//!
//! ```toml
//! subject = "民法"
//! version = "2024.1"
//!
//! [[concepts]]
//! concept = "诚实信用原则"
//! category = "基本原则"
//! patterns = ["诚信原则", "诚实信用"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use lexindex_core::extract::{Taxonomy, TaxonomyEntry};

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    subject: String,
    version: String,
    #[serde(default)]
    concepts: Vec<ConceptEntry>,
}

#[derive(Debug, Deserialize)]
struct ConceptEntry {
    concept: String,
    category: String,
    #[serde(default)]
    patterns: Vec<String>,
}

/// Load and validate the taxonomy for one subject.
pub fn load_taxonomy(taxonomy_dir: &Path, subject: &str) -> Result<Taxonomy> {
    let path = taxonomy_dir.join(format!("{subject}.toml"));
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read taxonomy file: {}", path.display()))?;
    let file: TaxonomyFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse taxonomy file: {}", path.display()))?;

    if file.subject != subject {
        anyhow::bail!(
            "taxonomy file {} declares subject '{}', expected '{}'",
            path.display(),
            file.subject,
            subject
        );
    }
    if file.concepts.is_empty() {
        anyhow::bail!("taxonomy for '{}' contains no concepts", subject);
    }
    for entry in &file.concepts {
        if entry.concept.trim().is_empty() {
            anyhow::bail!("taxonomy for '{}' contains an empty concept name", subject);
        }
    }

    Ok(Taxonomy {
        subject: file.subject,
        version: file.version,
        entries: file
            .concepts
            .into_iter()
            .map(|c| TaxonomyEntry {
                concept: c.concept,
                category: c.category,
                patterns: c.patterns,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_taxonomy() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("民法.toml"),
            r#"
subject = "民法"
version = "2024.1"

[[concepts]]
concept = "诚实信用原则"
category = "基本原则"
patterns = ["诚信原则"]
"#,
        )
        .unwrap();

        let taxonomy = load_taxonomy(tmp.path(), "民法").unwrap();
        assert_eq!(taxonomy.subject, "民法");
        assert_eq!(taxonomy.entries.len(), 1);
        assert_eq!(taxonomy.entries[0].patterns, vec!["诚信原则"]);
    }

    #[test]
    fn test_subject_mismatch_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("刑法.toml"),
            "subject = \"民法\"\nversion = \"1\"\n[[concepts]]\nconcept = \"甲\"\ncategory = \"乙\"\n",
        )
        .unwrap();
        assert!(load_taxonomy(tmp.path(), "刑法").is_err());
    }

    #[test]
    fn test_empty_taxonomy_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("民法.toml"),
            "subject = \"民法\"\nversion = \"1\"\n",
        )
        .unwrap();
        assert!(load_taxonomy(tmp.path(), "民法").is_err());
    }
}
