//! Hierarchy-aware statute segmenter.
//!
//! Splits a legal document into [`LawSegment`]s addressed by their
//! citation path. Heading markers (编/章/节/条 by default) are parsed in
//! document order, tracking the currently open book, chapter, and section;
//! every article opens a new segment and marker-less lines append to it.
//!
//! # Chunk-size policy
//!
//! An article whose estimated token count exceeds `max_tokens` is split
//! along the next-finer hierarchy boundary: one paragraph segment per
//! non-empty line (`第N款`), and a paragraph that is still oversized is
//! split at item tokens (`（一）`-style). A trailing fragment produced by
//! splitting that falls below `min_tokens` is merged into its preceding
//! sibling at the same level, never across a higher-level boundary.
//!
//! The segmenter assigns no identifiers and consults no clock: identical
//! input always yields a byte-identical segment set.

use crate::error::{Error, Result};
use crate::models::{HierarchyLevel, HierarchyPath, LawSegment};

/// Approximate characters-per-token ratio for non-CJK text.
///
/// CJK characters count one token each; everything else uses this rough
/// 4 chars ≈ 1 token heuristic. The result is advisory, used only for
/// chunk-size decisions.
const CHARS_PER_TOKEN: usize = 4;

/// How a heading token for one structural level is written in the source
/// text: a prefix, a run of numerals, and a suffix (e.g. `第` + `148` +
/// `条`). Both Chinese numerals and ASCII digits are accepted in the run.
#[derive(Debug, Clone)]
pub struct LevelMarker {
    pub level: HierarchyLevel,
    pub prefix: String,
    pub suffix: String,
}

/// The marker set for one document.
///
/// Defaults cover Chinese statute conventions: 编 (book), 章 (chapter),
/// 节 (section), and 条 (article) headings, with paragraphs numbered by
/// position within their article and items written as bracketed numerals
/// like `（一）`.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    /// Structural heading markers, coarsest first. Article must be the
    /// finest level present; paragraphs and items are positional.
    pub levels: Vec<LevelMarker>,
    /// Opening bracket of an item token.
    pub item_open: char,
    /// Closing bracket of an item token.
    pub item_close: char,
}

impl Default for MarkerSet {
    fn default() -> Self {
        let marker = |level, prefix: &str, suffix: &str| LevelMarker {
            level,
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        };
        Self {
            levels: vec![
                marker(HierarchyLevel::Book, "第", "编"),
                marker(HierarchyLevel::Chapter, "第", "章"),
                marker(HierarchyLevel::Section, "第", "节"),
                marker(HierarchyLevel::Article, "第", "条"),
            ],
            item_open: '（',
            item_close: '）',
        }
    }
}

/// Chunk-size limits for the splitting and merging policy.
#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    /// Token ceiling above which a unit is split at the next-finer
    /// hierarchy boundary.
    pub max_tokens: u32,
    /// Floor below which a trailing fragment produced by splitting is
    /// merged into its preceding sibling.
    pub min_tokens: u32,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            min_tokens: 24,
        }
    }
}

/// Estimate a model-agnostic token count: CJK characters count one each,
/// remaining non-whitespace text at [`CHARS_PER_TOKEN`] chars per token.
pub fn estimate_tokens(text: &str) -> u32 {
    let mut cjk = 0usize;
    let mut other = 0usize;
    for c in text.chars() {
        if is_cjk(c) {
            cjk += 1;
        } else if !c.is_whitespace() {
            other += 1;
        }
    }
    (cjk + other.div_ceil(CHARS_PER_TOKEN)) as u32
}

fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x2E80..=0x303F       // radicals, CJK punctuation
        | 0x3400..=0x4DBF     // extension A
        | 0x4E00..=0x9FFF     // unified ideographs
        | 0xF900..=0xFAFF     // compatibility ideographs
        | 0xFF00..=0xFFEF     // fullwidth forms
        | 0x20000..=0x2FA1F   // extensions B..F
    )
}

fn is_numeral(c: char) -> bool {
    c.is_ascii_digit() || "零〇一二三四五六七八九十百千".contains(c)
}

/// Match a heading token at the start of `line`: prefix, a non-empty
/// numeral run, then suffix. Returns the token and the rest of the line.
fn match_heading<'a>(line: &'a str, marker: &LevelMarker) -> Option<(&'a str, &'a str)> {
    let after_prefix = line.strip_prefix(marker.prefix.as_str())?;
    let run_len: usize = after_prefix
        .chars()
        .take_while(|c| is_numeral(*c))
        .map(|c| c.len_utf8())
        .sum();
    if run_len == 0 {
        return None;
    }
    let after_run = &after_prefix[run_len..];
    let rest = after_run.strip_prefix(marker.suffix.as_str())?;
    let token_len = line.len() - rest.len();
    Some((&line[..token_len], rest))
}

/// Match an item token at the start of `line`, e.g. `（一）`.
fn match_item<'a>(line: &'a str, markers: &MarkerSet) -> Option<(&'a str, &'a str)> {
    let after_open = line.strip_prefix(markers.item_open)?;
    let run_len: usize = after_open
        .chars()
        .take_while(|c| is_numeral(*c))
        .map(|c| c.len_utf8())
        .sum();
    if run_len == 0 {
        return None;
    }
    let after_run = &after_open[run_len..];
    let rest = after_run.strip_prefix(markers.item_close)?;
    let token_len = line.len() - rest.len();
    Some((&line[..token_len], rest))
}

/// Split a legal document into hierarchy-addressed segments.
///
/// Fails with [`Error::Validation`] (aborting the whole document, no
/// partial output) when an item token appears outside any article, an
/// article heading carries no content, or the document contains no
/// recognizable units.
pub fn segment(
    text: &str,
    markers: &MarkerSet,
    law_name: &str,
    options: &SegmentOptions,
) -> Result<Vec<LawSegment>> {
    if law_name.trim().is_empty() {
        return Err(Error::Validation("law_name must not be empty".to_string()));
    }

    let articles = parse_articles(text, markers)?;
    if articles.is_empty() {
        return Err(Error::Validation(format!(
            "document for '{law_name}' contains no recognizable units"
        )));
    }

    let mut segments = Vec::new();
    for article in articles {
        split_article(law_name, article, markers, options, &mut segments)?;
    }
    Ok(segments)
}

struct ParsedArticle {
    path: HierarchyPath,
    /// Full article text lines, heading line included.
    lines: Vec<String>,
    /// The rest of the heading line after the article token.
    heading_rest: String,
}

/// Line-ordered parse: track the open book/chapter/section, open a new
/// article at each article heading, append marker-less lines to it.
fn parse_articles(text: &str, markers: &MarkerSet) -> Result<Vec<ParsedArticle>> {
    let mut coarse: Vec<(HierarchyLevel, String)> = Vec::new();
    let mut articles: Vec<ParsedArticle> = Vec::new();
    let mut current: Option<ParsedArticle> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let heading = markers
            .levels
            .iter()
            .find_map(|m| match_heading(line, m).map(|(token, rest)| (m.level, token, rest)));

        match heading {
            Some((HierarchyLevel::Article, token, rest)) => {
                finish_article(current.take(), &mut articles)?;
                let mut path = HierarchyPath::from_pairs(coarse.clone())?;
                path.push(HierarchyLevel::Article, token)?;
                current = Some(ParsedArticle {
                    path,
                    lines: vec![line.to_string()],
                    heading_rest: rest.trim().to_string(),
                });
            }
            Some((level, token, _title)) => {
                finish_article(current.take(), &mut articles)?;
                // A coarser heading closes every level at or below it.
                coarse.retain(|(l, _)| *l < level);
                coarse.push((level, token.to_string()));
            }
            None => match current.as_mut() {
                Some(article) => article.lines.push(line.to_string()),
                None => {
                    if match_item(line, markers).is_some() {
                        return Err(Error::Validation(format!(
                            "item '{line}' has no enclosing article"
                        )));
                    }
                    // Preamble text (title pages, tables of contents)
                    // before the first unit is not addressable; skip it.
                }
            },
        }
    }
    finish_article(current.take(), &mut articles)?;
    Ok(articles)
}

fn finish_article(article: Option<ParsedArticle>, out: &mut Vec<ParsedArticle>) -> Result<()> {
    if let Some(article) = article {
        if article.heading_rest.is_empty() && article.lines.len() == 1 {
            return Err(Error::Validation(format!(
                "article '{}' has no content",
                article.path.citation()
            )));
        }
        out.push(article);
    }
    Ok(())
}

/// Emit one segment per article, or paragraph/item segments when the
/// article exceeds the token ceiling.
fn split_article(
    law_name: &str,
    article: ParsedArticle,
    markers: &MarkerSet,
    options: &SegmentOptions,
    out: &mut Vec<LawSegment>,
) -> Result<()> {
    let content = article.lines.join("\n");
    if estimate_tokens(&content) <= options.max_tokens {
        out.push(make_segment(law_name, article.path, content));
        return Ok(());
    }

    // One paragraph per non-empty line, numbered by position. Item
    // lines stay with the paragraph that introduces them.
    let mut paragraphs: Vec<String> = Vec::new();
    for line in article.lines {
        if match_item(&line, markers).is_some() {
            if let Some(prev) = paragraphs.last_mut() {
                prev.push('\n');
                prev.push_str(&line);
                continue;
            }
        }
        paragraphs.push(line);
    }
    merge_trailing(&mut paragraphs, options.min_tokens);

    for (index, paragraph) in paragraphs.into_iter().enumerate() {
        let mut path = article.path.clone();
        path.push(HierarchyLevel::Paragraph, format!("第{}款", index + 1))?;

        if estimate_tokens(&paragraph) <= options.max_tokens {
            out.push(make_segment(law_name, path, paragraph));
            continue;
        }

        match split_items(&paragraph, markers) {
            Some(items) => {
                let mut pieces: Vec<(String, String)> = items;
                merge_trailing_pairs(&mut pieces, options.min_tokens);
                for (token, text) in pieces {
                    let mut item_path = path.clone();
                    item_path.push(HierarchyLevel::Item, token)?;
                    out.push(make_segment(law_name, item_path, text));
                }
            }
            // No finer boundary to split on; keep the oversized paragraph.
            None => out.push(make_segment(law_name, path, paragraph)),
        }
    }
    Ok(())
}

/// Split a paragraph at its item tokens. Text before the first item stays
/// attached to that item. Returns `None` when no item token is present.
fn split_items(paragraph: &str, markers: &MarkerSet) -> Option<Vec<(String, String)>> {
    let mut boundaries: Vec<(usize, String)> = Vec::new();
    let mut offset = 0;
    for part in paragraph.split_inclusive(|c: char| c == '\n' || c == '；' || c == '：' || c == '。')
    {
        let trimmed_start = part.len() - part.trim_start().len();
        let candidate = &part[trimmed_start..];
        if let Some((token, _)) = match_item(candidate, markers) {
            boundaries.push((offset + trimmed_start, token.to_string()));
        }
        offset += part.len();
    }
    if boundaries.is_empty() {
        return None;
    }

    let mut items = Vec::with_capacity(boundaries.len());
    for (i, (start, token)) in boundaries.iter().enumerate() {
        let end = boundaries
            .get(i + 1)
            .map(|(next, _)| *next)
            .unwrap_or(paragraph.len());
        // The introductory clause before the first item belongs with it.
        let slice_start = if i == 0 { 0 } else { *start };
        let text = paragraph[slice_start..end].trim().to_string();
        items.push((token.clone(), text));
    }
    Some(items)
}

/// Merge an undersized trailing fragment into its preceding sibling.
fn merge_trailing(pieces: &mut Vec<String>, min_tokens: u32) {
    while pieces.len() > 1 {
        let last = pieces.last().map(|p| estimate_tokens(p)).unwrap_or(0);
        if last >= min_tokens {
            break;
        }
        let fragment = match pieces.pop() {
            Some(f) => f,
            None => break,
        };
        if let Some(prev) = pieces.last_mut() {
            prev.push('\n');
            prev.push_str(&fragment);
        }
    }
}

fn merge_trailing_pairs(pieces: &mut Vec<(String, String)>, min_tokens: u32) {
    while pieces.len() > 1 {
        let last = pieces.last().map(|(_, t)| estimate_tokens(t)).unwrap_or(0);
        if last >= min_tokens {
            break;
        }
        let (_, fragment) = match pieces.pop() {
            Some(f) => f,
            None => break,
        };
        if let Some((_, prev)) = pieces.last_mut() {
            prev.push('\n');
            prev.push_str(&fragment);
        }
    }
}

fn make_segment(law_name: &str, path: HierarchyPath, content: String) -> LawSegment {
    let token_count = estimate_tokens(&content);
    LawSegment {
        law_name: law_name.to_string(),
        path,
        content,
        token_count,
        key_concepts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAUD_CLAUSE: &str =
        "第148条 一方以欺诈手段使对方在违背真实意思的情况下实施的民事法律行为，受欺诈方有权请求人民法院或者仲裁机构予以撤销。";

    fn default_segment(text: &str) -> Result<Vec<LawSegment>> {
        segment(
            text,
            &MarkerSet::default(),
            "民法典",
            &SegmentOptions::default(),
        )
    }

    #[test]
    fn test_single_article_clause() {
        let segments = default_segment(FRAUD_CLAUSE).unwrap();
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert_eq!(seg.law_name, "民法典");
        assert_eq!(seg.path.get(HierarchyLevel::Article), Some("第148条"));
        assert_eq!(seg.content, FRAUD_CLAUSE);
        assert!(seg.token_count > 0);
    }

    #[test]
    fn test_tracks_open_book_chapter_section() {
        let text = "第一编 总则\n第六章 民事法律行为\n第三节 民事法律行为的效力\n第148条 正文内容。";
        let segments = default_segment(text).unwrap();
        assert_eq!(segments.len(), 1);
        let path = &segments[0].path;
        assert_eq!(path.get(HierarchyLevel::Book), Some("第一编"));
        assert_eq!(path.get(HierarchyLevel::Chapter), Some("第六章"));
        assert_eq!(path.get(HierarchyLevel::Section), Some("第三节"));
        assert_eq!(path.get(HierarchyLevel::Article), Some("第148条"));
    }

    #[test]
    fn test_new_chapter_closes_section() {
        let text = "第一章 甲\n第一节 乙\n第1条 第一条内容。\n第二章 丙\n第2条 第二条内容。";
        let segments = default_segment(text).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].path.get(HierarchyLevel::Chapter), Some("第二章"));
        assert_eq!(segments[1].path.get(HierarchyLevel::Section), None);
    }

    #[test]
    fn test_marker_less_lines_append_to_open_article() {
        let text = "第1条 首款内容甲乙丙。\n次款内容丁戊己。";
        let segments = default_segment(text).unwrap();
        assert_eq!(segments.len(), 1);
        assert!(segments[0].content.contains("首款内容"));
        assert!(segments[0].content.contains("次款内容"));
    }

    #[test]
    fn test_item_without_article_is_rejected() {
        let text = "第一章 总则\n（一）没有条的项。";
        let err = default_segment(text).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_article_without_content_is_rejected() {
        let err = default_segment("第9条").unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_no_recognizable_units_is_rejected() {
        let err = default_segment("这份文本没有任何标记。").unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn test_oversized_article_splits_into_paragraphs() {
        let first = format!("第10条 {}", "甲".repeat(40));
        let second = "乙".repeat(40);
        let text = format!("{first}\n{second}");
        let options = SegmentOptions {
            max_tokens: 50,
            min_tokens: 5,
        };
        let segments = segment(&text, &MarkerSet::default(), "测试法", &options).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0].path.get(HierarchyLevel::Paragraph),
            Some("第1款")
        );
        assert_eq!(
            segments[1].path.get(HierarchyLevel::Paragraph),
            Some("第2款")
        );
        assert_eq!(
            segments[0].path.get(HierarchyLevel::Article),
            segments[1].path.get(HierarchyLevel::Article)
        );
    }

    #[test]
    fn test_undersized_trailing_paragraph_merges_into_preceding() {
        let first = format!("第11条 {}", "甲".repeat(60));
        let second = "乙".repeat(60);
        let tail = "丙丙";
        let text = format!("{first}\n{second}\n{tail}");
        let options = SegmentOptions {
            max_tokens: 70,
            min_tokens: 10,
        };
        let segments = segment(&text, &MarkerSet::default(), "测试法", &options).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[1].content.ends_with(tail));
    }

    #[test]
    fn test_oversized_paragraph_splits_at_item_tokens() {
        let intro = "第12条 有下列情形之一的，合同无效：";
        let items = format!(
            "（一）{}；（二）{}；（三）{}。",
            "甲".repeat(30),
            "乙".repeat(30),
            "丙".repeat(30)
        );
        let text = format!("{intro}{items}");
        let options = SegmentOptions {
            max_tokens: 40,
            min_tokens: 5,
        };
        let segments = segment(&text, &MarkerSet::default(), "测试法", &options).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].path.get(HierarchyLevel::Item), Some("（一）"));
        assert!(segments[0].content.contains("有下列情形之一"));
        assert_eq!(segments[2].path.get(HierarchyLevel::Item), Some("（三）"));
        for seg in &segments {
            assert_eq!(seg.path.get(HierarchyLevel::Paragraph), Some("第1款"));
        }
    }

    #[test]
    fn test_item_lines_stay_with_their_paragraph() {
        let text = format!(
            "第13条 有下列情形之一的，行为无效：\n（一）{}\n（二）{}",
            "甲".repeat(30),
            "乙".repeat(30)
        );
        let options = SegmentOptions {
            max_tokens: 40,
            min_tokens: 5,
        };
        let segments = segment(&text, &MarkerSet::default(), "测试法", &options).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments
            .iter()
            .all(|s| s.path.get(HierarchyLevel::Paragraph) == Some("第1款")));
        assert_eq!(segments[0].path.get(HierarchyLevel::Item), Some("（一）"));
        assert_eq!(segments[1].path.get(HierarchyLevel::Item), Some("（二）"));
    }

    #[test]
    fn test_resegmenting_is_byte_identical() {
        let text = format!(
            "第一编 总则\n第六章 民事法律行为\n{FRAUD_CLAUSE}\n第149条 第三人实施欺诈行为的条款内容。"
        );
        let a = default_segment(&text).unwrap();
        let b = default_segment(&text).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_token_estimate_counts_cjk_per_char() {
        assert_eq!(estimate_tokens("欺诈"), 2);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("欺诈 abcd"), 3);
        assert_eq!(estimate_tokens(""), 0);
    }
}
