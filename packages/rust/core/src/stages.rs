//! The four LLM stages and their typed records.
//!
//! Every stage builds one prompt, makes one completion call, and parses the
//! reply into a record. Prompts ask for a `LABEL: value` layout; the parsers
//! accept the usual Markdown decoration around labels and fall back to the
//! raw reply when a label is missing. The raw reply is kept on every record.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use readme_review_markdown::{excerpt, sanitize_text};
use readme_review_shared::{Result, ReviewError};

use crate::llm::LanguageModel;
use crate::state::StageRecord;

/// README characters included in each prompt.
pub const PROMPT_EXCERPT_CHARS: usize = 1200;

/// Keywords listed in the tag prompt.
pub const PROMPT_KEYWORDS: usize = 20;

pub const MAX_TAGS: usize = 10;
pub const MAX_CATEGORIES: usize = 4;

/// Cap for a summary recovered from an unlabeled reply.
const FALLBACK_SUMMARY_CHARS: usize = 600;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Analyzer output: what the project is and what the README lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    pub suggestions: Vec<String>,
    pub raw: String,
}

impl StageRecord for Analysis {
    const KEY: &'static str = "analyzer";

    fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(ReviewError::stage_output(Self::KEY, "summary is empty"));
        }
        Ok(())
    }
}

impl Analysis {
    pub fn preview(&self) -> String {
        let mut out = format!("Summary: {}", self.summary);
        for s in &self.suggestions {
            out.push_str("\n  - ");
            out.push_str(s);
        }
        out
    }
}

/// Tag recommender output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSuggestions {
    /// At most [`MAX_TAGS`].
    pub tags: Vec<String>,
    /// At most [`MAX_CATEGORIES`].
    pub categories: Vec<String>,
    pub raw: String,
}

impl StageRecord for TagSuggestions {
    const KEY: &'static str = "tags";

    fn validate(&self) -> Result<()> {
        if self.tags.is_empty() {
            return Err(ReviewError::stage_output(Self::KEY, "no tags suggested"));
        }
        Ok(())
    }
}

impl TagSuggestions {
    pub fn preview(&self) -> String {
        format!(
            "Tags: {}\nCategories: {}",
            self.tags.join(", "),
            self.categories.join(", ")
        )
    }
}

/// Content improver output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Improvements {
    pub suggested_title: String,
    pub suggested_intro: String,
    pub missing_sections: Vec<String>,
    pub raw: String,
}

impl StageRecord for Improvements {
    const KEY: &'static str = "improvements";

    fn validate(&self) -> Result<()> {
        if self.suggested_title.trim().is_empty() {
            return Err(ReviewError::stage_output(Self::KEY, "suggested title is empty"));
        }
        Ok(())
    }
}

impl Improvements {
    pub fn preview(&self) -> String {
        format!(
            "Title: {}\nIntro: {}\nMissing: {}",
            self.suggested_title,
            self.suggested_intro,
            self.missing_sections.join(", ")
        )
    }
}

/// Reviewer output: the final plain-text plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub report: String,
}

impl StageRecord for Review {
    const KEY: &'static str = "report";

    fn validate(&self) -> Result<()> {
        if self.report.trim().is_empty() {
            return Err(ReviewError::stage_output(Self::KEY, "report is empty"));
        }
        Ok(())
    }
}

/// What the reviewer sees. Human feedback is deliberately absent.
#[derive(Debug, Clone, Copy)]
pub struct ReviewInput<'a> {
    pub analysis: &'a Analysis,
    pub tags: &'a TagSuggestions,
    pub improvements: &'a Improvements,
    /// Intro to review: the operator's edit if there was one.
    pub intro: &'a str,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Summarize the README and list improvements.
#[instrument(skip_all, fields(stage = Analysis::KEY, model = llm.name()))]
pub async fn analyze(readme: &str, llm: &dyn LanguageModel) -> Result<Analysis> {
    let raw = llm.complete(&analyzer_prompt(readme)).await?;
    let analysis = parse_analysis(&raw);
    analysis.validate()?;
    info!(suggestions = analysis.suggestions.len(), "analysis complete");
    Ok(analysis)
}

/// Suggest discovery tags and categories, seeded with extracted keywords.
#[instrument(skip_all, fields(stage = TagSuggestions::KEY, model = llm.name()))]
pub async fn recommend_tags(
    text: &str,
    keywords: &[String],
    llm: &dyn LanguageModel,
) -> Result<TagSuggestions> {
    let raw = llm.complete(&tags_prompt(text, keywords)).await?;
    let tags = parse_tags(&raw);
    tags.validate()?;
    info!(tags = tags.tags.len(), categories = tags.categories.len(), "tags suggested");
    Ok(tags)
}

/// Propose a better title, intro, and the sections the README is missing.
#[instrument(skip_all, fields(stage = Improvements::KEY, model = llm.name()))]
pub async fn improve_content(
    text: &str,
    sections: &[String],
    llm: &dyn LanguageModel,
) -> Result<Improvements> {
    let raw = llm.complete(&improver_prompt(text, sections)).await?;
    let improvements = parse_improvements(&raw);
    improvements.validate()?;
    info!(
        missing = improvements.missing_sections.len(),
        "content improvements proposed"
    );
    Ok(improvements)
}

/// Merge everything into the final report.
#[instrument(skip_all, fields(stage = Review::KEY, model = llm.name()))]
pub async fn review(input: ReviewInput<'_>, llm: &dyn LanguageModel) -> Result<Review> {
    let raw = llm.complete(&reviewer_prompt(input)).await?;
    let review = Review {
        report: raw.trim().to_string(),
    };
    review.validate()?;
    info!(report_len = review.report.len(), "review complete");
    Ok(review)
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub fn analyzer_prompt(readme: &str) -> String {
    format!(
        "You are a technical writer reviewing the README of a GitHub project.\n\
         Summarize what the project does and list concrete improvements to the README.\n\
         \n\
         Answer using exactly this layout:\n\
         SUMMARY: <two or three sentences>\n\
         SUGGESTIONS:\n\
         - <one improvement per line>\n\
         \n\
         README:\n{}",
        excerpt(readme, PROMPT_EXCERPT_CHARS)
    )
}

pub fn tags_prompt(text: &str, keywords: &[String]) -> String {
    let keywords: Vec<&str> = keywords
        .iter()
        .take(PROMPT_KEYWORDS)
        .map(String::as_str)
        .collect();
    let keywords = if keywords.is_empty() {
        "(none)".to_string()
    } else {
        keywords.join(", ")
    };
    format!(
        "You are helping a maintainer make a GitHub repository easier to discover.\n\
         Suggest up to {MAX_TAGS} short lowercase topic tags and up to {MAX_CATEGORIES} broad categories.\n\
         \n\
         Candidate keywords: {keywords}\n\
         \n\
         Answer using exactly this layout:\n\
         TAGS: tag-one, tag-two, tag-three\n\
         CATEGORIES: category-one, category-two\n\
         \n\
         README:\n{}",
        excerpt(text, PROMPT_EXCERPT_CHARS)
    )
}

pub fn improver_prompt(text: &str, sections: &[String]) -> String {
    let sections = if sections.is_empty() {
        "(none detected)".to_string()
    } else {
        sections.join(", ")
    };
    format!(
        "You are improving the opening of a GitHub README.\n\
         Propose a clearer title, a short introduction paragraph, and the standard \
         sections the README is missing.\n\
         \n\
         Existing sections: {sections}\n\
         \n\
         Answer using exactly this layout:\n\
         TITLE: <improved title>\n\
         INTRO: <one paragraph introduction>\n\
         MISSING:\n\
         - <missing section>\n\
         \n\
         README:\n{}",
        excerpt(text, PROMPT_EXCERPT_CHARS)
    )
}

pub fn reviewer_prompt(input: ReviewInput<'_>) -> String {
    let suggestions = bullet_list(&input.analysis.suggestions);
    let missing = bullet_list(&input.improvements.missing_sections);
    format!(
        "You are the final reviewer of a README improvement pass.\n\
         Combine the findings below into one final plan for the maintainer.\n\
         \n\
         Analysis summary: {summary}\n\
         Suggested improvements:\n{suggestions}\n\
         Tags: {tags}\n\
         Categories: {categories}\n\
         Proposed title: {title}\n\
         Proposed introduction:\n{intro}\n\
         Missing sections:\n{missing}\n\
         \n\
         Write the final plan as plain text with these parts:\n\
         1. Improved title\n\
         2. Summary (3-5 sentences)\n\
         3. Tags (6-10)\n\
         4. Categories (2-4)\n\
         5. Checklist of missing sections",
        summary = input.analysis.summary,
        tags = input.tags.tags.join(", "),
        categories = input.tags.categories.join(", "),
        title = input.improvements.suggested_title,
        intro = input.intro.trim(),
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Reply parsing
// ---------------------------------------------------------------------------

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+").expect("valid regex"));

/// A `LABEL:` block: the label (uppercased) and the lines under it.
/// Text on the label line itself is the first line.
#[derive(Debug)]
struct Block {
    label: String,
    lines: Vec<String>,
}

fn parse_blocks(raw: &str) -> Vec<Block> {
    let mut blocks = vec![Block {
        label: String::new(),
        lines: Vec::new(),
    }];

    for line in raw.lines() {
        match split_label(line) {
            Some((label, rest)) => {
                let lines = if rest.is_empty() { Vec::new() } else { vec![rest] };
                blocks.push(Block { label, lines });
            }
            None => {
                if let Some(current) = blocks.last_mut() {
                    current.lines.push(line.trim().to_string());
                }
            }
        }
    }

    blocks
}

/// Recognize `LABEL: rest`, tolerating `**LABEL**:` and `## LABEL:`.
fn split_label(line: &str) -> Option<(String, String)> {
    if BULLET_RE.is_match(line) {
        return None;
    }
    let clean = line.replace('*', "");
    let clean = clean.trim().trim_start_matches(['#', '>']).trim();
    let (head, rest) = clean.split_once(':')?;
    let head = head.trim();
    let is_label = !head.is_empty()
        && head.len() <= 30
        && head.chars().all(|c| c.is_ascii_alphabetic() || c == ' ');
    is_label.then(|| (head.to_ascii_uppercase(), rest.trim().to_string()))
}

/// Non-empty lines of the first block whose label matches any alias.
fn find_block<'a>(blocks: &'a [Block], aliases: &[&str]) -> Option<Vec<&'a str>> {
    blocks
        .iter()
        .find(|b| aliases.contains(&b.label.as_str()))
        .map(|b| {
            b.lines
                .iter()
                .map(String::as_str)
                .filter(|l| !l.is_empty())
                .collect()
        })
}

fn strip_bullet(line: &str) -> &str {
    match BULLET_RE.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line.trim(),
    }
}

fn bullets(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .map(|l| strip_bullet(l))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split comma/line separated items, dropping duplicates case-insensitively.
fn comma_list(lines: &[&str], limit: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        for item in strip_bullet(line).split(',') {
            let item = item.trim().trim_matches(['"', '\'', '`', '.']).trim_start_matches('#').trim();
            if item.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
                continue;
            }
            out.push(item.to_string());
        }
    }
    out.truncate(limit);
    out
}

/// First non-empty line, without heading or bullet markers.
fn first_line(raw: &str) -> Option<&str> {
    raw.lines()
        .map(|l| strip_bullet(l.trim().trim_start_matches('#')))
        .find(|l| !l.is_empty())
}

pub fn parse_analysis(raw: &str) -> Analysis {
    let blocks = parse_blocks(raw);

    let summary = match find_block(&blocks, &["SUMMARY"]) {
        Some(lines) => lines.join(" "),
        None => {
            let paragraph = raw.trim().split("\n\n").next().unwrap_or_default();
            sanitize_text(paragraph, FALLBACK_SUMMARY_CHARS)
        }
    };

    let suggestions = match find_block(&blocks, &["SUGGESTIONS", "IMPROVEMENTS", "RECOMMENDATIONS"]) {
        Some(lines) => bullets(&lines),
        None => raw
            .lines()
            .filter(|l| BULLET_RE.is_match(l))
            .map(|l| strip_bullet(l).to_string())
            .filter(|l| !l.is_empty())
            .collect(),
    };

    Analysis {
        summary: summary.trim().to_string(),
        suggestions,
        raw: raw.to_string(),
    }
}

pub fn parse_tags(raw: &str) -> TagSuggestions {
    let blocks = parse_blocks(raw);

    let tags = match find_block(&blocks, &["TAGS", "TOPICS"]) {
        Some(lines) => comma_list(&lines, MAX_TAGS),
        None => first_line(raw)
            .filter(|l| l.contains(','))
            .map(|l| comma_list(&[l], MAX_TAGS))
            .unwrap_or_default(),
    };
    let categories = find_block(&blocks, &["CATEGORIES", "CATEGORY"])
        .map(|lines| comma_list(&lines, MAX_CATEGORIES))
        .unwrap_or_default();

    TagSuggestions {
        tags,
        categories,
        raw: raw.to_string(),
    }
}

pub fn parse_improvements(raw: &str) -> Improvements {
    let blocks = parse_blocks(raw);

    let suggested_title = find_block(&blocks, &["TITLE", "SUGGESTED TITLE", "IMPROVED TITLE"])
        .and_then(|lines| lines.first().map(|l| l.to_string()))
        .or_else(|| first_line(raw).map(str::to_string))
        .unwrap_or_default();
    let suggested_intro = find_block(&blocks, &["INTRO", "INTRODUCTION", "SUGGESTED INTRO"])
        .map(|lines| lines.join("\n"))
        .unwrap_or_default();
    let missing_sections = find_block(&blocks, &["MISSING", "MISSING SECTIONS"])
        .map(|lines| bullets(&lines))
        .unwrap_or_default();

    Improvements {
        suggested_title: suggested_title.trim_matches(['"', '`']).trim().to_string(),
        suggested_intro,
        missing_sections,
        raw: raw.to_string(),
    }
}
