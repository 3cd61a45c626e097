//! README text utilities: Markdown-to-text, heading detection, sanitizing,
//! and keyword extraction.
//!
//! Markdown is parsed with `pulldown-cmark`; raw HTML blocks (centered logos,
//! badge rows) are reduced to their visible text with `scraper`.

mod cleanup;
mod keywords;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use scraper::Html;
use tracing::{debug, instrument};

pub use keywords::{DEFAULT_TOP_K, extract_keywords};

/// Default limit for [`sanitize_text`].
pub const DEFAULT_SANITIZE_LEN: usize = 4000;

// ---------------------------------------------------------------------------
// Markdown → plain text
// ---------------------------------------------------------------------------

/// Convert README Markdown to plain text, one block per line.
///
/// Paragraphs, headings, list items and table rows each become a line.
/// Code blocks and images are dropped; inline HTML tags are skipped and HTML
/// blocks contribute their text content.
#[instrument(skip_all, fields(len = md.len()))]
pub fn markdown_to_text(md: &str) -> String {
    let md = md.trim();
    if md.is_empty() {
        return String::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut html_block = String::new();
    let mut in_code_block = false;
    let mut in_html_block = false;
    let mut image_depth = 0usize;

    for event in Parser::new_ext(md, parser_options()) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            Event::Start(Tag::HtmlBlock) => {
                in_html_block = true;
                html_block.clear();
            }
            Event::End(TagEnd::HtmlBlock) => {
                in_html_block = false;
                let text = html_text(&html_block);
                if !text.is_empty() {
                    lines.push(text);
                }
            }
            Event::Html(html) if in_html_block => html_block.push_str(&html),
            Event::Text(text) | Event::Code(text) => {
                if !in_code_block && image_depth == 0 {
                    line.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => line.push(' '),
            Event::End(TagEnd::TableCell) => line.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::TableRow
                | TagEnd::TableHead,
            ) => flush_line(&mut line, &mut lines),
            _ => {}
        }
    }
    flush_line(&mut line, &mut lines);

    let out = cleanup::clean_blank_lines(&lines.join("\n"));
    debug!(lines = lines.len(), out_len = out.len(), "markdown converted to text");
    out
}

/// GFM extensions without smart punctuation, so text round-trips literally.
fn parser_options() -> Options {
    let mut options = Options::all();
    options.remove(Options::ENABLE_SMART_PUNCTUATION);
    options
}

/// Push the current line (trimmed, whitespace-collapsed) if it has content.
fn flush_line(line: &mut String, lines: &mut Vec<String>) {
    let text = cleanup::collapse_whitespace(line);
    if !text.is_empty() {
        lines.push(text);
    }
    line.clear();
}

/// Visible text of an HTML fragment.
fn html_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    cleanup::collapse_whitespace(&text.join(" "))
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Ordered heading texts (any level) found in README Markdown.
pub fn section_headings(md: &str) -> Vec<String> {
    let mut headings = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new_ext(md, parser_options()) {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(String::new()),
            Event::End(TagEnd::Heading(_)) => {
                if let Some(text) = current.take() {
                    let text = cleanup::collapse_whitespace(&text);
                    if !text.is_empty() {
                        headings.push(text);
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            _ => {}
        }
    }

    headings
}

// ---------------------------------------------------------------------------
// Bounded text
// ---------------------------------------------------------------------------

/// Trim, collapse whitespace runs to single spaces, and cap at `max_len`
/// characters. Truncated output ends with `...` and never exceeds `max_len`.
pub fn sanitize_text(text: &str, max_len: usize) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let collapsed = cleanup::collapse_whitespace(text);
    cleanup::truncate_with_marker(&collapsed, max_len)
}

/// Char-boundary-safe prefix used to bound prompt input.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    cleanup::prefix_chars(text, max_chars)
}
