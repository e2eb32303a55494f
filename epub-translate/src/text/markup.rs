//! Locating paragraph-level elements in XHTML and writing text back into them.
//!
//! Content documents are edited in place: only the text between tags
//! changes, every other byte of the document is kept.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

use super::cleaner::{decode_entities, escape_text, normalize_whitespace};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("document is not valid UTF-8")]
    NotUtf8,

    #[error("no <body> element")]
    MissingBody,

    #[error("<{tag}> at byte {offset} is never closed")]
    Unclosed { tag: String, offset: usize },
}

/// Where a segment's text sits in the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextSpan {
    /// Byte range of the markup the segment covers
    pub inner: Range<usize>,
    /// Byte ranges of the non-blank text between tags, in order
    pub runs: Vec<Range<usize>>,
}

/// A paragraph-level run of translatable text.
///
/// Usually one leaf element. Text written directly inside a container,
/// between its child blocks, forms segments of its own tagged with the
/// container's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedSegment {
    /// Lowercase element name
    pub tag: String,
    pub span: TextSpan,
    /// Extracted plain text, never empty
    pub text: String,
}

/// New text for one segment.
#[derive(Debug, Clone)]
pub struct Replacement<'a> {
    pub span: &'a TextSpan,
    pub text: &'a str,
    /// Wrap the text in `<em>`
    pub emphasize: bool,
}

#[derive(Debug)]
struct Tag {
    name: String,
    closing: bool,
    start: usize,
    end: usize,
}

fn block_tag_regex() -> &'static Regex {
    static BLOCK_TAG: OnceLock<Regex> = OnceLock::new();
    BLOCK_TAG.get_or_init(|| {
        Regex::new(r"(?i)<(/?)(p|h[1-6]|li|dt|dd|blockquote|figcaption|caption|td|th|div)(\s[^>]*)?>")
            .expect("block tag pattern should compile")
    })
}

fn body_open_regex() -> &'static Regex {
    static BODY_OPEN: OnceLock<Regex> = OnceLock::new();
    BODY_OPEN.get_or_init(|| {
        Regex::new(r"(?i)<body(\s[^>]*)?>").expect("body pattern should compile")
    })
}

fn body_close_regex() -> &'static Regex {
    static BODY_CLOSE: OnceLock<Regex> = OnceLock::new();
    BODY_CLOSE.get_or_init(|| Regex::new(r"(?i)</body\s*>").expect("body pattern should compile"))
}

fn html_open_regex() -> &'static Regex {
    static HTML_OPEN: OnceLock<Regex> = OnceLock::new();
    HTML_OPEN.get_or_init(|| {
        Regex::new(r"(?i)<html(\s[^>]*)?>").expect("html pattern should compile")
    })
}

fn lang_attr_regex() -> &'static Regex {
    static LANG_ATTR: OnceLock<Regex> = OnceLock::new();
    LANG_ATTR.get_or_init(|| {
        Regex::new(r#"(?i)\s(xml:)?lang\s*=\s*("[^"]*"|'[^']*')"#)
            .expect("lang attribute pattern should compile")
    })
}

/// Find the translatable segments of a content document, in document order.
///
/// An element that contains another paragraph-level element is not a
/// segment itself; its children are, and so is each stretch of text it
/// holds between them. Segments without text are skipped.
pub fn find_segments(markup: &str) -> Result<Vec<MarkedSegment>, MarkupError> {
    let open = body_open_regex()
        .find(markup)
        .ok_or(MarkupError::MissingBody)?;
    let close = body_close_regex()
        .find_iter(markup)
        .last()
        .filter(|m| m.start() >= open.end())
        .ok_or(MarkupError::MissingBody)?;

    let body_start = open.end();
    let body = &markup[body_start..close.start()];

    let tags: Vec<Tag> = block_tag_regex()
        .captures_iter(body)
        .filter(|caps| {
            let self_closing = caps
                .get(3)
                .map(|a| a.as_str().trim_end().ends_with('/'))
                .unwrap_or(false);
            !self_closing
        })
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Tag {
                name: caps[2].to_ascii_lowercase(),
                closing: !caps[1].is_empty(),
                start: body_start + whole.start(),
                end: body_start + whole.end(),
            })
        })
        .collect();

    let mut segments = Vec::new();
    walk(
        markup,
        &tags,
        "body",
        body_start..close.start(),
        0..tags.len(),
        &mut segments,
    )?;
    Ok(segments)
}

/// Emit the segments of one container: its leaf children and the text
/// between them. `children` indexes the container's tags in `tags`.
fn walk(
    markup: &str,
    tags: &[Tag],
    parent: &str,
    content: Range<usize>,
    children: Range<usize>,
    segments: &mut Vec<MarkedSegment>,
) -> Result<(), MarkupError> {
    let mut gap_start = content.start;
    let mut i = children.start;

    while i < children.end {
        let tag = &tags[i];
        if tag.closing {
            i += 1;
            continue;
        }

        let close = matching_close(tags, i).ok_or_else(|| MarkupError::Unclosed {
            tag: tag.name.clone(),
            offset: tag.start,
        })?;

        push_segment(markup, parent, gap_start..tag.start, segments);

        let inner = tag.end..tags[close].start;
        if tags[i + 1..close].iter().any(|t| !t.closing) {
            walk(markup, tags, &tag.name, inner, i + 1..close, segments)?;
        } else {
            push_segment(markup, &tag.name, inner, segments);
        }

        gap_start = tags[close].end;
        i = close + 1;
    }

    push_segment(markup, parent, gap_start..content.end, segments);
    Ok(())
}

fn push_segment(markup: &str, tag: &str, inner: Range<usize>, segments: &mut Vec<MarkedSegment>) {
    // Crossed nesting can leave an inverted range
    if inner.start >= inner.end {
        return;
    }

    let (runs, raw) = scan_text(markup, inner.clone());
    let text = normalize_whitespace(&decode_entities(&raw));
    if text.is_empty() {
        return;
    }

    segments.push(MarkedSegment {
        tag: tag.to_string(),
        span: TextSpan { inner, runs },
        text,
    });
}

/// Collect the non-blank text runs of `range` and their raw concatenation.
///
/// Comments and the content of `script` and `style` elements are not text.
/// A `<br>` contributes a space to the concatenation.
fn scan_text(markup: &str, range: Range<usize>) -> (Vec<Range<usize>>, String) {
    let mut runs = Vec::new();
    let mut raw = String::new();
    let mut pos = range.start;

    while pos < range.end {
        let rest = &markup[pos..range.end];
        let text_len = rest.find('<').unwrap_or(rest.len());
        if text_len > 0 {
            let text = &rest[..text_len];
            if !is_blank(text) {
                runs.push(pos..pos + text_len);
            }
            raw.push_str(text);
        }
        pos += text_len;

        let tag = &markup[pos..range.end];
        if tag.is_empty() {
            break;
        }
        let tag_len = if tag.starts_with("<!--") {
            tag.find("-->").map(|e| e + 3)
        } else {
            tag.find('>').map(|e| e + 1)
        };
        let Some(tag_len) = tag_len else {
            break;
        };

        let tag = &tag[..tag_len];
        let name = tag_name(tag);
        pos += tag_len;

        if name == "br" {
            raw.push(' ');
        } else if (name == "script" || name == "style")
            && !tag.starts_with("</")
            && !tag.ends_with("/>")
        {
            let closing = format!("</{}", name);
            match markup[pos..range.end].to_ascii_lowercase().find(&closing) {
                Some(offset) => pos += offset,
                None => break,
            }
        }
    }

    (runs, raw)
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn is_blank(raw: &str) -> bool {
    normalize_whitespace(&decode_entities(raw)).is_empty()
}

fn matching_close(tags: &[Tag], open: usize) -> Option<usize> {
    let name = &tags[open].name;
    let mut depth = 0usize;

    for (j, tag) in tags.iter().enumerate().skip(open + 1) {
        if tag.name != *name {
            continue;
        }
        if !tag.closing {
            depth += 1;
        } else if depth == 0 {
            return Some(j);
        } else {
            depth -= 1;
        }
    }
    None
}

/// Whether inner markup is already one emphasis element around everything.
pub fn is_emphasized(inner: &str) -> bool {
    let inner = inner.trim().to_ascii_lowercase();
    let opens = inner.starts_with("<em>")
        || inner.starts_with("<em ")
        || inner.starts_with("<i>")
        || inner.starts_with("<i ");
    let closes = inner.ends_with("</em>") || inner.ends_with("</i>");
    opens && closes
}

/// Split `text` over runs weighted by their source length.
///
/// Cuts fall on word boundaries; a word goes to the run its midpoint lands
/// in. The last run takes whatever is left, so the pieces always
/// concatenate back to `text`.
fn distribute<'t>(text: &'t str, weights: &[usize]) -> Vec<&'t str> {
    if weights.len() <= 1 {
        return weights.iter().map(|_| text).collect();
    }

    // (end byte, char count) of each word with its trailing whitespace
    let mut words: Vec<(usize, usize)> = Vec::new();
    let mut chars = 0;
    let mut in_space = false;
    for (offset, c) in text.char_indices() {
        if in_space && !c.is_whitespace() {
            words.push((offset, chars));
            chars = 0;
        }
        in_space = c.is_whitespace();
        chars += 1;
    }
    if chars > 0 {
        words.push((text.len(), chars));
    }

    let total_chars: usize = words.iter().map(|(_, n)| n).sum();
    let total_weight = weights.iter().sum::<usize>().max(1);

    let mut pieces = Vec::with_capacity(weights.len());
    let mut words = words.into_iter().peekable();
    let mut start = 0;
    let mut consumed = 0;
    let mut cumulative = 0;

    for weight in &weights[..weights.len() - 1] {
        cumulative += weight;
        let target = total_chars * cumulative / total_weight;
        let mut end = start;
        while let Some(&(word_end, len)) = words.peek() {
            if consumed * 2 + len > target * 2 {
                break;
            }
            consumed += len;
            end = word_end;
            words.next();
        }
        pieces.push(&text[start..end]);
        start = end;
    }
    pieces.push(&text[start..]);
    pieces
}

/// Rewrite segment text; replacements may be given in any order.
///
/// Only the text runs of each segment change. Every tag inside a segment,
/// inline ones included, is kept byte for byte, and the translation is
/// spread over the runs in proportion to the source text they held.
pub fn apply_replacements(markup: &str, replacements: &[Replacement<'_>]) -> String {
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    for replacement in replacements {
        let runs = &replacement.span.runs;
        let weights: Vec<usize> = runs
            .iter()
            .map(|run| normalize_whitespace(&decode_entities(&markup[run.clone()])).chars().count())
            .collect();
        let pieces = distribute(replacement.text, &weights);

        for (run, piece) in runs.iter().zip(pieces) {
            let original = &markup[run.clone()];
            let lead = &original[..original.len() - original.trim_start().len()];
            let trail = &original[original.trim_end().len()..];
            let piece = piece.trim();

            let mut text = String::from(lead);
            if piece.is_empty() {
                if lead.is_empty() {
                    text.push_str(trail);
                }
            } else {
                let escaped = escape_text(piece);
                if replacement.emphasize {
                    text.push_str("<em>");
                    text.push_str(&escaped);
                    text.push_str("</em>");
                } else {
                    text.push_str(&escaped);
                }
                text.push_str(trail);
            }
            edits.push((run.clone(), text));
        }
    }

    edits.sort_by_key(|(range, _)| range.start);

    let mut result = String::with_capacity(markup.len());
    let mut cursor = 0;
    for (range, text) in edits {
        if range.start < cursor {
            // Overlapping runs cannot come out of find_segments
            continue;
        }
        result.push_str(&markup[cursor..range.start]);
        result.push_str(&text);
        cursor = range.end;
    }

    result.push_str(&markup[cursor..]);
    result
}

/// Set `lang` and `xml:lang` on the `<html>` element.
pub fn set_document_lang(markup: &str, lang: &str) -> String {
    let Some(caps) = html_open_regex().captures(markup) else {
        return markup.to_string();
    };
    let Some(whole) = caps.get(0) else {
        return markup.to_string();
    };

    let attrs = caps.get(1).map(|a| a.as_str()).unwrap_or("");
    let attrs = lang_attr_regex().replace_all(attrs, "");
    let lang = escape_text(lang).replace('"', "&quot;");

    format!(
        "{}<html{} lang=\"{}\" xml:lang=\"{}\">{}",
        &markup[..whole.start()],
        attrs.trim_end(),
        lang,
        lang,
        &markup[whole.end()..]
    )
}
