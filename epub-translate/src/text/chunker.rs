//! Packing segments into translation chunks.
//!
//! Chunk boundaries are a pure function of the segment list and the budget,
//! so re-extracting an unchanged book yields the same checkpoint keys.

use super::{Chunk, SEGMENT_SEPARATOR, TextSegment};

/// Maximum recursion depth for splitting long text.
const MAX_SPLIT_DEPTH: usize = 10;

/// Pack one document's segments into chunks of at most `max_chars` characters.
///
/// The separator between segments counts towards the budget. A segment that
/// alone exceeds the budget becomes its own chunk.
pub fn build_chunks(document_id: &str, segments: &[TextSegment], max_chars: usize) -> Vec<Chunk> {
    let separator_len = SEGMENT_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut current_len = 0;

    for (i, segment) in segments.iter().enumerate() {
        let len = segment.char_len();

        if i > start {
            if current_len + separator_len + len <= max_chars {
                current_len += separator_len + len;
                continue;
            }
            // Flush current chunk
            chunks.push(Chunk::new(document_id, &segments[start..i]));
            start = i;
        }
        current_len = len;

        // An oversized segment stands alone
        if len > max_chars {
            chunks.push(Chunk::new(document_id, &segments[i..=i]));
            start = i + 1;
            current_len = 0;
        }
    }

    // Don't forget the last chunk
    if start < segments.len() {
        chunks.push(Chunk::new(document_id, &segments[start..]));
    }

    chunks
}

/// Cut text longer than `max_chars` into consecutive pieces that fit.
///
/// Prefers sentence ends, then clause punctuation, then word boundaries, and
/// only splits inside a word as a last resort. Joining the pieces with a
/// space restores the text up to whitespace.
pub fn split_oversized(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let sentences = split_sentences(text);
    let mut pieces = Vec::new();
    for sentence in reassemble(&sentences, max_chars) {
        if char_len(&sentence) > max_chars {
            pieces.extend(split_long_sentence(&sentence, max_chars, 0));
        } else {
            pieces.push(sentence);
        }
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split after sentence-ending punctuation followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    const TERMINATORS: &[char] = &['.', '!', '?', '\u{3002}', '\u{ff01}', '\u{ff1f}'];

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = TERMINATORS.contains(&c)
            && chars.peek().map(|n| n.is_whitespace()).unwrap_or(false);
        if at_boundary {
            sentences.push(current.trim().to_string());
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }

    sentences
}

/// Greedily join parts with single spaces while they fit.
fn reassemble(parts: &[String], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if current.is_empty() {
            current = part.to_string();
        } else if char_len(&current) + char_len(part) + 1 <= max_chars {
            current.push(' ');
            current.push_str(part);
        } else {
            chunks.push(std::mem::take(&mut current));
            current = part.to_string();
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split a long sentence into smaller pieces at natural break points.
fn split_long_sentence(sentence: &str, max_chars: usize, depth: usize) -> Vec<String> {
    // Prevent infinite recursion
    if depth > MAX_SPLIT_DEPTH {
        return hard_split(sentence, max_chars);
    }

    if char_len(sentence) <= max_chars {
        return vec![sentence.to_string()];
    }

    // Try splitting on various delimiters in order of preference
    const DELIMITERS: &[&str] = &[";", ":", ",", "\u{3001}", " - ", " \u{2014} ", " \u{2013} "];

    for delimiter in DELIMITERS {
        if !sentence.contains(delimiter) {
            continue;
        }
        // Keep the delimiter on the left-hand piece so nothing is lost
        let parts: Vec<String> = sentence
            .split_inclusive(delimiter)
            .map(|p| p.trim().to_string())
            .collect();
        if parts.len() < 2 {
            continue;
        }

        let chunks = reassemble(&parts, max_chars);
        if chunks.len() > 1 {
            let mut final_chunks = Vec::new();
            for chunk in chunks {
                if char_len(&chunk) > max_chars {
                    final_chunks.extend(split_long_sentence(&chunk, max_chars, depth + 1));
                } else {
                    final_chunks.push(chunk);
                }
            }
            return final_chunks;
        }
    }

    // Try splitting on word boundaries
    let words: Vec<String> = sentence.split_whitespace().map(str::to_string).collect();
    if words.len() > 1 {
        let mut final_chunks = Vec::new();
        for chunk in reassemble(&words, max_chars) {
            if char_len(&chunk) > max_chars {
                final_chunks.extend(hard_split(&chunk, max_chars));
            } else {
                final_chunks.push(chunk);
            }
        }
        return final_chunks;
    }

    // Last resort: hard split
    hard_split(sentence, max_chars)
}

/// Hard split text at exact character positions (last resort).
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
