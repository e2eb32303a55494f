//! Text units: segments extracted from content documents and the chunks
//! they are packed into for translation.

pub mod chunker;
pub mod cleaner;
pub mod markup;

pub use chunker::{build_chunks, split_oversized};

use std::ops::Range;

/// Placed between segment texts inside one chunk.
pub const SEGMENT_SEPARATOR: &str = "\n|||---|||\n";

/// What a translated chunk is split on; surrounding whitespace is trimmed.
const SEPARATOR_MARK: &str = "|||---|||";

const OPENING_QUOTES: &[char] = &['"', '\'', '\u{201c}', '\u{2018}', '\u{201e}', '\u{00ab}', '\u{300c}', '\u{300e}'];
const CLOSING_QUOTES: &[char] = &['"', '\u{201d}', '\u{2019}', '\u{00bb}', '\u{300d}', '\u{300f}'];

/// How a segment is formatted when translated text is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    Narration,
    /// Quoted speech; emphasized in the output
    Dialogue,
    /// `h1`-`h6` content; never emphasized
    Heading,
}

impl SegmentRole {
    /// Classify a segment from its element name and extracted text.
    pub fn classify(tag: &str, text: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        if tag.len() == 2 && tag.starts_with('h') && tag.as_bytes()[1].is_ascii_digit() {
            return Self::Heading;
        }

        let text = text.trim();
        if text.starts_with(OPENING_QUOTES) || text.ends_with(CLOSING_QUOTES) {
            Self::Dialogue
        } else {
            Self::Narration
        }
    }
}

/// One paragraph-level block of translatable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Path of the content document inside the container
    pub document_id: String,
    /// Position among the document's segments
    pub index: usize,
    pub text: String,
    pub role: SegmentRole,
}

impl TextSegment {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A run of consecutive segments from one document, translated as one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `<document_id>#<start segment index>`; the checkpoint key
    pub id: String,
    pub document_id: String,
    /// Segment indices covered, in order
    pub segments: Range<usize>,
    /// Segment texts joined with [`SEGMENT_SEPARATOR`]
    pub source: String,
}

impl Chunk {
    pub fn new(document_id: &str, segments: &[TextSegment]) -> Self {
        let start = segments.first().map(|s| s.index).unwrap_or(0);
        let source = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR);

        Self {
            id: Self::id_for(document_id, start),
            document_id: document_id.to_string(),
            segments: start..start + segments.len(),
            source,
        }
    }

    pub fn id_for(document_id: &str, start: usize) -> String {
        format!("{}#{}", document_id, start)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn char_len(&self) -> usize {
        self.source.chars().count()
    }

    /// Split a translation of this chunk back into one text per segment.
    ///
    /// Returns `None` when the parts do not line up with the segments or a
    /// part came back empty.
    pub fn split_translation(&self, translated: &str) -> Option<Vec<String>> {
        let parts: Vec<String> = translated
            .split(SEPARATOR_MARK)
            .map(|p| p.trim().to_string())
            .collect();

        if parts.len() != self.segment_count() || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(parts)
    }
}

/// Remove separator marks a service may echo inside a single segment's text.
pub fn scrub_separator(text: &str) -> String {
    text.replace(SEPARATOR_MARK, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(index: usize, text: &str) -> TextSegment {
        TextSegment {
            document_id: "OEBPS/ch1.xhtml".to_string(),
            index,
            text: text.to_string(),
            role: SegmentRole::Narration,
        }
    }

    #[test]
    fn test_classify_roles() {
        assert_eq!(SegmentRole::classify("h2", "Chapter One"), SegmentRole::Heading);
        assert_eq!(
            SegmentRole::classify("p", "\u{201c}Where are you going?\u{201d}"),
            SegmentRole::Dialogue
        );
        assert_eq!(SegmentRole::classify("p", "\"Stop,\" she said"), SegmentRole::Dialogue);
        assert_eq!(SegmentRole::classify("P", "\u{300c}\u{3084}\u{3042}\u{300d}"), SegmentRole::Dialogue);
        assert_eq!(
            SegmentRole::classify("p", "The rain had not stopped."),
            SegmentRole::Narration
        );
    }

    #[test]
    fn test_chunk_identity() {
        let segments = vec![segment(3, "One."), segment(4, "Two.")];
        let chunk = Chunk::new("OEBPS/ch1.xhtml", &segments);
        assert_eq!(chunk.id, "OEBPS/ch1.xhtml#3");
        assert_eq!(chunk.segments, 3..5);
        assert_eq!(chunk.source, "One.\n|||---|||\nTwo.");
        assert_eq!(chunk.char_len(), 4 + SEGMENT_SEPARATOR.chars().count() + 4);
    }

    #[test]
    fn test_split_translation_aligned() {
        let chunk = Chunk::new("a.xhtml", &[segment(0, "One."), segment(1, "Two.")]);
        let parts = chunk.split_translation("Eins. |||---|||Zwei.\n").unwrap();
        assert_eq!(parts, vec!["Eins.", "Zwei."]);
    }

    #[test]
    fn test_split_translation_misaligned() {
        let chunk = Chunk::new("a.xhtml", &[segment(0, "One."), segment(1, "Two.")]);
        assert!(chunk.split_translation("Eins. Zwei.").is_none());
        assert!(chunk.split_translation("Eins.|||---|||  ").is_none());
        assert!(chunk.split_translation("a|||---|||b|||---|||c").is_none());
    }

    #[test]
    fn test_scrub_separator() {
        assert_eq!(scrub_separator("Hallo |||---||| Welt"), "Hallo   Welt");
    }
}
