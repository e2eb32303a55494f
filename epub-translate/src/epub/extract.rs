//! Walking spine documents into translatable segments.

use super::container::Container;
use crate::error::{Error, Result};
use crate::text::markup::{self, MarkupError, TextSpan};
use crate::text::{SegmentRole, TextSegment};
use log::{debug, warn};
use std::path::Path;

/// Documents whose path contains one of these are never translated.
pub const DEFAULT_EXCLUDED_KEYWORDS: &[&str] = &[
    "toc",
    "nav",
    "cover",
    "title",
    "index",
    "info",
    "copyright",
];

/// One spine document.
#[derive(Debug, Clone)]
pub struct ContentDocument {
    /// Entry path inside the container
    pub id: String,
    /// False when the path matched an excluded keyword
    pub included: bool,
    pub segments: Vec<TextSegment>,
    /// Source markup; `None` for excluded documents
    pub markup: Option<String>,
    /// Where each segment's text sits in `markup`
    pub spans: Vec<TextSpan>,
    /// Set when the markup could not be segmented; the document passes through
    pub parse_error: Option<String>,
}

impl ContentDocument {
    fn excluded(id: &str) -> Self {
        Self {
            id: id.to_string(),
            included: false,
            segments: Vec::new(),
            markup: None,
            spans: Vec::new(),
            parse_error: None,
        }
    }

    /// Whether the document has segments to translate.
    pub fn is_translatable(&self) -> bool {
        self.included && self.parse_error.is_none() && !self.segments.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.segments.iter().map(TextSegment::char_len).sum()
    }
}

/// Case-insensitive keyword match against a document path.
pub fn is_excluded(document_id: &str, keywords: &[String]) -> bool {
    let id = document_id.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| id.contains(&k))
}

/// Segment one document's markup.
pub fn parse_document(id: &str, bytes: Vec<u8>) -> ContentDocument {
    let mut document = ContentDocument {
        id: id.to_string(),
        included: true,
        segments: Vec::new(),
        markup: None,
        spans: Vec::new(),
        parse_error: None,
    };

    let markup = match String::from_utf8(bytes) {
        Ok(markup) => markup,
        Err(_) => {
            document.parse_error = Some(MarkupError::NotUtf8.to_string());
            return document;
        }
    };

    match markup::find_segments(&markup) {
        Ok(found) => {
            for (index, marked) in found.into_iter().enumerate() {
                let role = SegmentRole::classify(&marked.tag, &marked.text);
                document.segments.push(TextSegment {
                    document_id: id.to_string(),
                    index,
                    text: marked.text,
                    role,
                });
                document.spans.push(marked.span);
            }
        }
        Err(e) => document.parse_error = Some(e.to_string()),
    }

    document.markup = Some(markup);
    document
}

/// Lazy, in-order sequence of the spine's content documents.
///
/// Opening a new extractor on the same file yields the same documents again.
pub struct Extractor {
    container: Container,
    keywords: Vec<String>,
    next: usize,
}

impl Extractor {
    pub fn open(path: &Path, keywords: &[String]) -> Result<Self> {
        Ok(Self {
            container: Container::open(path)?,
            keywords: keywords.to_vec(),
            next: 0,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.container.title()
    }

    fn read_next(&mut self) -> Option<Result<ContentDocument>> {
        loop {
            let item = self.container.spine().get(self.next)?.clone();
            self.next += 1;

            if !item.is_xhtml() {
                debug!("Skipping non-XHTML spine item {} ({})", item.path, item.media_type);
                continue;
            }
            if is_excluded(&item.path, &self.keywords) {
                debug!("Excluding {}", item.path);
                return Some(Ok(ContentDocument::excluded(&item.path)));
            }

            let bytes = match self.container.read(&item) {
                Ok(bytes) => bytes,
                Err(e) => return Some(Err(e)),
            };
            let document = parse_document(&item.path, bytes);
            if let Some(reason) = &document.parse_error {
                let err = Error::MarkupParse {
                    document: item.path.clone(),
                    reason: reason.clone(),
                };
                warn!("{}; passing it through unchanged", err);
            }
            return Some(Ok(document));
        }
    }
}

impl Iterator for Extractor {
    type Item = Result<ContentDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next()
    }
}

/// Extract every spine document of the book at `path`.
pub fn extract_documents(path: &Path, keywords: &[String]) -> Result<Vec<ContentDocument>> {
    Extractor::open(path, keywords)?.collect()
}
