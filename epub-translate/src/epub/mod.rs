//! EPUB container access: reading spine documents and writing translated copies.

pub mod assembler;
mod container;
pub mod extract;

pub use assembler::{finalize, render_document, write_epub};
pub use extract::{
    ContentDocument, DEFAULT_EXCLUDED_KEYWORDS, Extractor, extract_documents, is_excluded,
};
