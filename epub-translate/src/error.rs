//! Failure taxonomy of the translation pipeline

use std::path::PathBuf;
use thiserror::Error;
use translate_client::TranslateError;

#[derive(Error, Debug)]
pub enum Error {
    /// The input is not a readable EPUB container
    #[error("Cannot read EPUB container {path}: {reason}")]
    ContainerRead { path: PathBuf, reason: String },

    /// One content document could not be segmented; it is passed through unchanged
    #[error("Cannot parse markup of {document}: {reason}")]
    MarkupParse { document: String, reason: String },

    #[error("No checkpoint entry for chunk {0}")]
    CheckpointMiss(String),

    /// The stored entry does not belong to the chunk now carrying this id
    #[error("Checkpoint entry for chunk {chunk_id} conflicts with the current input")]
    CheckpointConflict { chunk_id: String },

    #[error("Translation of chunk {chunk_id} failed: {source}")]
    TranslationFailed {
        chunk_id: String,
        #[source]
        source: TranslateError,
    },

    #[error("Translation quota exceeded at chunk {chunk_id}: {message}")]
    QuotaExceeded { chunk_id: String, message: String },

    #[error("Cannot assemble EPUB: {0}")]
    Assembly(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a transport failure for `chunk_id` onto the pipeline taxonomy.
    pub fn from_transport(chunk_id: &str, err: TranslateError) -> Self {
        if err.is_quota() {
            let message = match err {
                TranslateError::QuotaExceeded(message) => message,
                other => other.to_string(),
            };
            return Self::QuotaExceeded {
                chunk_id: chunk_id.to_string(),
                message,
            };
        }
        Self::TranslationFailed {
            chunk_id: chunk_id.to_string(),
            source: err,
        }
    }

    /// Short machine-readable name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContainerRead { .. } => "container-read",
            Self::MarkupParse { .. } => "markup-parse",
            Self::CheckpointMiss(_) => "checkpoint-miss",
            Self::CheckpointConflict { .. } => "checkpoint-conflict",
            Self::TranslationFailed { .. } => "translation-failed",
            Self::QuotaExceeded { .. } => "quota-exceeded",
            Self::Assembly(_) => "assembly",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Assembly(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_maps_to_quota_exceeded() {
        let err = Error::from_transport("ch1.xhtml#0", TranslateError::QuotaExceeded("limit".into()));
        assert!(matches!(
            err,
            Error::QuotaExceeded { ref chunk_id, ref message } if chunk_id == "ch1.xhtml#0" && message == "limit"
        ));
        assert_eq!(err.kind(), "quota-exceeded");
    }

    #[test]
    fn test_exhausted_maps_to_translation_failed() {
        let cause = TranslateError::Exhausted {
            attempts: 3,
            last: Box::new(TranslateError::Timeout { seconds: 10.0 }),
        };
        let err = Error::from_transport("ch2.xhtml#4", cause.clone());
        match err {
            Error::TranslationFailed { chunk_id, source } => {
                assert_eq!(chunk_id, "ch2.xhtml#4");
                assert_eq!(source, cause);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_names_chunk() {
        let err = Error::CheckpointConflict {
            chunk_id: "OEBPS/a.xhtml#7".into(),
        };
        assert!(err.to_string().contains("OEBPS/a.xhtml#7"));
    }
}
