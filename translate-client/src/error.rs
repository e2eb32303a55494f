use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error("No translation within {seconds:.1}s")]
    Timeout { seconds: f64 },

    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("Translation quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Input of {len} characters exceeds the {max} character limit")]
    InputTooLong { len: usize, max: usize },

    #[error("Request rejected by service: {0}")]
    Rejected(String),

    #[error("Translation failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<TranslateError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TranslateError {
    /// Whether another attempt at the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transient(_))
    }

    /// Whether this error (or the cause it wraps) is a quota block.
    pub fn is_quota(&self) -> bool {
        match self {
            Self::QuotaExceeded(_) => true,
            Self::Exhausted { last, .. } => last.is_quota(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
