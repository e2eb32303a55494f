use async_trait::async_trait;

use crate::error::Result;

/// One unit of work for a translation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_lang: String,
    pub target_lang: String,
    pub text: String,
}

impl TranslationRequest {
    pub fn new(source_lang: &str, target_lang: &str, text: impl Into<String>) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            text: text.into(),
        }
    }

    /// Length in characters, which is what service input limits count.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Trait for translation transports
///
/// A single call is a single submission to the service. Retry, pacing and
/// timeouts are layered on top by [`crate::PacedTranslator`].
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate the request text, returning the translated text
    async fn translate(&self, request: &TranslationRequest) -> Result<String>;

    /// Get the transport name for display
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Box<T> {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        (**self).translate(request).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for std::sync::Arc<T> {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        (**self).translate(request).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
