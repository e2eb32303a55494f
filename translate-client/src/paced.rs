//! Retry, timeout and pacing around a raw [`Translator`].
//!
//! The web translator is driven as if one person were using it, so requests
//! are strictly sequential and separated by a cooldown, including retries.

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, sleep_until, timeout};

use crate::config::TransportConfig;
use crate::error::{Result, TranslateError};
use crate::translator::{TranslationRequest, Translator};

/// Wraps a transport with retry/backoff, per-attempt timeout and cooldown
pub struct PacedTranslator<T> {
    inner: T,
    config: TransportConfig,
    /// When the previous submission finished. Holding this lock for the
    /// whole request also keeps submissions one at a time.
    last_finished: Mutex<Option<Instant>>,
}

impl<T: Translator> PacedTranslator<T> {
    /// Create a paced transport; fails if the config is unusable
    pub fn new(inner: T, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner,
            config,
            last_finished: Mutex::new(None),
        })
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn max_input_length(&self) -> usize {
        self.config.max_input_length
    }

    /// Translate `text` from `source_lang` to `target_lang`
    pub async fn translate_text(
        &self,
        source_lang: &str,
        target_lang: &str,
        text: &str,
    ) -> Result<String> {
        self.translate(&TranslationRequest::new(source_lang, target_lang, text))
            .await
    }

    async fn attempt(&self, request: &TranslationRequest) -> Result<String> {
        let limit = self.config.attempt_timeout();
        let reply = match timeout(limit, self.inner.translate(request)).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(TranslateError::Timeout {
                    seconds: limit.as_secs_f64(),
                });
            }
        };

        let cleaned = self.strip_boilerplate(&reply);
        if cleaned.is_empty() {
            return Err(TranslateError::Transient(
                "service returned an empty translation".into(),
            ));
        }
        Ok(cleaned)
    }

    fn strip_boilerplate(&self, text: &str) -> String {
        let mut cleaned = text.to_string();
        for phrase in &self.config.strip_phrases {
            if !phrase.is_empty() {
                cleaned = cleaned.replace(phrase.as_str(), "");
            }
        }
        cleaned.trim().to_string()
    }
}

#[async_trait]
impl<T: Translator> Translator for PacedTranslator<T> {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let len = request.char_len();
        let max = self.config.max_input_length;
        if len > max {
            return Err(TranslateError::InputTooLong { len, max });
        }
        if request.text.trim().is_empty() {
            return Ok(String::new());
        }

        let mut last_finished = self.last_finished.lock().await;
        let attempts = self.config.retry_attempts;
        let mut last_error = None;

        for attempt in 1..=attempts {
            if let Some(finished) = *last_finished {
                sleep_until(finished + self.config.cooldown()).await;
            }

            debug!(
                "Submitting {} chars to {} (attempt {}/{})",
                len,
                self.inner.name(),
                attempt,
                attempts
            );
            let outcome = self.attempt(request).await;
            *last_finished = Some(Instant::now());

            match outcome {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => {
                    warn!("Translation attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        let delay = self.config.backoff(attempt);
                        debug!("Retrying in {:.1}s", delay.as_secs_f64());
                        sleep(delay).await;
                    }
                }
                Err(e) => {
                    if e.is_quota() {
                        error!("{} reports the quota is exhausted: {}", self.inner.name(), e);
                    } else {
                        warn!("Translation attempt {}/{} rejected: {}", attempt, attempts, e);
                    }
                    return Err(e);
                }
            }
        }

        error!("All {} translation attempts failed", attempts);
        Err(TranslateError::Exhausted {
            attempts,
            last: Box::new(
                last_error
                    .unwrap_or_else(|| TranslateError::Transient("no attempt was made".into())),
            ),
        })
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
