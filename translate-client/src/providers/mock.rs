//! Mock translation transport for testing
//!
//! Provides a configurable mock that can simulate failures, quota walls,
//! slow responses and successful translations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Result, TranslateError};
use crate::translator::{TranslationRequest, Translator};

/// What a successful call returns
#[derive(Debug, Clone)]
enum Reply {
    /// The request text, uppercased; keeps delimiters and layout intact
    Uppercase,
    /// A fixed string regardless of input
    Fixed(String),
}

/// A mock transport for testing retry, resume and abort behavior
pub struct MockTranslator {
    /// Number of leading calls that fail with `fail_with`
    fail_count: usize,
    /// Error returned for the leading failures
    fail_with: Option<TranslateError>,
    /// Errors for specific 0-based call numbers
    fail_on: HashMap<usize, TranslateError>,
    /// Error returned for every call from this 0-based call number on
    fail_from: Option<(usize, TranslateError)>,
    /// Simulated response latency
    delay: Option<Duration>,
    reply: Reply,
    call_count: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl MockTranslator {
    fn with_reply(reply: Reply) -> Self {
        Self {
            fail_count: 0,
            fail_with: None,
            fail_on: HashMap::new(),
            fail_from: None,
            delay: None,
            reply,
            call_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a transport that "translates" by uppercasing
    pub fn uppercase() -> Self {
        Self::with_reply(Reply::Uppercase)
    }

    /// Create a transport that always returns `response`
    pub fn always_succeeds(response: &str) -> Self {
        Self::with_reply(Reply::Fixed(response.to_string()))
    }

    /// Create a transport that fails `n` times with `error`, then uppercases
    pub fn fails_then_succeeds(n: usize, error: TranslateError) -> Self {
        Self {
            fail_count: n,
            fail_with: Some(error),
            ..Self::uppercase()
        }
    }

    /// Create a transport that always fails with `error`
    pub fn always_fails(error: TranslateError) -> Self {
        Self::fails_then_succeeds(usize::MAX, error)
    }

    /// Fail the given 0-based call with `error`
    pub fn fail_on_call(mut self, call: usize, error: TranslateError) -> Self {
        self.fail_on.insert(call, error);
        self
    }

    /// Fail every call from the given 0-based call number on
    pub fn fail_from_call(mut self, call: usize, error: TranslateError) -> Self {
        self.fail_from = Some((call, error));
        self
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times translate() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts received, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn scripted_failure(&self, call_num: usize) -> Option<TranslateError> {
        if call_num < self.fail_count {
            if let Some(err) = &self.fail_with {
                return Some(err.clone());
            }
        }
        if let Some(err) = self.fail_on.get(&call_num) {
            return Some(err.clone());
        }
        match &self.fail_from {
            Some((from, err)) if call_num >= *from => Some(err.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.text.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.scripted_failure(call_num) {
            return Err(err);
        }

        Ok(match &self.reply {
            Reply::Uppercase => request.text.to_uppercase(),
            Reply::Fixed(text) => text.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
