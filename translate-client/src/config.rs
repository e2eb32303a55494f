use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TranslateError};

/// Input ceiling imposed by the web translator; `max_input_length` may not exceed it.
pub const HARD_INPUT_CEILING: usize = 5000;

/// Transport settings: retry, pacing and the bridge endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Attempts per request before giving up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// How long a single attempt may wait for the translated text
    #[serde(default = "default_base_timeout_seconds")]
    pub base_timeout_seconds: f64,

    /// Largest text (in characters) accepted per request
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Mandatory pause between any two submissions
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Base delay before a retry; doubled on each further attempt
    #[serde(default = "default_retry_backoff_seconds")]
    pub retry_backoff_seconds: f64,

    /// Boilerplate the service appends to results, removed before returning
    #[serde(default = "default_strip_phrases")]
    pub strip_phrases: Vec<String>,

    /// Endpoint of the browser-automation bridge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_url: Option<String>,

    /// Response fragments that mean the service is refusing further work
    #[serde(default = "default_quota_markers")]
    pub quota_markers: Vec<String>,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_base_timeout_seconds() -> f64 {
    10.0
}

fn default_max_input_length() -> usize {
    4950
}

fn default_cooldown_seconds() -> f64 {
    1.5
}

fn default_retry_backoff_seconds() -> f64 {
    3.0
}

fn default_strip_phrases() -> Vec<String> {
    vec!["Translated with DeepL.com (free version)".to_string()]
}

fn default_quota_markers() -> Vec<String> {
    vec![
        "usage limit".to_string(),
        "notification-many-translations-block".to_string(),
    ]
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            base_timeout_seconds: default_base_timeout_seconds(),
            max_input_length: default_max_input_length(),
            cooldown_seconds: default_cooldown_seconds(),
            retry_backoff_seconds: default_retry_backoff_seconds(),
            strip_phrases: default_strip_phrases(),
            bridge_url: None,
            quota_markers: default_quota_markers(),
        }
    }
}

impl TransportConfig {
    /// Check the values are usable before any request is made
    pub fn validate(&self) -> Result<()> {
        if self.retry_attempts == 0 {
            return Err(TranslateError::Config(
                "retry_attempts must be at least 1".into(),
            ));
        }
        if self.max_input_length == 0 || self.max_input_length > HARD_INPUT_CEILING {
            return Err(TranslateError::Config(format!(
                "max_input_length must be between 1 and {}, got {}",
                HARD_INPUT_CEILING, self.max_input_length
            )));
        }
        for (name, value) in [
            ("base_timeout_seconds", self.base_timeout_seconds),
            ("cooldown_seconds", self.cooldown_seconds),
            ("retry_backoff_seconds", self.retry_backoff_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TranslateError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.base_timeout_seconds == 0.0 {
            return Err(TranslateError::Config(
                "base_timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.base_timeout_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_seconds)
    }

    /// Delay before retry number `attempt` (1-based count of failed attempts).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.saturating_sub(1).min(6) as i32);
        Duration::from_secs_f64(self.retry_backoff_seconds * factor)
    }
}
