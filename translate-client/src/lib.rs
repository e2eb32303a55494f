//! Translation transport for the epub-translate workspace
//!
//! Provides a single capability, "translate this text", behind the
//! [`Translator`] trait, plus:
//! - [`PacedTranslator`]: retry, per-attempt timeout and inter-request cooldown
//! - [`HttpBridgeTranslator`]: talks to an external browser-automation bridge
//! - [`MockTranslator`]: scriptable transport for tests

pub mod config;
pub mod error;
pub mod paced;
pub mod translator;
pub mod providers;

pub use config::{HARD_INPUT_CEILING, TransportConfig};
pub use error::{Result, TranslateError};
pub use paced::PacedTranslator;
pub use providers::{HttpBridgeTranslator, MockTranslator};
pub use translator::{TranslationRequest, Translator};
