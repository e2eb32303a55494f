//! Translation transport implementations

mod http_bridge;
pub mod mock;

pub use http_bridge::HttpBridgeTranslator;
pub use mock::MockTranslator;
