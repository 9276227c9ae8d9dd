//! Runtime configuration.
//!
//! ## Example
//!
//! ```
//! use tap_core::RuntimeConfig;
//!
//! let config: RuntimeConfig = serde_json::from_str(r#"{ "max_flush_depth": 10 }"#).unwrap();
//! assert_eq!(config.max_flush_depth, 10);
//! ```

use serde::{Deserialize, Serialize};

/// Default ceiling for scheduler tasks run by a single flush.
pub const DEFAULT_MAX_FLUSH_DEPTH: usize = 50;

/// Settings shared by every root driven by one [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
	/// Maximum number of scheduler tasks a single flush may run before it
	/// fails with [`TapError::MaxUpdateDepthExceeded`](crate::TapError::MaxUpdateDepthExceeded).
	pub max_flush_depth: usize,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			max_flush_depth: DEFAULT_MAX_FLUSH_DEPTH,
		}
	}
}

impl RuntimeConfig {
	/// Returns a copy with a different flush ceiling. Zero is clamped to one.
	pub fn with_max_flush_depth(mut self, depth: usize) -> Self {
		self.max_flush_depth = depth.max(1);
		self
	}
}
