//! # tap
//!
//! A resource/fiber runtime: ordered state cells, effects scheduled at
//! commit, memoization and composable resources with automatic lifecycle
//! management and batched re-evaluation.
//!
//! This crate re-exports [`tap_core`]. Enable the `test` feature to get the
//! test kit under `tap::test`.
//!
//! ## Quick Example
//!
//! ```rust
//! use tap::prelude::*;
//!
//! let runtime = Runtime::new();
//! let greeting = resource(|name: String| format!("hello {name}"));
//!
//! let handle = create_resource(&runtime, greeting.element("ada".into()), CreateOptions::default())?;
//! assert_eq!(handle.get_state(), "hello ada");
//! # Ok::<(), tap::TapError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `test` - re-exports `tap-test` as `tap::test`
//! - `full` - all features enabled

pub use tap_core::*;

#[cfg(feature = "test")]
pub use tap_test as test;

/// Prelude module for convenient imports
///
/// Import everything needed to write and drive resources:
///
/// ```rust
/// use tap::prelude::*;
/// ```
pub mod prelude {
	pub use tap_core::{
		Callback, Cleanup, Context, CreateOptions, EffectEvent, Element, RefHandle, Resource,
		ResourceHandle, Runtime, RuntimeConfig, StateSetter, TapError, TapResult, create_context,
		create_resource, resource, tap_callback, tap_context, tap_effect, tap_effect_event,
		tap_effect_with_deps, tap_inline_resource, tap_memo, tap_ref, tap_resource,
		tap_resource_with_deps, tap_resources, tap_state, tap_state_with, with_context_provider,
	};
}
