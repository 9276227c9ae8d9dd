//! # tap-core
//!
//! A host-independent incremental-computation runtime: ordered state cells,
//! effects scheduled at commit, memoization and composable nested resources
//! with automatic lifecycle management and batched re-evaluation.
//!
//! ## Concepts
//!
//! - **Resource**: a function `P -> R` with an identity ([`resource`]).
//! - **Element**: a resource paired with props ([`Resource::element`]).
//! - **Fiber**: the durable instance behind an element. It owns the cells
//!   the resource body's primitives read and write, in call order.
//! - **Render / commit**: rendering runs the body and records effects;
//!   committing runs the effects whose dependencies changed.
//! - **Runtime**: the queue that batches re-renders of dirty roots into one
//!   pass, drained by the host through [`Runtime::drain`].
//!
//! ## Quick Start
//!
//! ```
//! use tap_core::{CreateOptions, Runtime, create_resource, resource, tap_state};
//!
//! let runtime = Runtime::new();
//! let counter = resource(|start: i32| tap_state(start));
//!
//! let handle = create_resource(&runtime, counter.element(1), CreateOptions::default()).unwrap();
//! let (count, set_count) = handle.get_state();
//! assert_eq!(count, 1);
//!
//! set_count.set(2);
//! set_count.set(3);
//! runtime.drain().unwrap();
//! assert_eq!(handle.get_state().0, 3);
//! ```
//!
//! ## Logging
//!
//! The runtime emits [`tracing`] events: `trace` for fiber render, commit and
//! unmount, `debug` for flushes and scheduling, `warn` for updates ignored
//! after shutdown and `error` for panicking subscribers. No subscriber is
//! installed by this crate.

pub mod cell;
pub mod config;
pub mod context;
pub mod error;
mod execution;
pub mod fiber;
pub mod handle;
pub mod hooks;
pub mod host;
pub mod resource;
pub mod scheduler;

pub use cell::{Cleanup, Deps, IntoCleanup};
pub use config::{DEFAULT_MAX_FLUSH_DEPTH, RuntimeConfig};
pub use context::{Context, create_context, tap_context, with_context_provider};
pub use error::{CellKind, TapError, TapResult};
pub use execution::is_rendering;
pub use fiber::{
	FiberCore, FiberId, RenderResult, ResourceFiber, Revision, commit_resource_fiber,
	create_resource_fiber, render_resource_fiber, unmount_resource_fiber,
};
pub use handle::{CreateOptions, ResourceHandle, Subscription, create_resource};
pub use hooks::{
	Callback, EffectEvent, RefHandle, StateSetter, tap_callback, tap_effect, tap_effect_event,
	tap_effect_with_deps, tap_inline_resource, tap_memo, tap_ref, tap_resource,
	tap_resource_with_deps, tap_resources, tap_state, tap_state_with,
};
pub use host::HostAdapter;
pub use resource::{Element, Resource, ResourceId, resource};
pub use scheduler::{Runtime, RuntimeBuilder, SchedulerId, UpdateScheduler, WeakScheduler};
