//! Error types for the tap runtime.
//!
//! Every failure the runtime can report is a [`TapError`]. Operations that
//! drive a render or a flush return [`TapResult`].
//!
//! ## Boundaries
//!
//! Primitives called from inside a resource body (`tap_state`, `tap_effect`, ...)
//! have no `Result` channel back to the caller. When one of them detects a
//! violation it *raises* the error: the stack unwinds with the [`TapError`]
//! as payload until the nearest render, commit or unmount boundary, which
//! converts it back into an `Err`. Nested fibers use the same path, so an
//! error raised three resources deep surfaces from the root's
//! `render_resource_fiber` call.
//!
//! Raising outside of any boundary is a plain panic carrying the error
//! message. Foreign panics are never converted; they keep unwinding.

use core::cell::Cell;
use core::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Kind of slot a fiber cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
	/// A state slot (`tap_state`, `tap_memo`, `tap_ref`, ...).
	State,
	/// An effect slot (`tap_effect`, `tap_effect_with_deps`).
	Effect,
}

impl fmt::Display for CellKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::State => f.write_str("state"),
			Self::Effect => f.write_str("effect"),
		}
	}
}

/// Errors raised by the tap runtime.
#[derive(Debug, Error)]
pub enum TapError {
	/// A state setter was called while its own fiber was rendering.
	#[error("Resource updated during render")]
	UpdateDuringRender,

	/// A state setter was called before its fiber was ever committed.
	#[error("Resource updated before mount")]
	UpdateBeforeMount,

	/// A render consumed more cells than the previous render recorded.
	#[error(
		"Rendered more hooks than during the previous render (hook #{index}, {recorded} recorded). \
		 Hooks must be called in the exact same order in every render."
	)]
	RenderedMoreHooks {
		/// Cursor position of the offending call.
		index: usize,
		/// Number of cells recorded by earlier renders.
		recorded: usize,
	},

	/// A render finished having consumed fewer cells than previously recorded.
	#[error(
		"Rendered fewer hooks than during the previous render ({consumed} of {recorded}). \
		 Hooks must be called in the exact same order in every render."
	)]
	RenderedFewerHooks {
		/// Number of cells consumed by this render.
		consumed: usize,
		/// Number of cells recorded by earlier renders.
		recorded: usize,
	},

	/// The cell at `index` does not match the primitive requesting it.
	#[error("Hook order changed between renders: hook #{index} is not a {expected} hook")]
	HookOrderChanged {
		/// Cursor position of the offending call.
		index: usize,
		/// Kind the calling primitive expected.
		expected: CellKind,
	},

	/// A primitive was called outside of any resource render.
	#[error("Hooks can only be called while a resource is rendering")]
	NoActiveFiber,

	/// A flush ran more scheduler tasks than the configured ceiling.
	#[error(
		"Maximum update depth exceeded ({limit} updates in one flush). This can happen when a \
		 resource repeatedly calls setState inside tapEffect."
	)]
	MaxUpdateDepthExceeded {
		/// The ceiling that was exceeded.
		limit: usize,
	},

	/// Several scheduler tasks failed during one flush.
	#[error("{} errors occurred during flush: {}", .0.len(), join_messages(.0))]
	Aggregate(Vec<TapError>),

	/// A fiber was rendered or committed after it was unmounted.
	#[error("Resource fiber has been unmounted")]
	FiberUnmounted,

	/// A resource handle was used after `unmount()`.
	#[error("Resource handle has been unmounted")]
	HandleUnmounted,
}

fn join_messages(errors: &[TapError]) -> String {
	errors
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("; ")
}

impl TapError {
	/// Flattens an error into the list of individual failures it carries.
	pub fn into_errors(self) -> Vec<TapError> {
		match self {
			Self::Aggregate(errors) => errors.into_iter().flat_map(Self::into_errors).collect(),
			other => vec![other],
		}
	}
}

/// Result type alias for tap operations.
pub type TapResult<T> = Result<T, TapError>;

thread_local! {
	static BOUNDARY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct BoundaryGuard;

impl BoundaryGuard {
	fn enter() -> Self {
		BOUNDARY_DEPTH.with(|depth| depth.set(depth.get() + 1));
		Self
	}
}

impl Drop for BoundaryGuard {
	fn drop(&mut self) {
		BOUNDARY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
	}
}

/// Raises `error` towards the nearest boundary.
pub(crate) fn raise(error: TapError) -> ! {
	if BOUNDARY_DEPTH.with(Cell::get) > 0 {
		panic::resume_unwind(Box::new(error));
	}
	panic!("{error}");
}

/// Runs `f`, converting a raised [`TapError`] back into `Err`.
pub(crate) fn boundary<T>(f: impl FnOnce() -> T) -> TapResult<T> {
	let _guard = BoundaryGuard::enter();
	match panic::catch_unwind(AssertUnwindSafe(f)) {
		Ok(value) => Ok(value),
		Err(payload) => match payload.downcast::<TapError>() {
			Ok(error) => Err(*error),
			Err(payload) => panic::resume_unwind(payload),
		},
	}
}

/// Folds the errors of a loop that keeps going after failures: none is
/// `Ok`, one is returned as is, more become [`TapError::Aggregate`].
pub(crate) fn collect_errors(mut errors: Vec<TapError>) -> TapResult<()> {
	match errors.len() {
		0 => Ok(()),
		1 => Err(errors.remove(0)),
		_ => Err(TapError::Aggregate(errors)),
	}
}

/// Unwraps a runtime result, raising the error to the enclosing boundary.
pub(crate) trait OrRaise<T> {
	fn or_raise(self) -> T;
}

impl<T> OrRaise<T> for TapResult<T> {
	fn or_raise(self) -> T {
		self.unwrap_or_else(|error| raise(error))
	}
}
