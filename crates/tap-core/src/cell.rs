//! Cell storage.
//!
//! A fiber keeps its cells in a positional arena: a `Vec<FiberCell>` indexed by
//! a cursor that is reset at the start of every render and advanced by every
//! primitive call. A cell is never looked up by anything but its position.

use core::any::Any;
use core::fmt;

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::Rc;

use crate::error::CellKind;

/// A dependency list.
///
/// Any `PartialEq + 'static` value works: tuples, vectors, ids. Two lists are
/// equal when they have the same type and compare equal.
pub trait Deps: Any {
	/// Compares against a type-erased dependency list.
	fn deps_eq(&self, other: &dyn Deps) -> bool;

	/// Upcast used for comparisons.
	fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> Deps for T {
	fn deps_eq(&self, other: &dyn Deps) -> bool {
		other
			.as_any()
			.downcast_ref::<T>()
			.is_some_and(|other| other == self)
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

/// Returns whether an effect guarded by `next` must run again.
///
/// A missing list on either side always counts as a change.
pub(crate) fn deps_changed(prev: Option<&dyn Deps>, next: Option<&dyn Deps>) -> bool {
	match (prev, next) {
		(Some(prev), Some(next)) => !prev.deps_eq(next),
		_ => true,
	}
}

/// Cleanup returned by an effect body.
#[derive(Default)]
pub struct Cleanup(Option<Box<dyn FnOnce()>>);

impl Cleanup {
	/// Wraps a cleanup closure.
	pub fn new<F>(f: F) -> Self
	where
		F: FnOnce() + 'static,
	{
		Self(Some(Box::new(f)))
	}

	/// No cleanup.
	pub fn none() -> Self {
		Self(None)
	}

	/// Whether there is something to run.
	pub fn is_some(&self) -> bool {
		self.0.is_some()
	}

	pub(crate) fn run(self) {
		if let Some(f) = self.0 {
			f();
		}
	}
}

impl fmt::Debug for Cleanup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Cleanup").field(&self.is_some()).finish()
	}
}

/// Values an effect body may return.
///
/// ```
/// use tap_core::{Cleanup, IntoCleanup};
///
/// assert!(!().into_cleanup().is_some());
/// assert!(Cleanup::new(|| {}).into_cleanup().is_some());
/// assert!(Some(|| {}).into_cleanup().is_some());
/// ```
pub trait IntoCleanup {
	/// Converts the effect's return value into a cleanup.
	fn into_cleanup(self) -> Cleanup;
}

impl IntoCleanup for () {
	fn into_cleanup(self) -> Cleanup {
		Cleanup::none()
	}
}

impl IntoCleanup for Cleanup {
	fn into_cleanup(self) -> Cleanup {
		self
	}
}

impl<F> IntoCleanup for Option<F>
where
	F: FnOnce() + 'static,
{
	fn into_cleanup(self) -> Cleanup {
		match self {
			Some(f) => Cleanup::new(f),
			None => Cleanup::none(),
		}
	}
}

/// Result of the last committed run of an effect.
#[derive(Default)]
pub(crate) struct EffectCell {
	pub(crate) mounted: bool,
	pub(crate) cleanup: Option<Cleanup>,
	pub(crate) deps: Option<Box<dyn Deps>>,
}

/// One ordered slot of a fiber.
pub(crate) enum FiberCell {
	/// Typed state owned by a primitive; the concrete type is known to the
	/// primitive that allocated it.
	State(Rc<dyn Any>),
	Effect(EffectCell),
}

impl FiberCell {
	pub(crate) fn kind(&self) -> CellKind {
		match self {
			Self::State(_) => CellKind::State,
			Self::Effect(_) => CellKind::Effect,
		}
	}
}

/// An effect waiting for commit.
pub(crate) struct EffectTask {
	pub(crate) cell_index: usize,
	pub(crate) deps: Option<Box<dyn Deps>>,
	pub(crate) run: Box<dyn FnOnce() -> Cleanup>,
}
