//! Memoization hooks: tap_memo and tap_callback

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::Rc;

use crate::cell::Deps;
use crate::hooks::tap_slot;

struct MemoSlot<T> {
	entry: RefCell<Option<(Box<dyn Deps>, T)>>,
}

/// Returns the value computed by `compute`, recomputing only when `deps`
/// differ from the deps of the last computation.
///
/// # Example
///
/// ```
/// use tap_core::{resource, tap_memo};
///
/// let stats = resource(|values: Vec<u32>| {
///     let values_for_sum = values.clone();
///     tap_memo(values, move || values_for_sum.iter().sum::<u32>())
/// });
/// # let _ = stats;
/// ```
pub fn tap_memo<T, D, F>(deps: D, compute: F) -> T
where
	T: Clone + 'static,
	D: PartialEq + 'static,
	F: FnOnce() -> T,
{
	let slot = tap_slot(|_| MemoSlot::<T> {
		entry: RefCell::new(None),
	});

	let cached = match slot.entry.borrow().as_ref() {
		Some((prev, value)) if prev.deps_eq(&deps) => Some(value.clone()),
		_ => None,
	};
	if let Some(value) = cached {
		return value;
	}

	let value = compute();
	*slot.entry.borrow_mut() = Some((Box::new(deps), value.clone()));
	value
}

/// A shared, cheaply clonable function.
///
/// Two callbacks compare equal only when they are clones of each other.
pub struct Callback<A, O = ()> {
	f: Rc<dyn Fn(A) -> O>,
}

impl<A, O> Callback<A, O> {
	/// Wraps a function.
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(A) -> O + 'static,
	{
		Self { f: Rc::new(f) }
	}

	/// Calls the function.
	pub fn call(&self, args: A) -> O {
		(self.f)(args)
	}
}

impl<A, O> Clone for Callback<A, O> {
	fn clone(&self) -> Self {
		Self {
			f: Rc::clone(&self.f),
		}
	}
}

impl<A, O> PartialEq for Callback<A, O> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.f, &other.f)
	}
}

impl<A, O> Eq for Callback<A, O> {}

impl<A, O> fmt::Debug for Callback<A, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callback").finish_non_exhaustive()
	}
}

/// Returns a [`Callback`] that keeps its identity while `deps` are unchanged.
pub fn tap_callback<A, O, D, F>(deps: D, f: F) -> Callback<A, O>
where
	A: 'static,
	O: 'static,
	D: PartialEq + 'static,
	F: Fn(A) -> O + 'static,
{
	tap_memo(deps, move || Callback::new(f))
}
