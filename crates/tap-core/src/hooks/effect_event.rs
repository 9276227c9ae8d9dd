//! Effect event hook: tap_effect_event

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::rc::Rc;

use crate::hooks::{tap_effect, tap_ref};

/// A stable function that always calls the closure from the latest commit.
///
/// The wrapper keeps its identity for the whole life of the fiber, so it can
/// be captured by long-lived effects without listing it as a dependency.
pub struct EffectEvent<A, O = ()> {
	latest: Rc<RefCell<Rc<dyn Fn(A) -> O>>>,
}

impl<A, O> EffectEvent<A, O> {
	/// Calls the latest committed closure.
	pub fn call(&self, args: A) -> O {
		let f = Rc::clone(&self.latest.borrow());
		f(args)
	}
}

impl<A, O> Clone for EffectEvent<A, O> {
	fn clone(&self) -> Self {
		Self {
			latest: Rc::clone(&self.latest),
		}
	}
}

impl<A, O> PartialEq for EffectEvent<A, O> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.latest, &other.latest)
	}
}

impl<A, O> Eq for EffectEvent<A, O> {}

impl<A, O> fmt::Debug for EffectEvent<A, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EffectEvent").finish_non_exhaustive()
	}
}

/// Wraps `f` in a stable [`EffectEvent`].
///
/// The closure installed by a render becomes visible once that render is
/// committed.
///
/// # Example
///
/// ```
/// use tap_core::{resource, tap_effect_event, tap_effect_with_deps};
///
/// let ticker = resource(|label: String| {
///     let on_tick = tap_effect_event(move |n: u32| println!("{label}: {n}"));
///     tap_effect_with_deps((), move || on_tick.call(1));
/// });
/// # let _ = ticker;
/// ```
pub fn tap_effect_event<A, O, F>(f: F) -> EffectEvent<A, O>
where
	A: 'static,
	O: 'static,
	F: Fn(A) -> O + 'static,
{
	let f: Rc<dyn Fn(A) -> O> = Rc::new(f);
	let cell = tap_ref(Rc::clone(&f)).into_shared();
	tap_effect({
		let cell = Rc::clone(&cell);
		move || {
			*cell.borrow_mut() = f;
		}
	});
	EffectEvent { latest: cell }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fiber::{commit_resource_fiber, create_resource_fiber, render_resource_fiber};
	use crate::resource::resource;
	use rstest::rstest;

	#[rstest]
	fn test_effect_event_is_stable_and_calls_latest() {
		let r = resource(|offset: i32| tap_effect_event(move |n: i32| n + offset));
		let fiber = create_resource_fiber(r, || {});

		let first = render_resource_fiber(&fiber, 1).unwrap();
		commit_resource_fiber(&fiber, &first).unwrap();
		let event = first.output().clone();
		assert_eq!(event.call(1), 2);

		let second = render_resource_fiber(&fiber, 100).unwrap();
		assert_eq!(*second.output(), event);
		assert_eq!(event.call(1), 2);

		commit_resource_fiber(&fiber, &second).unwrap();
		assert_eq!(event.call(1), 101);
	}
}
