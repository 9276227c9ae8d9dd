//! State hook: tap_state

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::rc::{Rc, Weak};

use crate::error::{TapResult, raise};
use crate::fiber::FiberCore;
use crate::hooks::tap_slot;

struct StateSlot<T> {
	value: RefCell<T>,
	fiber: Weak<FiberCore>,
}

/// Setter for a value created by [`tap_state`].
///
/// The setter is stable: every render of the same fiber returns a setter that
/// compares equal to the previous one, so it can be used as a dependency.
///
/// Setting a value equal to the current one does nothing. Otherwise the value
/// is stored and, if the owning fiber is mounted, a re-render is scheduled.
///
/// # Errors
///
/// [`StateSetter::try_set`] and [`StateSetter::try_update`] fail with
/// - [`TapError::UpdateDuringRender`](crate::TapError::UpdateDuringRender)
///   while the owning fiber is rendering
/// - [`TapError::UpdateBeforeMount`](crate::TapError::UpdateBeforeMount)
///   before the owning fiber was ever committed
///
/// [`StateSetter::set`] and [`StateSetter::update`] raise the same errors.
pub struct StateSetter<T> {
	slot: Rc<StateSlot<T>>,
}

impl<T: PartialEq + 'static> StateSetter<T> {
	/// Replaces the value. Returns whether it changed.
	pub fn try_set(&self, value: T) -> TapResult<bool> {
		if *self.slot.value.borrow() == value {
			return Ok(false);
		}
		if let Some(fiber) = self.slot.fiber.upgrade() {
			fiber.ensure_updatable()?;
			*self.slot.value.borrow_mut() = value;
			fiber.schedule_if_mounted();
		} else {
			*self.slot.value.borrow_mut() = value;
		}
		Ok(true)
	}

	/// Derives the next value from the current one. Returns whether it changed.
	pub fn try_update<F>(&self, f: F) -> TapResult<bool>
	where
		F: FnOnce(&T) -> T,
	{
		let next = f(&self.slot.value.borrow());
		self.try_set(next)
	}

	/// Replaces the value, raising on misuse.
	pub fn set(&self, value: T) {
		if let Err(error) = self.try_set(value) {
			raise(error);
		}
	}

	/// Derives the next value from the current one, raising on misuse.
	pub fn update<F>(&self, f: F)
	where
		F: FnOnce(&T) -> T,
	{
		if let Err(error) = self.try_update(f) {
			raise(error);
		}
	}
}

impl<T: Clone> StateSetter<T> {
	/// The value currently stored, including updates not rendered yet.
	pub fn get(&self) -> T {
		self.slot.value.borrow().clone()
	}
}

impl<T> Clone for StateSetter<T> {
	fn clone(&self) -> Self {
		Self {
			slot: Rc::clone(&self.slot),
		}
	}
}

impl<T> PartialEq for StateSetter<T> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.slot, &other.slot)
	}
}

impl<T> Eq for StateSetter<T> {}

impl<T: fmt::Debug> fmt::Debug for StateSetter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StateSetter")
			.field("value", &self.slot.value.borrow())
			.finish()
	}
}

/// Declares a piece of state owned by the current fiber.
///
/// `initial` is only used on the first render; later renders return the
/// stored value.
///
/// # Example
///
/// ```
/// use tap_core::{resource, tap_state};
///
/// let counter = resource(|()| {
///     let (count, set_count) = tap_state(0);
///     (count, set_count)
/// });
/// # let _ = counter;
/// ```
pub fn tap_state<T>(initial: T) -> (T, StateSetter<T>)
where
	T: Clone + 'static,
{
	tap_state_with(move || initial)
}

/// Like [`tap_state`], computing the initial value lazily on first render.
pub fn tap_state_with<T, F>(init: F) -> (T, StateSetter<T>)
where
	T: Clone + 'static,
	F: FnOnce() -> T,
{
	let slot = tap_slot(|fiber| StateSlot {
		value: RefCell::new(init()),
		fiber: Rc::downgrade(fiber),
	});
	let value = slot.value.borrow().clone();
	(value, StateSetter { slot })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TapError;
	use crate::fiber::{commit_resource_fiber, create_resource_fiber, render_resource_fiber, unmount_resource_fiber};
	use crate::resource::resource;
	use core::cell::Cell;
	use rstest::rstest;

	type Counter = (i32, StateSetter<i32>);

	fn counter_fiber(
		rerenders: Rc<Cell<usize>>,
	) -> crate::fiber::ResourceFiber<(), Counter> {
		let r = resource(|()| tap_state(0));
		create_resource_fiber(r, move || rerenders.set(rerenders.get() + 1))
	}

	#[rstest]
	fn test_setter_is_stable_across_renders() {
		let fiber = counter_fiber(Rc::new(Cell::new(0)));
		let first = render_resource_fiber(&fiber, ()).unwrap();
		commit_resource_fiber(&fiber, &first).unwrap();
		let second = render_resource_fiber(&fiber, ()).unwrap();
		assert_eq!(first.output().1, second.output().1);
	}

	#[rstest]
	fn test_set_before_mount_is_rejected() {
		let fiber = counter_fiber(Rc::new(Cell::new(0)));
		let result = render_resource_fiber(&fiber, ()).unwrap();
		let (_, set_count) = result.output();
		assert!(matches!(set_count.try_set(1), Err(TapError::UpdateBeforeMount)));
	}

	#[rstest]
	fn test_set_schedules_rerender_when_value_changes() {
		let rerenders = Rc::new(Cell::new(0));
		let fiber = counter_fiber(Rc::clone(&rerenders));
		let result = render_resource_fiber(&fiber, ()).unwrap();
		commit_resource_fiber(&fiber, &result).unwrap();
		let (_, set_count) = result.output();

		assert!(set_count.try_set(1).unwrap());
		assert!(!set_count.try_set(1).unwrap());
		assert!(set_count.try_update(|n| n + 1).unwrap());
		assert_eq!(rerenders.get(), 2);

		let next = render_resource_fiber(&fiber, ()).unwrap();
		assert_eq!(next.output().0, 2);
	}

	#[rstest]
	fn test_set_after_unmount_stores_without_scheduling() {
		let rerenders = Rc::new(Cell::new(0));
		let fiber = counter_fiber(Rc::clone(&rerenders));
		let result = render_resource_fiber(&fiber, ()).unwrap();
		commit_resource_fiber(&fiber, &result).unwrap();
		unmount_resource_fiber(&fiber).unwrap();

		let (_, set_count) = result.output();
		assert!(set_count.try_set(5).unwrap());
		assert_eq!(set_count.get(), 5);
		assert_eq!(rerenders.get(), 0);
	}

	#[rstest]
	fn test_set_during_own_render_fails_the_render() {
		let r = resource(|()| {
			let (count, set_count) = tap_state(0);
			set_count.set(count + 1);
			count
		});
		let fiber = create_resource_fiber(r, || {});
		assert!(matches!(
			render_resource_fiber(&fiber, ()),
			Err(TapError::UpdateDuringRender)
		));
	}

	#[rstest]
	fn test_lazy_initializer_runs_once() {
		let calls = Rc::new(Cell::new(0));
		let r = resource({
			let calls = Rc::clone(&calls);
			move |()| {
				let calls = Rc::clone(&calls);
				tap_state_with(move || {
					calls.set(calls.get() + 1);
					"ready".to_string()
				})
				.0
			}
		});
		let fiber = create_resource_fiber(r, || {});
		for _ in 0..3 {
			let result = render_resource_fiber(&fiber, ()).unwrap();
			commit_resource_fiber(&fiber, &result).unwrap();
			assert_eq!(result.output(), "ready");
		}
		assert_eq!(calls.get(), 1);
	}

	#[rstest]
	#[should_panic(expected = "Hooks can only be called while a resource is rendering")]
	fn test_tap_state_outside_render_panics() {
		let _ = tap_state(1);
	}
}
