//! Ref hook: tap_ref

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::rc::Rc;

use crate::hooks::tap_slot;

/// A mutable box owned by a fiber.
///
/// Writing to a ref never schedules a re-render.
pub struct RefHandle<T> {
	value: Rc<RefCell<T>>,
}

impl<T> RefHandle<T> {
	/// Replaces the stored value.
	pub fn set_current(&self, value: T) {
		*self.value.borrow_mut() = value;
	}

	/// Replaces the stored value, returning the previous one.
	pub fn replace(&self, value: T) -> T {
		self.value.replace(value)
	}

	/// Reads the stored value.
	pub fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
		f(&self.value.borrow())
	}

	/// Mutates the stored value in place.
	pub fn with_mut<O>(&self, f: impl FnOnce(&mut T) -> O) -> O {
		f(&mut self.value.borrow_mut())
	}

	pub(crate) fn into_shared(self) -> Rc<RefCell<T>> {
		self.value
	}
}

impl<T: Clone> RefHandle<T> {
	/// A copy of the stored value.
	pub fn current(&self) -> T {
		self.value.borrow().clone()
	}
}

impl<T> Clone for RefHandle<T> {
	fn clone(&self) -> Self {
		Self {
			value: Rc::clone(&self.value),
		}
	}
}

impl<T> PartialEq for RefHandle<T> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.value, &other.value)
	}
}

impl<T> Eq for RefHandle<T> {}

impl<T: fmt::Debug> fmt::Debug for RefHandle<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("RefHandle").field(&self.value.borrow()).finish()
	}
}

/// Declares a ref holding `initial` on first render.
pub fn tap_ref<T: 'static>(initial: T) -> RefHandle<T> {
	let value = tap_slot(|_| RefCell::new(initial));
	RefHandle { value }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fiber::{commit_resource_fiber, create_resource_fiber, render_resource_fiber};
	use crate::resource::resource;
	use rstest::rstest;

	#[rstest]
	fn test_ref_survives_renders_without_rerender() {
		let r = resource(|()| {
			let renders = tap_ref(0_u32);
			renders.with_mut(|n| *n += 1);
			renders
		});
		let rerenders = Rc::new(core::cell::Cell::new(0));
		let fiber = create_resource_fiber(r, {
			let rerenders = Rc::clone(&rerenders);
			move || rerenders.set(rerenders.get() + 1)
		});

		let mut last = None;
		for _ in 0..3 {
			let result = render_resource_fiber(&fiber, ()).unwrap();
			commit_resource_fiber(&fiber, &result).unwrap();
			last = Some(result.into_output());
		}
		let handle = last.unwrap();
		assert_eq!(handle.current(), 3);
		handle.set_current(10);
		assert_eq!(handle.replace(11), 10);
		assert_eq!(rerenders.get(), 0);
	}
}
