//! Execution context: which fiber the calling primitive belongs to.
//!
//! Rendering a fiber pushes it onto a thread-local stack for the duration of
//! the resource body. Nested renders (`tap_resource`, `tap_resources`) push on
//! top and pop when done, so primitives always resolve to the innermost fiber.

use core::cell::RefCell;

extern crate alloc;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::cell::EffectTask;
use crate::error::{TapError, raise};
use crate::fiber::FiberCore;

thread_local! {
	static FIBER_STACK: RefCell<Vec<Rc<FiberCore>>> = const { RefCell::new(Vec::new()) };
}

/// Returns the fiber currently rendering, raising [`TapError::NoActiveFiber`]
/// when called outside a render.
pub(crate) fn current_fiber() -> Rc<FiberCore> {
	FIBER_STACK
		.with(|stack| stack.borrow().last().cloned())
		.unwrap_or_else(|| raise(TapError::NoActiveFiber))
}

/// Whether any fiber is rendering on this thread.
pub fn is_rendering() -> bool {
	FIBER_STACK.with(|stack| !stack.borrow().is_empty())
}

/// Active render of one fiber. Dropping the scope (normally or while
/// unwinding) restores the previous fiber and deactivates the render.
pub(crate) struct RenderScope {
	fiber: Rc<FiberCore>,
}

impl RenderScope {
	pub(crate) fn enter(fiber: Rc<FiberCore>) -> Self {
		fiber.begin_render();
		FIBER_STACK.with(|stack| stack.borrow_mut().push(Rc::clone(&fiber)));
		Self { fiber }
	}

	/// Ends the render, returning the effects it scheduled.
	pub(crate) fn finish(self) -> Vec<EffectTask> {
		self.fiber.check_consumed_all_cells();
		self.fiber.take_render_tasks()
	}
}

impl Drop for RenderScope {
	fn drop(&mut self) {
		FIBER_STACK.with(|stack| {
			stack.borrow_mut().pop();
		});
		self.fiber.end_render();
	}
}
