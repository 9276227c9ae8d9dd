//! Bridge into a host framework's own render cycle.
//!
//! A host that has its own notion of "render" and "layout effect" drives a
//! resource through a [`HostAdapter`]:
//!
//! 1. call [`HostAdapter::render`] during every host render,
//! 2. call [`HostAdapter::commit`] from the host's commit/layout effect,
//! 3. call [`HostAdapter::teardown`] when the host component goes away.
//!
//! State changes inside the resource call the `rerender` callback given to
//! [`HostAdapter::new`], which should schedule a host render.

use core::cell::RefCell;
use core::fmt;

extern crate alloc;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::error::TapResult;
use crate::fiber::{
	RenderResult, ResourceFiber, commit_resource_fiber, create_resource_fiber,
	render_resource_fiber, unmount_resource_fiber,
};
use crate::resource::Element;

/// Drives one resource from a host framework.
pub struct HostAdapter<P, R> {
	rerender: Rc<dyn Fn()>,
	fiber: RefCell<Option<ResourceFiber<P, R>>>,
	retired: RefCell<Vec<ResourceFiber<P, R>>>,
	pending: RefCell<Option<RenderResult<P, R>>>,
}

impl<P, R> HostAdapter<P, R>
where
	P: Clone + 'static,
	R: Clone + 'static,
{
	/// Creates an adapter. `rerender` asks the host to render again.
	pub fn new<F>(rerender: F) -> Self
	where
		F: Fn() + 'static,
	{
		Self {
			rerender: Rc::new(rerender),
			fiber: RefCell::new(None),
			retired: RefCell::new(Vec::new()),
			pending: RefCell::new(None),
		}
	}

	/// Renders `element` and returns its output. Nothing is committed.
	///
	/// A new fiber replaces the current one when the element's resource
	/// identity differs; the old fiber is unmounted by the next commit.
	pub fn render(&self, element: Element<P, R>) -> TapResult<R> {
		let (resource, props) = element.into_parts();

		let fiber = {
			let mut current = self.fiber.borrow_mut();
			match current.as_ref() {
				Some(fiber) if fiber.resource().id() == resource.id() => fiber.clone(),
				_ => {
					let rerender = Rc::clone(&self.rerender);
					let fiber = create_resource_fiber(resource, move || rerender());
					if let Some(previous) = current.replace(fiber.clone()) {
						self.retired.borrow_mut().push(previous);
					}
					fiber
				}
			}
		};

		let result = render_resource_fiber(&fiber, props)?;
		let output = result.output().clone();
		*self.pending.borrow_mut() = Some(result);
		Ok(output)
	}

	/// Commits the last render, unmounting replaced fibers first.
	pub fn commit(&self) -> TapResult<()> {
		self.unmount_retired()?;

		let pending = self.pending.borrow_mut().take();
		let fiber = self.fiber.borrow().clone();
		match (fiber, pending) {
			(Some(fiber), Some(result)) => commit_resource_fiber(&fiber, &result),
			_ => Ok(()),
		}
	}

	/// Unmounts every fiber this adapter created.
	pub fn teardown(&self) -> TapResult<()> {
		self.pending.borrow_mut().take();
		self.unmount_retired()?;
		match self.fiber.borrow_mut().take() {
			Some(fiber) => unmount_resource_fiber(&fiber),
			None => Ok(()),
		}
	}

	/// Whether the current fiber is mounted.
	pub fn is_mounted(&self) -> bool {
		self.fiber
			.borrow()
			.as_ref()
			.is_some_and(ResourceFiber::is_mounted)
	}

	fn unmount_retired(&self) -> TapResult<()> {
		let retired = core::mem::take(&mut *self.retired.borrow_mut());
		for fiber in retired {
			unmount_resource_fiber(&fiber)?;
		}
		Ok(())
	}
}

impl<P, R> fmt::Debug for HostAdapter<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HostAdapter")
			.field("fiber", &self.fiber.borrow().as_ref().map(ResourceFiber::id))
			.field("retired", &self.retired.borrow().len())
			.field("has_pending", &self.pending.borrow().is_some())
			.finish()
	}
}
