//! Test fibers with render-and-commit helpers.
//!
//! A [`TestResource`] owns one fiber and plays the role of its host: it
//! counts re-render requests instead of scheduling them, so tests decide
//! when the next render happens.
//!
//! Every test resource is registered on a thread-local list until it is
//! unmounted; [`cleanup_all_resources`] unmounts whatever is left, which
//! makes cleanup-order assertions independent of drop order.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tap_core::{
	RenderResult, ResourceFiber, TapError, TapResult, commit_resource_fiber, create_resource_fiber,
	render_resource_fiber, resource, unmount_resource_fiber,
};

thread_local! {
	static ACTIVE: RefCell<Vec<(tap_core::FiberId, Box<dyn Fn() -> TapResult<()>>)>> =
		const { RefCell::new(Vec::new()) };
}

/// A fiber driven by a test.
pub struct TestResource<P, R> {
	fiber: ResourceFiber<P, R>,
	last_props: RefCell<Option<P>>,
	rerender_requests: Rc<Cell<usize>>,
}

/// Creates a test resource for `body`.
pub fn create_test_resource<P, R, F>(body: F) -> TestResource<P, R>
where
	P: Clone + 'static,
	R: 'static,
	F: Fn(P) -> R + 'static,
{
	TestResource::new(body)
}

impl<P, R> TestResource<P, R>
where
	P: Clone + 'static,
	R: 'static,
{
	/// Creates a test resource for `body`.
	pub fn new<F>(body: F) -> Self
	where
		F: Fn(P) -> R + 'static,
	{
		let rerender_requests = Rc::new(Cell::new(0));
		let fiber = create_resource_fiber(resource(body), {
			let rerender_requests = Rc::clone(&rerender_requests);
			move || rerender_requests.set(rerender_requests.get() + 1)
		});

		let registered = fiber.clone();
		let unmount: Box<dyn Fn() -> TapResult<()>> = Box::new(move || unmount_resource_fiber(&registered));
		ACTIVE.with(|active| active.borrow_mut().push((fiber.id(), unmount)));

		Self {
			fiber,
			last_props: RefCell::new(None),
			rerender_requests,
		}
	}

	/// Renders without committing.
	pub fn render_only(&self, props: P) -> TapResult<RenderResult<P, R>> {
		*self.last_props.borrow_mut() = Some(props.clone());
		render_resource_fiber(&self.fiber, props)
	}

	/// Commits a result produced by [`TestResource::render_only`].
	pub fn commit(&self, result: &RenderResult<P, R>) -> TapResult<()> {
		commit_resource_fiber(&self.fiber, result)
	}

	/// Unmounts the fiber.
	pub fn unmount(&self) -> TapResult<()> {
		let id = self.fiber.id();
		ACTIVE.with(|active| active.borrow_mut().retain(|(active_id, _)| *active_id != id));
		unmount_resource_fiber(&self.fiber)
	}

	/// Number of times the fiber asked to be rendered again.
	pub fn rerender_requests(&self) -> usize {
		self.rerender_requests.get()
	}

	/// The fiber under test.
	pub fn fiber(&self) -> &ResourceFiber<P, R> {
		&self.fiber
	}
}

impl<P, R> TestResource<P, R>
where
	P: Clone + 'static,
	R: Clone + 'static,
{
	/// Renders and commits, returning the output.
	pub fn render(&self, props: P) -> TapResult<R> {
		let result = self.render_only(props)?;
		self.commit(&result)?;
		Ok(result.into_output())
	}

	/// Renders and commits again with the last props.
	///
	/// # Errors
	///
	/// [`TapError::NoActiveFiber`] if the resource was never rendered, plus
	/// anything [`TestResource::render`] returns.
	pub fn rerender(&self) -> TapResult<R> {
		let props = self.last_props.borrow().clone().ok_or(TapError::NoActiveFiber)?;
		self.render(props)
	}
}

impl<P, R> fmt::Debug for TestResource<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TestResource")
			.field("fiber", &self.fiber)
			.field("rerender_requests", &self.rerender_requests.get())
			.finish()
	}
}

/// Renders `body` once with `props`, commits, and returns the output.
///
/// # Panics
///
/// Panics if the render or commit fails.
pub fn render_test<P, R, F>(body: F, props: P) -> R
where
	P: Clone + 'static,
	R: Clone + 'static,
	F: Fn(P) -> R + 'static,
{
	let test_resource = create_test_resource(body);
	match test_resource.render(props) {
		Ok(output) => output,
		Err(error) => panic!("test resource failed to render: {error}"),
	}
}

/// Unmounts every test resource on this thread that was not unmounted yet,
/// in creation order. Returns the first error, after trying all of them.
pub fn cleanup_all_resources() -> TapResult<()> {
	let active = ACTIVE.with(|active| std::mem::take(&mut *active.borrow_mut()));
	let mut first_error = None;
	for (_, unmount) in active {
		if let Err(error) = unmount() {
			first_error.get_or_insert(error);
		}
	}
	first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::CallLog;
	use rstest::rstest;
	use tap_core::{Cleanup, tap_effect_with_deps, tap_state};

	#[rstest]
	fn test_render_commits_effects() {
		let log = CallLog::new();
		let test_resource = create_test_resource({
			let log = log.clone();
			move |()| {
				let log = log.clone();
				tap_effect_with_deps((), move || log.push("mounted"));
			}
		});
		test_resource.render(()).unwrap();
		assert_eq!(log.entries(), vec!["mounted"]);
	}

	#[rstest]
	fn test_rerender_requests_are_counted() {
		let test_resource = create_test_resource(|()| tap_state(0));
		let (_, set_value) = test_resource.render(()).unwrap();
		set_value.set(1);
		set_value.set(2);
		assert_eq!(test_resource.rerender_requests(), 2);
		assert_eq!(test_resource.rerender().unwrap().0, 2);
	}

	#[rstest]
	fn test_rerender_before_render_fails() {
		let test_resource = create_test_resource(|()| 1);
		assert!(matches!(test_resource.rerender(), Err(TapError::NoActiveFiber)));
	}

	#[rstest]
	fn test_cleanup_all_resources_unmounts_in_creation_order() {
		let log = CallLog::new();
		let make = |name: &'static str| {
			let log = log.clone();
			create_test_resource(move |()| {
				let log = log.clone();
				tap_effect_with_deps((), move || Cleanup::new(move || log.push(name)));
			})
		};
		let first = make("first");
		let second = make("second");
		let third = make("third");
		for test_resource in [&first, &second, &third] {
			test_resource.render(()).unwrap();
		}
		second.unmount().unwrap();

		cleanup_all_resources().unwrap();
		assert_eq!(log.entries(), vec!["second", "first", "third"]);
		assert!(first.fiber().is_unmounted());
	}

	#[rstest]
	fn test_render_test_returns_output() {
		assert_eq!(render_test(|n: u8| n + 1, 1), 2);
	}
}
