//! Imperative resource handles.
//!
//! [`create_resource`] turns an element into a root that lives outside of any
//! render: it renders and commits synchronously, exposes the current output
//! and notifies subscribers when the output changes.
//!
//! ## Example
//!
//! ```
//! use tap_core::{CreateOptions, Runtime, create_resource, resource};
//!
//! let runtime = Runtime::new();
//! let doubled = resource(|n: i32| n * 2);
//!
//! let handle = create_resource(&runtime, doubled.element(5), CreateOptions::default()).unwrap();
//! assert_eq!(handle.get_state(), 10);
//!
//! handle.render(doubled.element(6)).unwrap();
//! assert_eq!(handle.get_state(), 12);
//!
//! handle.unmount().unwrap();
//! assert!(handle.render(doubled.element(7)).is_err());
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use std::panic::{self, AssertUnwindSafe};

extern crate alloc;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use indexmap::IndexMap;

use crate::error::{TapError, TapResult};
use crate::fiber::{
	ResourceFiber, commit_resource_fiber, create_resource_fiber, render_resource_fiber,
	unmount_resource_fiber,
};
use crate::hooks::tap_resource;
use crate::resource::{Element, Resource};
use crate::scheduler::{Runtime, UpdateScheduler};

/// Options for [`create_resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
	/// Commit the initial render. When `false`, the handle renders once but
	/// runs no effect until the first [`ResourceHandle::render`].
	pub mount: bool,
}

impl Default for CreateOptions {
	fn default() -> Self {
		Self { mount: true }
	}
}

impl CreateOptions {
	/// Options that defer mounting until the first `render`.
	pub fn deferred() -> Self {
		Self { mount: false }
	}
}

#[derive(Default)]
struct SubscriberList {
	next_id: Cell<usize>,
	callbacks: RefCell<IndexMap<usize, Rc<dyn Fn()>>>,
}

impl SubscriberList {
	fn add(&self, callback: Rc<dyn Fn()>) -> usize {
		let id = self.next_id.get();
		self.next_id.set(id + 1);
		self.callbacks.borrow_mut().insert(id, callback);
		id
	}

	fn notify(&self) {
		let callbacks: Vec<_> = self.callbacks.borrow().values().cloned().collect();
		for callback in callbacks {
			if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
				tracing::error!(panic = %panic_message(payload.as_ref()), "resource subscriber panicked");
			}
		}
	}
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
	if let Some(error) = payload.downcast_ref::<TapError>() {
		error.to_string()
	} else if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic payload".to_string()
	}
}

/// The element a handle renders, swapped by [`ResourceHandle::render`].
type SharedElement<P, R> = Rc<RefCell<Element<P, R>>>;

fn wrapper_resource<P, R>() -> Resource<SharedElement<P, R>, R>
where
	P: Clone + 'static,
	R: Clone + 'static,
{
	Resource::named("ResourceHandle", |element: SharedElement<P, R>| {
		let element = element.borrow().clone();
		tap_resource(element)
	})
}

struct HandleRoot<P, R> {
	runtime: Runtime,
	element: SharedElement<P, R>,
	fiber: ResourceFiber<SharedElement<P, R>, R>,
	scheduler: UpdateScheduler,
	output: RefCell<R>,
	notified: RefCell<R>,
	subscribers: Rc<SubscriberList>,
	is_mounted: Cell<bool>,
	is_unmounted: Cell<bool>,
}

impl<P, R> HandleRoot<P, R>
where
	P: Clone + 'static,
	R: Clone + PartialEq + 'static,
{
	fn run(self: &Rc<Self>, scheduler: &UpdateScheduler) -> TapResult<()> {
		if self.is_unmounted.get() {
			return Ok(());
		}
		let result = render_resource_fiber(&self.fiber, Rc::clone(&self.element))?;
		if scheduler.is_dirty() || !self.is_mounted.get() {
			return Ok(());
		}
		commit_resource_fiber(&self.fiber, &result)?;
		self.publish(result.into_output());
		Ok(())
	}

	/// Stores a committed output. Subscribers hear about it once the pass
	/// that committed it has drained.
	fn publish(self: &Rc<Self>, value: R) {
		*self.output.borrow_mut() = value;
		let root = Rc::downgrade(self);
		self.runtime.after_flush(
			self.scheduler.id(),
			Rc::new(move || {
				if let Some(root) = root.upgrade() {
					root.notify_if_changed();
				}
			}),
		);
	}

	fn notify_if_changed(&self) {
		{
			let output = self.output.borrow();
			let mut notified = self.notified.borrow_mut();
			if *notified == *output {
				return;
			}
			*notified = output.clone();
		}
		self.subscribers.notify();
	}

	/// Renders and commits right now, inside a synchronous flush.
	fn flush(&self) -> TapResult<()> {
		self.runtime.flush_sync(|| self.scheduler.run_task())?
	}
}

/// Handle to a root created by [`create_resource`].
///
/// Cloning gives another handle to the same root.
pub struct ResourceHandle<P, R> {
	root: Rc<HandleRoot<P, R>>,
}

/// Renders `element` as a new root on `runtime`.
///
/// The initial render happens before this returns, so
/// [`ResourceHandle::get_state`] is valid right away. Unless `options.mount`
/// is `false` the render is also committed inside [`Runtime::flush_sync`],
/// which applies updates made by mount effects before returning. Later state
/// changes inside the tree are batched on `runtime`.
///
/// # Errors
///
/// Any error raised by the initial render or commit.
pub fn create_resource<P, R>(
	runtime: &Runtime,
	element: Element<P, R>,
	options: CreateOptions,
) -> TapResult<ResourceHandle<P, R>>
where
	P: Clone + 'static,
	R: Clone + PartialEq + 'static,
{
	let resource_name = element.resource().name().unwrap_or("anonymous");
	tracing::debug!(resource = resource_name, mount = options.mount, "creating resource handle");

	let element = Rc::new(RefCell::new(element));
	let link: Rc<RefCell<Weak<HandleRoot<P, R>>>> = Rc::default();

	let scheduler = UpdateScheduler::new(runtime, {
		let link = Rc::clone(&link);
		move |scheduler| {
			let root = link.borrow().upgrade();
			match root {
				Some(root) => root.run(scheduler),
				None => Ok(()),
			}
		}
	});
	let weak_scheduler = scheduler.downgrade();
	let fiber = create_resource_fiber(wrapper_resource::<P, R>(), move || {
		if let Some(scheduler) = weak_scheduler.upgrade() {
			scheduler.mark_dirty();
		}
	});

	let initial = render_resource_fiber(&fiber, Rc::clone(&element))?;
	let output = initial.output().clone();
	let root = Rc::new(HandleRoot {
		runtime: runtime.clone(),
		element,
		fiber,
		scheduler,
		output: RefCell::new(output.clone()),
		notified: RefCell::new(output),
		subscribers: Rc::default(),
		is_mounted: Cell::new(options.mount),
		is_unmounted: Cell::new(false),
	});
	*link.borrow_mut() = Rc::downgrade(&root);

	if options.mount {
		runtime.flush_sync(|| commit_resource_fiber(&root.fiber, &initial))??;
	}
	Ok(ResourceHandle { root })
}

impl<P, R> ResourceHandle<P, R>
where
	P: Clone + 'static,
	R: Clone + PartialEq + 'static,
{
	/// The output of the last committed render.
	///
	/// Before the first commit of a deferred handle this is the output of the
	/// initial render.
	pub fn get_state(&self) -> R {
		self.root.output.borrow().clone()
	}

	/// Registers `callback`, called at most once per flush, after a flush
	/// whose commits changed the output.
	///
	/// Changes are detected with `PartialEq` against the output seen at the
	/// last notification: a new value that compares equal notifies nobody,
	/// and so does a flush that changes the output and changes it back.
	///
	/// A panicking callback is logged and does not affect other subscribers.
	pub fn subscribe<F>(&self, callback: F) -> Subscription
	where
		F: Fn() + 'static,
	{
		let subscribers = &self.root.subscribers;
		let id = subscribers.add(Rc::new(callback));
		Subscription {
			subscribers: Rc::downgrade(subscribers),
			id,
		}
	}

	/// Replaces the element and renders it synchronously.
	///
	/// A deferred handle is mounted by its first `render`.
	///
	/// # Errors
	///
	/// [`TapError::HandleUnmounted`] after [`ResourceHandle::unmount`], or
	/// any error raised while rendering.
	pub fn render(&self, element: Element<P, R>) -> TapResult<()> {
		let root = &self.root;
		if root.is_unmounted.get() {
			return Err(TapError::HandleUnmounted);
		}
		*root.element.borrow_mut() = element;

		if !root.is_mounted.replace(true) {
			tracing::debug!(fiber = %root.fiber.id(), "mounting deferred resource handle");
		}
		root.flush()
	}

	/// Runs every cleanup of the tree. The handle cannot render afterwards.
	///
	/// # Errors
	///
	/// [`TapError::HandleUnmounted`] when called twice, or the errors raised
	/// by cleanups. Every cleanup runs even when some of them fail.
	pub fn unmount(&self) -> TapResult<()> {
		let root = &self.root;
		if root.is_unmounted.replace(true) {
			return Err(TapError::HandleUnmounted);
		}
		root.is_mounted.set(false);
		tracing::debug!(fiber = %root.fiber.id(), "unmounting resource handle");
		unmount_resource_fiber(&root.fiber)
	}

	/// Whether the handle's tree is committed and live.
	pub fn is_mounted(&self) -> bool {
		self.root.is_mounted.get()
	}

	/// Whether [`ResourceHandle::unmount`] was called.
	pub fn is_unmounted(&self) -> bool {
		self.root.is_unmounted.get()
	}

	/// The runtime this handle flushes on.
	pub fn runtime(&self) -> &Runtime {
		&self.root.runtime
	}
}

impl<P, R> Clone for ResourceHandle<P, R> {
	fn clone(&self) -> Self {
		Self {
			root: Rc::clone(&self.root),
		}
	}
}

impl<P, R> fmt::Debug for ResourceHandle<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceHandle")
			.field("fiber", &self.root.fiber.id())
			.field("is_mounted", &self.root.is_mounted.get())
			.field("is_unmounted", &self.root.is_unmounted.get())
			.field("subscribers", &self.root.subscribers.callbacks.borrow().len())
			.finish()
	}
}

/// Registration returned by [`ResourceHandle::subscribe`].
///
/// Dropping it keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
	subscribers: Weak<SubscriberList>,
	id: usize,
}

impl Subscription {
	/// Removes the callback. Returns whether it was still registered.
	pub fn unsubscribe(self) -> bool {
		self.subscribers
			.upgrade()
			.is_some_and(|subscribers| subscribers.callbacks.borrow_mut().shift_remove(&self.id).is_some())
	}
}

impl fmt::Debug for SubscriberList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubscriberList")
			.field("len", &self.callbacks.borrow().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hooks::{StateSetter, tap_effect, tap_effect_with_deps, tap_state};
	use crate::resource::resource;
	use rstest::rstest;

	#[rstest]
	fn test_state_is_available_immediately() {
		let runtime = Runtime::new();
		let r = resource(|n: i32| n * 2);
		let handle = create_resource(&runtime, r.element(5), CreateOptions::default()).unwrap();
		assert_eq!(handle.get_state(), 10);
		assert!(handle.is_mounted());
		assert!(!runtime.has_pending());
	}

	#[rstest]
	fn test_deferred_handle_runs_effects_on_first_render() {
		let runtime = Runtime::new();
		let mounted = Rc::new(Cell::new(0));
		let r = resource({
			let mounted = Rc::clone(&mounted);
			move |n: i32| {
				let mounted = Rc::clone(&mounted);
				tap_effect_with_deps((), move || mounted.set(mounted.get() + 1));
				n
			}
		});

		let handle = create_resource(&runtime, r.element(1), CreateOptions::deferred()).unwrap();
		assert_eq!(handle.get_state(), 1);
		assert!(!handle.is_mounted());
		assert_eq!(mounted.get(), 0);

		handle.render(r.element(2)).unwrap();
		assert!(handle.is_mounted());
		assert_eq!(mounted.get(), 1);
		assert_eq!(handle.get_state(), 2);
	}

	#[rstest]
	fn test_subscribers_hear_changes_only() {
		let runtime = Runtime::new();
		let r = resource(|n: i32| n % 2);
		let handle = create_resource(&runtime, r.element(1), CreateOptions::default()).unwrap();
		let calls = Rc::new(Cell::new(0));
		let subscription = handle.subscribe({
			let calls = Rc::clone(&calls);
			move || calls.set(calls.get() + 1)
		});

		handle.render(r.element(3)).unwrap();
		assert_eq!(calls.get(), 0);
		handle.render(r.element(4)).unwrap();
		assert_eq!(calls.get(), 1);

		assert!(subscription.unsubscribe());
		handle.render(r.element(5)).unwrap();
		assert_eq!(calls.get(), 1);
	}

	#[rstest]
	fn test_panicking_subscriber_does_not_block_others() {
		let runtime = Runtime::new();
		let r = resource(|n: i32| n);
		let handle = create_resource(&runtime, r.element(0), CreateOptions::default()).unwrap();
		let _bad = handle.subscribe(|| panic!("subscriber failure"));
		let calls = Rc::new(Cell::new(0));
		let _good = handle.subscribe({
			let calls = Rc::clone(&calls);
			move || calls.set(calls.get() + 1)
		});

		handle.render(r.element(1)).unwrap();
		assert_eq!(calls.get(), 1);
		assert_eq!(handle.get_state(), 1);
	}

	#[rstest]
	fn test_unmount_is_terminal() {
		let runtime = Runtime::new();
		let r = resource(|()| 1);
		let handle = create_resource(&runtime, r.element(()), CreateOptions::default()).unwrap();
		handle.unmount().unwrap();

		assert!(matches!(handle.render(r.element(())), Err(TapError::HandleUnmounted)));
		assert!(matches!(handle.unmount(), Err(TapError::HandleUnmounted)));
		assert!(handle.is_unmounted());
	}

	#[rstest]
	fn test_setter_changes_wait_for_drain() {
		let runtime = Runtime::new();
		let r = resource(|()| tap_state(0));
		let handle = create_resource(&runtime, r.element(()), CreateOptions::default()).unwrap();
		let (_, set_value): (i32, StateSetter<i32>) = handle.get_state();

		set_value.set(1);
		set_value.set(2);
		assert_eq!(handle.get_state().0, 0);
		assert_eq!(runtime.pending_count(), 1);

		runtime.drain().unwrap();
		assert_eq!(handle.get_state().0, 2);
	}

	#[rstest]
	fn test_runaway_effect_fails_creation() {
		let runtime = Runtime::new();
		let r = resource(|()| {
			let (n, set_n) = tap_state(0_u64);
			tap_effect(move || set_n.set(n + 1));
			n
		});
		let error = create_resource(&runtime, r.element(()), CreateOptions::default()).unwrap_err();
		assert!(matches!(error, TapError::MaxUpdateDepthExceeded { limit: 50 }));
	}

	#[rstest]
	#[case::settles_elsewhere(2, 1)]
	#[case::settles_back(0, 0)]
	fn test_subscribers_hear_one_notification_per_flush(#[case] settle_to: i32, #[case] notifications: usize) {
		let runtime = Runtime::new();
		let r = resource(move |()| {
			let (value, set_value) = tap_state(0);
			let setter = set_value.clone();
			tap_effect(move || {
				if value == 1 {
					setter.set(settle_to);
				}
			});
			(value, set_value)
		});
		let handle = create_resource(&runtime, r.element(()), CreateOptions::default()).unwrap();
		let calls = Rc::new(Cell::new(0_usize));
		let _subscription = handle.subscribe({
			let calls = Rc::clone(&calls);
			move || calls.set(calls.get() + 1)
		});

		handle.get_state().1.set(1);
		runtime.drain().unwrap();

		assert_eq!(handle.get_state().0, settle_to);
		assert_eq!(calls.get(), notifications);
		assert!(!runtime.has_pending());
	}

	#[rstest]
	fn test_subscriber_updates_are_scheduled_after_the_flush() {
		let runtime = Runtime::new();
		let r = resource(|()| tap_state(0));
		let handle = Rc::new(create_resource(&runtime, r.element(()), CreateOptions::default()).unwrap());
		let seen = Rc::new(RefCell::new(Vec::new()));
		let _subscription = handle.subscribe({
			let handle = Rc::downgrade(&handle);
			let seen = Rc::clone(&seen);
			move || {
				if let Some(handle) = handle.upgrade() {
					let (value, set_value) = handle.get_state();
					seen.borrow_mut().push(value);
					if value < 3 {
						set_value.set(value + 1);
					}
				}
			}
		});

		handle.get_state().1.set(1);
		runtime.drain().unwrap();
		assert_eq!(*seen.borrow(), vec![1]);
		assert_eq!(runtime.pending_count(), 1);

		runtime.drain().unwrap();
		runtime.drain().unwrap();
		assert_eq!(*seen.borrow(), vec![1, 2, 3]);
		assert!(!runtime.has_pending());
	}
}
