//! Update scheduling and flushing.
//!
//! Every independently flushable root owns an [`UpdateScheduler`]. Marking a
//! scheduler dirty enqueues it on its [`Runtime`]. The runtime coalesces all
//! dirty schedulers into one pass: the first enqueue after an idle period
//! calls the runtime's *waker*, and whatever executor hosts the runtime later
//! calls [`Runtime::drain`] to run the pass.
//!
//! ## Flush semantics
//!
//! - Schedulers run in insertion order, each at most once per enqueue.
//!   Schedulers enqueued while draining run in the same pass.
//! - A scheduler whose dirty flag was cleared before its turn is skipped.
//! - More than [`RuntimeConfig::max_flush_depth`] tasks in one pass aborts the
//!   pass with [`TapError::MaxUpdateDepthExceeded`].
//! - Task errors do not stop the pass; they are collected and returned once it
//!   ends, as the single error or a [`TapError::Aggregate`].
//! - Callbacks registered with `after_flush` during the pass run once, after
//!   the queue is empty, with at most one callback per scheduler.
//!
//! [`Runtime::flush_sync`] runs a closure against a private queue and drains
//! it before returning, so callers get a committed result without waiting for
//! the ambient drain.
//!
//! ## Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tap_core::{Runtime, UpdateScheduler};
//!
//! let wakes = Rc::new(Cell::new(0));
//! let runtime = Runtime::builder()
//!     .waker({
//!         let wakes = Rc::clone(&wakes);
//!         move || wakes.set(wakes.get() + 1)
//!     })
//!     .build();
//!
//! let runs = Rc::new(Cell::new(0));
//! let scheduler = UpdateScheduler::new(&runtime, {
//!     let runs = Rc::clone(&runs);
//!     move |_| {
//!         runs.set(runs.get() + 1);
//!         Ok(())
//!     }
//! });
//!
//! scheduler.mark_dirty();
//! scheduler.mark_dirty();
//! assert_eq!(wakes.get(), 1);
//!
//! runtime.drain().unwrap();
//! assert_eq!(runs.get(), 1);
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;

use indexmap::IndexMap;

use crate::config::RuntimeConfig;
use crate::error::{TapError, TapResult, collect_errors};

/// Unique identifier of an [`UpdateScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedulerId(usize);

impl SchedulerId {
	fn next() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for SchedulerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "scheduler#{}", self.0)
	}
}

type FlushCallback = Rc<dyn Fn()>;

/// The coalescing set.
#[derive(Default)]
struct FlushState {
	schedulers: IndexMap<SchedulerId, UpdateScheduler>,
	after_flush: IndexMap<SchedulerId, FlushCallback>,
	is_scheduled: bool,
}

struct RuntimeInner {
	config: RuntimeConfig,
	state: RefCell<FlushState>,
	waker: Option<Box<dyn Fn()>>,
	is_shutdown: Cell<bool>,
}

/// Executor for update schedulers.
///
/// Cloning a runtime gives another handle to the same queue.
#[derive(Clone)]
pub struct Runtime {
	inner: Rc<RuntimeInner>,
}

impl Runtime {
	/// Creates a runtime with the default configuration and no waker.
	pub fn new() -> Self {
		Self::builder().build()
	}

	/// Creates a runtime with `config` and no waker.
	pub fn with_config(config: RuntimeConfig) -> Self {
		Self::builder().config(config).build()
	}

	/// Starts building a runtime.
	pub fn builder() -> RuntimeBuilder {
		RuntimeBuilder::default()
	}

	/// The configuration this runtime was built with.
	pub fn config(&self) -> &RuntimeConfig {
		&self.inner.config
	}

	/// Whether a drain is owed.
	pub fn has_pending(&self) -> bool {
		!self.inner.state.borrow().schedulers.is_empty()
	}

	/// Number of schedulers waiting for the next drain.
	pub fn pending_count(&self) -> usize {
		self.inner.state.borrow().schedulers.len()
	}

	/// Whether [`Runtime::shutdown`] was called.
	pub fn is_shutdown(&self) -> bool {
		self.inner.is_shutdown.get()
	}

	fn enqueue(&self, scheduler: &UpdateScheduler) {
		if self.inner.is_shutdown.get() {
			tracing::warn!(scheduler = %scheduler.id(), "update ignored: runtime is shut down");
			return;
		}

		let wake = {
			let mut state = self.inner.state.borrow_mut();
			state.schedulers.insert(scheduler.id(), scheduler.clone());
			!core::mem::replace(&mut state.is_scheduled, true)
		};
		tracing::debug!(scheduler = %scheduler.id(), wake, "scheduler enqueued");

		if !wake {
			return;
		}
		if let Some(waker) = &self.inner.waker {
			waker();
		}
	}

	/// Registers `callback` to run once the current pass has drained.
	///
	/// A later registration for the same `key` in the same pass replaces the
	/// earlier one.
	pub(crate) fn after_flush(&self, key: SchedulerId, callback: FlushCallback) {
		self.inner.state.borrow_mut().after_flush.insert(key, callback);
	}

	/// Runs every pending scheduler.
	///
	/// This is the body of the coalesced pass; hosts call it after the waker
	/// fired. Draining an empty queue is a no-op.
	///
	/// # Errors
	///
	/// [`TapError::MaxUpdateDepthExceeded`] when the pass runs more tasks
	/// than configured, otherwise the errors returned by tasks.
	pub fn drain(&self) -> TapResult<()> {
		let result = self.run_pass();
		let callbacks = self.take_after_flush();
		run_after_flush(callbacks);
		result
	}

	fn run_pass(&self) -> TapResult<()> {
		let _reset = ResetOnExit { runtime: self };
		let limit = self.inner.config.max_flush_depth;
		let mut depth = 0;
		let mut errors = Vec::new();

		tracing::debug!(pending = self.pending_count(), "flush started");
		loop {
			let next = self.inner.state.borrow_mut().schedulers.shift_remove_index(0);
			let Some((_, scheduler)) = next else {
				break;
			};
			if !scheduler.is_dirty() {
				continue;
			}

			depth += 1;
			if depth > limit {
				tracing::debug!(limit, "flush aborted: update depth exceeded");
				return Err(TapError::MaxUpdateDepthExceeded { limit });
			}

			if let Err(error) = scheduler.run_task() {
				errors.push(error);
			}
		}
		tracing::debug!(tasks = depth, errors = errors.len(), "flush finished");

		collect_errors(errors)
	}

	fn take_after_flush(&self) -> Vec<FlushCallback> {
		let callbacks = core::mem::take(&mut self.inner.state.borrow_mut().after_flush);
		callbacks.into_values().collect()
	}

	/// Runs `f` against a private queue and drains it before returning.
	///
	/// Schedulers marked dirty by `f` run synchronously here, never in the
	/// ambient pass, and the waker is not called for them. The ambient queue
	/// is restored afterwards, also when `f` or the drain fails. Flush
	/// callbacks of the private pass run after the restore, so updates they
	/// cause go to the ambient queue.
	///
	/// # Errors
	///
	/// Same as [`Runtime::drain`]. The value returned by `f` is discarded when
	/// the drain fails.
	pub fn flush_sync<T>(&self, f: impl FnOnce() -> T) -> TapResult<T> {
		let private = FlushState {
			is_scheduled: true,
			..FlushState::default()
		};
		let previous = self.inner.state.replace(private);
		let restore = RestoreOnExit {
			runtime: self,
			previous: Some(previous),
		};

		let value = f();
		let result = self.run_pass();
		let callbacks = self.take_after_flush();
		drop(restore);

		run_after_flush(callbacks);
		result.map(|()| value)
	}

	/// Discards pending work. Later updates are ignored.
	pub fn shutdown(&self) {
		if self.inner.is_shutdown.replace(true) {
			return;
		}
		let discarded = {
			let mut state = self.inner.state.borrow_mut();
			state.is_scheduled = false;
			state.after_flush.clear();
			core::mem::take(&mut state.schedulers)
		};
		tracing::debug!(discarded = discarded.len(), "runtime shut down");
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Runtime {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.borrow();
		f.debug_struct("Runtime")
			.field("config", &self.inner.config)
			.field("pending", &state.schedulers.len())
			.field("is_scheduled", &state.is_scheduled)
			.field("is_shutdown", &self.inner.is_shutdown.get())
			.finish()
	}
}

fn run_after_flush(callbacks: Vec<FlushCallback>) {
	for callback in callbacks {
		callback();
	}
}

struct ResetOnExit<'a> {
	runtime: &'a Runtime,
}

impl Drop for ResetOnExit<'_> {
	fn drop(&mut self) {
		let mut state = self.runtime.inner.state.borrow_mut();
		state.schedulers.clear();
		state.is_scheduled = false;
	}
}

struct RestoreOnExit<'a> {
	runtime: &'a Runtime,
	previous: Option<FlushState>,
}

impl Drop for RestoreOnExit<'_> {
	fn drop(&mut self) {
		if let Some(previous) = self.previous.take() {
			*self.runtime.inner.state.borrow_mut() = previous;
		}
	}
}

/// Builder for [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
	config: RuntimeConfig,
	waker: Option<Box<dyn Fn()>>,
}

impl RuntimeBuilder {
	/// Replaces the whole configuration.
	pub fn config(mut self, config: RuntimeConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the flush ceiling.
	pub fn max_flush_depth(mut self, depth: usize) -> Self {
		self.config = self.config.with_max_flush_depth(depth);
		self
	}

	/// Sets the callback invoked when a drain becomes owed.
	///
	/// The waker must not drain synchronously; it should arrange for
	/// [`Runtime::drain`] to run once the current call stack unwinds.
	pub fn waker<F>(mut self, waker: F) -> Self
	where
		F: Fn() + 'static,
	{
		self.waker = Some(Box::new(waker));
		self
	}

	/// Builds the runtime.
	pub fn build(self) -> Runtime {
		Runtime {
			inner: Rc::new(RuntimeInner {
				config: self.config,
				state: RefCell::new(FlushState::default()),
				waker: self.waker,
				is_shutdown: Cell::new(false),
			}),
		}
	}
}

type SchedulerTask = Box<dyn Fn(&UpdateScheduler) -> TapResult<()>>;

struct SchedulerInner {
	id: SchedulerId,
	is_dirty: Cell<bool>,
	runtime: Weak<RuntimeInner>,
	task: SchedulerTask,
}

/// A dirty flag plus the task that cleans it.
///
/// Cloning gives another handle to the same scheduler.
#[derive(Clone)]
pub struct UpdateScheduler {
	inner: Rc<SchedulerInner>,
}

impl UpdateScheduler {
	/// Creates a scheduler running `task` on `runtime`.
	///
	/// The task receives its own scheduler so it can check
	/// [`UpdateScheduler::is_dirty`] after rendering.
	pub fn new<F>(runtime: &Runtime, task: F) -> Self
	where
		F: Fn(&UpdateScheduler) -> TapResult<()> + 'static,
	{
		Self {
			inner: Rc::new(SchedulerInner {
				id: SchedulerId::next(),
				is_dirty: Cell::new(false),
				runtime: Rc::downgrade(&runtime.inner),
				task: Box::new(task),
			}),
		}
	}

	/// Identifier of this scheduler.
	pub fn id(&self) -> SchedulerId {
		self.inner.id
	}

	/// Whether the task has to run again.
	pub fn is_dirty(&self) -> bool {
		self.inner.is_dirty.get()
	}

	/// Flags the scheduler and enqueues it on its runtime.
	pub fn mark_dirty(&self) {
		self.inner.is_dirty.set(true);
		match self.inner.runtime.upgrade() {
			Some(inner) => Runtime { inner }.enqueue(self),
			None => tracing::warn!(scheduler = %self.id(), "update ignored: runtime dropped"),
		}
	}

	/// Clears the flag and runs the task.
	pub fn run_task(&self) -> TapResult<()> {
		self.inner.is_dirty.set(false);
		(self.inner.task)(self)
	}

	/// A handle that does not keep the scheduler alive.
	pub fn downgrade(&self) -> WeakScheduler {
		WeakScheduler {
			inner: Rc::downgrade(&self.inner),
		}
	}
}

impl PartialEq for UpdateScheduler {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for UpdateScheduler {}

impl fmt::Debug for UpdateScheduler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UpdateScheduler")
			.field("id", &self.inner.id)
			.field("is_dirty", &self.inner.is_dirty.get())
			.finish()
	}
}

/// Weak counterpart of [`UpdateScheduler`].
#[derive(Clone)]
pub struct WeakScheduler {
	inner: Weak<SchedulerInner>,
}

impl WeakScheduler {
	/// Upgrades to a strong handle if the scheduler is still alive.
	pub fn upgrade(&self) -> Option<UpdateScheduler> {
		self.inner.upgrade().map(|inner| UpdateScheduler { inner })
	}
}

impl fmt::Debug for WeakScheduler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakScheduler").finish_non_exhaustive()
	}
}
