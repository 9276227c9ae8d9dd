//! Resource fibers and the render/commit cycle.
//!
//! A fiber is the durable instance behind an element: the positional cell
//! arena, the render cursor and the lifecycle flags. Its life follows
//!
//! ```text
//! NeverMounted -> Rendered -> Mounted -> (render <-> commit) -> Unmounted
//! ```
//!
//! - [`render_resource_fiber`] runs the resource body with the fiber installed
//!   as the current fiber. Effects are recorded, not run.
//! - [`commit_resource_fiber`] applies a [`RenderResult`]: each recorded effect
//!   whose deps changed has its previous cleanup run, then runs itself.
//! - [`unmount_resource_fiber`] runs every active cleanup in cell order. It is
//!   terminal; the fiber cannot be rendered again.
//!
//! ## Example
//!
//! ```
//! use tap_core::{
//!     commit_resource_fiber, create_resource_fiber, render_resource_fiber, resource,
//!     tap_state, unmount_resource_fiber,
//! };
//!
//! let counter = resource(|start: i32| {
//!     let (count, _set_count) = tap_state(start);
//!     count
//! });
//!
//! let fiber = create_resource_fiber(counter, || {});
//! let result = render_resource_fiber(&fiber, 5).unwrap();
//! assert_eq!(*result.output(), 5);
//!
//! commit_resource_fiber(&fiber, &result).unwrap();
//! assert!(fiber.is_mounted());
//!
//! unmount_resource_fiber(&fiber).unwrap();
//! assert!(fiber.is_unmounted());
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

extern crate alloc;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::cell::{EffectTask, FiberCell, deps_changed};
use crate::error::{CellKind, TapError, TapResult, boundary, collect_errors, raise};
use crate::execution::RenderScope;
use crate::resource::{Resource, ResourceId};

/// Unique identifier of a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiberId(usize);

impl FiberId {
	fn next() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for FiberId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "fiber#{}", self.0)
	}
}

/// Identity of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
	pub(crate) fn next() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

/// The untyped part of a fiber that primitives operate on.
pub struct FiberCore {
	id: FiberId,
	resource_id: ResourceId,
	resource_name: Option<&'static str>,
	pub(crate) cells: RefCell<Vec<FiberCell>>,
	cursor: Cell<usize>,
	/// Effects recorded by the render in progress; `Some` only while rendering.
	render_tasks: RefCell<Option<Vec<EffectTask>>>,
	is_first_render: Cell<bool>,
	is_mounted: Cell<bool>,
	is_never_mounted: Cell<bool>,
	is_unmounted: Cell<bool>,
	schedule_rerender: Box<dyn Fn()>,
}

impl FiberCore {
	/// Identifier of this fiber.
	pub fn id(&self) -> FiberId {
		self.id
	}

	/// Whether the last commit is live.
	pub fn is_mounted(&self) -> bool {
		self.is_mounted.get()
	}

	/// Whether the fiber has never been committed.
	pub fn is_never_mounted(&self) -> bool {
		self.is_never_mounted.get()
	}

	/// Whether no render of this fiber has been committed yet.
	pub fn is_first_render(&self) -> bool {
		self.is_first_render.get()
	}

	/// Whether the fiber has been unmounted. Terminal.
	pub fn is_unmounted(&self) -> bool {
		self.is_unmounted.get()
	}

	/// Whether a render of this fiber is in progress.
	pub fn is_rendering(&self) -> bool {
		self.render_tasks.borrow().is_some()
	}

	/// Number of cells recorded so far.
	pub fn cell_count(&self) -> usize {
		self.cells.borrow().len()
	}

	/// Claims the next cell position.
	pub(crate) fn next_index(&self) -> usize {
		let index = self.cursor.get();
		self.cursor.set(index + 1);

		let recorded = self.cells.borrow().len();
		if !self.is_first_render.get() && index >= recorded {
			raise(TapError::RenderedMoreHooks { index, recorded });
		}
		index
	}

	/// Appends a freshly allocated cell at `index`.
	pub(crate) fn push_cell(&self, index: usize, cell: FiberCell) {
		let mut cells = self.cells.borrow_mut();
		if cells.len() != index {
			let expected = cell.kind();
			drop(cells);
			raise(TapError::HookOrderChanged { index, expected });
		}
		cells.push(cell);
	}

	/// Records an effect for the render in progress.
	pub(crate) fn push_render_task(&self, task: EffectTask) {
		match self.render_tasks.borrow_mut().as_mut() {
			Some(tasks) => tasks.push(task),
			None => raise(TapError::NoActiveFiber),
		}
	}

	/// Validates that a state setter may run now.
	pub(crate) fn ensure_updatable(&self) -> TapResult<()> {
		if self.is_rendering() {
			return Err(TapError::UpdateDuringRender);
		}
		if self.is_never_mounted.get() && !self.is_unmounted.get() {
			return Err(TapError::UpdateBeforeMount);
		}
		Ok(())
	}

	/// Asks the owner for a re-render when the fiber is live.
	pub(crate) fn schedule_if_mounted(&self) -> bool {
		if self.is_mounted.get() {
			(self.schedule_rerender)();
			true
		} else {
			false
		}
	}

	pub(crate) fn begin_render(&self) {
		self.cursor.set(0);
		*self.render_tasks.borrow_mut() = Some(Vec::new());
	}

	pub(crate) fn end_render(&self) {
		self.render_tasks.borrow_mut().take();
	}

	pub(crate) fn take_render_tasks(&self) -> Vec<EffectTask> {
		self.render_tasks.borrow_mut().take().unwrap_or_default()
	}

	pub(crate) fn check_consumed_all_cells(&self) {
		let consumed = self.cursor.get();
		let recorded = self.cells.borrow().len();
		if !self.is_first_render.get() && consumed < recorded {
			raise(TapError::RenderedFewerHooks { consumed, recorded });
		}
	}

	fn label(&self) -> &'static str {
		self.resource_name.unwrap_or("anonymous")
	}
}

impl fmt::Debug for FiberCore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FiberCore")
			.field("id", &self.id)
			.field("resource", &self.resource_id)
			.field("cells", &self.cell_count())
			.field("is_first_render", &self.is_first_render.get())
			.field("is_mounted", &self.is_mounted.get())
			.field("is_never_mounted", &self.is_never_mounted.get())
			.field("is_unmounted", &self.is_unmounted.get())
			.finish()
	}
}

/// A fiber for a resource with props `P` and output `R`.
///
/// Cloning gives another handle to the same fiber.
pub struct ResourceFiber<P, R> {
	resource: Resource<P, R>,
	core: Rc<FiberCore>,
}

impl<P, R> ResourceFiber<P, R> {
	/// Identifier of this fiber.
	pub fn id(&self) -> FiberId {
		self.core.id
	}

	/// The resource this fiber renders.
	pub fn resource(&self) -> &Resource<P, R> {
		&self.resource
	}

	/// Lifecycle and cell state shared with the primitives.
	pub fn core(&self) -> &FiberCore {
		&self.core
	}

	/// Whether the last commit is live.
	pub fn is_mounted(&self) -> bool {
		self.core.is_mounted()
	}

	/// Whether the fiber has been unmounted.
	pub fn is_unmounted(&self) -> bool {
		self.core.is_unmounted()
	}
}

impl<P, R> Clone for ResourceFiber<P, R> {
	fn clone(&self) -> Self {
		Self {
			resource: self.resource.clone(),
			core: Rc::clone(&self.core),
		}
	}
}

impl<P, R> fmt::Debug for ResourceFiber<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceFiber")
			.field("resource", &self.resource)
			.field("core", &self.core)
			.finish()
	}
}

/// Output of one render pass, waiting to be committed.
pub struct RenderResult<P, R> {
	revision: Revision,
	output: R,
	props: P,
	tasks: RefCell<Vec<EffectTask>>,
}

impl<P, R> RenderResult<P, R> {
	/// Identity of this render pass.
	pub fn revision(&self) -> Revision {
		self.revision
	}

	/// The value the resource body returned.
	pub fn output(&self) -> &R {
		&self.output
	}

	/// The props the body ran with.
	pub fn props(&self) -> &P {
		&self.props
	}

	/// Number of effects still waiting for commit.
	pub fn pending_effects(&self) -> usize {
		self.tasks.borrow().len()
	}

	/// Consumes the result, returning the output.
	pub fn into_output(self) -> R {
		self.output
	}
}

impl<P: fmt::Debug, R: fmt::Debug> fmt::Debug for RenderResult<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RenderResult")
			.field("revision", &self.revision)
			.field("output", &self.output)
			.field("props", &self.props)
			.field("pending_effects", &self.pending_effects())
			.finish()
	}
}

/// Creates a fiber for `resource`.
///
/// `schedule_rerender` is called whenever state owned by the mounted fiber
/// changes; the owner decides when to render again.
pub fn create_resource_fiber<P, R, F>(resource: Resource<P, R>, schedule_rerender: F) -> ResourceFiber<P, R>
where
	F: Fn() + 'static,
{
	let core = FiberCore {
		id: FiberId::next(),
		resource_id: resource.id(),
		resource_name: resource.name(),
		cells: RefCell::new(Vec::new()),
		cursor: Cell::new(0),
		render_tasks: RefCell::new(None),
		is_first_render: Cell::new(true),
		is_mounted: Cell::new(false),
		is_never_mounted: Cell::new(true),
		is_unmounted: Cell::new(false),
		schedule_rerender: Box::new(schedule_rerender),
	};
	tracing::trace!(fiber = %core.id, resource = core.label(), "created fiber");
	ResourceFiber {
		resource,
		core: Rc::new(core),
	}
}

/// Renders `fiber` with `props` without running any effect.
pub fn render_resource_fiber<P, R>(fiber: &ResourceFiber<P, R>, props: P) -> TapResult<RenderResult<P, R>>
where
	P: Clone,
{
	let core = &fiber.core;
	if core.is_unmounted() {
		return Err(TapError::FiberUnmounted);
	}
	tracing::trace!(fiber = %core.id, resource = core.label(), "rendering fiber");

	let (output, tasks) = boundary(|| {
		let scope = RenderScope::enter(Rc::clone(core));
		let output = fiber.resource.call(props.clone());
		(output, scope.finish())
	})?;

	Ok(RenderResult {
		revision: Revision::next(),
		output,
		props,
		tasks: RefCell::new(tasks),
	})
}

/// Commits `result`, running the effects whose dependencies changed.
///
/// The effect tasks of a result are consumed by the first commit; committing
/// the same result again is a no-op apart from the lifecycle flags.
pub fn commit_resource_fiber<P, R>(fiber: &ResourceFiber<P, R>, result: &RenderResult<P, R>) -> TapResult<()> {
	let core = &fiber.core;
	if core.is_unmounted() {
		return Err(TapError::FiberUnmounted);
	}
	tracing::trace!(fiber = %core.id, resource = core.label(), revision = result.revision.0, "committing fiber");

	core.is_mounted.set(true);
	core.is_never_mounted.set(false);

	let tasks = core::mem::take(&mut *result.tasks.borrow_mut());
	boundary(|| commit_effects(core, tasks))?;

	core.is_first_render.set(false);
	Ok(())
}

fn commit_effects(core: &FiberCore, tasks: Vec<EffectTask>) {
	for task in tasks {
		let index = task.cell_index;
		let stale = {
			let mut cells = core.cells.borrow_mut();
			let Some(FiberCell::Effect(cell)) = cells.get_mut(index) else {
				drop(cells);
				raise(TapError::HookOrderChanged {
					index,
					expected: CellKind::Effect,
				});
			};
			if cell.mounted && !deps_changed(cell.deps.as_deref(), task.deps.as_deref()) {
				continue;
			}
			cell.mounted = false;
			cell.cleanup.take()
		};

		if let Some(cleanup) = stale {
			cleanup.run();
		}
		let cleanup = (task.run)();

		if let Some(FiberCell::Effect(cell)) = core.cells.borrow_mut().get_mut(index) {
			cell.mounted = true;
			cell.cleanup = Some(cleanup);
			cell.deps = task.deps;
		}
	}
}

/// Unmounts `fiber`, running every active cleanup in cell order.
///
/// A failing cleanup does not stop the others; the failures are returned
/// together once all of them ran. Unmounting twice is a no-op.
pub fn unmount_resource_fiber<P, R>(fiber: &ResourceFiber<P, R>) -> TapResult<()> {
	let core = &fiber.core;
	if core.is_unmounted.replace(true) {
		return Ok(());
	}
	tracing::trace!(fiber = %core.id, resource = core.label(), "unmounting fiber");

	core.is_mounted.set(false);
	cleanup_all_effects(core)
}

/// Runs every active cleanup, each in its own boundary, so one failing
/// cleanup does not keep the later ones from running.
fn cleanup_all_effects(core: &FiberCore) -> TapResult<()> {
	let count = core.cells.borrow().len();
	let mut errors = Vec::new();
	for index in 0..count {
		let cleanup = match core.cells.borrow_mut().get_mut(index) {
			Some(FiberCell::Effect(cell)) if cell.mounted => {
				cell.mounted = false;
				cell.deps = None;
				cell.cleanup.take()
			}
			_ => None,
		};
		if let Some(cleanup) = cleanup {
			if let Err(error) = boundary(|| cleanup.run()) {
				errors.push(error);
			}
		}
	}
	collect_errors(errors)
}
