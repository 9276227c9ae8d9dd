//! Effect hooks: tap_effect and tap_effect_with_deps
//!
//! Effects are recorded during render and run when the render result is
//! committed, in the order they were declared.

extern crate alloc;
use alloc::boxed::Box;

use crate::cell::{Cleanup, Deps, EffectCell, EffectTask, FiberCell, IntoCleanup};
use crate::error::{CellKind, TapError, raise};
use crate::execution::current_fiber;

/// Runs `f` after every commit of the current fiber.
///
/// `f` may return a cleanup: `()`, a [`Cleanup`], or `Option<impl FnOnce()>`.
/// The cleanup of the previous run is called right before the next run and
/// when the fiber unmounts.
///
/// # Example
///
/// ```
/// use tap_core::{Cleanup, resource, tap_effect};
///
/// let logger = resource(|name: &'static str| {
///     tap_effect(move || {
///         println!("{name} committed");
///         Cleanup::new(move || println!("{name} cleaned up"))
///     });
/// });
/// # let _ = logger;
/// ```
pub fn tap_effect<F, C>(f: F)
where
	F: FnOnce() -> C + 'static,
	C: IntoCleanup,
{
	record_effect(None, f);
}

/// Runs `f` after a commit only when `deps` differ from the deps of the last
/// run.
///
/// Pass `()` to run once on mount and clean up on unmount.
///
/// ```
/// use tap_core::{resource, tap_effect_with_deps};
///
/// let subscription = resource(|topic: String| {
///     tap_effect_with_deps(topic.clone(), move || {
///         println!("subscribed to {topic}");
///         Some(move || println!("unsubscribed"))
///     });
/// });
/// # let _ = subscription;
/// ```
pub fn tap_effect_with_deps<D, F, C>(deps: D, f: F)
where
	D: PartialEq + 'static,
	F: FnOnce() -> C + 'static,
	C: IntoCleanup,
{
	record_effect(Some(Box::new(deps)), f);
}

fn record_effect<F, C>(deps: Option<Box<dyn Deps>>, f: F)
where
	F: FnOnce() -> C + 'static,
	C: IntoCleanup,
{
	let fiber = current_fiber();
	let index = fiber.next_index();

	let kind = fiber.cells.borrow().get(index).map(FiberCell::kind);
	match kind {
		Some(CellKind::Effect) => {}
		Some(CellKind::State) => raise(TapError::HookOrderChanged {
			index,
			expected: CellKind::Effect,
		}),
		None => fiber.push_cell(index, FiberCell::Effect(EffectCell::default())),
	}

	fiber.push_render_task(EffectTask {
		cell_index: index,
		deps,
		run: Box::new(move || -> Cleanup { f().into_cleanup() }),
	});
}
