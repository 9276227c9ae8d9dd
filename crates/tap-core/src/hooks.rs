//! Primitives callable from inside a resource body.
//!
//! Every primitive except [`tap_inline_resource`] and the context reader
//! consumes exactly one cell of the current fiber, in call order. Calling them
//! conditionally or in a loop of varying length breaks that order and is
//! reported as [`TapError::RenderedMoreHooks`], [`TapError::RenderedFewerHooks`]
//! or [`TapError::HookOrderChanged`].
//!
//! ## Primitives
//!
//! - [`tap_state`] / [`tap_state_with`]: a value plus a [`StateSetter`]
//! - [`tap_effect`] / [`tap_effect_with_deps`]: side effects run at commit
//! - [`tap_memo`] / [`tap_callback`]: values recomputed when deps change
//! - [`tap_ref`]: a mutable box that survives renders
//! - [`tap_effect_event`]: a stable function that always calls the latest closure
//!
//! ## Composition
//!
//! - [`tap_resource`] / [`tap_resource_with_deps`]: one nested fiber
//! - [`tap_resources`]: one nested fiber per key
//! - [`tap_inline_resource`]: another resource's body against the caller's cells

mod effect;
mod effect_event;
mod inline;
mod memo;
mod reference;
mod resource;
mod resources;
mod state;

pub use effect::{tap_effect, tap_effect_with_deps};
pub use effect_event::{EffectEvent, tap_effect_event};
pub use inline::tap_inline_resource;
pub use memo::{Callback, tap_callback, tap_memo};
pub use reference::{RefHandle, tap_ref};
pub use resource::{tap_resource, tap_resource_with_deps};
pub use resources::tap_resources;
pub use state::{StateSetter, tap_state, tap_state_with};

use core::any::Any;

extern crate alloc;
use alloc::rc::Rc;

use crate::cell::FiberCell;
use crate::error::{CellKind, TapError, raise};
use crate::execution::current_fiber;
use crate::fiber::FiberCore;

/// Claims the next cell as a typed state slot.
///
/// On first use `init` builds the slot; later renders return the slot stored
/// at the same position.
pub(crate) fn tap_slot<S, F>(init: F) -> Rc<S>
where
	S: 'static,
	F: FnOnce(&Rc<FiberCore>) -> S,
{
	let fiber = current_fiber();
	let index = fiber.next_index();

	let existing = fiber.cells.borrow().get(index).map(|cell| match cell {
		FiberCell::State(slot) => Some(Rc::clone(slot)),
		FiberCell::Effect(_) => None,
	});

	match existing {
		Some(Some(slot)) => slot.downcast::<S>().unwrap_or_else(|_| order_changed(index)),
		Some(None) => order_changed(index),
		None => {
			let slot = Rc::new(init(&fiber));
			fiber.push_cell(index, FiberCell::State(Rc::clone(&slot) as Rc<dyn Any>));
			slot
		}
	}
}

fn order_changed(index: usize) -> ! {
	raise(TapError::HookOrderChanged {
		index,
		expected: CellKind::State,
	})
}
