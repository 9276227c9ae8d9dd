//! Context: values provided to every resource rendered inside a scope.
//!
//! A provider is a dynamic scope, not a tree position: [`tap_context`] sees
//! the innermost [`with_context_provider`] call that is active on this thread
//! while the body runs. Reading a context does not consume a cell.
//!
//! ```
//! use tap_core::{create_context, tap_context, with_context_provider};
//!
//! let theme = create_context("light");
//! assert_eq!(tap_context(&theme), "light");
//!
//! with_context_provider(&theme, "dark", || {
//!     assert_eq!(tap_context(&theme), "dark");
//! });
//! assert_eq!(tap_context(&theme), "light");
//! ```

use core::any::Any;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::rc::Rc;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ContextId(usize);

impl ContextId {
	fn next() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

thread_local! {
	static PROVIDERS: RefCell<Vec<(ContextId, Rc<dyn Any>)>> = const { RefCell::new(Vec::new()) };
}

/// A context key with a default value.
pub struct Context<T> {
	id: ContextId,
	default: Rc<T>,
}

impl<T> Clone for Context<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			default: Rc::clone(&self.default),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for Context<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("id", &self.id.0)
			.field("default", &self.default)
			.finish()
	}
}

/// Creates a context whose value is `default` outside of any provider.
pub fn create_context<T: 'static>(default: T) -> Context<T> {
	Context {
		id: ContextId::next(),
		default: Rc::new(default),
	}
}

/// Reads the innermost provided value of `context`, or its default.
pub fn tap_context<T: Clone + 'static>(context: &Context<T>) -> T {
	let provided = PROVIDERS.with(|providers| {
		providers
			.borrow()
			.iter()
			.rev()
			.find(|(id, _)| *id == context.id)
			.map(|(_, value)| Rc::clone(value))
	});

	match provided.and_then(|value| value.downcast::<T>().ok()) {
		Some(value) => T::clone(&value),
		None => T::clone(&context.default),
	}
}

struct ProviderGuard;

impl Drop for ProviderGuard {
	fn drop(&mut self) {
		PROVIDERS.with(|providers| {
			providers.borrow_mut().pop();
		});
	}
}

/// Runs `f` with `value` provided for `context`.
///
/// The provider is removed when `f` returns or unwinds.
pub fn with_context_provider<T, O, F>(context: &Context<T>, value: T, f: F) -> O
where
	T: 'static,
	F: FnOnce() -> O,
{
	PROVIDERS.with(|providers| {
		providers
			.borrow_mut()
			.push((context.id, Rc::new(value) as Rc<dyn Any>));
	});
	let _guard = ProviderGuard;
	f()
}
