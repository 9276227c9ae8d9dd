//! Inline resource hook: tap_inline_resource

use crate::execution::current_fiber;
use crate::resource::Element;

/// Runs the body of `element`'s resource directly against the current fiber.
///
/// No child fiber is created: the inlined body's primitives take cells from
/// the caller, so the caller must inline the same resource at the same
/// position on every render.
pub fn tap_inline_resource<P, R>(element: Element<P, R>) -> R {
	current_fiber();
	let (resource, props) = element.into_parts();
	resource.call(props)
}
