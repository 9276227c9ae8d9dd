//! Resources and elements.
//!
//! A [`Resource`] is an identity-bearing function from props to a value. Pairing
//! it with props gives an [`Element`], the unit passed to `create_resource`,
//! `tap_resource` and friends.
//!
//! Identity is assigned when the resource is constructed and shared by all of
//! its clones. It decides whether an existing fiber may be reused: two
//! resources built from identical closures are still different resources.
//!
//! ```
//! use tap_core::resource;
//!
//! let double = resource(|n: i32| n * 2);
//! let element = double.element(21);
//! assert_eq!(element.props(), &21);
//! assert_eq!(element.resource().id(), double.id());
//! ```

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

extern crate alloc;
use alloc::rc::Rc;

/// Unique identity of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(usize);

impl ResourceId {
	fn next() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(1);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for ResourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "resource#{}", self.0)
	}
}

/// An identity-bearing resource body `P -> R`.
pub struct Resource<P, R> {
	id: ResourceId,
	name: Option<&'static str>,
	body: Rc<dyn Fn(P) -> R>,
}

/// Creates a resource from a body function.
///
/// The body runs on every render of every fiber created for this resource and
/// may call the `tap_*` primitives. It must not perform side effects; those
/// belong in `tap_effect`.
pub fn resource<P, R, F>(body: F) -> Resource<P, R>
where
	F: Fn(P) -> R + 'static,
{
	Resource::new(body)
}

impl<P, R> Resource<P, R> {
	/// Creates a resource with a fresh identity.
	pub fn new<F>(body: F) -> Self
	where
		F: Fn(P) -> R + 'static,
	{
		Self {
			id: ResourceId::next(),
			name: None,
			body: Rc::new(body),
		}
	}

	/// Creates a resource with a display name used in logs.
	pub fn named<F>(name: &'static str, body: F) -> Self
	where
		F: Fn(P) -> R + 'static,
	{
		Self {
			name: Some(name),
			..Self::new(body)
		}
	}

	/// Identity of this resource.
	pub fn id(&self) -> ResourceId {
		self.id
	}

	/// Display name, if one was given.
	pub fn name(&self) -> Option<&'static str> {
		self.name
	}

	/// Pairs this resource with props.
	pub fn element(&self, props: P) -> Element<P, R> {
		Element {
			resource: self.clone(),
			props,
		}
	}

	/// Runs the body against whatever fiber is currently rendering.
	pub(crate) fn call(&self, props: P) -> R {
		(self.body)(props)
	}
}

impl<R> Resource<(), R> {
	/// Element for a resource that takes no props.
	pub fn element_default(&self) -> Element<(), R> {
		self.element(())
	}
}

impl<P, R> Clone for Resource<P, R> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			name: self.name,
			body: Rc::clone(&self.body),
		}
	}
}

impl<P, R> PartialEq for Resource<P, R> {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl<P, R> Eq for Resource<P, R> {}

impl<P, R> fmt::Debug for Resource<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resource")
			.field("id", &self.id)
			.field("name", &self.name)
			.finish()
	}
}

/// An immutable `(resource, props)` pair.
pub struct Element<P, R> {
	resource: Resource<P, R>,
	props: P,
}

impl<P, R> Element<P, R> {
	/// The resource this element instantiates.
	pub fn resource(&self) -> &Resource<P, R> {
		&self.resource
	}

	/// The props this element carries.
	pub fn props(&self) -> &P {
		&self.props
	}

	/// Splits the element into its resource and props.
	pub fn into_parts(self) -> (Resource<P, R>, P) {
		(self.resource, self.props)
	}
}

impl<P: Clone, R> Clone for Element<P, R> {
	fn clone(&self) -> Self {
		Self {
			resource: self.resource.clone(),
			props: self.props.clone(),
		}
	}
}

impl<P: fmt::Debug, R> fmt::Debug for Element<P, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Element")
			.field("resource", &self.resource)
			.field("props", &self.props)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_resource_ids_are_unique() {
		let a = resource(|n: i32| n);
		let b = resource(|n: i32| n);
		assert_ne!(a.id(), b.id());
		assert_ne!(a, b);
	}

	#[rstest]
	fn test_clones_share_identity() {
		let a = Resource::named("Counter", |n: i32| n + 1);
		let b = a.clone();
		assert_eq!(a, b);
		assert_eq!(b.name(), Some("Counter"));
		assert_eq!(b.call(1), 2);
	}

	#[rstest]
	fn test_element_carries_resource_and_props() {
		let r = resource(|s: String| s.len());
		let element = r.element("hello".to_string());
		assert_eq!(element.resource().id(), r.id());
		let (resource, props) = element.into_parts();
		assert_eq!(resource.call(props), 5);
	}

	#[rstest]
	fn test_element_default_for_unit_props() {
		let r = resource(|()| 3);
		assert_eq!(r.element_default().props(), &());
	}
}
