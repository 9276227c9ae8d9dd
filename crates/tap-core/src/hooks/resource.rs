//! Nested resource hooks: tap_resource and tap_resource_with_deps

extern crate alloc;
use alloc::rc::Rc;

use crate::cell::Cleanup;
use crate::error::OrRaise;
use crate::fiber::{
	Revision, commit_resource_fiber, create_resource_fiber, render_resource_fiber,
	unmount_resource_fiber,
};
use crate::hooks::{tap_effect_with_deps, tap_memo, tap_state};
use crate::resource::{Element, Resource};

/// Mounts `element` as a child fiber of the current fiber and returns its
/// output.
///
/// The child fiber is kept for as long as the element's resource identity
/// stays the same. It re-renders on every render of the parent and whenever
/// its own state changes. It commits when the parent commits and unmounts
/// when the parent unmounts or the resource identity changes.
///
/// # Example
///
/// ```
/// use tap_core::{resource, tap_resource, tap_state};
///
/// let counter = resource(|start: i32| tap_state(start).0);
/// let doubled = resource(move |start: i32| tap_resource(counter.element(start)) * 2);
/// # let _ = doubled;
/// ```
pub fn tap_resource<P, R>(element: Element<P, R>) -> R
where
	P: Clone + 'static,
	R: Clone + 'static,
{
	let (resource, props) = element.into_parts();
	mount_child(resource, Rc::new((props, Revision::next())))
}

/// Like [`tap_resource`], re-rendering the child for new props only when
/// `deps` change.
///
/// The child still re-renders when its own state changes.
pub fn tap_resource_with_deps<P, R, D>(element: Element<P, R>, deps: D) -> R
where
	P: Clone + 'static,
	R: Clone + 'static,
	D: PartialEq + 'static,
{
	let (resource, props) = element.into_parts();
	let props = tap_memo(deps, move || Rc::new((props, Revision::next())));
	mount_child(resource, props)
}

fn mount_child<P, R>(resource: Resource<P, R>, props: Rc<(P, Revision)>) -> R
where
	P: Clone + 'static,
	R: Clone + 'static,
{
	let (version, set_version) = tap_state(0_u64);

	let fiber = tap_memo(resource.id(), move || {
		create_resource_fiber(resource, move || set_version.update(|version| version + 1))
	});

	let result = tap_memo((fiber.id(), props.1, version), {
		let fiber = fiber.clone();
		move || Rc::new(render_resource_fiber(&fiber, props.0.clone()).or_raise())
	});

	tap_effect_with_deps(fiber.id(), {
		let fiber = fiber.clone();
		move || Cleanup::new(move || unmount_resource_fiber(&fiber).or_raise())
	});

	tap_effect_with_deps((fiber.id(), result.revision()), {
		let result = Rc::clone(&result);
		move || commit_resource_fiber(&fiber, &result).or_raise()
	});

	result.output().clone()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TapError;
	use crate::fiber::ResourceFiber;
	use crate::hooks::{StateSetter, tap_effect};
	use crate::resource::resource;
	use core::cell::{Cell, RefCell};
	use rstest::rstest;

	fn commit_render<P: Clone, R>(fiber: &ResourceFiber<P, R>, props: P) -> R {
		let result = render_resource_fiber(fiber, props).unwrap();
		commit_resource_fiber(fiber, &result).unwrap();
		result.into_output()
	}

	#[rstest]
	fn test_child_state_change_rerenders_parent() {
		let child = resource(|()| tap_state(1));
		let parent = resource(move |()| {
			let (value, set_value) = tap_resource(child.element(()));
			(value * 10, set_value)
		});
		let parent_rerenders = Rc::new(Cell::new(0));
		let fiber = create_resource_fiber(parent, {
			let parent_rerenders = Rc::clone(&parent_rerenders);
			move || parent_rerenders.set(parent_rerenders.get() + 1)
		});

		let (value, set_value): (i32, StateSetter<i32>) = commit_render(&fiber, ());
		assert_eq!(value, 10);

		set_value.set(2);
		assert_eq!(parent_rerenders.get(), 1);
		assert_eq!(commit_render(&fiber, ()).0, 20);
	}

	#[rstest]
	fn test_identity_change_unmounts_previous_child_first() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let make = |name: &'static str| {
			let log = Rc::clone(&log);
			resource(move |()| {
				let log = Rc::clone(&log);
				tap_effect_with_deps((), move || {
					log.borrow_mut().push(format!("mount {name}"));
					Cleanup::new(move || log.borrow_mut().push(format!("unmount {name}")))
				});
				name
			})
		};
		let a = make("a");
		let b = make("b");
		let parent = resource(move |use_b: bool| {
			let element = if use_b { b.element(()) } else { a.element(()) };
			tap_resource(element)
		});
		let fiber = create_resource_fiber(parent, || {});

		assert_eq!(commit_render(&fiber, false), "a");
		assert_eq!(commit_render(&fiber, false), "a");
		assert_eq!(commit_render(&fiber, true), "b");
		unmount_resource_fiber(&fiber).unwrap();

		assert_eq!(
			*log.borrow(),
			vec!["mount a", "unmount a", "mount b", "unmount b"]
		);
	}

	#[rstest]
	fn test_deps_skip_child_rerender() {
		let renders = Rc::new(Cell::new(0));
		let child = resource({
			let renders = Rc::clone(&renders);
			move |n: u32| {
				renders.set(renders.get() + 1);
				n
			}
		});
		let parent = resource(move |(n, dep): (u32, u32)| {
			tap_resource_with_deps(child.element(n), dep)
		});
		let fiber = create_resource_fiber(parent, || {});

		assert_eq!(commit_render(&fiber, (1, 0)), 1);
		assert_eq!(commit_render(&fiber, (2, 0)), 1);
		assert_eq!(commit_render(&fiber, (3, 1)), 3);
		assert_eq!(renders.get(), 2);
	}

	#[rstest]
	fn test_child_errors_surface_from_parent_render() {
		let child = resource(|()| {
			let (n, set_n) = tap_state(0);
			set_n.set(n + 1);
		});
		let parent = resource(move |()| tap_resource(child.element(())));
		let fiber = create_resource_fiber(parent, || {});
		assert!(matches!(
			render_resource_fiber(&fiber, ()),
			Err(TapError::UpdateDuringRender)
		));
	}

	#[rstest]
	fn test_child_effects_run_after_parent_declares_them() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let child = resource({
			let log = Rc::clone(&log);
			move |()| {
				let log = Rc::clone(&log);
				tap_effect(move || log.borrow_mut().push("child"));
			}
		});
		let parent = resource({
			let log = Rc::clone(&log);
			move |()| {
				let log = Rc::clone(&log);
				tap_resource(child.element(()));
				tap_effect(move || log.borrow_mut().push("parent"));
			}
		});
		let fiber = create_resource_fiber(parent, || {});
		commit_render(&fiber, ());
		assert_eq!(*log.borrow(), vec!["child", "parent"]);
	}
}
