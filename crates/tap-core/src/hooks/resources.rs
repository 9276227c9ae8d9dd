//! Keyed collection hook: tap_resources

use core::hash::Hash;

extern crate alloc;
use alloc::rc::Rc;
use alloc::vec::Vec;

use indexmap::IndexMap;

use crate::cell::Cleanup;
use crate::error::{OrRaise, collect_errors};
use crate::fiber::{
	RenderResult, ResourceFiber, commit_resource_fiber, create_resource_fiber,
	render_resource_fiber, unmount_resource_fiber,
};
use crate::hooks::{tap_callback, tap_effect, tap_effect_with_deps, tap_memo, tap_ref, tap_state};
use crate::resource::Element;

/// Mounts one child fiber per key of `map` and returns their outputs in the
/// order of `map`.
///
/// `get_element` builds the element for each entry. It is replaced only when
/// `deps` change, so it may capture values that are listed in `deps`.
///
/// For every key, an existing fiber is reused when the requested resource has
/// the same identity. Otherwise the old fiber (if any) is unmounted and a new
/// one is created. Keys missing from `map` are unmounted. At commit, removals
/// run before additions and additions before commits, so a key is never held
/// by two live fibers. A child that fails to unmount or commit does not stop
/// its siblings; the failures are raised together afterwards.
///
/// # Example
///
/// ```
/// use indexmap::IndexMap;
/// use tap_core::{resource, tap_resources};
///
/// let todo = resource(|title: String| title.to_uppercase());
/// let list = resource(move |todos: IndexMap<u32, String>| {
///     let todo = todo.clone();
///     tap_resources(todos, move |title, _id| todo.element(title.clone()), ())
/// });
/// # let _ = list;
/// ```
pub fn tap_resources<K, V, P, R, F, D>(map: IndexMap<K, V>, get_element: F, deps: D) -> IndexMap<K, R>
where
	K: Hash + Eq + Clone + 'static,
	P: Clone + 'static,
	R: Clone + 'static,
	F: Fn(&V, &K) -> Element<P, R> + 'static,
	D: PartialEq + 'static,
{
	let (_, set_version) = tap_state(0_u64);
	let rerender = tap_callback((), move |()| set_version.update(|version| version + 1));
	let fibers = tap_ref(IndexMap::<K, ResourceFiber<P, R>>::new());
	let get_element = tap_memo(deps, move || Rc::new(get_element));

	let mut removals: Vec<K> = Vec::new();
	let mut additions: Vec<(K, ResourceFiber<P, R>)> = Vec::new();
	let mut commits: Vec<(ResourceFiber<P, R>, RenderResult<P, R>)> = Vec::with_capacity(map.len());
	let mut outputs = IndexMap::with_capacity(map.len());

	for (key, value) in &map {
		let (resource, props) = get_element(value, key).into_parts();
		let existing = fibers.with(|fibers| fibers.get(key).cloned());

		let fiber = match existing {
			Some(fiber) if fiber.resource().id() == resource.id() => fiber,
			existing => {
				if existing.is_some() {
					removals.push(key.clone());
				}
				let rerender = rerender.clone();
				let fiber = create_resource_fiber(resource, move || rerender.call(()));
				additions.push((key.clone(), fiber.clone()));
				fiber
			}
		};

		let result = render_resource_fiber(&fiber, props).or_raise();
		outputs.insert(key.clone(), result.output().clone());
		commits.push((fiber, result));
	}

	fibers.with(|fibers| {
		removals.extend(fibers.keys().filter(|key| !map.contains_key(*key)).cloned());
	});

	tap_effect_with_deps((), {
		let fibers = fibers.clone();
		move || {
			Cleanup::new(move || {
				let remaining: Vec<_> = fibers.with_mut(|fibers| fibers.drain(..).map(|(_, fiber)| fiber).collect());
				let errors = remaining
					.iter()
					.filter_map(|fiber| unmount_resource_fiber(fiber).err())
					.collect();
				collect_errors(errors).or_raise();
			})
		}
	});

	tap_effect(move || {
		let mut errors = Vec::new();
		for key in removals {
			if let Some(fiber) = fibers.with_mut(|fibers| fibers.shift_remove(&key)) {
				errors.extend(unmount_resource_fiber(&fiber).err());
			}
		}
		fibers.with_mut(|fibers| fibers.extend(additions));
		for (fiber, result) in commits {
			errors.extend(commit_resource_fiber(&fiber, &result).err());
		}
		collect_errors(errors).or_raise();
	});

	outputs
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TapError;
	use crate::hooks::tap_state;
	use crate::resource::{Resource, resource};
	use core::cell::RefCell;
	use rstest::rstest;

	type Log = Rc<RefCell<Vec<String>>>;

	fn tracked(log: &Log, tag: &'static str) -> Resource<String, String> {
		let log = Rc::clone(log);
		resource(move |name: String| {
			let log = Rc::clone(&log);
			let label = format!("{tag}:{name}");
			let effect_label = label.clone();
			tap_effect_with_deps((), move || {
				log.borrow_mut().push(format!("mount {effect_label}"));
				Cleanup::new(move || log.borrow_mut().push(format!("unmount {effect_label}")))
			});
			label
		})
	}

	/// Children whose cleanup fails when their name starts with `!`.
	fn fragile(log: &Log) -> Resource<String, ()> {
		let log = Rc::clone(log);
		resource(move |name: String| {
			let log = Rc::clone(&log);
			tap_effect_with_deps((), move || {
				Cleanup::new(move || {
					log.borrow_mut().push(format!("unmount {name}"));
					if name.starts_with('!') {
						let uncommitted = create_resource_fiber(resource(|()| tap_state(0)), || {});
						let (_, set_value) = render_resource_fiber(&uncommitted, ()).unwrap().into_output();
						set_value.set(1);
					}
				})
			});
		})
	}

	fn fragile_list(log: &Log) -> ResourceFiber<IndexMap<String, String>, IndexMap<String, ()>> {
		let item = fragile(log);
		let list = resource(move |map: IndexMap<String, String>| {
			let item = item.clone();
			tap_resources(map, move |value: &String, _key: &String| item.element(value.clone()), ())
		});
		create_resource_fiber(list, || {})
	}

	fn entries(items: &[(&str, &str)]) -> IndexMap<String, String> {
		items
			.iter()
			.map(|(key, value)| (key.to_string(), value.to_string()))
			.collect()
	}

	fn commit_render<P: Clone, R>(fiber: &ResourceFiber<P, R>, props: P) -> R {
		let result = render_resource_fiber(fiber, props).unwrap();
		commit_resource_fiber(fiber, &result).unwrap();
		result.into_output()
	}

	#[rstest]
	fn test_outputs_follow_map_order() {
		let log = Log::default();
		let item = tracked(&log, "item");
		let list = resource(move |map: IndexMap<String, String>| {
			let item = item.clone();
			tap_resources(map, move |value: &String, _key: &String| item.element(value.clone()), ())
		});
		let fiber = create_resource_fiber(list, || {});

		let outputs = commit_render(&fiber, entries(&[("b", "2"), ("a", "1")]));
		assert_eq!(
			outputs.into_iter().collect::<Vec<_>>(),
			vec![
				("b".to_string(), "item:2".to_string()),
				("a".to_string(), "item:1".to_string()),
			]
		);
	}

	#[rstest]
	fn test_removed_keys_are_unmounted_and_kept_keys_preserved() {
		let log = Log::default();
		let item = tracked(&log, "item");
		let list = resource(move |map: IndexMap<String, String>| {
			let item = item.clone();
			tap_resources(map, move |value: &String, _key: &String| item.element(value.clone()), ())
		});
		let fiber = create_resource_fiber(list, || {});

		commit_render(&fiber, entries(&[("a", "1"), ("b", "2")]));
		commit_render(&fiber, entries(&[("b", "2")]));

		assert_eq!(
			*log.borrow(),
			vec!["mount item:1", "mount item:2", "unmount item:1"]
		);
	}

	#[rstest]
	fn test_type_change_replaces_before_creating() {
		let log = Log::default();
		let old = tracked(&log, "old");
		let new = tracked(&log, "new");
		let list = resource(move |(map, use_new): (IndexMap<String, String>, bool)| {
			let kind = if use_new { new.clone() } else { old.clone() };
			tap_resources(map, move |value: &String, _key: &String| kind.element(value.clone()), use_new)
		});
		let fiber = create_resource_fiber(list, || {});

		commit_render(&fiber, (entries(&[("k", "x")]), false));
		let outputs = commit_render(&fiber, (entries(&[("k", "x")]), true));

		assert_eq!(outputs["k"], "new:x");
		assert_eq!(
			*log.borrow(),
			vec!["mount old:x", "unmount old:x", "mount new:x"]
		);
	}

	#[rstest]
	fn test_parent_unmount_unmounts_every_child() {
		let log = Log::default();
		let item = tracked(&log, "item");
		let list = resource(move |map: IndexMap<String, String>| {
			let item = item.clone();
			tap_resources(map, move |value: &String, _key: &String| item.element(value.clone()), ())
		});
		let fiber = create_resource_fiber(list, || {});

		commit_render(&fiber, entries(&[("a", "1"), ("b", "2")]));
		unmount_resource_fiber(&fiber).unwrap();

		let log = log.borrow();
		assert!(log.contains(&"unmount item:1".to_string()));
		assert!(log.contains(&"unmount item:2".to_string()));
	}

	#[rstest]
	fn test_child_state_survives_parent_rerender() {
		let counter = resource(|()| tap_state(0_i32));
		let list = resource(move |keys: IndexMap<u8, ()>| {
			let counter = counter.clone();
			tap_resources(keys, move |_: &(), _: &u8| counter.element(()), ())
		});
		let requests = Rc::new(core::cell::Cell::new(0));
		let fiber = create_resource_fiber(list, {
			let requests = Rc::clone(&requests);
			move || requests.set(requests.get() + 1)
		});

		let keys: IndexMap<u8, ()> = [(1, ()), (2, ())].into_iter().collect();
		let outputs = commit_render(&fiber, keys.clone());
		outputs[&1].1.set(5);
		assert_eq!(requests.get(), 1);

		let outputs = commit_render(&fiber, keys);
		assert_eq!(outputs[&1].0, 5);
		assert_eq!(outputs[&2].0, 0);
	}

	#[rstest]
	fn test_failing_child_unmount_does_not_skip_siblings() {
		let log = Log::default();
		let fiber = fragile_list(&log);
		commit_render(&fiber, entries(&[("a", "!a"), ("b", "b"), ("c", "!c")]));

		let error = unmount_resource_fiber(&fiber).unwrap_err();

		assert_eq!(*log.borrow(), vec!["unmount !a", "unmount b", "unmount !c"]);
		let failures = error.into_errors();
		assert_eq!(failures.len(), 2);
		assert!(failures.iter().all(|error| matches!(error, TapError::UpdateBeforeMount)));
	}

	#[rstest]
	fn test_failing_removal_does_not_skip_other_removals() {
		let log = Log::default();
		let fiber = fragile_list(&log);
		commit_render(&fiber, entries(&[("a", "!a"), ("b", "b")]));

		let result = render_resource_fiber(&fiber, entries(&[("c", "c")])).unwrap();
		let error = commit_resource_fiber(&fiber, &result).unwrap_err();

		assert!(matches!(error, TapError::UpdateBeforeMount));
		assert_eq!(*log.borrow(), vec!["unmount !a", "unmount b"]);

		unmount_resource_fiber(&fiber).unwrap();
		assert_eq!(*log.borrow(), vec!["unmount !a", "unmount b", "unmount c"]);
	}
}
