//! Call recorder for effect and cleanup ordering.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A shared, append-only list of labels.
///
/// Clones share the same list, so a log can be captured by many effects and
/// inspected by the test afterwards.
///
/// ```
/// use tap_test::CallLog;
///
/// let log = CallLog::new();
/// let record = log.recorder("tick");
/// record();
/// record();
/// assert_eq!(log.entries(), vec!["tick", "tick"]);
/// ```
#[derive(Clone, Default)]
pub struct CallLog {
	entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
	/// Creates an empty log.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an entry.
	pub fn push(&self, entry: impl Into<String>) {
		self.entries.borrow_mut().push(entry.into());
	}

	/// A closure that appends `label` each time it is called.
	pub fn recorder(&self, label: impl Into<String>) -> impl Fn() + 'static {
		let log = self.clone();
		let label = label.into();
		move || log.push(label.clone())
	}

	/// A copy of every entry so far.
	pub fn entries(&self) -> Vec<String> {
		self.entries.borrow().clone()
	}

	/// Returns every entry so far and clears the log.
	pub fn take(&self) -> Vec<String> {
		std::mem::take(&mut *self.entries.borrow_mut())
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Whether nothing was recorded.
	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	/// Number of entries equal to `entry`.
	pub fn count(&self, entry: &str) -> usize {
		self.entries.borrow().iter().filter(|e| *e == entry).count()
	}
}

impl fmt::Debug for CallLog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.entries.borrow().iter()).finish()
	}
}
