//! Test logging utilities
//!
//! Provides utilities for observing runtime log events in test environments.

use std::io;
use std::sync::{Arc, Mutex, Once};

use tracing_subscriber::fmt::MakeWriter;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
///
/// Installs a global `fmt` subscriber writing through the test harness'
/// captured output. Calling it again is a no-op.
///
/// # Examples
///
/// ```
/// use tap_test::init_test_logging;
///
/// init_test_logging();
/// ```
pub fn init_test_logging() {
	INIT.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_max_level(tracing::Level::TRACE)
			.with_test_writer()
			.try_init();
	});
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.0.lock() {
			Ok(mut bytes) => bytes.extend_from_slice(buf),
			Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
		}
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl<'a> MakeWriter<'a> for SharedBuffer {
	type Writer = SharedBuffer;

	fn make_writer(&'a self) -> Self::Writer {
		self.clone()
	}
}

/// Runs `f` with a subscriber capturing every event emitted on this thread,
/// returning `f`'s output and the formatted log lines.
///
/// ```
/// use tap_test::capture_logs;
///
/// let (value, logs) = capture_logs(|| {
///     tracing::warn!("careful");
///     7
/// });
/// assert_eq!(value, 7);
/// assert!(logs.contains("careful"));
/// ```
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
	let buffer = SharedBuffer::default();
	let subscriber = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::TRACE)
		.with_ansi(false)
		.with_writer(buffer.clone())
		.finish();

	let value = tracing::subscriber::with_default(subscriber, f);
	let bytes = match buffer.0.lock() {
		Ok(bytes) => bytes.clone(),
		Err(poisoned) => poisoned.into_inner().clone(),
	};
	(value, String::from_utf8_lossy(&bytes).into_owned())
}
