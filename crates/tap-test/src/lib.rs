//! # tap-test
//!
//! Testing utilities for tap resources.
//!
//! ## Features
//!
//! - **[`TestResource`]**: a fiber for an ad-hoc body, rendered and committed
//!   in one call
//! - **[`CallLog`]**: a shared recorder for effect and cleanup order
//! - **[`cleanup_all_resources`]**: unmounts every test resource still alive
//!   on this thread
//! - **[`capture_logs`]** / **[`init_test_logging`]**: runtime log output in tests
//!
//! ## Quick Start
//!
//! ```
//! use tap_core::tap_state;
//! use tap_test::create_test_resource;
//!
//! let counter = create_test_resource(|start: i32| tap_state(start));
//! let (count, set_count) = counter.render(1).unwrap();
//! assert_eq!(count, 1);
//!
//! set_count.set(5);
//! assert_eq!(counter.rerender_requests(), 1);
//! assert_eq!(counter.rerender().unwrap().0, 5);
//! ```

pub mod log;
pub mod logging;
pub mod resource;

pub use log::CallLog;
pub use logging::{capture_logs, init_test_logging};
pub use resource::{TestResource, cleanup_all_resources, create_test_resource, render_test};
