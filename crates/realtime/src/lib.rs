//! Live connection counter for the browser extension.
//!
//! The counter and the live channel sit behind [`LiveBackend`]: Redis in
//! production, an in-process backend for single-instance runs and tests.
//! With Redis each open stream gets its own subscriber connection. When no
//! backend is reachable every stream degrades to a single zero count.

#![warn(clippy::unwrap_used)]

pub mod backend;
pub mod counter;
pub mod event;
pub mod memory;
pub mod stream;

pub use backend::{LiveBackend, RedisBackend};
pub use counter::ConnectionCounter;
pub use event::{parse_live_message, LiveEvent};
pub use memory::MemoryBackend;
pub use stream::{dashboard_stream, extension_stream, ConnectionGuard, LiveStream};
