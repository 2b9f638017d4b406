//! Run lifecycle: directory allocation and the resolved run context.

pub mod allocator;
pub mod context;

pub use allocator::{Clock, PathAllocator, SystemClock, DEFAULT_ROOT};
pub use context::RunContext;
