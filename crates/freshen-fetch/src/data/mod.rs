//! Configuration and value types.

pub mod options;
pub mod progress;
pub mod spec;

pub use options::FetchOptions;
pub use progress::{MOMENTUM, Throughput};
pub use spec::{FetchSpec, ResumeFallback};
