//! Staged, lock-guarded file access.
//!
//! [`FileTransaction`] gives a writer a private staging path that replaces
//! the final path only on commit, and gives readers a shared lock that keeps
//! writers out while they look. [`FileGroup`] does the same for several
//! paths at once.

mod error;
pub mod lock;
pub mod primitives;
pub mod workflow;

pub use error::{Error, Result};
pub use lock::{LockFile, LockKind};
pub use primitives::{PublishOptions, discard, modified_utc, publish, set_times, to_utc};
pub use workflow::{AccessMode, FileGroup, FileTransaction};
