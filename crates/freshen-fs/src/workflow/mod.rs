pub mod group;
pub mod transaction;

pub use group::FileGroup;
pub use transaction::{AccessMode, FileTransaction, staging_dir};
