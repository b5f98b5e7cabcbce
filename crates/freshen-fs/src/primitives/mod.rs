pub mod publish;
pub mod seed;
pub mod times;

pub use publish::{PublishOptions, discard, publish};
pub use seed::{copy_dir_all, seed};
pub use times::{modified_utc, set_times, system_time_from_utc, to_utc};
