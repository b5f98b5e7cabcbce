//! Batch execution of fetches and artifacts.
//!
//! A [`Scheduler`] runs [`Job`]s either in this process, sharing one HTTP
//! session ([`Backend::Single`]), or one child process per job
//! ([`Backend::Workers`]). Status records from every job flow through one
//! bounded channel into a [`Renderer`] on its own thread; the merged
//! per-path view becomes the [`BatchSummary`].

mod config;
mod display;
mod error;
mod guard;
mod job;
mod live;
mod render;
mod scheduler;
mod worker;

pub use config::{Backend, ErrorMode, PathDisplay, SchedulerConfig, TransferSettings, WorkerCommand};
pub use display::PathFormatter;
pub use error::{Result, SchedError};
pub use guard::guard;
pub use job::{Job, JobDescriptor, WorkerRequest};
pub use live::{BatchSummary, LiveView};
pub use render::{BarRenderer, PlainRenderer, Renderer, SilentRenderer};
pub use scheduler::Scheduler;
pub use worker::serve_worker;
