//! Background jobs.

pub mod scheduler;

pub use scheduler::{Scheduler, SchedulerConfig, register_cache_sweep};
