//! Control-loop engine: timestamps, convergence rules, and the scheduler.

/// Monotonic timestamp sources.
pub mod clock;
pub mod controller;
pub mod scheduler;
pub mod types;

pub use scheduler::{LoopHandle, Scheduler};
pub use types::{LoopState, LoopStats, TickPlan, TickReport};
