//! Lightweight adaptation (no synthesis probing), the worker pool shared
//! with the stage runner, and batch statistics.

pub mod pool;
pub mod service;
pub mod stats;

pub use pool::{PoolOutcome, WorkerPool};
pub use service::AdaptationService;
pub use stats::{summary_report, AdaptationResult, AdaptationStats};
