pub mod adaptation;
pub mod config;
pub mod corpus;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod segment;
pub mod services;
pub mod stage;
pub mod telemetry;
pub mod validation;

pub use config::{AdaptationConfig, Settings};
pub use error::{AdaptationError, Result};
pub use orchestrator::DurationValidatedOrchestrator;
pub use stage::AdaptationStage;
