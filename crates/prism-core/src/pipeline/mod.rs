//! Report generation pipeline.
//!
//! One run per (topic, model): query expansion, knowledge retrieval and
//! structured generation, in that order. [`FanOutCoordinator`] runs one
//! pipeline per selected model concurrently and returns their outcomes in
//! selection order.

pub mod executor;
pub mod fanout;
pub mod outcome;
pub mod stages;
pub mod state;

pub use executor::PipelineExecutor;
pub use fanout::{FanOutCoordinator, RetryPolicy};
pub use outcome::PipelineOutcome;
pub use state::{Phase, RunState, Stage, StateUpdate};
