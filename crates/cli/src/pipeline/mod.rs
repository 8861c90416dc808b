//! Pipeline orchestration module.

mod orchestrator;

pub use orchestrator::DispatchPipeline;
