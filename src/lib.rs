//! Phased test-execution orchestrator.
//!
//! Runs end-to-end test suites through an ordered, dependency-gated phase
//! pipeline: environment preparation, discovered test phases with
//! configurable concurrency and success criteria, and best-effort cleanup.

pub mod context;
pub mod criteria;
pub mod discovery;
pub mod errors;
pub mod executor;
pub mod gate;
pub mod orchestrator;
pub mod phase;
pub mod planner;
pub mod report;
pub mod resources;
pub mod runner;
pub mod systask;
pub mod task;
pub mod ui;
