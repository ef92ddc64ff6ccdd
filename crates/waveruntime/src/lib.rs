//! Workflow execution runtime
//!
//! This crate provides the wave scheduler that runs producer graphs, the
//! pause/stop/resume control surface, the producer registry and the
//! declarative loader.

mod control;
mod loader;
mod manager;
mod registry;
mod runtime;

pub use manager::{ResultObserver, WorkflowHandle, WorkflowManager};
pub use registry::{ProducerActivator, ProducerFactory, ProducerMetadata, ProducerRegistry};
pub use runtime::{RuntimeConfig, WaveRuntime};
