//! Core abstractions for the wave engine
//!
//! This crate holds the data model every other crate builds on: dynamic
//! values, parameter tables, the [`Producer`] trait and its graph arena,
//! relation conditions, the per-run context and the declarative definition
//! types. Scheduling lives in `waveruntime`.

pub mod condition;
mod context;
mod definition;
mod error;
pub mod events;
mod graph;
pub mod parameter;
mod producer;
mod relation;
mod result;
mod value;

pub use condition::{CompareOp, ConditionExpr};
pub use context::{RunLedger, WorkflowContext};
pub use definition::{ProducerDefinition, RelationDefinition, WorkflowDefinition};
pub use error::{ProduceError, ProducerError, WorkflowError};
pub use events::{EventBus, ExecutionEvent, ExecutionId};
pub use graph::{ProducerGraph, ProducerId};
pub use parameter::{ParameterDescriptor, ParameterMap, ParameterSpec, ParameterTable, ParameterType};
pub use producer::{ErrorHandler, ProceedHook, Producer, ProducerNode};
pub use relation::{Condition, NativePredicate, Relation, RelationId, RelationOptions};
pub use result::{ProduceResult, RunOptions, WorkflowResult};
pub use value::{Value, ValueKind};

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
