use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Values emitted by one producer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceResult {
    pub producer: String,
    pub data: Vec<Value>,
}

impl ProduceResult {
    pub fn new(producer: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            producer: producer.into(),
            data,
        }
    }
}

/// Outcome of a `run()`.
///
/// `finished` is false when the run was stopped before its queue drained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub data: Vec<ProduceResult>,
    pub finished: bool,
}

impl WorkflowResult {
    pub fn last(&self) -> Option<&ProduceResult> {
        self.data.last()
    }

    /// Data of the final entry, or nothing when the pool was empty.
    pub fn last_data(&self) -> &[Value] {
        self.data.last().map(|r| r.data.as_slice()).unwrap_or_default()
    }

    pub fn find(&self, producer: &str) -> Option<&ProduceResult> {
        self.data.iter().find(|r| r.producer == producer)
    }
}

/// Options accepted by `run()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Wrap a non-array input into a one-element array.
    pub single_input: bool,
    /// Keep only the final pool entry in the result.
    pub return_last: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single_input(mut self, yes: bool) -> Self {
        self.single_input = yes;
        self
    }

    pub fn return_last(mut self, yes: bool) -> Self {
        self.return_last = yes;
        self
    }
}
