use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use wavecore::{ParameterDescriptor, ParameterTable, ProduceError, Producer, Value, WorkflowContext};

type SyncBody = dyn Fn(Vec<Value>, &ParameterTable, &WorkflowContext) -> Result<Vec<Value>, ProduceError>
    + Send
    + Sync;

type AsyncBody = dyn Fn(Vec<Value>, ParameterTable, WorkflowContext) -> BoxFuture<'static, Result<Vec<Value>, ProduceError>>
    + Send
    + Sync;

enum Body {
    Sync(Arc<SyncBody>),
    Async(Arc<AsyncBody>),
}

/// A producer around a native closure. Built in code only; it has no
/// factory because a closure cannot be named in a definition.
pub struct WrapProducer {
    body: Body,
    parameters: ParameterDescriptor,
}

impl WrapProducer {
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(Vec<Value>, &ParameterTable, &WorkflowContext) -> Result<Vec<Value>, ProduceError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            body: Body::Sync(Arc::new(body)),
            parameters: ParameterDescriptor::default(),
        }
    }

    /// The closure receives owned copies of the parameters and the context
    /// so the returned future can outlive the call.
    pub fn from_async<F>(body: F) -> Self
    where
        F: Fn(Vec<Value>, ParameterTable, WorkflowContext) -> BoxFuture<'static, Result<Vec<Value>, ProduceError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            body: Body::Async(Arc::new(body)),
            parameters: ParameterDescriptor::default(),
        }
    }

    /// Declare accepted parameters. Without this any parameter is accepted.
    pub fn with_parameters(mut self, parameters: ParameterDescriptor) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl Producer for WrapProducer {
    fn producer_type(&self) -> &str {
        "wrap"
    }

    fn introduce(&self) -> String {
        "Wraps a native function".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        self.parameters.clone()
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        match &self.body {
            Body::Sync(body) => body(input, params, ctx),
            Body::Async(body) => body(input, params.clone(), ctx.clone()).await,
        }
    }
}
