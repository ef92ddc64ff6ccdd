#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wavecore::{
    ParameterDescriptor, ParameterSpec, ParameterTable, ParameterType, ProduceError, Producer,
    ProducerGraph, ProducerNode, RelationOptions, Value, WorkflowContext,
};
use waveruntime::{ProducerFactory, WorkflowManager};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Returns its input, followed by the `tag` parameter when set.
pub struct Echo;

#[async_trait]
impl Producer for Echo {
    fn producer_type(&self) -> &str {
        "echo"
    }

    fn introduce(&self) -> String {
        "Returns its input".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new().with(ParameterSpec::optional("tag", ParameterType::ANY, "value appended to the output"))
    }

    async fn produce(
        &self,
        mut input: Vec<Value>,
        params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        if let Some(tag) = params.get("tag") {
            input.push(tag.clone());
        }
        Ok(input)
    }
}

/// Ignores its input and emits the `values` parameter.
pub struct Emit;

#[async_trait]
impl Producer for Emit {
    fn producer_type(&self) -> &str {
        "emit"
    }

    fn introduce(&self) -> String {
        "Emits fixed values".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new()
            .with(ParameterSpec::optional("values", ParameterType::ARRAY, "values to emit").with_default(Vec::<Value>::new()))
    }

    async fn produce(
        &self,
        _input: Vec<Value>,
        params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        Ok(params
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

/// Always fails.
pub struct Fail;

#[async_trait]
impl Producer for Fail {
    fn producer_type(&self) -> &str {
        "fail"
    }

    fn introduce(&self) -> String {
        "Always fails".to_string()
    }

    async fn produce(
        &self,
        _input: Vec<Value>,
        _params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        Err(ProduceError::ExecutionFailed("boom".to_string()))
    }
}

/// Cancels the run, then returns its input.
pub struct Canceller;

#[async_trait]
impl Producer for Canceller {
    fn producer_type(&self) -> &str {
        "canceller"
    }

    fn introduce(&self) -> String {
        "Cancels the run".to_string()
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        _params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        ctx.cancel();
        Ok(input)
    }
}

/// Emits `[flag parameter (or null), number of positional inputs]`.
pub struct InjectProbe;

#[async_trait]
impl Producer for InjectProbe {
    fn producer_type(&self) -> &str {
        "inject_probe"
    }

    fn introduce(&self) -> String {
        "Reports the injected flag".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new().with(ParameterSpec::optional("flag", ParameterType::ANY, "injected value"))
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let flag = params.get("flag").cloned().unwrap_or_default();
        Ok(vec![flag, Value::from(input.len())])
    }
}

/// Emits the `region` environment entry.
pub struct EnvRead;

#[async_trait]
impl Producer for EnvRead {
    fn producer_type(&self) -> &str {
        "env_read"
    }

    fn introduce(&self) -> String {
        "Reads the environment".to_string()
    }

    async fn produce(
        &self,
        _input: Vec<Value>,
        _params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        Ok(vec![ctx.env("region").cloned().unwrap_or_default()])
    }
}

/// Returns its input and records the largest result pool it has seen.
pub struct PoolProbe {
    pub max_pool: Arc<AtomicUsize>,
}

#[async_trait]
impl Producer for PoolProbe {
    fn producer_type(&self) -> &str {
        "pool_probe"
    }

    fn introduce(&self) -> String {
        "Watches the result pool".to_string()
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        _params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        self.max_pool.fetch_max(ctx.data_pool_len(), Ordering::SeqCst);
        Ok(input)
    }
}

pub struct EchoFactory;

impl ProducerFactory for EchoFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(Echo)
    }

    fn producer_type(&self) -> &str {
        "echo"
    }
}

pub struct EmitFactory;

impl ProducerFactory for EmitFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(Emit)
    }

    fn producer_type(&self) -> &str {
        "emit"
    }
}

/// Activator used by loader tests.
pub fn activate(tag: &str) -> Option<Box<dyn Producer>> {
    match tag {
        "echo" => Some(Box::new(Echo)),
        "emit" => Some(Box::new(Emit)),
        "fail" => Some(Box::new(Fail)),
        "inject_probe" => Some(Box::new(InjectProbe)),
        _ => None,
    }
}

pub fn emit(id: &str, values: Vec<Value>) -> ProducerNode {
    ProducerNode::new(id, Emit)
        .with_parameters([("values".to_string(), Value::Array(values))].into())
        .unwrap()
}

pub fn echo(id: &str) -> ProducerNode {
    ProducerNode::new(id, Echo)
}

pub fn tagged(id: &str, tag: &str) -> ProducerNode {
    ProducerNode::new(id, Echo)
        .with_parameters([("tag".to_string(), Value::from(tag))].into())
        .unwrap()
}

pub fn slow(id: &str, millis: u64) -> ProducerNode {
    echo(id).with_running_delay(Duration::from_millis(millis))
}

/// Assembles a graph by producer id.
#[derive(Default)]
pub struct GraphBuilder {
    graph: ProducerGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, node: ProducerNode) -> Self {
        self.graph.add_producer(node).unwrap();
        self
    }

    pub fn link(self, from: &str, to: &str) -> Self {
        self.link_with(from, to, RelationOptions::new())
    }

    pub fn link_with(mut self, from: &str, to: &str, options: RelationOptions) -> Self {
        let from = self.graph.find(from).unwrap();
        let to = self.graph.find(to).unwrap();
        self.graph.relate(from, to, options).unwrap();
        self
    }

    pub fn build(self, entrance: &str) -> WorkflowManager {
        let mut manager = WorkflowManager::from_graph(self.graph);
        manager.set_entrance(entrance).unwrap();
        manager
    }
}

/// A linear chain `ids[0] -> ids[1] -> ...` of slow echo producers.
pub fn slow_chain(ids: &[&str], millis: u64) -> WorkflowManager {
    let mut builder = GraphBuilder::new();
    for id in ids {
        builder = builder.add(slow(id, millis));
    }
    for pair in ids.windows(2) {
        builder = builder.link(pair[0], pair[1]);
    }
    builder.build(ids[0])
}
