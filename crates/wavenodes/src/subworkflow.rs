//! Producers that run a nested workflow.
//!
//! A nested workflow is either loaded from the `definition` parameter
//! through the registry the producer came from, or wraps a manager built in
//! code. The registry is held weakly: it owns the factories that create
//! these producers, so a strong handle would keep it alive forever.

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use wavecore::{
    ConditionExpr, ParameterDescriptor, ParameterMap, ParameterSpec, ParameterTable, ParameterType,
    ProduceError, Producer, RunOptions, Value, WorkflowContext, WorkflowDefinition,
};
use waveruntime::{ProducerFactory, ProducerMetadata, ProducerRegistry, WorkflowManager};

enum Source {
    Registry(Weak<ProducerRegistry>),
    Prebuilt(Arc<WorkflowManager>),
}

/// Runs a nested workflow on its input and returns the last result's data
pub struct SubWorkflowProducer {
    source: Source,
}

impl SubWorkflowProducer {
    /// Load the nested workflow from the `definition` parameter.
    pub fn new(registry: Weak<ProducerRegistry>) -> Self {
        Self {
            source: Source::Registry(registry),
        }
    }

    /// Run `manager` on every call. Each call works on a shallow clone, so
    /// concurrent calls do not conflict.
    pub fn from_manager(manager: Arc<WorkflowManager>) -> Self {
        Self {
            source: Source::Prebuilt(manager),
        }
    }

    fn descriptor(&self) -> ParameterDescriptor {
        let env = ParameterSpec::optional(
            "env",
            ParameterType::OBJECT,
            "Entries patched over the parent environment",
        )
        .with_default(Value::Object(Default::default()));
        match self.source {
            Source::Registry(_) => ParameterDescriptor::new()
                .with(ParameterSpec::required(
                    "definition",
                    ParameterType::ARRAY | ParameterType::OBJECT,
                    "Workflow definition, or a list of them",
                ))
                .with(env),
            Source::Prebuilt(_) => ParameterDescriptor::new().with(env),
        }
    }

    fn registry(&self) -> Result<Option<Arc<ProducerRegistry>>, ProduceError> {
        match &self.source {
            Source::Registry(weak) => weak.upgrade().map(Some).ok_or_else(|| {
                ProduceError::ExecutionFailed("Producer registry is no longer available".to_string())
            }),
            Source::Prebuilt(_) => Ok(None),
        }
    }

    /// Load definitions eagerly so a broken nested workflow is reported
    /// when the parent is loaded.
    fn check_definition(&self, params: &ParameterMap) -> Result<(), ProduceError> {
        let Some(raw) = params.get("definition") else {
            return Ok(());
        };
        let definitions = WorkflowDefinition::list_from_value(raw.to_json())
            .map_err(|e| ProduceError::Parameter(e.to_string()))?;
        if let Some(registry) = self.registry()? {
            WorkflowManager::from_definitions(registry.as_ref(), &definitions)
                .map_err(|e| ProduceError::Parameter(format!("Invalid nested workflow: {}", e)))?;
        }
        Ok(())
    }

    fn workflow(&self, params: &ParameterTable) -> Result<WorkflowManager, ProduceError> {
        match &self.source {
            Source::Prebuilt(manager) => Ok(manager.shallow_clone()),
            Source::Registry(_) => {
                let registry = self.registry()?.ok_or_else(|| {
                    ProduceError::ExecutionFailed("Producer registry is no longer available".to_string())
                })?;
                let raw = params
                    .get("definition")
                    .ok_or_else(|| ProduceError::MissingInput("definition".to_string()))?;
                let definitions = WorkflowDefinition::list_from_value(raw.to_json())?;
                Ok(WorkflowManager::from_definitions(registry.as_ref(), &definitions)?)
            }
        }
    }

    fn environment(params: &ParameterTable, ctx: &WorkflowContext) -> ParameterMap {
        let mut environment = ctx.environment().clone();
        if let Some(overrides) = params.get("env").and_then(Value::as_object) {
            environment.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        environment
    }
}

#[async_trait]
impl Producer for SubWorkflowProducer {
    fn producer_type(&self) -> &str {
        "sub_workflow"
    }

    fn introduce(&self) -> String {
        "Run a nested workflow on the input".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        self.descriptor()
    }

    fn check_parameters(&self, params: ParameterMap, partial: bool) -> Result<ParameterMap, ProduceError> {
        let params = self
            .descriptor()
            .validate(params, partial)
            .map_err(ProduceError::Parameter)?;
        self.check_definition(&params)?;
        Ok(params)
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let workflow = self.workflow(params)?;
        let environment = Self::environment(params, ctx);
        let result = workflow
            .run(Value::Array(input), environment, RunOptions::default())
            .await?;
        Ok(result.last_data().to_vec())
    }
}

/// Runs a nested workflow repeatedly, feeding each output into the next run
pub struct RepeatWorkflowProducer {
    inner: SubWorkflowProducer,
}

impl RepeatWorkflowProducer {
    pub fn new(registry: Weak<ProducerRegistry>) -> Self {
        Self {
            inner: SubWorkflowProducer::new(registry),
        }
    }

    pub fn from_manager(manager: Arc<WorkflowManager>) -> Self {
        Self {
            inner: SubWorkflowProducer::from_manager(manager),
        }
    }

    fn until(params: &ParameterMap) -> Result<Option<ConditionExpr>, ProduceError> {
        params
            .get("until")
            .map(|raw| {
                serde_json::from_value(raw.to_json())
                    .map_err(|e| ProduceError::Parameter(format!("Invalid until condition: {}", e)))
            })
            .transpose()
    }
}

#[async_trait]
impl Producer for RepeatWorkflowProducer {
    fn producer_type(&self) -> &str {
        "repeat_workflow"
    }

    fn introduce(&self) -> String {
        "Run a nested workflow in a loop, each round consuming the previous output".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        self.inner
            .descriptor()
            .with(ParameterSpec::required(
                "times",
                ParameterType::NUMBER,
                "Maximum number of rounds",
            ))
            .with(ParameterSpec::optional(
                "until",
                ParameterType::OBJECT,
                "Condition on the round's output that ends the loop early",
            ))
    }

    fn check_parameters(&self, params: ParameterMap, partial: bool) -> Result<ParameterMap, ProduceError> {
        let params = self
            .parameter_structure()
            .validate(params, partial)
            .map_err(ProduceError::Parameter)?;
        if let Some(times) = params.get("times").and_then(Value::as_f64) {
            if times < 0.0 || times.fract() != 0.0 {
                return Err(ProduceError::Parameter(format!(
                    "Parameter \"times\" must be a non-negative integer, got {}",
                    times
                )));
            }
        }
        Self::until(&params)?;
        self.inner.check_definition(&params)?;
        Ok(params)
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let times = params
            .get_f64("times")
            .ok_or_else(|| ProduceError::MissingInput("times".to_string()))? as u64;
        let until = Self::until(&params.to_map())?;
        if times == 0 {
            return Ok(input);
        }
        let workflow = self.inner.workflow(params)?;
        let environment = SubWorkflowProducer::environment(params, ctx);

        let mut data = input;
        for round in 1..=times {
            let result = workflow
                .run(Value::Array(data), environment.clone(), RunOptions::default())
                .await?;
            data = result.last_data().to_vec();
            if let Some(until) = &until {
                let output = Value::Array(data.clone());
                if until.evaluate(&output).map_err(ProduceError::ExecutionFailed)? {
                    tracing::debug!("Repeat loop ended after round {} of {}", round, times);
                    break;
                }
            }
        }
        Ok(data)
    }
}

pub struct SubWorkflowProducerFactory {
    registry: Weak<ProducerRegistry>,
}

impl SubWorkflowProducerFactory {
    pub fn new(registry: Weak<ProducerRegistry>) -> Self {
        Self { registry }
    }
}

impl ProducerFactory for SubWorkflowProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(SubWorkflowProducer::new(self.registry.clone()))
    }

    fn producer_type(&self) -> &str {
        "sub_workflow"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Run a nested workflow on the input".to_string(),
            category: "workflow".to_string(),
            parameters: SubWorkflowProducer::new(Weak::new()).parameter_structure(),
        }
    }
}

pub struct RepeatWorkflowProducerFactory {
    registry: Weak<ProducerRegistry>,
}

impl RepeatWorkflowProducerFactory {
    pub fn new(registry: Weak<ProducerRegistry>) -> Self {
        Self { registry }
    }
}

impl ProducerFactory for RepeatWorkflowProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(RepeatWorkflowProducer::new(self.registry.clone()))
    }

    fn producer_type(&self) -> &str {
        "repeat_workflow"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Run a nested workflow in a loop".to_string(),
            category: "workflow".to_string(),
            parameters: RepeatWorkflowProducer::new(Weak::new()).parameter_structure(),
        }
    }
}
