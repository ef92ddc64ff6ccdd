use crate::context::WorkflowContext;
use crate::error::{ProduceError, ProducerError};
use crate::parameter::{ParameterDescriptor, ParameterMap, ParameterTable};
use crate::relation::RelationId;
use crate::value::Value;
use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Core trait that every graph node implementation provides.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Type tag used by registries (e.g. "data_pick", "sub_workflow").
    fn producer_type(&self) -> &str;

    /// Human-readable description.
    fn introduce(&self) -> String;

    /// Accepted parameters. The default accepts anything.
    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::default()
    }

    /// Validate and normalize parameters, at initialization (`partial ==
    /// false`) and before every per-call override (`partial == true`).
    fn check_parameters(&self, params: ParameterMap, partial: bool) -> Result<ParameterMap, ProduceError> {
        self.parameter_structure()
            .validate(params, partial)
            .map_err(ProduceError::Parameter)
    }

    /// Turn input values into output values.
    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError>;
}

/// Post-processing applied to a producer's output.
pub type ProceedHook = Arc<dyn Fn(Vec<Value>) -> Vec<Value> + Send + Sync>;

/// Local recovery for a failed `produce`. Returning `Err` aborts the run.
pub type ErrorHandler = Arc<
    dyn Fn(&ProducerError, &ParameterTable, &WorkflowContext) -> Result<Vec<Value>, ProducerError>
        + Send
        + Sync,
>;

/// A producer placed in a graph: identity, configuration, delays, hooks and
/// its edge lists.
pub struct ProducerNode {
    id: String,
    producer: Box<dyn Producer>,
    parameters: ParameterTable,
    description: Option<String>,
    running_delay: Duration,
    reply_delay: Duration,
    proceed: Option<ProceedHook>,
    error_handler: Option<ErrorHandler>,
    pub(crate) parents: Vec<RelationId>,
    pub(crate) children: Vec<RelationId>,
}

impl ProducerNode {
    pub fn new(id: impl Into<String>, producer: impl Producer + 'static) -> Self {
        Self::boxed(Some(id.into()), Box::new(producer))
    }

    /// Wrap an already boxed producer. Without an id a random upper-case
    /// UUID is assigned.
    pub fn boxed(id: Option<String>, producer: Box<dyn Producer>) -> Self {
        Self {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string().to_uppercase()),
            producer,
            parameters: ParameterTable::new(),
            description: None,
            running_delay: Duration::ZERO,
            reply_delay: Duration::ZERO,
            proceed: None,
            error_handler: None,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_running_delay(mut self, delay: Duration) -> Self {
        self.running_delay = delay;
        self
    }

    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_proceed<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
    {
        self.proceed = Some(Arc::new(hook));
        self
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ProducerError, &ParameterTable, &WorkflowContext) -> Result<Vec<Value>, ProducerError>
            + Send
            + Sync
            + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Builder form of [`ProducerNode::initialize`].
    pub fn with_parameters(mut self, params: ParameterMap) -> Result<Self, ProducerError> {
        self.initialize(params)?;
        Ok(self)
    }

    /// Validate `params` and make them the producer's configuration.
    pub fn initialize(&mut self, params: ParameterMap) -> Result<(), ProducerError> {
        let checked = self
            .producer
            .check_parameters(params, false)
            .map_err(|e| self.wrap(e))?;
        self.parameters.replace_all(checked);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn producer_type(&self) -> &str {
        self.producer.producer_type()
    }

    pub fn producer(&self) -> &dyn Producer {
        self.producer.as_ref()
    }

    pub fn introduce(&self) -> String {
        self.producer.introduce()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterTable {
        &mut self.parameters
    }

    pub fn running_delay(&self) -> Duration {
        self.running_delay
    }

    pub fn reply_delay(&self) -> Duration {
        self.reply_delay
    }

    pub fn set_running_delay(&mut self, delay: Duration) {
        self.running_delay = delay;
    }

    pub fn set_reply_delay(&mut self, delay: Duration) {
        self.reply_delay = delay;
    }

    pub fn parents(&self) -> &[RelationId] {
        &self.parents
    }

    pub fn children(&self) -> &[RelationId] {
        &self.children
    }

    /// The wrapper every scheduler call goes through: pre-delay, parameter
    /// view, `produce` with error recovery, post-delay, then `proceed`.
    ///
    /// With empty `overrides` the owned table is used directly; otherwise a
    /// patched clone is, and the owned table is left untouched.
    pub async fn prepare_execute(
        &self,
        input: Vec<Value>,
        overrides: ParameterMap,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProducerError> {
        if !self.running_delay.is_zero() {
            sleep(self.running_delay).await;
        }

        let params: Cow<'_, ParameterTable> = if overrides.is_empty() {
            Cow::Borrowed(&self.parameters)
        } else {
            let checked = self
                .producer
                .check_parameters(overrides, true)
                .map_err(|e| self.wrap(e))?;
            Cow::Owned(self.parameters.patched(checked))
        };

        let output = match self.producer.produce(input, &params, ctx).await {
            Ok(output) => output,
            Err(e) => {
                let err = self.wrap(e);
                let Some(handler) = &self.error_handler else {
                    return Err(err);
                };
                let recovered = handler(&err, &params, ctx)?;
                tracing::warn!(producer = %self.id, error = %err, "Producer failure recovered by error handler");
                recovered
            }
        };

        if !self.reply_delay.is_zero() {
            sleep(self.reply_delay).await;
        }

        Ok(match &self.proceed {
            Some(hook) => hook(output),
            None => output,
        })
    }

    fn wrap(&self, source: ProduceError) -> ProducerError {
        ProducerError::new(self.producer.producer_type(), self.id.clone(), source)
    }
}

impl fmt::Debug for ProducerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerNode")
            .field("id", &self.id)
            .field("type", &self.producer.producer_type())
            .field("parameters", &self.parameters)
            .field("running_delay", &self.running_delay)
            .field("reply_delay", &self.reply_delay)
            .field("parents", &self.parents)
            .field("children", &self.children)
            .finish()
    }
}
