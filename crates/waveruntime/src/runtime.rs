use crate::manager::WorkflowManager;
use crate::registry::ProducerRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use wavecore::{
    EventBus, ExecutionEvent, ParameterMap, Result, RunOptions, Value, WorkflowDefinition,
    WorkflowResult,
};

/// Loads definitions against a registry and runs them with a shared event bus
pub struct WaveRuntime {
    registry: Arc<ProducerRegistry>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl WaveRuntime {
    /// Create a runtime with an empty registry
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with custom configuration and an empty registry
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ProducerRegistry::new()), config)
    }

    /// Create a runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<ProducerRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            event_bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ProducerRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Build a manager wired to this runtime's event bus
    pub fn load(&self, definitions: &[WorkflowDefinition]) -> Result<WorkflowManager> {
        let manager = WorkflowManager::from_definitions(self.registry.as_ref(), definitions)?;
        Ok(manager.with_event_bus(Arc::clone(&self.event_bus)))
    }

    /// Parse a definition (or an array of them) and load it
    pub fn load_json(&self, json: &str) -> Result<WorkflowManager> {
        self.load(&WorkflowDefinition::list_from_json(json)?)
    }

    /// Load and run in one step with the configured default options
    pub async fn run_definition(
        &self,
        definitions: &[WorkflowDefinition],
        input: Value,
        environment: ParameterMap,
    ) -> Result<WorkflowResult> {
        self.load(definitions)?
            .run(input, environment, self.config.default_options.clone())
            .await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for WaveRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    pub default_options: RunOptions,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1024,
            default_options: RunOptions::default(),
        }
    }
}
