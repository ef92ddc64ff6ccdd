use async_trait::async_trait;
use wavecore::{
    ParameterDescriptor, ParameterMap, ParameterSpec, ParameterTable, ParameterType, ProduceError,
    Producer, Value, WorkflowContext,
};
use waveruntime::{ProducerFactory, ProducerMetadata};

/// Logs its input through `tracing` and passes it on
pub struct LogProducer;

#[async_trait]
impl Producer for LogProducer {
    fn producer_type(&self) -> &str {
        "log"
    }

    fn introduce(&self) -> String {
        "Logs input values for debugging".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new()
            .with(
                ParameterSpec::optional("message", ParameterType::STRING, "Prefix for the log line")
                    .with_default("(no message)"),
            )
            .with(
                ParameterSpec::optional("level", ParameterType::STRING, "One of debug, info, warn")
                    .with_default("info"),
            )
    }

    fn check_parameters(&self, params: ParameterMap, partial: bool) -> Result<ParameterMap, ProduceError> {
        let params = self
            .parameter_structure()
            .validate(params, partial)
            .map_err(ProduceError::Parameter)?;
        match params.get("level").and_then(Value::as_str) {
            None | Some("debug") | Some("info") | Some("warn") => Ok(params),
            Some(other) => Err(ProduceError::Parameter(format!("Unsupported log level: {}", other))),
        }
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let message = params.get_str("message").unwrap_or("(no message)");
        let rendered: Vec<String> = input.iter().map(Value::to_string).collect();
        let execution_id = ctx.execution_id();
        match params.get_str("level").unwrap_or("info") {
            "debug" => tracing::debug!("[{}] {}: {:?}", execution_id, message, rendered),
            "warn" => tracing::warn!("[{}] {}: {:?}", execution_id, message, rendered),
            _ => tracing::info!("[{}] {}: {:?}", execution_id, message, rendered),
        }
        Ok(input)
    }
}

pub struct LogProducerFactory;

impl ProducerFactory for LogProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(LogProducer)
    }

    fn producer_type(&self) -> &str {
        "log"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
            parameters: LogProducer.parameter_structure(),
        }
    }
}
