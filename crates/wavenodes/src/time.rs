use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use wavecore::{
    ParameterDescriptor, ParameterSpec, ParameterTable, ParameterType, ProduceError, Producer,
    Value, WorkflowContext,
};
use waveruntime::{ProducerFactory, ProducerMetadata};

/// Waits `delay_ms`, then passes its input on. Returns early when the run
/// is cancelled.
pub struct DelayProducer;

#[async_trait]
impl Producer for DelayProducer {
    fn producer_type(&self) -> &str {
        "delay"
    }

    fn introduce(&self) -> String {
        "Delay execution for specified milliseconds".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new().with(
            ParameterSpec::optional("delay_ms", ParameterType::NUMBER, "Milliseconds to wait")
                .with_default(1000),
        )
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let delay_ms = params.get_f64("delay_ms").unwrap_or(1000.0).max(0.0) as u64;
        let cancelled = ctx.cancellation_token();
        tokio::select! {
            _ = sleep(Duration::from_millis(delay_ms)) => {}
            _ = cancelled.cancelled() => {
                tracing::debug!("Delay cut short by cancellation");
            }
        }
        Ok(input)
    }
}

pub struct DelayProducerFactory;

impl ProducerFactory for DelayProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(DelayProducer)
    }

    fn producer_type(&self) -> &str {
        "delay"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
            parameters: DelayProducer.parameter_structure(),
        }
    }
}
