use async_trait::async_trait;
use wavecore::{ParameterTable, ProduceError, Producer, Value, WorkflowContext};
use waveruntime::{ProducerFactory, ProducerMetadata};

/// Returns its input unchanged
pub struct PassthroughProducer;

#[async_trait]
impl Producer for PassthroughProducer {
    fn producer_type(&self) -> &str {
        "passthrough"
    }

    fn introduce(&self) -> String {
        "Producer that does nothing".to_string()
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        _params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        Ok(input)
    }
}

pub struct PassthroughProducerFactory;

impl ProducerFactory for PassthroughProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(PassthroughProducer)
    }

    fn producer_type(&self) -> &str {
        "passthrough"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Returns its input unchanged".to_string(),
            category: "core".to_string(),
            parameters: Default::default(),
        }
    }
}
