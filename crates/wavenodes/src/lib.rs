//! Standard producer library
//!
//! Collection of built-in producers for common operations

mod convert;
mod debug;
mod passthrough;
mod pick;
mod subworkflow;
mod time;
mod wrap;

pub use convert::{convert, convert_value, ConvertRule, ValueConvertProducer};
pub use debug::LogProducer;
pub use passthrough::PassthroughProducer;
pub use pick::{pick, pick_structured, DataPickProducer, StructuredPickProducer};
pub use subworkflow::{
    RepeatWorkflowProducer, RepeatWorkflowProducerFactory, SubWorkflowProducer,
    SubWorkflowProducerFactory,
};
pub use time::DelayProducer;
pub use wrap::WrapProducer;
use waveruntime::ProducerRegistry;

use std::sync::Arc;

/// Register all standard producers that need no registry of their own
pub fn register_all(registry: &mut ProducerRegistry) {
    registry.register(Arc::new(passthrough::PassthroughProducerFactory));
    registry.register(Arc::new(debug::LogProducerFactory));
    registry.register(Arc::new(time::DelayProducerFactory));
    registry.register(Arc::new(pick::DataPickProducerFactory));
    registry.register(Arc::new(pick::StructuredPickProducerFactory));
    registry.register(Arc::new(convert::ValueConvertProducerFactory));
}

/// A registry with every standard producer, including the nested workflow
/// producers, which load inner definitions through this same registry.
pub fn standard_registry() -> Arc<ProducerRegistry> {
    standard_registry_with(|_| {})
}

/// Like [`standard_registry`], with extra registrations applied before the
/// registry is shared.
pub fn standard_registry_with<F>(extend: F) -> Arc<ProducerRegistry>
where
    F: FnOnce(&mut ProducerRegistry),
{
    Arc::new_cyclic(|weak| {
        let mut registry = ProducerRegistry::new();
        register_all(&mut registry);
        registry.register(Arc::new(SubWorkflowProducerFactory::new(weak.clone())));
        registry.register(Arc::new(RepeatWorkflowProducerFactory::new(weak.clone())));
        extend(&mut registry);
        registry
    })
}
