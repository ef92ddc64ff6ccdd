use std::collections::HashMap;
use std::sync::Arc;
use wavecore::{ParameterDescriptor, Producer, WorkflowError};

/// Turns a type tag from a definition into a fresh producer instance.
pub trait ProducerActivator: Send + Sync {
    fn activate(&self, producer_type: &str) -> Option<Box<dyn Producer>>;
}

impl<F> ProducerActivator for F
where
    F: Fn(&str) -> Option<Box<dyn Producer>> + Send + Sync,
{
    fn activate(&self, producer_type: &str) -> Option<Box<dyn Producer>> {
        self(producer_type)
    }
}

/// Factory trait for creating producer instances
pub trait ProducerFactory: Send + Sync {
    /// Create a new, unconfigured instance
    fn create(&self) -> Box<dyn Producer>;

    /// Type tag this factory answers to
    fn producer_type(&self) -> &str;

    /// Description and accepted parameters, taken from a throwaway instance
    fn metadata(&self) -> ProducerMetadata {
        let instance = self.create();
        ProducerMetadata {
            description: instance.introduce(),
            category: "general".to_string(),
            parameters: instance.parameter_structure(),
        }
    }
}

/// Metadata about a producer type
#[derive(Debug, Clone)]
pub struct ProducerMetadata {
    pub description: String,
    pub category: String,
    pub parameters: ParameterDescriptor,
}

/// Registry of available producer types
#[derive(Clone, Default)]
pub struct ProducerRegistry {
    factories: HashMap<String, Arc<dyn ProducerFactory>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer factory, replacing any previous one for the type
    pub fn register(&mut self, factory: Arc<dyn ProducerFactory>) {
        let producer_type = factory.producer_type().to_string();
        tracing::debug!("Registering producer type: {}", producer_type);
        self.factories.insert(producer_type, factory);
    }

    pub fn contains(&self, producer_type: &str) -> bool {
        self.factories.contains_key(producer_type)
    }

    pub fn create_producer(&self, producer_type: &str) -> Result<Box<dyn Producer>, WorkflowError> {
        self.factories
            .get(producer_type)
            .map(|f| f.create())
            .ok_or_else(|| WorkflowError::Generator(format!("Unknown producer type \"{}\"", producer_type)))
    }

    /// All registered type tags, sorted
    pub fn list_producer_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, producer_type: &str) -> Option<ProducerMetadata> {
        self.factories.get(producer_type).map(|f| f.metadata())
    }
}

impl ProducerActivator for ProducerRegistry {
    fn activate(&self, producer_type: &str) -> Option<Box<dyn Producer>> {
        self.factories.get(producer_type).map(|f| f.create())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wavecore::{ParameterSpec, ParameterTable, ParameterType, ProduceError, Value, WorkflowContext};

    struct Identity;

    #[async_trait]
    impl Producer for Identity {
        fn producer_type(&self) -> &str {
            "identity"
        }

        fn introduce(&self) -> String {
            "Returns its input".to_string()
        }

        fn parameter_structure(&self) -> ParameterDescriptor {
            ParameterDescriptor::new().with(ParameterSpec::optional("label", ParameterType::STRING, "display label"))
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

    struct IdentityFactory;

    impl ProducerFactory for IdentityFactory {
        fn create(&self) -> Box<dyn Producer> {
            Box::new(Identity)
        }

        fn producer_type(&self) -> &str {
            "identity"
        }
    }

    #[test]
    fn registry_activates_registered_types_only() {
        let mut registry = ProducerRegistry::new();
        registry.register(Arc::new(IdentityFactory));

        assert!(registry.activate("identity").is_some());
        assert!(registry.activate("missing").is_none());
        assert_eq!(registry.create_producer("missing").err().unwrap().kind(), "Generator");
        assert_eq!(registry.list_producer_types(), vec!["identity".to_string()]);

        let meta = registry.get_metadata("identity").unwrap();
        assert_eq!(meta.description, "Returns its input");
        assert!(meta.parameters.get("label").is_some());
    }

    #[test]
    fn closures_are_activators() {
        let activator = |tag: &str| -> Option<Box<dyn Producer>> {
            (tag == "identity").then(|| Box::new(Identity) as Box<dyn Producer>)
        };
        assert!(activator.activate("identity").is_some());
        assert!(activator.activate("other").is_none());
    }
}
