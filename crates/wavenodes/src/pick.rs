//! Producers that pull pieces out of their input values.
//!
//! Queries are JSON pointers with one extension: a non-numeric segment
//! applied to an array maps over its elements, so `/items/name` on
//! `{"items": [{"name": "a"}, {"name": "b"}]}` yields `["a", "b"]`.
//! Anything that cannot be resolved becomes `null`.

use async_trait::async_trait;
use wavecore::{
    ParameterDescriptor, ParameterSpec, ParameterTable, ParameterType, ProduceError, Producer,
    Value, WorkflowContext,
};
use waveruntime::{ProducerFactory, ProducerMetadata};

/// Resolve `query` against `value`. A query that is not a pointer is a
/// literal and comes back as a string.
pub fn pick(value: &Value, query: &str) -> Value {
    match query.strip_prefix('/') {
        Some(rest) => {
            let segments: Vec<String> = rest
                .split('/')
                .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
                .collect();
            walk(value, &segments)
        }
        None if query.is_empty() => value.clone(),
        None => Value::from(query),
    }
}

fn walk(value: &Value, segments: &[String]) -> Value {
    let Some((segment, rest)) = segments.split_first() else {
        return value.clone();
    };
    match value {
        Value::Object(map) => map.get(segment).map_or(Value::Null, |v| walk(v, rest)),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => items.get(index).map_or(Value::Null, |v| walk(v, rest)),
            Err(_) => Value::Array(items.iter().map(|item| walk(item, segments)).collect()),
        },
        _ => Value::Null,
    }
}

/// Mirror the shape of `query`, replacing every pointer string with the
/// value it resolves to in `value`.
pub fn pick_structured(value: &Value, query: &Value) -> Value {
    match query {
        Value::String(s) if s.starts_with('/') => pick(value, s),
        Value::Array(items) => Value::Array(items.iter().map(|q| pick_structured(value, q)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, q)| (key.clone(), pick_structured(value, q)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Picks one value per input with a pointer query
pub struct DataPickProducer;

#[async_trait]
impl Producer for DataPickProducer {
    fn producer_type(&self) -> &str {
        "data_pick"
    }

    fn introduce(&self) -> String {
        "Pick data from input values by a pointer query".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new().with(ParameterSpec::required(
            "query",
            ParameterType::STRING,
            "Pointer such as /user/name, or a literal",
        ))
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let query = params
            .get_str("query")
            .ok_or_else(|| ProduceError::MissingInput("query".to_string()))?;
        Ok(input.iter().map(|value| pick(value, query)).collect())
    }
}

pub struct DataPickProducerFactory;

impl ProducerFactory for DataPickProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(DataPickProducer)
    }

    fn producer_type(&self) -> &str {
        "data_pick"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Pick data from input values by a pointer query".to_string(),
            category: "transform".to_string(),
            parameters: DataPickProducer.parameter_structure(),
        }
    }
}

/// Builds one structured value per input from a query template
pub struct StructuredPickProducer;

#[async_trait]
impl Producer for StructuredPickProducer {
    fn producer_type(&self) -> &str {
        "structured_pick"
    }

    fn introduce(&self) -> String {
        "Pick data into a structure described by the query".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new().with(ParameterSpec::required(
            "query",
            ParameterType::ARRAY | ParameterType::OBJECT,
            "Template whose pointer strings are replaced by picked values",
        ))
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let query = params
            .get("query")
            .ok_or_else(|| ProduceError::MissingInput("query".to_string()))?;
        Ok(input.iter().map(|value| pick_structured(value, query)).collect())
    }
}

pub struct StructuredPickProducerFactory;

impl ProducerFactory for StructuredPickProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(StructuredPickProducer)
    }

    fn producer_type(&self) -> &str {
        "structured_pick"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Pick data into a structure described by the query".to_string(),
            category: "transform".to_string(),
            parameters: StructuredPickProducer.parameter_structure(),
        }
    }
}
