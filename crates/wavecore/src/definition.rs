use crate::condition::ConditionExpr;
use crate::error::WorkflowError;
use crate::parameter::ParameterMap;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Declarative workflow, the input of `WorkflowManager::from_definitions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub producers: Vec<ProducerDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl WorkflowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse one definition or an array of them.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, WorkflowError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        Self::list_from_value(raw)
    }

    pub fn list_from_value(raw: serde_json::Value) -> Result<Vec<Self>, WorkflowError> {
        Ok(match raw {
            serde_json::Value::Array(_) => serde_json::from_value(raw)?,
            other => vec![serde_json::from_value(other)?],
        })
    }

    pub fn producer(mut self, producer: ProducerDefinition) -> Self {
        self.producers.push(producer);
        self
    }

    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn entrance(mut self, id: impl Into<String>) -> Self {
        self.entrance = Some(id.into());
        self
    }

    pub fn output(mut self, id: impl Into<String>) -> Self {
        self.output = Some(id.into());
        self
    }
}

/// A producer declaration. Delays are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerDefinition {
    #[serde(rename = "type")]
    pub producer_type: String,
    pub id: String,
    #[serde(default)]
    pub parameters: ParameterMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub running_delay: u64,
    #[serde(default)]
    pub reply_delay: u64,
}

impl ProducerDefinition {
    pub fn new(producer_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            producer_type: producer_type.into(),
            id: id.into(),
            parameters: ParameterMap::new(),
            description: None,
            running_delay: 0,
            reply_delay: 0,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn delays(mut self, running_ms: u64, reply_ms: u64) -> Self {
        self.running_delay = running_ms;
        self.reply_delay = reply_ms;
        self
    }
}

/// A relation declaration between two declared producer ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDefinition {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionExpr>,
    #[serde(default)]
    pub allow_empty_input: bool,
}

impl RelationDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            inject: None,
            condition: None,
            allow_empty_input: false,
        }
    }

    pub fn inject(mut self, name: impl Into<String>) -> Self {
        self.inject = Some(name.into());
        self
    }

    pub fn condition(mut self, condition: ConditionExpr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn allow_empty_input(mut self, allow: bool) -> Self {
        self.allow_empty_input = allow;
        self
    }
}
