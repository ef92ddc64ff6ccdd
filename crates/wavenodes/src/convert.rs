use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use wavecore::{
    ParameterDescriptor, ParameterMap, ParameterSpec, ParameterTable, ParameterType, ProduceError,
    Producer, Value, WorkflowContext,
};
use waveruntime::{ProducerFactory, ProducerMetadata};

/// One entry of the `rules` parameter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConvertRule {
    /// Value this rule matches. Absent means `null`.
    #[serde(default)]
    pub key: Value,
    pub value: Value,
    /// Applied when no other rule matches.
    #[serde(default)]
    pub default: bool,
}

fn parse_rules(raw: &Value) -> Result<Vec<ConvertRule>, ProduceError> {
    serde_json::from_value(raw.to_json())
        .map_err(|e| ProduceError::Parameter(format!("Invalid convert rules: {}", e)))
}

/// Replace `value` by the first rule whose key equals it, else by the
/// default rule, else keep it.
pub fn convert_value(value: &Value, rules: &[ConvertRule]) -> Value {
    rules
        .iter()
        .find(|rule| rule.key == *value)
        .or_else(|| rules.iter().find(|rule| rule.default))
        .map_or_else(|| value.clone(), |rule| rule.value.clone())
}

/// Convert the places of `source` selected by `structure`.
pub fn convert(structure: &Value, source: &Value, rules: &[ConvertRule]) -> Value {
    match (structure, source) {
        (_, Value::Null) => convert_value(source, rules),
        (Value::Bool(false), _) => source.clone(),
        (Value::Bool(true), _) => convert_value(source, rules),
        (_, Value::Array(_) | Value::Object(_)) => convert_nested(structure, source, rules),
        _ => convert_value(source, rules),
    }
}

fn convert_nested(structure: &Value, source: &Value, rules: &[ConvertRule]) -> Value {
    match (structure, source) {
        (Value::Array(shape), Value::Array(items)) => {
            let object_shape = shape.iter().find(|s| matches!(s, Value::Object(_)));
            let convert_plain = shape.iter().any(|s| *s == Value::Bool(true));
            if object_shape.is_none() && !convert_plain {
                return source.clone();
            }
            Value::Array(
                items
                    .iter()
                    .map(|item| match (object_shape, item) {
                        (Some(shape), Value::Object(_)) => convert(shape, item, rules),
                        _ if convert_plain => convert_value(item, rules),
                        _ => item.clone(),
                    })
                    .collect(),
            )
        }
        (Value::Object(shape), Value::Object(fields)) if shape.is_empty() => Value::Object(
            fields
                .iter()
                .map(|(key, value)| {
                    let converted = match value {
                        Value::Array(_) | Value::Object(_) => value.clone(),
                        _ => convert_value(value, rules),
                    };
                    (key.clone(), converted)
                })
                .collect(),
        ),
        (Value::Object(shape), Value::Object(fields)) => {
            let excluding = shape.values().any(|s| *s == Value::Bool(false));
            let selected: Vec<&String> = shape
                .iter()
                .filter(|(_, s)| if excluding { **s != Value::Bool(false) } else { s.is_truthy() })
                .map(|(key, _)| key)
                .collect();
            let mut result: HashMap<String, Value> = fields
                .iter()
                .map(|(key, value)| {
                    let converted = match shape.get(key) {
                        Some(inner) if selected.contains(&key) => convert(inner, value, rules),
                        _ => value.clone(),
                    };
                    (key.clone(), converted)
                })
                .collect();
            for key in selected {
                if !fields.contains_key(key) {
                    result.insert(key.clone(), convert_value(&Value::Null, rules));
                }
            }
            Value::Object(result)
        }
        _ => source.clone(),
    }
}

/// Rewrites values by lookup rules
pub struct ValueConvertProducer;

#[async_trait]
impl Producer for ValueConvertProducer {
    fn producer_type(&self) -> &str {
        "value_convert"
    }

    fn introduce(&self) -> String {
        "Use given structure to focus on places of the input, then convert them by rules".to_string()
    }

    fn parameter_structure(&self) -> ParameterDescriptor {
        ParameterDescriptor::new()
            .with(ParameterSpec::required(
                "rules",
                ParameterType::ARRAY,
                "List of {key, value, default} rules; the first equal key wins, then the default rule",
            ))
            .with(
                ParameterSpec::optional(
                    "structure",
                    ParameterType::ANY,
                    "Selects which places of each input are converted",
                )
                .with_default(Value::Object(HashMap::new())),
            )
    }

    fn check_parameters(&self, params: ParameterMap, partial: bool) -> Result<ParameterMap, ProduceError> {
        let params = self
            .parameter_structure()
            .validate(params, partial)
            .map_err(ProduceError::Parameter)?;
        if let Some(rules) = params.get("rules") {
            parse_rules(rules)?;
        }
        Ok(params)
    }

    async fn produce(
        &self,
        input: Vec<Value>,
        params: &ParameterTable,
        _ctx: &WorkflowContext,
    ) -> Result<Vec<Value>, ProduceError> {
        let rules = params
            .get("rules")
            .ok_or_else(|| ProduceError::MissingInput("rules".to_string()))
            .and_then(parse_rules)?;
        let structure = params.get("structure").cloned().unwrap_or_default();
        Ok(input
            .iter()
            .map(|value| match value {
                Value::Null => Value::Null,
                Value::Array(_) | Value::Object(_) => convert(&structure, value, &rules),
                _ => convert_value(value, &rules),
            })
            .collect())
    }
}

pub struct ValueConvertProducerFactory;

impl ProducerFactory for ValueConvertProducerFactory {
    fn create(&self) -> Box<dyn Producer> {
        Box::new(ValueConvertProducer)
    }

    fn producer_type(&self) -> &str {
        "value_convert"
    }

    fn metadata(&self) -> ProducerMetadata {
        ProducerMetadata {
            description: "Convert values by lookup rules".to_string(),
            category: "transform".to_string(),
            parameters: ValueConvertProducer.parameter_structure(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn rules() -> Vec<ConvertRule> {
        parse_rules(&v(json!([
            {"key": "y", "value": true},
            {"key": "n", "value": false},
            {"value": "missing"},
            {"default": true, "value": "?"}
        ])))
        .unwrap()
    }

    #[test]
    fn first_matching_rule_then_default() {
        let rules = rules();
        assert_eq!(convert_value(&v(json!("y")), &rules), v(json!(true)));
        assert_eq!(convert_value(&Value::Null, &rules), v(json!("missing")));
        assert_eq!(convert_value(&v(json!(42)), &rules), v(json!("?")));

        let no_default = &rules[..2];
        assert_eq!(convert_value(&v(json!(42)), no_default), v(json!(42)));
    }

    #[test]
    fn empty_object_structure_converts_level_one_scalars() {
        let source = v(json!({"a": "y", "b": {"c": "y"}, "d": null}));
        assert_eq!(
            convert(&v(json!({})), &source, &rules()),
            v(json!({"a": true, "b": {"c": "y"}, "d": "missing"}))
        );
    }

    #[test]
    fn object_structure_selects_keys() {
        let source = v(json!({"a": "y", "b": "n", "c": "y"}));
        assert_eq!(
            convert(&v(json!({"a": true})), &source, &rules()),
            v(json!({"a": true, "b": "n", "c": "y"}))
        );
        assert_eq!(
            convert(&v(json!({"a": false})), &source, &rules()),
            v(json!({"a": "y", "b": "n", "c": "y"}))
        );
        assert_eq!(
            convert(&v(json!({"a": false, "b": true, "z": true})), &source, &rules()),
            v(json!({"a": "y", "b": false, "c": "y", "z": "missing"}))
        );
    }

    #[test]
    fn array_structure_applies_to_elements() {
        let source = v(json!([{"k": "y", "other": "y"}, "n", 3]));
        assert_eq!(
            convert(&v(json!([{"k": true}])), &source, &rules()),
            v(json!([{"k": true, "other": "y"}, "n", 3]))
        );
        assert_eq!(
            convert(&v(json!([{"k": true}, true])), &source, &rules()),
            v(json!([{"k": true, "other": "y"}, false, "?"]))
        );
        assert_eq!(convert(&v(json!([])), &source, &rules()), source);
    }

    #[test]
    fn malformed_rules_fail_parameter_check() {
        let params: ParameterMap = [("rules".to_string(), v(json!([{"key": 1}])))].into();
        let err = ValueConvertProducer.check_parameters(params, false).unwrap_err();
        assert!(matches!(err, ProduceError::Parameter(_)));
    }

    #[tokio::test]
    async fn produce_converts_scalars_and_keeps_null() {
        let mut params = ParameterTable::new();
        params.set("rules", v(json!([{"key": 1, "value": "one"}])));
        params.set("structure", v(json!({})));
        let ctx = WorkflowContext::new(Default::default());
        let out = ValueConvertProducer
            .produce(vec![Value::from(1), Value::Null, v(json!({"x": 1}))], &params, &ctx)
            .await
            .unwrap();
        assert_eq!(out, vec![v(json!("one")), Value::Null, v(json!({"x": "one"}))]);
    }
}
