mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use wavecore::{
    ParameterMap, ProducerDefinition, RelationDefinition, RunOptions, Value, WorkflowDefinition,
    WorkflowError,
};
use waveruntime::{ProducerRegistry, RuntimeConfig, WaveRuntime, WorkflowManager};

fn load(definitions: &[WorkflowDefinition]) -> Result<WorkflowManager, WorkflowError> {
    WorkflowManager::from_definitions(&activate, definitions)
}

fn generator_message(definitions: &[WorkflowDefinition]) -> String {
    match load(definitions) {
        Err(WorkflowError::Generator(message)) => message,
        Err(other) => panic!("expected a generator error, got {other}"),
        Ok(_) => panic!("expected a generator error, definitions loaded"),
    }
}

fn pair() -> WorkflowDefinition {
    WorkflowDefinition::new()
        .producer(ProducerDefinition::new("echo", "A"))
        .producer(ProducerDefinition::new("echo", "B"))
        .relation(RelationDefinition::new("A", "B"))
        .entrance("A")
}

#[test]
fn empty_definition_list_is_rejected() {
    assert!(generator_message(&[]).contains("at least one definition"));
}

#[test]
fn duplicate_producer_ids_across_definitions_are_rejected() {
    let second = WorkflowDefinition::new().producer(ProducerDefinition::new("emit", "A"));
    assert!(generator_message(&[pair(), second]).contains("\"A\" conflict"));
}

#[test]
fn duplicate_relations_are_rejected() {
    let second = WorkflowDefinition::new().relation(RelationDefinition::new("A", "B"));
    assert!(generator_message(&[pair(), second]).contains("A -> B is already existed"));
}

#[test]
fn second_entrance_or_output_is_rejected() {
    let entrance = WorkflowDefinition::new().entrance("B");
    assert!(generator_message(&[pair(), entrance]).contains("as entrance"));

    let outputs = [pair().output("B"), WorkflowDefinition::new().output("A")];
    assert!(generator_message(&outputs).contains("as output point"));
}

#[test]
fn unknown_type_is_reported_with_producer_id() {
    let def = pair().producer(ProducerDefinition::new("teleport", "T"));
    let message = generator_message(&[def]);
    assert!(message.contains("teleport"));
    assert!(message.contains("\"T\""));
}

#[test]
fn invalid_parameters_fail_at_load_time() {
    let def = pair().producer(ProducerDefinition::new("emit", "E").param("values", "not a list"));
    assert!(generator_message(&[def]).contains("\"E\""));

    let def = pair().producer(ProducerDefinition::new("emit", "E").param("extra", 1));
    assert!(generator_message(&[def]).contains("extra"));
}

#[test]
fn entrance_must_be_declared() {
    let mut def = pair();
    def.entrance = None;
    assert!(generator_message(&[def]).contains("No entrance point"));

    assert!(generator_message(&[pair().entrance("nowhere")]).contains("nowhere"));
}

#[test]
fn relations_must_reference_declared_producers() {
    let def = pair().relation(RelationDefinition::new("ghost", "B"));
    assert!(generator_message(&[def]).contains("ghost (nonexisted)"));

    let def = pair().relation(RelationDefinition::new("A", "ghost"));
    assert!(generator_message(&[def]).contains("ghost (nonexisted)"));
}

#[test]
fn output_must_be_declared() {
    assert!(generator_message(&[pair().output("ghost")]).contains("Unexisted output point"));
}

#[test]
fn cycles_are_rejected() {
    let def = pair()
        .producer(ProducerDefinition::new("echo", "C"))
        .relation(RelationDefinition::new("B", "C"))
        .relation(RelationDefinition::new("C", "B"));
    assert!(generator_message(&[def]).contains("cycle"));
}

#[test]
fn declared_delays_and_description_are_applied() {
    let def = WorkflowDefinition::new()
        .producer(
            ProducerDefinition::new("echo", "A")
                .delays(5, 7)
                .description("first step"),
        )
        .entrance("A");
    let manager = load(&[def]).unwrap();
    let a = manager.graph().find("A").unwrap();
    let node = &manager.graph()[a];
    assert_eq!(node.running_delay(), Duration::from_millis(5));
    assert_eq!(node.reply_delay(), Duration::from_millis(7));
    assert_eq!(node.description(), Some("first step"));
}

#[test]
fn unreachable_nodes_lists_side_entries() {
    let def = pair()
        .producer(ProducerDefinition::new("echo", "X"))
        .relation(RelationDefinition::new("X", "B"));
    let manager = load(&[def]).unwrap();
    assert_eq!(manager.unreachable_nodes(), vec!["X".to_string()]);
}

#[tokio::test]
async fn json_definitions_load_and_run() {
    let json = r#"[
        {
            "producers": [
                {"type": "emit", "id": "source", "parameters": {"values": [1, 10, 20]}},
                {"type": "echo", "id": "big"},
                {"type": "inject_probe", "id": "probe"}
            ],
            "relations": [
                {"from": "source", "to": "big", "condition": {"kind": "compare", "op": "ge", "value": 10}}
            ],
            "entrance": "source"
        },
        {
            "relations": [
                {"from": "big", "to": "probe", "inject": "flag"}
            ],
            "output": "probe"
        }
    ]"#;
    let definitions = WorkflowDefinition::list_from_json(json).unwrap();
    let manager = load(&definitions).unwrap();
    assert_eq!(manager.entrance(), Some("source"));
    assert_eq!(manager.output(), Some("probe"));

    let result = manager
        .run(Value::from(Vec::<Value>::new()), ParameterMap::new(), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.last_data(), &[Value::from(10), Value::from(0)]);
}

#[tokio::test]
async fn runtime_loads_through_its_registry() {
    let mut registry = ProducerRegistry::new();
    registry.register(Arc::new(EchoFactory));
    registry.register(Arc::new(EmitFactory));
    let config = RuntimeConfig {
        default_options: RunOptions::new().return_last(true),
        ..RuntimeConfig::default()
    };
    let runtime = WaveRuntime::with_registry(Arc::new(registry), config);
    let mut events = runtime.subscribe_events();

    let definitions = [WorkflowDefinition::new()
        .producer(ProducerDefinition::new("emit", "A").param("values", vec![3]))
        .producer(ProducerDefinition::new("echo", "B").param("tag", "done"))
        .relation(RelationDefinition::new("A", "B"))
        .entrance("A")];
    let result = runtime
        .run_definition(&definitions, Value::from(Vec::<Value>::new()), ParameterMap::new())
        .await
        .unwrap();

    assert_eq!(result.data.len(), 1);
    assert_eq!(result.last_data(), &[Value::from(3), Value::from("done")]);
    assert!(events.try_recv().is_ok());

    let err = runtime.load_json(r#"{"producers": [{"type": "fail", "id": "F"}], "entrance": "F"}"#);
    assert_eq!(err.err().unwrap().kind(), "Generator");
}
