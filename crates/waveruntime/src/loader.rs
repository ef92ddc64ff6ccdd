use crate::manager::WorkflowManager;
use crate::registry::ProducerActivator;
use std::collections::HashSet;
use std::time::Duration;
use wavecore::{
    Condition, ProducerGraph, ProducerNode, RelationDefinition, RelationOptions, Result,
    WorkflowDefinition, WorkflowError,
};

impl WorkflowManager {
    /// Build a manager from one or more declarative definitions.
    ///
    /// Producer and relation declarations are merged across definitions.
    /// Every structural problem is reported as [`WorkflowError::Generator`]
    /// before anything runs.
    pub fn from_definitions<A>(activator: &A, definitions: &[WorkflowDefinition]) -> Result<Self>
    where
        A: ProducerActivator + ?Sized,
    {
        if definitions.is_empty() {
            return Err(generator("Must have at least one definition".to_string()));
        }

        let mut graph = ProducerGraph::new();
        let mut relations: Vec<&RelationDefinition> = Vec::new();
        let mut pairs: HashSet<(&str, &str)> = HashSet::new();
        let mut entrance: Option<&str> = None;
        let mut output: Option<&str> = None;

        for definition in definitions {
            if let Some(id) = definition.entrance.as_deref() {
                if let Some(existing) = entrance {
                    return Err(generator(format!(
                        "Cannot set {} as entrance which had already set to {}",
                        id, existing
                    )));
                }
                entrance = Some(id);
            }
            if let Some(id) = definition.output.as_deref() {
                if let Some(existing) = output {
                    return Err(generator(format!(
                        "Cannot set {} as output point which had already set to {}",
                        id, existing
                    )));
                }
                output = Some(id);
            }

            for producer in &definition.producers {
                if graph.find(&producer.id).is_some() {
                    return Err(generator(format!("ID \"{}\" conflict", producer.id)));
                }
                let instance = activator.activate(&producer.producer_type).ok_or_else(|| {
                    generator(format!(
                        "Activator for type \"{}\" (on \"{}\") returns nothing",
                        producer.producer_type, producer.id
                    ))
                })?;

                let mut node = ProducerNode::boxed(Some(producer.id.clone()), instance)
                    .with_running_delay(Duration::from_millis(producer.running_delay))
                    .with_reply_delay(Duration::from_millis(producer.reply_delay));
                if let Some(description) = &producer.description {
                    node = node.with_description(description.clone());
                }
                node.initialize(producer.parameters.clone())
                    .map_err(|e| generator(format!("Cannot initialize \"{}\": {}", producer.id, e)))?;
                graph.add_producer(node)?;
            }

            for relation in &definition.relations {
                if !pairs.insert((relation.from.as_str(), relation.to.as_str())) {
                    return Err(generator(format!(
                        "Relation {} -> {} is already existed",
                        relation.from, relation.to
                    )));
                }
                relations.push(relation);
            }
        }

        let entrance = entrance
            .and_then(|id| graph.find(id))
            .ok_or_else(|| generator(format!("No entrance point (prefer id {})", entrance.unwrap_or("<none>"))))?;

        for relation in relations {
            let from = graph.find(&relation.from).ok_or_else(|| {
                generator(format!(
                    "Relation {} (nonexisted) -> {} is not available",
                    relation.from, relation.to
                ))
            })?;
            let to = graph.find(&relation.to).ok_or_else(|| {
                generator(format!(
                    "Relation {} -> {} (nonexisted) is not available",
                    relation.from, relation.to
                ))
            })?;

            let mut options = RelationOptions::new().allow_empty_input(relation.allow_empty_input);
            if let Some(name) = &relation.inject {
                options = options.inject(name.clone());
            }
            if let Some(expr) = &relation.condition {
                options = options.condition(Condition::Expr(expr.clone()));
            }
            graph.relate(from, to, options)?;
        }

        if let Some(culprit) = graph.find_cycle() {
            return Err(generator(format!("Relations form a cycle through \"{}\"", culprit)));
        }

        let output = match output {
            Some(id) => Some(
                graph
                    .find(id)
                    .ok_or_else(|| generator(format!("Unexisted output point (prefer id {})", id)))?,
            ),
            None => None,
        };

        tracing::debug!(
            "Loaded workflow with {} producer(s) from {} definition(s)",
            graph.len(),
            definitions.len()
        );

        Ok(WorkflowManager::assemble(graph, entrance, output))
    }
}

fn generator(message: String) -> WorkflowError {
    WorkflowError::Generator(message)
}
