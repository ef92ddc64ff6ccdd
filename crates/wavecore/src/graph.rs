use crate::error::WorkflowError;
use crate::producer::ProducerNode;
use crate::relation::{Relation, RelationId, RelationOptions};
use crate::value::Value;
use crate::Result;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::ops::Index;

/// Index of a producer inside its [`ProducerGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProducerId(pub(crate) usize);

impl ProducerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of producers with relations stored as index pairs.
///
/// Every live relation is listed exactly once in its source's `children`
/// and once in its target's `parents`. Removed relations leave an empty
/// slot so that outstanding [`RelationId`]s never alias a different edge.
#[derive(Debug, Default)]
pub struct ProducerGraph {
    nodes: Vec<ProducerNode>,
    relations: Vec<Option<Relation>>,
    index: HashMap<String, ProducerId>,
}

impl ProducerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_producer(&mut self, node: ProducerNode) -> Result<ProducerId> {
        if self.index.contains_key(node.id()) {
            return Err(WorkflowError::Graph(format!(
                "Producer '{}' is already part of the graph",
                node.id()
            )));
        }
        let id = ProducerId(self.nodes.len());
        self.index.insert(node.id().to_string(), id);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn producer(&self, id: ProducerId) -> Option<&ProducerNode> {
        self.nodes.get(id.0)
    }

    pub fn producer_mut(&mut self, id: ProducerId) -> Option<&mut ProducerNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn find(&self, id: &str) -> Option<ProducerId> {
        self.index.get(id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = ProducerId> + '_ {
        (0..self.nodes.len()).map(ProducerId)
    }

    pub fn producers(&self) -> impl Iterator<Item = (ProducerId, &ProducerNode)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (ProducerId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Connect `from` to `to`, registering the edge on both endpoints.
    pub fn relate(&mut self, from: ProducerId, to: ProducerId, options: RelationOptions) -> Result<RelationId> {
        self.check(from)?;
        self.check(to)?;
        let rid = RelationId(self.relations.len());
        self.relations.push(Some(Relation::new(from, to, options)));
        self.nodes[from.0].children.push(rid);
        self.nodes[to.0].parents.push(rid);
        Ok(rid)
    }

    /// Remove the edge between `a` and `b`, whichever direction it runs.
    pub fn break_relation(&mut self, a: ProducerId, b: ProducerId) -> Result<Relation> {
        self.check(a)?;
        self.check(b)?;
        let found = self.nodes[a.0]
            .children
            .iter()
            .chain(self.nodes[a.0].parents.iter())
            .copied()
            .find(|rid| {
                self.relation(*rid)
                    .is_some_and(|r| (r.from == a && r.to == b) || (r.from == b && r.to == a))
            });
        match found {
            Some(rid) => self.remove_relation(rid),
            None => Err(WorkflowError::Graph(format!(
                "No relation between '{}' and '{}'",
                self.nodes[a.0].id(),
                self.nodes[b.0].id()
            ))),
        }
    }

    pub fn remove_relation(&mut self, rid: RelationId) -> Result<Relation> {
        let relation = self
            .relations
            .get_mut(rid.0)
            .and_then(Option::take)
            .ok_or_else(|| WorkflowError::Graph(format!("Unknown relation {:?}", rid)))?;
        self.nodes[relation.from.0].children.retain(|r| *r != rid);
        self.nodes[relation.to.0].parents.retain(|r| *r != rid);
        Ok(relation)
    }

    pub fn relation(&self, rid: RelationId) -> Option<&Relation> {
        self.relations.get(rid.0).and_then(Option::as_ref)
    }

    /// Outgoing edges of `id` in registration order.
    pub fn children_of(&self, id: ProducerId) -> impl Iterator<Item = (RelationId, &Relation)> + '_ {
        let list = self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or_default();
        self.resolve(list)
    }

    /// Incoming edges of `id` in registration order.
    pub fn parents_of(&self, id: ProducerId) -> impl Iterator<Item = (RelationId, &Relation)> + '_ {
        let list = self.nodes.get(id.0).map(|n| n.parents.as_slice()).unwrap_or_default();
        self.resolve(list)
    }

    fn resolve<'a>(&'a self, list: &'a [RelationId]) -> impl Iterator<Item = (RelationId, &'a Relation)> + 'a {
        list.iter()
            .filter_map(move |rid| self.relation(*rid).map(|r| (*rid, r)))
    }

    pub fn is_root(&self, id: ProducerId) -> bool {
        self.parents_of(id).next().is_none()
    }

    pub fn is_youngest(&self, id: ProducerId) -> bool {
        self.children_of(id).next().is_none()
    }

    /// Whether `child` is a direct child of `parent`.
    pub fn is_belongs_to(&self, child: ProducerId, parent: ProducerId) -> bool {
        self.parents_of(child).any(|(_, r)| r.from == parent)
    }

    /// Whether `parent` is a direct parent of `child`.
    pub fn is_parent_of(&self, parent: ProducerId, child: ProducerId) -> bool {
        self.children_of(parent).any(|(_, r)| r.to == child)
    }

    /// Readiness: a parentless producer is always ready; otherwise every
    /// parent must be finished or skipped.
    pub fn fit_condition(
        &self,
        id: ProducerId,
        finished: &HashSet<ProducerId>,
        skipped: &HashSet<ProducerId>,
    ) -> bool {
        self.parents_of(id)
            .all(|(_, r)| finished.contains(&r.from) || skipped.contains(&r.from))
    }

    /// Evaluate the condition of `rid` against one emitted value.
    pub fn judge(&self, rid: RelationId, value: &Value) -> Result<bool> {
        let relation = self
            .relation(rid)
            .ok_or_else(|| WorkflowError::Graph(format!("Unknown relation {:?}", rid)))?;
        relation
            .condition()
            .evaluate(value)
            .map_err(|message| WorkflowError::Relation {
                from: self.nodes[relation.from.0].id().to_string(),
                to: self.nodes[relation.to.0].id().to_string(),
                message,
            })
    }

    /// Returns the id of a producer that sits on a directed cycle, if any.
    pub fn find_cycle(&self) -> Option<String> {
        let mut graph: DiGraph<ProducerId, ()> = DiGraph::new();
        let indices: Vec<NodeIndex> = self.ids().map(|id| graph.add_node(id)).collect();
        for relation in self.relations.iter().flatten() {
            graph.add_edge(indices[relation.from.0], indices[relation.to.0], ());
        }
        toposort(&graph, None)
            .err()
            .map(|cycle| self.nodes[graph[cycle.node_id()].0].id().to_string())
    }

    /// Producers that can never be reached when starting at `entrance`.
    ///
    /// Only downward steps make a producer reachable. Since the arena knows
    /// every producer, isolated ones are reported too, not only those met
    /// while climbing back up from a reachable node.
    pub fn unreachable_from(&self, entrance: ProducerId) -> Vec<String> {
        let mut reachable: HashSet<ProducerId> = HashSet::from([entrance]);
        let mut queue = VecDeque::from([entrance]);

        while let Some(current) = queue.pop_front() {
            for (_, r) in self.children_of(current) {
                if reachable.insert(r.to) {
                    queue.push_back(r.to);
                }
            }
        }

        self.producers()
            .filter(|(id, _)| !reachable.contains(id))
            .map(|(_, node)| node.id().to_string())
            .collect()
    }

    fn check(&self, id: ProducerId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(WorkflowError::Graph(format!("Unknown producer {}", id)))
        }
    }
}

impl Index<ProducerId> for ProducerGraph {
    type Output = ProducerNode;

    fn index(&self, id: ProducerId) -> &ProducerNode {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{CompareOp, ConditionExpr};
    use crate::context::WorkflowContext;
    use crate::error::ProduceError;
    use crate::parameter::ParameterTable;
    use crate::producer::Producer;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Producer for Noop {
        fn producer_type(&self) -> &str {
            "noop"
        }

        fn introduce(&self) -> String {
            String::new()
        }

        async fn produce(
            &self,
            input: Vec<Value>,
            _params: &ParameterTable,
            _ctx: &WorkflowContext,
        ) -> std::result::Result<Vec<Value>, ProduceError> {
            Ok(input)
        }
    }

    fn graph(names: &[&str]) -> (ProducerGraph, Vec<ProducerId>) {
        let mut g = ProducerGraph::new();
        let ids = names
            .iter()
            .map(|n| g.add_producer(ProducerNode::new(*n, Noop)).unwrap())
            .collect();
        (g, ids)
    }

    #[test]
    fn relate_mirrors_both_endpoints() {
        let (mut g, ids) = graph(&["a", "b"]);
        let rid = g.relate(ids[0], ids[1], RelationOptions::new()).unwrap();
        assert_eq!(g[ids[0]].children(), &[rid]);
        assert_eq!(g[ids[1]].parents(), &[rid]);
        assert!(g.is_parent_of(ids[0], ids[1]));
        assert!(g.is_belongs_to(ids[1], ids[0]));
        assert!(g.is_root(ids[0]));
        assert!(g.is_youngest(ids[1]));
    }

    #[test]
    fn break_relation_works_from_either_side() {
        let (mut g, ids) = graph(&["a", "b"]);
        g.relate(ids[0], ids[1], RelationOptions::new()).unwrap();
        g.break_relation(ids[1], ids[0]).unwrap();
        assert!(g[ids[0]].children().is_empty());
        assert!(g[ids[1]].parents().is_empty());

        let err = g.break_relation(ids[0], ids[1]).unwrap_err();
        assert_eq!(err.kind(), "Graph");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let (mut g, _) = graph(&["a"]);
        assert!(g.add_producer(ProducerNode::new("a", Noop)).is_err());
        assert_eq!(g.find("a"), Some(ProducerId(0)));
        assert_eq!(g.find("missing"), None);
    }

    #[test]
    fn fit_condition_accepts_finished_or_skipped_parents() {
        let (mut g, ids) = graph(&["a", "b", "c"]);
        g.relate(ids[0], ids[2], RelationOptions::new()).unwrap();
        g.relate(ids[1], ids[2], RelationOptions::new()).unwrap();

        let mut finished = HashSet::new();
        let mut skipped = HashSet::new();
        assert!(g.fit_condition(ids[0], &finished, &skipped));
        assert!(!g.fit_condition(ids[2], &finished, &skipped));

        finished.insert(ids[0]);
        assert!(!g.fit_condition(ids[2], &finished, &skipped));
        skipped.insert(ids[1]);
        assert!(g.fit_condition(ids[2], &finished, &skipped));
    }

    #[test]
    fn judge_failure_names_the_edge() {
        let (mut g, ids) = graph(&["A", "B"]);
        let rid = g
            .relate(
                ids[0],
                ids[1],
                RelationOptions::new().condition(ConditionExpr::compare("", CompareOp::Gt, 1)),
            )
            .unwrap();
        assert!(g.judge(rid, &Value::from(2)).unwrap());
        let err = g.judge(rid, &Value::from("x")).unwrap_err();
        assert!(err.to_string().contains("A -> B"), "{err}");
    }

    #[test]
    fn cycles_are_detected() {
        let (mut g, ids) = graph(&["a", "b", "c"]);
        g.relate(ids[0], ids[1], RelationOptions::new()).unwrap();
        g.relate(ids[1], ids[2], RelationOptions::new()).unwrap();
        assert_eq!(g.find_cycle(), None);
        g.relate(ids[2], ids[1], RelationOptions::new()).unwrap();
        let culprit = g.find_cycle().unwrap();
        assert!(culprit == "b" || culprit == "c");
    }

    #[test]
    fn unreachable_reports_side_entries_and_islands() {
        let (mut g, ids) = graph(&["A", "B", "X", "Y"]);
        g.relate(ids[0], ids[1], RelationOptions::new()).unwrap();
        g.relate(ids[2], ids[1], RelationOptions::new()).unwrap();
        let mut unreachable = g.unreachable_from(ids[0]);
        unreachable.sort();
        assert_eq!(unreachable, vec!["X".to_string(), "Y".to_string()]);
    }
}
