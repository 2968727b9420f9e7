//! # Dependency Resolver
//!
//! Accepts dependency edges during construction, then produces the ordered
//! Declare/Define stream in a single pass.

use crate::model::EntityId;
use crate::state::{DependencyEdge, Step};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("dependency cycle between {} steps", .steps.len())]
    Cycle { steps: Vec<Step> },
}

/// Turns accumulated dependency edges into a valid callback order.
///
/// For every submitted edge, the object's step that satisfies the object
/// state must come before the subject's step that requires it. An edge set
/// that cannot be satisfied is an error, never silently dropped.
pub trait Scheduler {
    /// Register an entity, whether or not it has edges
    fn insert(&mut self, entity: EntityId);

    fn depend(&mut self, edge: DependencyEdge);

    /// Order all registered steps
    fn solve(&mut self) -> Result<Vec<Step>, SchedulingError>;
}

/// Default scheduler: a Declare and a Define node per entity, ordered
/// topologically.
#[derive(Debug, Default)]
pub struct DepResolver {
    graph: DiGraph<Step, ()>,
    nodes: HashMap<EntityId, (NodeIndex, NodeIndex)>,
}

impl DepResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edges between steps, including the implicit declare-before-define
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn register(&mut self, entity: EntityId) -> (NodeIndex, NodeIndex) {
        if let Some(nodes) = self.nodes.get(&entity) {
            return *nodes;
        }
        let declare = self.graph.add_node(Step::declare(entity));
        let define = self.graph.add_node(Step::define(entity));
        self.graph.add_edge(declare, define, ());
        self.nodes.insert(entity, (declare, define));
        (declare, define)
    }

    fn cycle(&self) -> Vec<Step> {
        let mut nodes = tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.len() > 1 || scc.first().map_or(false, |n| self.graph.contains_edge(*n, *n)))
            .unwrap_or_default();
        nodes.sort();
        nodes.into_iter().map(|n| self.graph[n]).collect()
    }
}

impl Scheduler for DepResolver {
    fn insert(&mut self, entity: EntityId) {
        self.register(entity);
    }

    fn depend(&mut self, edge: DependencyEdge) {
        let (subject_declare, subject_define) = self.register(edge.subject);
        let (object_declare, object_define) = self.register(edge.object);

        let after = if edge.subject_state.includes_declared() {
            subject_declare
        } else {
            subject_define
        };
        let before = if edge.object_state.includes_valid() {
            object_define
        } else {
            object_declare
        };

        // On a single entity only "declared after own define" is not
        // already implied by declare-before-define
        if edge.subject == edge.object && !(before == object_define && after == subject_declare) {
            return;
        }
        self.graph.update_edge(before, after, ());
    }

    fn solve(&mut self) -> Result<Vec<Step>, SchedulingError> {
        let mut indegree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        // Lowest index first keeps registration order among free steps
        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|n| indegree[n.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.graph[node]);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                indegree[next.index()] -= 1;
                if indegree[next.index()] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.graph.node_count() {
            let steps = self.cycle();
            tracing::debug!("[DEPWALK] Unresolved cycle over {} steps", steps.len());
            return Err(SchedulingError::Cycle { steps });
        }

        Ok(order)
    }
}
