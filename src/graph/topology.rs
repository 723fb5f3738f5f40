//! Topological analysis of pipelines.
//!
//! Provides algorithms for:
//! - Topological sorting (execution order)
//! - Dependency closures of an update target
//! - Parallel batch identification

use crate::core::error::{GraphError, GraphResult, NodeId};
use crate::graph::structure::Pipeline;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, VecDeque};

/// Analyzer for pipeline topology.
///
/// Every ordering it produces is deterministic: ties are broken by node
/// insertion order.
pub struct TopologyAnalyzer<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Create a new analyzer for the given pipeline.
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Get the topological sort order of the whole pipeline (Kahn's algorithm).
    ///
    /// Returns nodes in an order where producers come before consumers.
    pub fn topological_sort(&self) -> GraphResult<Vec<NodeId>> {
        let all: IndexSet<NodeId> = self.pipeline.node_ids().collect();
        self.sort_subset(&all)
    }

    /// The target node and every node it transitively reads from.
    pub fn dependency_closure(&self, target: NodeId) -> GraphResult<IndexSet<NodeId>> {
        if !self.pipeline.has_node(target) {
            return Err(GraphError::NodeNotFound(target));
        }
        let mut closure = IndexSet::new();
        let mut queue = VecDeque::from([target]);
        while let Some(current) = queue.pop_front() {
            if closure.insert(current) {
                for conn in self.pipeline.connections_to(current) {
                    queue.push_back(conn.from.node_id);
                }
            }
        }
        Ok(closure)
    }

    /// Execution order of the nodes an update of `target` involves.
    ///
    /// The target comes last.
    pub fn dependency_order(&self, target: NodeId) -> GraphResult<Vec<NodeId>> {
        let closure = self.dependency_closure(target)?;
        self.sort_subset(&closure)
    }

    fn sort_subset(&self, subset: &IndexSet<NodeId>) -> GraphResult<Vec<NodeId>> {
        // Keep pipeline insertion order for tie breaking.
        let members: Vec<NodeId> = self
            .pipeline
            .node_ids()
            .filter(|id| subset.contains(id))
            .collect();

        let mut in_degree: IndexMap<NodeId, usize> =
            members.iter().map(|&id| (id, 0)).collect();
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for conn in self.pipeline.connections() {
            let (from, to) = (conn.from.node_id, conn.to.node_id);
            if !subset.contains(&from) || !subset.contains(&to) {
                continue;
            }
            adjacency.entry(from).or_default().push(to);
            if let Some(degree) = in_degree.get_mut(&to) {
                *degree += 1;
            }
        }

        // Start with nodes that have no incoming edges
        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut result = Vec::with_capacity(members.len());

        while let Some(node) = queue.pop_front() {
            result.push(node);
            let Some(neighbors) = adjacency.get(&node) else {
                continue;
            };
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*neighbor);
                    }
                }
            }
        }

        // If we haven't visited all nodes, there's a cycle
        if result.len() != members.len() {
            let remaining: Vec<NodeId> = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(&id, _)| id)
                .collect();

            return Err(GraphError::CycleDetected { nodes: remaining });
        }

        Ok(result)
    }

    /// Group an execution order into batches of mutually independent nodes.
    ///
    /// Nodes in the same batch can run in parallel: none reads, directly or
    /// transitively, from another. Batches keep the relative order of
    /// `order`, which must be topologically sorted.
    pub fn parallel_batches(&self, order: &[NodeId]) -> Vec<Vec<NodeId>> {
        let mut depth: HashMap<NodeId, usize> = HashMap::new();
        let mut batches: Vec<Vec<NodeId>> = Vec::new();

        for &node_id in order {
            let node_depth = self
                .pipeline
                .connections_to(node_id)
                .filter_map(|conn| depth.get(&conn.from.node_id))
                .max()
                .map_or(0, |d| d + 1);

            depth.insert(node_id, node_depth);
            if batches.len() <= node_depth {
                batches.resize_with(node_depth + 1, Vec::new);
            }
            batches[node_depth].push(node_id);
        }

        batches
    }

    /// Check if the pipeline has any cycles.
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::{Add, ImageSource, ShiftScale};

    fn shift(pipeline: &mut Pipeline) -> NodeId {
        pipeline.add_filter(Box::new(ShiftScale::<u8>::new()))
    }

    #[test]
    fn test_topological_sort() {
        let mut pipeline = Pipeline::new();

        let node3 = shift(&mut pipeline);
        let node1 = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
        let node2 = shift(&mut pipeline);

        pipeline.connect(node1, 0, node2, 0).unwrap();
        pipeline.connect(node2, 0, node3, 0).unwrap();

        let analyzer = TopologyAnalyzer::new(&pipeline);
        assert_eq!(analyzer.topological_sort().unwrap(), vec![node1, node2, node3]);
        assert!(!analyzer.has_cycle());
    }

    #[test]
    fn test_dependency_order_excludes_unrelated() {
        let mut pipeline = Pipeline::new();

        let src = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
        let a = shift(&mut pipeline);
        let b = shift(&mut pipeline);
        let unrelated = shift(&mut pipeline);

        pipeline.connect(src, 0, a, 0).unwrap();
        pipeline.connect(src, 0, b, 0).unwrap();
        pipeline.connect(src, 0, unrelated, 0).unwrap();
        pipeline.connect(a, 0, b, 0).unwrap();

        let analyzer = TopologyAnalyzer::new(&pipeline);
        assert_eq!(analyzer.dependency_order(b).unwrap(), vec![src, a, b]);
        assert_eq!(analyzer.dependency_order(src).unwrap(), vec![src]);
        assert!(matches!(
            analyzer.dependency_order(NodeId::new()),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_parallel_batches() {
        let mut pipeline = Pipeline::new();

        // Diamond: src -> a, src -> b, (a, b) -> sum
        let src = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
        let a = shift(&mut pipeline);
        let b = shift(&mut pipeline);
        let sum = pipeline.add_filter(Box::new(Add::<u8>::new()));

        pipeline.connect(src, 0, a, 0).unwrap();
        pipeline.connect(src, 0, b, 0).unwrap();
        pipeline.connect(a, 0, sum, "first").unwrap();
        pipeline.connect(b, 0, sum, "second").unwrap();

        let analyzer = TopologyAnalyzer::new(&pipeline);
        let order = analyzer.dependency_order(sum).unwrap();
        let batches = analyzer.parallel_batches(&order);
        assert_eq!(batches, vec![vec![src], vec![a, b], vec![sum]]);
    }

    #[test]
    fn test_cycle_reported() {
        let mut pipeline = Pipeline::new();
        let a = shift(&mut pipeline);
        let b = shift(&mut pipeline);
        pipeline.connect(a, 0, b, 0).unwrap();
        pipeline.insert_connection_unchecked(b, 0, a, 0);

        let analyzer = TopologyAnalyzer::new(&pipeline);
        assert!(analyzer.has_cycle());
        assert!(matches!(
            analyzer.dependency_order(b),
            Err(GraphError::CycleDetected { .. })
        ));
    }
}
