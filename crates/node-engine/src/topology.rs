//! Cycle-checked topological ordering
//!
//! Depth-first search with a temporary mark for nodes on the current path
//! and a permanent mark for finished nodes. The returned order is the
//! reverse postorder, so every producer precedes its consumers.

use std::collections::{HashMap, HashSet};

use crate::error::{NodeEngineError, Result};
use crate::types::{GraphEdge, GraphNode, NodeId};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Order node ids so that each edge's source comes before its target
///
/// Independent nodes keep their node-list order. Edges whose endpoints are
/// not in `nodes` are ignored. Fails with `Cycle` carrying the offending
/// path (first and last element equal) as soon as one is found.
pub fn topological_sort(nodes: &[GraphNode], edges: &[GraphEdge]) -> Result<Vec<NodeId>> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        if known.contains(edge.source.as_str()) && known.contains(edge.target.as_str()) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    let mut postorder: Vec<NodeId> = Vec::with_capacity(nodes.len());

    // Walking roots and successors back to front makes the reversed
    // postorder list independent nodes front to back.
    for node in nodes.iter().rev() {
        if !marks.contains_key(node.id.as_str()) {
            visit(&node.id, &adjacency, &mut marks, &mut path, &mut postorder)?;
        }
    }

    postorder.reverse();
    Ok(postorder)
}

fn visit<'a>(
    node_id: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    postorder: &mut Vec<NodeId>,
) -> Result<()> {
    match marks.get(node_id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|id| *id == node_id).unwrap_or(0);
            let mut cycle: Vec<NodeId> = path[start..].iter().map(|id| id.to_string()).collect();
            cycle.push(node_id.to_string());
            return Err(NodeEngineError::Cycle { path: cycle });
        }
        None => {}
    }

    marks.insert(node_id, Mark::Visiting);
    path.push(node_id);

    if let Some(targets) = adjacency.get(node_id) {
        for target in targets.iter().rev() {
            visit(target, adjacency, marks, path, postorder)?;
        }
    }

    path.pop();
    marks.insert(node_id, Mark::Done);
    postorder.push(node_id.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<GraphNode> {
        ids.iter().map(|id| GraphNode::new(*id, "stub")).collect()
    }

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge::new(format!("{}-{}", source, target), source, target)
    }

    fn assert_valid(order: &[NodeId], edges: &[GraphEdge]) {
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for e in edges {
            assert!(
                position[e.source.as_str()] < position[e.target.as_str()],
                "{} must precede {} in {:?}",
                e.source,
                e.target,
                order
            );
        }
    }

    #[test]
    fn test_linear_chain() {
        let edges = vec![edge("a", "b"), edge("b", "c")];
        let order = topological_sort(&nodes(&["c", "b", "a"]), &edges).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_and_fan_out() {
        let all = nodes(&["d", "c", "a", "e", "b", "f"]);
        let edges = vec![
            edge("a", "b"),
            edge("a", "c"),
            edge("b", "d"),
            edge("c", "d"),
            edge("e", "f"),
            edge("a", "f"),
        ];
        let order = topological_sort(&all, &edges).unwrap();

        assert_eq!(order.len(), all.len());
        assert_valid(&order, &edges);
    }

    #[test]
    fn test_isolated_nodes_keep_encounter_order() {
        let order = topological_sort(&nodes(&["n1", "n2", "n3"]), &[]).unwrap();
        assert_eq!(order, vec!["n1", "n2", "n3"]);
    }

    #[test]
    fn test_two_node_cycle() {
        let edges = vec![edge("A", "B"), edge("B", "A")];
        let err = topological_sort(&nodes(&["A", "B"]), &edges).unwrap_err();

        match err {
            NodeEngineError::Cycle { path } => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_and_cycle_behind_acyclic_prefix() {
        let err = topological_sort(&nodes(&["a"]), &[edge("a", "a")]).unwrap_err();
        assert!(matches!(err, NodeEngineError::Cycle { ref path } if path == &["a", "a"]));

        let edges = vec![edge("root", "x"), edge("x", "y"), edge("y", "z"), edge("z", "x")];
        let err = topological_sort(&nodes(&["root", "x", "y", "z"]), &edges).unwrap_err();
        match err {
            NodeEngineError::Cycle { path } => {
                assert!(!path.contains(&"root".to_string()));
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_edges_are_ignored() {
        let edges = vec![edge("a", "ghost"), edge("ghost", "a"), edge("a", "b")];
        let order = topological_sort(&nodes(&["a", "b"]), &edges).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }
}
