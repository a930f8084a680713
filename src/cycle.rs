//! Cycle detection for prerequisite and module-import graphs.

use std::collections::HashMap;
use std::hash::Hash;

/// Tracks the visitation state of a node during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Search `edges` (node to the nodes it depends on) for a cycle and return
/// it closed and rotated to start at its smallest node.
///
/// Nodes are visited in `order` so reports are deterministic. Edges to nodes
/// without an entry in `edges` are leaves.
pub(crate) fn find_cycle<N>(order: &[N], edges: &HashMap<N, Vec<N>>) -> Option<Vec<N>>
where
    N: Clone + Eq + Hash + Ord,
{
    let mut detector = CycleDetector::new(edges);
    order
        .iter()
        .filter_map(|node| {
            if detector.is_visited(node) {
                None
            } else {
                detector.visit(node.clone())
            }
        })
        .next()
}

struct CycleDetector<'a, N> {
    edges: &'a HashMap<N, Vec<N>>,
    stack: Vec<N>,
    states: HashMap<N, VisitState>,
}

impl<'a, N> CycleDetector<'a, N>
where
    N: Clone + Eq + Hash + Ord,
{
    fn new(edges: &'a HashMap<N, Vec<N>>) -> Self {
        Self {
            edges,
            stack: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn is_visited(&self, node: &N) -> bool {
        matches!(self.states.get(node), Some(VisitState::Visited))
    }

    fn visit(&mut self, node: N) -> Option<Vec<N>> {
        match self.states.get(&node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self
                    .stack
                    .iter()
                    .position(|n| n == &node)
                    .unwrap_or_else(|| {
                        debug_assert!(false, "visiting node must be on the stack");
                        0
                    });
                let mut cycle: Vec<N> = self.stack.iter().skip(idx).cloned().collect();
                cycle.push(node);
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(node.clone(), VisitState::Visiting);
            }
        }

        self.stack.push(node.clone());

        let edges = self.edges;
        if let Some(deps) = edges.get(&node) {
            for dep in deps {
                if !edges.contains_key(dep) {
                    continue;
                }
                if let Some(cycle) = self.visit(dep.clone()) {
                    return Some(cycle);
                }
            }
        }

        self.stack.pop();
        self.states.insert(node, VisitState::Visited);
        None
    }
}

/// Rotate a closed cycle so it starts at its smallest node.
fn canonicalize_cycle<N: Clone + Ord>(mut cycle: Vec<N>) -> Vec<N> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        *slot = first;
    }
    cycle
}
