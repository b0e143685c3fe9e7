//! Dependency graph shared by the component and line-item validators.
//!
//! Nodes are the definitions of a template, indexed by their position in the
//! template (the arena index). An edge `node -> dependency` means `node`
//! reads `dependency`'s value.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

#[derive(Debug, Clone)]
pub(crate) struct DependencyGraph {
    ids: Vec<String>,
    dependencies: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub(crate) fn new(ids: Vec<String>) -> Self {
        let dependencies = vec![Vec::new(); ids.len()];
        Self { ids, dependencies }
    }

    pub(crate) fn add_dependency(&mut self, node: usize, dependency: usize) {
        let edges = &mut self.dependencies[node];
        if !edges.contains(&dependency) {
            edges.push(dependency);
        }
    }

    /// Finds every cycle reachable by depth-first traversal.
    ///
    /// A cycle is reported when the traversal meets a node that is still on
    /// the recursion stack; the path runs from that node back to itself.
    /// Nodes are visited in template order and edges in insertion order, so
    /// the output is deterministic.
    pub(crate) fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut state = vec![VisitState::Unvisited; self.ids.len()];
        let mut stack = Vec::new();
        let mut cycles: Vec<Vec<usize>> = Vec::new();

        for node in 0..self.ids.len() {
            if state[node] == VisitState::Unvisited {
                self.visit(node, &mut state, &mut stack, &mut cycles);
            }
        }

        cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| self.ids[i].clone()).collect())
            .collect()
    }

    fn visit(
        &self,
        node: usize,
        state: &mut [VisitState],
        stack: &mut Vec<usize>,
        cycles: &mut Vec<Vec<usize>>,
    ) {
        state[node] = VisitState::InProgress;
        stack.push(node);

        for &dependency in &self.dependencies[node] {
            match state[dependency] {
                VisitState::Unvisited => self.visit(dependency, state, stack, cycles),
                VisitState::InProgress => {
                    if let Some(start) = stack.iter().position(|&n| n == dependency) {
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(dependency);
                        if !cycles.iter().any(|known| same_cycle(known, &cycle)) {
                            cycles.push(cycle);
                        }
                    }
                }
                VisitState::Done => {}
            }
        }

        stack.pop();
        state[node] = VisitState::Done;
    }

    /// Orders nodes so every dependency precedes its dependents.
    ///
    /// Kahn's algorithm; among ready nodes the lowest template position goes
    /// first. Returns the ids left unordered if the graph has a cycle.
    pub(crate) fn topological_order(&self) -> Result<Vec<usize>, Vec<String>> {
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.ids.len()];
        let mut in_degree: Vec<usize> = vec![0; self.ids.len()];

        for (node, deps) in self.dependencies.iter().enumerate() {
            in_degree[node] = deps.len();
            for &dependency in deps {
                dependents[dependency].push(node);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| Reverse(node))
            .collect();

        let mut order = Vec::with_capacity(self.ids.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != self.ids.len() {
            let remaining = (0..self.ids.len())
                .filter(|node| !order.contains(node))
                .map(|node| self.ids[node].clone())
                .collect();
            return Err(remaining);
        }

        Ok(order)
    }
}

fn same_cycle(a: &[usize], b: &[usize]) -> bool {
    // Both paths repeat their first node at the end; compare the rotations.
    let a = &a[..a.len() - 1];
    let b = &b[..b.len() - 1];
    if a.len() != b.len() {
        return false;
    }
    (0..a.len()).any(|shift| (0..a.len()).all(|i| a[(i + shift) % a.len()] == b[i]))
}
