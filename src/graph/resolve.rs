use std::collections::VecDeque;

use crate::error::SetupError;
use crate::registry::{CompId, SlotId};

use super::flatten::Model;

/// Execution order produced by [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Components in the order an evaluation pass runs them
    pub components: Vec<CompId>,
    /// Logical variables in dependency order
    pub variables: Vec<SlotId>,
}

/// Dependency graph over slots and components.
///
/// Node `i < n_slots` is slot `i`; node `n_slots + c` is component `c`.
/// Edges: parameter slot -> component -> output slot, and connection
/// source slot -> target slot. Routing intra-component edges through a
/// component node is the same as linking every parameter to every output.
struct DepGraph {
    n_slots: usize,
    succ: Vec<Vec<usize>>,
    pred: Vec<Vec<usize>>,
}

impl DepGraph {
    fn build(model: &Model) -> Self {
        let n_slots = model.registry.slot_count();
        let n = n_slots + model.components.len();
        let mut graph = Self {
            n_slots,
            succ: vec![Vec::new(); n],
            pred: vec![Vec::new(); n],
        };

        for (c, entry) in model.components.iter().enumerate() {
            let node = n_slots + c;
            for slot in &entry.params {
                graph.edge(slot.0, node);
            }
            for slot in &entry.outputs {
                graph.edge(node, slot.0);
            }
        }
        for s in 0..n_slots {
            for target in &model.registry.slot(SlotId(s)).targets {
                graph.edge(s, target.0);
            }
        }
        graph
    }

    fn edge(&mut self, from: usize, to: usize) {
        self.succ[from].push(to);
        self.pred[to].push(from);
    }

    fn len(&self) -> usize {
        self.succ.len()
    }

    /// Walk backwards through unscheduled nodes until one repeats.
    ///
    /// Every unscheduled node still has an unscheduled predecessor, so the
    /// walk always closes a cycle.
    fn find_cycle(&self, scheduled: &[bool]) -> Vec<usize> {
        let Some(start) = (0..self.len()).find(|&i| !scheduled[i]) else {
            return Vec::new();
        };

        let mut position = vec![None; self.len()];
        let mut path = Vec::new();
        let mut node = start;
        loop {
            if let Some(i) = position[node] {
                let mut cycle: Vec<usize> = path[i..].to_vec();
                cycle.reverse();
                if let Some(min_at) = cycle.iter().enumerate().min_by_key(|(_, n)| **n).map(|(i, _)| i) {
                    cycle.rotate_left(min_at);
                }
                return cycle;
            }
            position[node] = Some(path.len());
            path.push(node);
            match self.pred[node].iter().find(|&&p| !scheduled[p]) {
                Some(&p) => node = p,
                None => return Vec::new(),
            }
        }
    }
}

/// Topologically order the flattened model with Kahn's algorithm.
///
/// Fails with [`SetupError::CyclicGraphError`] listing the variables on one
/// cycle, in edge order.
pub(crate) fn resolve(model: &Model) -> Result<Schedule, SetupError> {
    let graph = DepGraph::build(model);
    let n = graph.len();

    let mut in_degree: Vec<usize> = graph.pred.iter().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut scheduled = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop_front() {
        scheduled[node] = true;
        order.push(node);
        for &next in &graph.succ[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < n {
        let cycle = graph
            .find_cycle(&scheduled)
            .into_iter()
            .filter(|&node| node < graph.n_slots)
            .map(|node| model.registry.label(SlotId(node)).to_string())
            .collect();
        return Err(SetupError::CyclicGraphError { cycle });
    }

    let mut schedule = Schedule::default();
    for node in order {
        if node < graph.n_slots {
            schedule.variables.push(SlotId(node));
        } else {
            schedule.components.push(CompId(node - graph.n_slots));
        }
    }
    Ok(schedule)
}
