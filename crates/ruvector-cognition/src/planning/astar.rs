//! A\* search over world states.
//!
//! Nodes are ordered by `f = g + h` in a binary min-heap, where `g` is the
//! accumulated operator cost and `h` the number of goal facts not yet
//! satisfied. Nodes with equal `f` are extracted in insertion order.

use super::{Constraints, Plan, PlanStrategy, PlanningError, PlanningGoal, Result, TaskPlanner};
use crate::state::WorldState;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use tracing::{debug, trace};

/// Hamming distance from `state` to the goal conditions.
pub fn heuristic(state: &WorldState, goal: &WorldState) -> f64 {
    state.mismatch_count(goal) as f64
}

struct SearchNode {
    state: WorldState,
    plan: Vec<usize>,
    g: f64,
    f: f64,
    seq: u64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for SearchNode {}
impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for BinaryHeap: lowest f first, then earliest insertion.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TaskPlanner {
    /// Search for the cheapest operator sequence whose final state
    /// satisfies `goal.conditions`.
    ///
    /// A state is expanded at most once; the search stops after
    /// `max_iterations` expansions.
    pub fn astar_plan(
        &self,
        goal: &PlanningGoal,
        initial_state: &WorldState,
        constraints: &Constraints,
    ) -> Result<Plan> {
        let mut open = BinaryHeap::new();
        let mut closed: HashSet<u64> = HashSet::new();
        let mut seq = 0u64;
        let mut expanded = 0usize;

        let h = heuristic(initial_state, &goal.conditions);
        open.push(SearchNode {
            state: initial_state.clone(),
            plan: Vec::new(),
            g: 0.0,
            f: h,
            seq,
        });

        while let Some(node) = open.pop() {
            let key = node.state.canonical_hash();
            if closed.contains(&key) {
                continue;
            }

            if node.state.satisfies(&goal.conditions) {
                debug!(
                    goal = %goal.name,
                    steps = node.plan.len(),
                    cost = node.g,
                    expanded,
                    "A* reached goal"
                );
                return Ok(Plan::from_indices(
                    self,
                    &node.plan,
                    PlanStrategy::Search,
                    expanded,
                ));
            }

            if expanded >= self.config.max_iterations {
                debug!(goal = %goal.name, expanded, "A* iteration budget exhausted");
                break;
            }
            closed.insert(key);
            expanded += 1;
            trace!(g = node.g, f = node.f, open = open.len(), "expanding");

            for (index, operator) in self.operators.iter().enumerate() {
                if !operator.is_applicable(&node.state) {
                    continue;
                }
                let next = operator.apply(&node.state);
                if !constraints.check(&next, operator) {
                    continue;
                }
                if closed.contains(&next.canonical_hash()) {
                    continue;
                }

                let g = node.g + operator.cost;
                let h = heuristic(&next, &goal.conditions);
                let mut plan = node.plan.clone();
                plan.push(index);
                seq += 1;
                open.push(SearchNode {
                    state: next,
                    plan,
                    g,
                    f: g + h,
                    seq,
                });
            }
        }

        debug!(goal = %goal.name, expanded, "A* found no plan");
        Err(PlanningError::NoPlanFound {
            goal: goal.name.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
