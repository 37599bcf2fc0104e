//! Hierarchical task network decomposition.
//!
//! The search is depth-first over an explicit stack of frames instead of
//! recursion. A compound task leaves a choice point on the stack that
//! remembers which method to try next, so methods run in registration order
//! and a later method is only decomposed once every earlier one has failed.

use super::{Constraints, Plan, PlanStrategy, PlanningError, Result, Task, TaskPlanner};
use crate::state::WorldState;

use std::collections::VecDeque;
use tracing::{debug, trace};

/// A partial decomposition: the tasks still to process and what has been
/// committed so far.
#[derive(Debug, Clone)]
struct Branch {
    tasks: VecDeque<Task>,
    state: WorldState,
    plan: Vec<usize>,
    depth: usize,
}

#[derive(Debug)]
enum Frame {
    /// Consume primitive tasks from the front of the branch.
    Advance(Branch),
    /// Try methods for `task`, starting at index `next_method` of the
    /// planner's method table.
    Choose {
        branch: Branch,
        task: Task,
        next_method: usize,
    },
}

impl TaskPlanner {
    /// Decompose `tasks` into a primitive operator sequence.
    ///
    /// The depth counter only grows when a compound task is decomposed; a
    /// branch deeper than `max_depth` fails.
    pub fn htn_plan(
        &self,
        tasks: &[Task],
        initial_state: &WorldState,
        constraints: &Constraints,
    ) -> Result<Plan> {
        let mut stack = vec![Frame::Advance(Branch {
            tasks: tasks.iter().cloned().collect(),
            state: initial_state.clone(),
            plan: Vec::new(),
            depth: 0,
        })];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Advance(branch) => {
                    if let Some(plan) = self.advance(branch, constraints, &mut stack) {
                        return Ok(plan);
                    }
                }
                Frame::Choose {
                    branch,
                    task,
                    next_method,
                } => self.choose(branch, task, next_method, &mut stack),
            }
        }

        debug!(tasks = tasks.len(), "HTN decomposition exhausted");
        Err(PlanningError::NoPlanFound {
            goal: tasks
                .first()
                .map(|t| t.name().to_string())
                .unwrap_or_default(),
        })
    }

    /// Run primitives until the branch finishes, fails, or reaches a
    /// compound task. Returns the finished plan on success.
    fn advance(
        &self,
        mut branch: Branch,
        constraints: &Constraints,
        stack: &mut Vec<Frame>,
    ) -> Option<Plan> {
        if branch.depth > self.config.max_depth {
            trace!(depth = branch.depth, "max depth exceeded");
            return None;
        }

        loop {
            let Some(task) = branch.tasks.pop_front() else {
                return Some(Plan::from_indices(self, &branch.plan, PlanStrategy::Htn, 0));
            };

            match task {
                Task::Primitive(name) => {
                    let Some(index) = self.operator_index(&name) else {
                        trace!(task = %name, "no operator for primitive task");
                        return None;
                    };
                    let operator = &self.operators[index];
                    if !operator.is_applicable(&branch.state) {
                        trace!(task = %name, "preconditions not met");
                        return None;
                    }
                    let next = operator.apply(&branch.state);
                    if !constraints.check(&next, operator) {
                        trace!(task = %name, "constraint violated");
                        return None;
                    }
                    branch.state = next;
                    branch.plan.push(index);
                }
                compound @ Task::Compound { .. } => {
                    stack.push(Frame::Choose {
                        branch,
                        task: compound,
                        next_method: 0,
                    });
                    return None;
                }
            }
        }
    }

    fn choose(&self, branch: Branch, task: Task, next_method: usize, stack: &mut Vec<Frame>) {
        for (i, method) in self.methods.iter().enumerate().skip(next_method) {
            if method.task_name != task.name() || !method.is_applicable(&branch.state) {
                continue;
            }
            let Some(subtasks) = method.decompose(&task, &branch.state) else {
                continue;
            };
            trace!(
                task = %task.name(),
                method = i,
                subtasks = subtasks.len(),
                depth = branch.depth + 1,
                "decomposed"
            );

            let mut tasks: VecDeque<Task> = subtasks.into();
            tasks.extend(branch.tasks.iter().cloned());
            let child = Branch {
                tasks,
                state: branch.state.clone(),
                plan: branch.plan.clone(),
                depth: branch.depth + 1,
            };

            // Resume after this method if the child branch fails.
            stack.push(Frame::Choose {
                branch,
                task,
                next_method: i + 1,
            });
            stack.push(Frame::Advance(child));
            return;
        }
        trace!(task = %task.name(), "no applicable method");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
