//! Planning-domain types: STRIPS operators, HTN methods, tasks, goals, and
//! constraints.

use crate::state::{Value, WorldState};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// A primitive STRIPS action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    pub preconditions: WorldState,
    pub effects: WorldState,
    #[serde(default = "default_unit")]
    pub cost: f64,
    #[serde(default = "default_unit")]
    pub duration: f64,
}

fn default_unit() -> f64 {
    1.0
}

impl Operator {
    /// Create an operator with unit cost and duration.
    pub fn new(name: impl Into<String>, preconditions: WorldState, effects: WorldState) -> Self {
        Self {
            name: name.into(),
            preconditions,
            effects,
            cost: 1.0,
            duration: 1.0,
        }
    }

    /// Set the cost used by A* and plan totals.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Set the duration checked by the deadline constraint.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    /// Whether every precondition holds in `state`.
    pub fn is_applicable(&self, state: &WorldState) -> bool {
        state.satisfies(&self.preconditions)
    }

    /// The state after applying this operator's effects.
    pub fn apply(&self, state: &WorldState) -> WorldState {
        state.applied(&self.effects)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// An entry of an HTN task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Executed directly by the operator of the same name.
    Primitive(String),
    /// Decomposed by the methods registered for `name`.
    Compound {
        name: String,
        #[serde(default)]
        payload: BTreeMap<String, Value>,
    },
}

impl Task {
    /// A task executed directly by the operator of the same name.
    pub fn primitive(name: impl Into<String>) -> Self {
        Task::Primitive(name.into())
    }

    /// A compound task with an empty payload.
    pub fn compound(name: impl Into<String>) -> Self {
        Task::Compound {
            name: name.into(),
            payload: BTreeMap::new(),
        }
    }

    /// Compound task carrying parameters for its decomposition function.
    pub fn compound_with(name: impl Into<String>, payload: BTreeMap<String, Value>) -> Self {
        Task::Compound {
            name: name.into(),
            payload,
        }
    }

    /// Task name, used to look up operators and methods.
    pub fn name(&self) -> &str {
        match self {
            Task::Primitive(name) => name,
            Task::Compound { name, .. } => name,
        }
    }

    /// Whether this is a primitive task.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Task::Primitive(_))
    }

    /// Payload of a compound task, `None` for primitives.
    pub fn payload(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Task::Primitive(_) => None,
            Task::Compound { payload, .. } => Some(payload),
        }
    }
}

impl From<&str> for Task {
    fn from(name: &str) -> Self {
        Task::Primitive(name.to_string())
    }
}

impl From<String> for Task {
    fn from(name: String) -> Self {
        Task::Primitive(name)
    }
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Produces subtasks for a compound task in a given state.
///
/// Returning `None` means the method does not apply.
pub type DecomposeFn = Arc<dyn Fn(&Task, &WorldState) -> Option<Vec<Task>> + Send + Sync>;

/// An HTN decomposition rule for one compound task name.
#[derive(Clone)]
pub struct Method {
    pub task_name: String,
    pub preconditions: WorldState,
    pub subtasks: Vec<Task>,
    pub decompose_fn: Option<DecomposeFn>,
}

impl Method {
    /// Create a method with a fixed subtask list.
    pub fn new(task_name: impl Into<String>, preconditions: WorldState, subtasks: Vec<Task>) -> Self {
        Self {
            task_name: task_name.into(),
            preconditions,
            subtasks,
            decompose_fn: None,
        }
    }

    /// Attach a decomposition function. It replaces the fixed subtask list.
    pub fn with_decomposition<F>(mut self, f: F) -> Self
    where
        F: Fn(&Task, &WorldState) -> Option<Vec<Task>> + Send + Sync + 'static,
    {
        self.decompose_fn = Some(Arc::new(f));
        self
    }

    /// Whether the method's preconditions hold in `state`.
    pub fn is_applicable(&self, state: &WorldState) -> bool {
        state.satisfies(&self.preconditions)
    }

    /// Subtasks for `task` in `state`, or `None` when decomposition fails.
    pub fn decompose(&self, task: &Task, state: &WorldState) -> Option<Vec<Task>> {
        match &self.decompose_fn {
            Some(f) => f(task, state),
            None => Some(self.subtasks.clone()),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("task_name", &self.task_name)
            .field("preconditions", &self.preconditions)
            .field("subtasks", &self.subtasks)
            .field("decompose_fn", &self.decompose_fn.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Goal & constraints
// ---------------------------------------------------------------------------

/// What the planner is asked to achieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningGoal {
    pub name: String,
    /// Facts that must hold in the final state (A* goal test).
    pub conditions: WorldState,
    /// Initial HTN task list. When empty, the compound task named after the
    /// goal is decomposed instead.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl PlanningGoal {
    /// Create a goal with no explicit task list.
    pub fn new(name: impl Into<String>, conditions: WorldState) -> Self {
        Self {
            name: name.into(),
            conditions,
            tasks: Vec::new(),
        }
    }

    /// Set the initial HTN task list.
    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = tasks;
        self
    }

    pub(crate) fn root_tasks(&self) -> Vec<Task> {
        if self.tasks.is_empty() {
            vec![Task::compound(self.name.clone())]
        } else {
            self.tasks.clone()
        }
    }
}

/// Limits checked after every operator application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Resource name -> maximum value of the same key in the world state.
    #[serde(default)]
    pub resources: BTreeMap<String, f64>,
    /// Latest permitted completion time, in the units of the `time` fact.
    #[serde(default)]
    pub deadline: Option<f64>,
}

/// World-state key read by the deadline constraint.
pub const TIME_KEY: &str = "time";

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the named resource fact at `limit`.
    pub fn with_resource(mut self, name: impl Into<String>, limit: f64) -> Self {
        self.resources.insert(name.into(), limit);
        self
    }

    /// Set the latest permitted completion time.
    pub fn with_deadline(mut self, deadline: f64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Check `state` (the result of applying `operator`) against the limits.
    ///
    /// Resource keys missing from the state, or holding non-numeric values,
    /// never violate their limit. A missing `time` fact counts as 0.
    pub fn check(&self, state: &WorldState, operator: &Operator) -> bool {
        for (resource, limit) in &self.resources {
            if let Some(usage) = state.number(resource) {
                if usage > *limit {
                    return false;
                }
            }
        }
        if let Some(deadline) = self.deadline {
            let now = state.number(TIME_KEY).unwrap_or(0.0);
            if now + operator.duration > deadline {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
