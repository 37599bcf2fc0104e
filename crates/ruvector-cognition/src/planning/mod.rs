//! Task planning: HTN decomposition with an A\* fallback over world states.
//!
//! The [`TaskPlanner`] owns a declarative table of STRIPS [`Operator`]s and
//! HTN [`Method`]s. [`TaskPlanner::plan`] first tries to decompose the goal
//! into primitive tasks ([`htn`]); when no decomposition succeeds it searches
//! the state space with A\* ([`astar`]).
//!
//! ```rust
//! use ruvector_cognition::planning::{Constraints, PlanningGoal, TaskPlanner};
//! use ruvector_cognition::world_state;
//!
//! let mut planner = TaskPlanner::default();
//! planner.register_operator(
//!     "stop",
//!     world_state! { "robot_state" => "moving" },
//!     world_state! { "robot_state" => "idle" },
//!     1.0,
//!     1.0,
//! );
//!
//! let goal = PlanningGoal::new("rest", world_state! { "robot_state" => "idle" });
//! let plan = planner
//!     .plan(&goal, &world_state! { "robot_state" => "moving" }, &Constraints::default())
//!     .unwrap();
//! assert_eq!(plan.names(), vec!["stop"]);
//! ```

pub mod astar;
pub mod domain;
pub mod htn;

pub use domain::{Constraints, DecomposeFn, Method, Operator, PlanningGoal, Task, TIME_KEY};

use crate::state::WorldState;

use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from planning operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanningError {
    #[error("no plan found for goal '{goal}'")]
    NoPlanFound { goal: String },
}

pub type Result<T> = std::result::Result<T, PlanningError>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Work bounds for the planner. These are its only cancellation mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of nested method decompositions.
    pub max_depth: usize,
    /// Maximum number of A\* node expansions.
    pub max_iterations: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_iterations: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Which strategy produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStrategy {
    Htn,
    Search,
}

/// An ordered operator sequence for an external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub operators: Vec<Operator>,
    pub total_cost: f64,
    pub total_duration: f64,
    pub strategy: PlanStrategy,
    /// A\* expansions (0 for HTN plans).
    pub nodes_expanded: usize,
}

impl Plan {
    pub(crate) fn from_indices(
        planner: &TaskPlanner,
        indices: &[usize],
        strategy: PlanStrategy,
        nodes_expanded: usize,
    ) -> Self {
        let operators: Vec<Operator> = indices
            .iter()
            .filter_map(|&i| planner.operators.get(i).cloned())
            .collect();
        let total_cost = operators.iter().map(|op| op.cost).sum();
        let total_duration = operators.iter().map(|op| op.duration).sum();
        Self {
            operators,
            total_cost,
            total_duration,
            strategy,
            nodes_expanded,
        }
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Operator names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.operators.iter().map(|op| op.name.as_str()).collect()
    }

    /// Final state after applying every operator to `initial`.
    pub fn simulate(&self, initial: &WorldState) -> WorldState {
        self.operators
            .iter()
            .fold(initial.clone(), |state, op| op.apply(&state))
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// HTN + A\* task planner over an operator/method table.
#[derive(Debug, Clone, Default)]
pub struct TaskPlanner {
    operators: Vec<Operator>,
    methods: Vec<Method>,
    config: PlannerConfig,
}

impl TaskPlanner {
    /// Create an empty planner with the given configuration.
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            operators: Vec::new(),
            methods: Vec::new(),
            config,
        }
    }

    /// Register a primitive operator.
    pub fn register_operator(
        &mut self,
        name: impl Into<String>,
        preconditions: WorldState,
        effects: WorldState,
        cost: f64,
        duration: f64,
    ) {
        self.add_operator(
            Operator::new(name, preconditions, effects)
                .with_cost(cost)
                .with_duration(duration),
        );
    }

    /// Register a fully built operator.
    pub fn add_operator(&mut self, operator: Operator) {
        debug!(name = %operator.name, "registered operator");
        self.operators.push(operator);
    }

    /// Register a decomposition method for `task_name`.
    pub fn register_method(
        &mut self,
        task_name: impl Into<String>,
        preconditions: WorldState,
        subtasks: Vec<Task>,
        decompose_fn: Option<DecomposeFn>,
    ) {
        let mut method = Method::new(task_name, preconditions, subtasks);
        method.decompose_fn = decompose_fn;
        self.add_method(method);
    }

    /// Register a fully built method.
    pub fn add_method(&mut self, method: Method) {
        debug!(task = %method.task_name, "registered method");
        self.methods.push(method);
    }

    /// Registered operators, in registration order.
    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// Methods for `task_name`, in registration order.
    pub fn methods_for<'a>(&'a self, task_name: &'a str) -> impl Iterator<Item = &'a Method> + 'a {
        self.methods.iter().filter(move |m| m.task_name == task_name)
    }

    /// Read-only access to the configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: PlannerConfig) {
        self.config = config;
    }

    /// Produce a plan for `goal`: HTN decomposition first, A\* on failure.
    pub fn plan(
        &self,
        goal: &PlanningGoal,
        initial_state: &WorldState,
        constraints: &Constraints,
    ) -> Result<Plan> {
        debug!(goal = %goal.name, "planning");
        match self.htn_plan(&goal.root_tasks(), initial_state, constraints) {
            Ok(plan) => {
                debug!(goal = %goal.name, steps = plan.len(), "HTN decomposition succeeded");
                Ok(plan)
            }
            Err(_) => {
                debug!(goal = %goal.name, "HTN decomposition failed, falling back to A*");
                self.astar_plan(goal, initial_state, constraints)
                    .map_err(|_| PlanningError::NoPlanFound {
                        goal: goal.name.clone(),
                    })
            }
        }
    }

    /// Plan again from `current_state` toward `goal`.
    ///
    /// The failed action and the partial plan are accepted for interface
    /// stability but do not influence the search, and the new plan is made
    /// without constraints.
    pub fn replan(
        &self,
        failed_action: &Operator,
        partial_plan: &Plan,
        goal: &PlanningGoal,
        current_state: &WorldState,
    ) -> Result<Plan> {
        debug!(
            goal = %goal.name,
            failed = %failed_action.name,
            completed_steps = partial_plan.len(),
            "replanning from current state"
        );
        self.plan(goal, current_state, &Constraints::default())
    }

    fn operator_index(&self, name: &str) -> Option<usize> {
        self.operators.iter().position(|op| op.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
