//! # ruvector-cognition
//!
//! Cognition core for autonomous robots: a blackboard-backed behavior tree
//! engine, an HTN task planner with an A\* fallback, a priority and deadline
//! aware goal manager, and a multi-criteria decision engine.
//!
//! ## Modules
//!
//! - [`state`]: World-state facts shared by the planner and goals
//! - [`planning`]: STRIPS operators, HTN methods, HTN and A\* planning
//! - [`cognitive`]: Blackboard, behavior trees, goals, decisions, and the core loop
//! - [`config`]: Serializable configuration bundle
//! - [`clock`]: Time sources for deadlines
//!
//! ## Quick Start
//!
//! ```rust
//! use ruvector_cognition::{world_state, BehaviorStatus, BehaviorTree, CognitiveCore, Constraints};
//! use ruvector_cognition::cognitive::sequence_from_plan;
//! use ruvector_cognition::BehaviorNode;
//!
//! let mut core = CognitiveCore::default();
//! core.planner_mut().register_operator(
//!     "dock",
//!     world_state! { "docked" => false },
//!     world_state! { "docked" => true },
//!     1.0,
//!     2.0,
//! );
//! core.goals_mut().add_goal("charge", world_state! { "docked" => true }, 5, None);
//!
//! let (_, plan) = core
//!     .plan_next(&world_state! { "docked" => false }, &Constraints::default())
//!     .unwrap()
//!     .unwrap();
//!
//! let root = sequence_from_plan("charge", &plan, |op| {
//!     BehaviorNode::action(op.name.clone(), |_bb| BehaviorStatus::Success)
//! });
//! let mut tree = BehaviorTree::new(root);
//! assert_eq!(tree.tick(), BehaviorStatus::Success);
//! ```

pub mod clock;
pub mod cognitive;
pub mod config;
pub mod planning;
pub mod state;

// Convenience re-exports of the most commonly used types.
pub use clock::{Clock, ManualClock, SystemClock};
pub use cognitive::{
    ActionOption, BehaviorNode, BehaviorStatus, BehaviorTree, Blackboard, CognitiveCore, Decision,
    DecisionEngine, Goal, GoalId, GoalManager, GoalStatus, Situation,
};
pub use config::{CognitionConfig, ConfigError};
pub use planning::{Constraints, Method, Operator, Plan, PlanStrategy, PlannerConfig, PlanningGoal, Task, TaskPlanner};
pub use state::{Value, WorldState};
