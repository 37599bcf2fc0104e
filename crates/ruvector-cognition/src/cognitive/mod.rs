//! Cognitive architecture for goal-directed robot behavior.
//!
//! This module provides:
//! - **Blackboard** shared by the nodes of a behavior tree
//! - **Behavior trees** for reactive, resumable task execution
//! - **Goal manager** ordering goals by priority and deadline
//! - **Decision engine** for utility and prospect-theory action selection
//! - **Cognitive core** wiring goals, planning and decisions together

pub mod behavior_tree;
pub mod blackboard;
pub mod cognitive_core;
pub mod decision_engine;
pub mod goal_manager;

pub use behavior_tree::{sequence_from_plan, Behavior, BehaviorNode, BehaviorStatus, BehaviorTree, NodeKind};
pub use blackboard::Blackboard;
pub use cognitive_core::{CognitionError, CognitiveCore};
pub use decision_engine::{
    ActionOption, ActionOutcome, CandidateScore, Decision, DecisionConfig, DecisionEngine,
    DecisionError, DecisionStats, Situation,
};
pub use goal_manager::{
    compare_goals, Goal, GoalCallback, GoalError, GoalId, GoalManager, GoalStats, GoalStatus,
};
