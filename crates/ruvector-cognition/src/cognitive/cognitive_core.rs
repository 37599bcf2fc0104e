//! Goal -> plan -> decide orchestration.
//!
//! The [`CognitiveCore`] owns a [`GoalManager`], a [`TaskPlanner`] and a
//! [`DecisionEngine`] and wires them together: the current goal is taken
//! from the queue, planned for against the observed world state, and
//! discrete choices along the way go through the decision engine.

use crate::clock::{Clock, SystemClock};
use crate::cognitive::decision_engine::{ActionOption, Decision, DecisionEngine, DecisionError, Situation};
use crate::cognitive::goal_manager::{GoalError, GoalId, GoalManager};
use crate::config::CognitionConfig;
use crate::planning::{Constraints, Plan, PlanningError, TaskPlanner};
use crate::state::WorldState;

use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CognitionError {
    #[error(transparent)]
    Planning(#[from] PlanningError),
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
}

pub type Result<T> = std::result::Result<T, CognitionError>;

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CognitiveCore {
    goals: GoalManager,
    planner: TaskPlanner,
    decisions: DecisionEngine,
}

impl Default for CognitiveCore {
    fn default() -> Self {
        Self::new(CognitionConfig::default())
    }
}

impl CognitiveCore {
    /// Create a core using the system clock.
    pub fn new(config: CognitionConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Build with an explicit time source for the goal manager.
    pub fn with_clock(config: CognitionConfig, clock: impl Clock + 'static) -> Self {
        Self {
            goals: GoalManager::with_clock(clock),
            planner: TaskPlanner::new(config.planner),
            decisions: DecisionEngine::new(config.decision),
        }
    }

    /// Plan for the current goal from `state`.
    ///
    /// Goals the state already satisfies are completed and skipped. Returns
    /// `Ok(None)` when no goal is eligible. A planning failure is returned as
    /// an error and leaves the goal Active; the caller decides whether to
    /// fail it.
    pub fn plan_next(
        &mut self,
        state: &WorldState,
        constraints: &Constraints,
    ) -> Result<Option<(GoalId, Plan)>> {
        loop {
            let Some(goal) = self.goals.get_current_goal() else {
                debug!("no eligible goal");
                return Ok(None);
            };
            let id = goal.id;
            if state.satisfies(&goal.conditions) {
                info!(id, name = %goal.name, "goal already satisfied");
                self.goals.mark_completed(id)?;
                continue;
            }

            let planning_goal = goal.to_planning_goal();
            let plan = self.planner.plan(&planning_goal, state, constraints)?;
            debug!(id, steps = plan.len(), strategy = ?plan.strategy, "planned current goal");
            return Ok(Some((id, plan)));
        }
    }

    /// Close out goal `id` after executing its plan.
    pub fn report_outcome(&mut self, id: GoalId, success: bool, reason: &str) -> Result<()> {
        if success {
            self.goals.mark_completed(id)?;
        } else {
            self.goals.mark_failed(id, reason)?;
        }
        Ok(())
    }

    /// Pick an action through the decision engine.
    pub fn choose(&mut self, situation: &Situation, actions: &[ActionOption]) -> Result<Decision> {
        Ok(self.decisions.decide(situation, actions)?)
    }

    /// Read-only access to the goal manager.
    pub fn goals(&self) -> &GoalManager {
        &self.goals
    }

    /// Mutable access to the goal manager.
    pub fn goals_mut(&mut self) -> &mut GoalManager {
        &mut self.goals
    }

    /// Read-only access to the planner.
    pub fn planner(&self) -> &TaskPlanner {
        &self.planner
    }

    /// Mutable access to the planner, e.g. to register operators.
    pub fn planner_mut(&mut self) -> &mut TaskPlanner {
        &mut self.planner
    }

    /// Read-only access to the decision engine.
    pub fn decision_engine(&self) -> &DecisionEngine {
        &self.decisions
    }

    /// Mutable access to the decision engine.
    pub fn decision_engine_mut(&mut self) -> &mut DecisionEngine {
        &mut self.decisions
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::cognitive::goal_manager::GoalStatus;
    use crate::planning::{PlanStrategy, PlannerConfig};
    use crate::world_state;

    fn core() -> CognitiveCore {
        let mut core = CognitiveCore::with_clock(CognitionConfig::default(), ManualClock::new(0));
        let planner = core.planner_mut();
        planner.register_operator(
            "undock",
            world_state! { "docked" => true },
            world_state! { "docked" => false },
            1.0,
            1.0,
        );
        planner.register_operator(
            "dock",
            world_state! { "docked" => false },
            world_state! { "docked" => true },
            1.0,
            1.0,
        );
        core
    }

    #[test]
    fn test_plan_next_for_highest_priority_goal() {
        let mut core = core();
        core.goals_mut().add_goal("explore", world_state! { "docked" => false }, 1, None);
        let charge = core.goals_mut().add_goal("charge", world_state! { "docked" => true }, 5, None);

        let (id, plan) = core
            .plan_next(&world_state! { "docked" => false }, &Constraints::default())
            .unwrap()
            .unwrap();
        assert_eq!(id, charge);
        assert_eq!(plan.names(), vec!["dock"]);
        assert_eq!(plan.strategy, PlanStrategy::Search);
        assert_eq!(core.goals().active_goal().unwrap().id, charge);
    }

    #[test]
    fn test_satisfied_goals_are_completed() {
        let mut core = core();
        let a = core.goals_mut().add_goal("stay", world_state! { "docked" => true }, 5, None);
        let b = core.goals_mut().add_goal("leave", world_state! { "docked" => false }, 1, None);

        let (id, plan) = core
            .plan_next(&world_state! { "docked" => true }, &Constraints::default())
            .unwrap()
            .unwrap();
        assert_eq!(id, b);
        assert_eq!(plan.names(), vec!["undock"]);
        assert_eq!(core.goals().goal(a).unwrap().status, GoalStatus::Completed);
    }

    #[test]
    fn test_plan_next_without_goals() {
        let mut core = core();
        assert_eq!(
            core.plan_next(&WorldState::new(), &Constraints::default()).unwrap(),
            None
        );
    }

    #[test]
    fn test_planning_failure_propagates() {
        let mut core = core();
        let id = core.goals_mut().add_goal("fly", world_state! { "airborne" => true }, 1, None);
        let err = core
            .plan_next(&world_state! { "docked" => true }, &Constraints::default())
            .unwrap_err();
        assert!(matches!(err, CognitionError::Planning(PlanningError::NoPlanFound { .. })));
        assert_eq!(core.goals().goal(id).unwrap().status, GoalStatus::Active);

        core.report_outcome(id, false, "unreachable").unwrap();
        assert_eq!(
            core.goals().goal(id).unwrap().failure_reason.as_deref(),
            Some("unreachable")
        );
    }

    #[test]
    fn test_config_reaches_components() {
        let mut config = CognitionConfig::default();
        config.planner = PlannerConfig {
            max_depth: 2,
            max_iterations: 7,
        };
        config.decision.risk_tolerance = 0.9;
        let core = CognitiveCore::new(config);
        assert_eq!(core.planner().config().max_iterations, 7);
        assert!((core.decision_engine().risk_tolerance() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_choose_delegates() {
        let mut core = core();
        assert!(matches!(
            core.choose(&Situation::default(), &[]),
            Err(CognitionError::Decision(DecisionError::NoActionsProvided))
        ));
        let d = core
            .choose(&Situation::default(), &[ActionOption::new("wait")])
            .unwrap();
        assert_eq!(d.index, 0);
        assert!((d.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(core.decision_engine().history().count(), 1);
    }
}
