//! Priority-ordered goal scheduling with deadlines and conflict resolution.
//!
//! The [`GoalManager`] owns every [`Goal`] and guarantees that at most one
//! of them is `Active`. Goals move Pending -> Active -> {Completed, Failed,
//! Canceled}; an Active goal drops back to Pending when another goal is
//! activated. Expired Pending goals are failed while the queue is scanned.

use crate::clock::{Clock, SystemClock};
use crate::planning::PlanningGoal;
use crate::state::WorldState;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Failure reason recorded when a goal's deadline passes.
pub const DEADLINE_EXCEEDED: &str = "Deadline exceeded";

pub type GoalId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GoalError {
    #[error("goal {0} not found")]
    NotFound(GoalId),
    #[error("goal {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: GoalId,
        from: GoalStatus,
        to: GoalStatus,
    },
}

pub type Result<T> = std::result::Result<T, GoalError>;

// ---------------------------------------------------------------------------
// Goal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    Pending,
    Active,
    Completed,
    Failed,
    Canceled,
}

impl GoalStatus {
    /// Completed, Failed and Canceled are final.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GoalStatus::Completed | GoalStatus::Failed | GoalStatus::Canceled
        )
    }
}

/// A goal record. Timestamps are microseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub name: String,
    pub conditions: WorldState,
    pub priority: i32,
    pub status: GoalStatus,
    pub created_at: i64,
    pub deadline: Option<i64>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub progress: f64,
    pub failure_reason: Option<String>,
}

impl Goal {
    /// Whether the deadline lies strictly before `now_us`.
    pub fn is_expired(&self, now_us: i64) -> bool {
        self.deadline.is_some_and(|d| now_us > d)
    }

    /// Planner input for this goal.
    pub fn to_planning_goal(&self) -> PlanningGoal {
        PlanningGoal::new(self.name.clone(), self.conditions.clone())
    }
}

/// Queue order: higher priority first; when both goals have a deadline the
/// earlier one first; otherwise the earlier-created one first.
///
/// Not transitive when goals with and without deadlines are mixed.
pub fn compare_goals(a: &Goal, b: &Goal) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Per-status goal counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStats {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
}

/// Invoked once when a goal becomes Completed or Failed.
pub type GoalCallback = Box<dyn FnMut(GoalId, GoalStatus, &Goal) + Send>;

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

pub struct GoalManager {
    goals: Vec<Goal>,
    active: Option<GoalId>,
    next_id: GoalId,
    callbacks: HashMap<GoalId, Vec<GoalCallback>>,
    clock: Box<dyn Clock>,
}

impl Default for GoalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GoalManager {
    /// Create an empty manager on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create an empty manager on the given clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            goals: Vec::new(),
            active: None,
            next_id: 1,
            callbacks: HashMap::new(),
            clock: Box::new(clock),
        }
    }

    /// Insert a Pending goal and re-sort the queue.
    pub fn add_goal(
        &mut self,
        name: impl Into<String>,
        conditions: WorldState,
        priority: i32,
        deadline: Option<i64>,
    ) -> GoalId {
        let id = self.next_id;
        self.next_id += 1;
        let goal = Goal {
            id,
            name: name.into(),
            conditions,
            priority,
            status: GoalStatus::Pending,
            created_at: self.clock.now_us(),
            deadline,
            started_at: None,
            completed_at: None,
            progress: 0.0,
            failure_reason: None,
        };
        info!(id, name = %goal.name, priority, "goal added");
        self.goals.push(goal);
        self.sort_queue();
        id
    }

    /// The Active goal, or the first eligible Pending goal, which is then
    /// activated. Goals whose deadline has passed are failed on the way.
    pub fn get_current_goal(&mut self) -> Option<&Goal> {
        let now = self.clock.now_us();

        if let Some(id) = self.active {
            let expired = self.goal(id).is_some_and(|g| g.is_expired(now));
            if !expired {
                return self.goal(id);
            }
            self.finish(id, GoalStatus::Failed, Some(DEADLINE_EXCEEDED.to_string()));
        }

        let mut expired = Vec::new();
        let mut chosen = None;
        for goal in self.goals.iter().filter(|g| g.status == GoalStatus::Pending) {
            if goal.is_expired(now) {
                expired.push(goal.id);
            } else {
                chosen = Some(goal.id);
                break;
            }
        }
        for id in expired {
            self.finish(id, GoalStatus::Failed, Some(DEADLINE_EXCEEDED.to_string()));
        }

        let id = chosen?;
        self.set_active(id, now);
        self.goal(id)
    }

    /// Make `id` the Active goal, returning any previous one to Pending.
    pub fn activate_goal(&mut self, id: GoalId) -> Result<()> {
        self.check_transition(id, GoalStatus::Active)?;
        if self.active == Some(id) {
            return Ok(());
        }
        let now = self.clock.now_us();
        self.set_active(id, now);
        Ok(())
    }

    /// Complete `id` and fire its callbacks.
    pub fn mark_completed(&mut self, id: GoalId) -> Result<()> {
        self.check_transition(id, GoalStatus::Completed)?;
        self.finish(id, GoalStatus::Completed, None);
        Ok(())
    }

    /// Fail `id` with `reason` and fire its callbacks.
    pub fn mark_failed(&mut self, id: GoalId, reason: impl Into<String>) -> Result<()> {
        self.check_transition(id, GoalStatus::Failed)?;
        self.finish(id, GoalStatus::Failed, Some(reason.into()));
        Ok(())
    }

    /// Cancel `id`; its callbacks are dropped without firing.
    pub fn cancel_goal(&mut self, id: GoalId) -> Result<()> {
        self.check_transition(id, GoalStatus::Canceled)?;
        self.finish(id, GoalStatus::Canceled, None);
        Ok(())
    }

    /// Set progress, clamped to [0, 1].
    pub fn update_progress(&mut self, id: GoalId, value: f64) -> Result<()> {
        let goal = self.goal_mut(id).ok_or(GoalError::NotFound(id))?;
        goal.progress = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        Ok(())
    }

    /// The goal among `ids` that comes first in the queue. Unknown ids are
    /// ignored; argument order does not matter.
    pub fn resolve_conflict(&self, ids: &[GoalId]) -> Option<GoalId> {
        self.goals
            .iter()
            .find(|g| ids.contains(&g.id))
            .map(|g| g.id)
    }

    /// Register a callback for when `id` is completed or failed.
    ///
    /// Callbacks run in registration order, once.
    pub fn on_goal_finished<F>(&mut self, id: GoalId, callback: F) -> Result<()>
    where
        F: FnMut(GoalId, GoalStatus, &Goal) + Send + 'static,
    {
        if self.goal(id).is_none() {
            return Err(GoalError::NotFound(id));
        }
        self.callbacks.entry(id).or_default().push(Box::new(callback));
        Ok(())
    }

    /// Remove every goal and callback. Ids keep increasing.
    pub fn clear(&mut self) {
        self.goals.clear();
        self.callbacks.clear();
        self.active = None;
    }

    /// Look up a goal by id.
    pub fn goal(&self, id: GoalId) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    /// All goals in queue order.
    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    /// Pending goals in queue order.
    pub fn pending_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(|g| g.status == GoalStatus::Pending)
    }

    /// The Active goal, if any.
    pub fn active_goal(&self) -> Option<&Goal> {
        self.active.and_then(|id| self.goal(id))
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Number of callbacks still waiting to fire.
    pub fn callback_count(&self) -> usize {
        self.callbacks.values().map(Vec::len).sum()
    }

    /// Per-status counts over every goal.
    pub fn statistics(&self) -> GoalStats {
        let mut stats = GoalStats::default();
        for goal in &self.goals {
            match goal.status {
                GoalStatus::Pending => stats.pending += 1,
                GoalStatus::Active => stats.active += 1,
                GoalStatus::Completed => stats.completed += 1,
                GoalStatus::Failed => stats.failed += 1,
                GoalStatus::Canceled => stats.canceled += 1,
            }
        }
        stats
    }

    // -- internals ---------------------------------------------------------

    fn goal_mut(&mut self, id: GoalId) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.id == id)
    }

    fn check_transition(&self, id: GoalId, to: GoalStatus) -> Result<()> {
        let goal = self.goal(id).ok_or(GoalError::NotFound(id))?;
        if goal.status.is_terminal() {
            return Err(GoalError::InvalidTransition {
                id,
                from: goal.status,
                to,
            });
        }
        Ok(())
    }

    fn set_active(&mut self, id: GoalId, now: i64) {
        if let Some(prev) = self.active.take() {
            if let Some(goal) = self.goal_mut(prev) {
                goal.status = GoalStatus::Pending;
                info!(id = prev, "goal deactivated");
            }
        }
        if let Some(goal) = self.goal_mut(id) {
            goal.status = GoalStatus::Active;
            goal.started_at = Some(now);
            info!(id, name = %goal.name, "goal activated");
            self.active = Some(id);
        }
    }

    fn finish(&mut self, id: GoalId, status: GoalStatus, reason: Option<String>) {
        let now = self.clock.now_us();
        let Some(goal) = self.goal_mut(id) else {
            return;
        };
        goal.status = status;
        goal.completed_at = Some(now);
        if status == GoalStatus::Failed {
            match reason.as_deref() {
                Some(DEADLINE_EXCEEDED) => warn!(id, name = %goal.name, "goal deadline exceeded"),
                _ => info!(id, name = %goal.name, ?reason, "goal failed"),
            }
            goal.failure_reason = reason;
        } else {
            info!(id, name = %goal.name, ?status, "goal finished");
        }
        if self.active == Some(id) {
            self.active = None;
        }

        if matches!(status, GoalStatus::Completed | GoalStatus::Failed) {
            self.notify(id, status);
        } else {
            self.callbacks.remove(&id);
        }
    }

    fn notify(&mut self, id: GoalId, status: GoalStatus) {
        let Some(mut callbacks) = self.callbacks.remove(&id) else {
            return;
        };
        let Some(goal) = self.goals.iter().find(|g| g.id == id) else {
            return;
        };
        for callback in callbacks.iter_mut() {
            callback(id, status, goal);
        }
    }

    /// Stable insertion sort; `compare_goals` is not a total order, so the
    /// standard sorts are avoided.
    fn sort_queue(&mut self) {
        for i in 1..self.goals.len() {
            let mut j = i;
            while j > 0 && compare_goals(&self.goals[j], &self.goals[j - 1]) == Ordering::Less {
                self.goals.swap(j, j - 1);
                j -= 1;
            }
        }
    }
}

impl fmt::Debug for GoalManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoalManager")
            .field("goals", &self.goals)
            .field("active", &self.active)
            .field("next_id", &self.next_id)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::world_state;
    use std::sync::{Arc, Mutex};

    fn manager() -> (GoalManager, ManualClock) {
        let clock = ManualClock::new(1_000);
        (GoalManager::with_clock(clock.clone()), clock)
    }

    fn queue_names(m: &GoalManager) -> Vec<&str> {
        m.goals().iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn test_ids_are_monotonic_per_instance() {
        let (mut a, _) = manager();
        let (mut b, _) = manager();
        assert_eq!(a.add_goal("x", WorldState::new(), 1, None), 1);
        assert_eq!(a.add_goal("y", WorldState::new(), 1, None), 2);
        assert_eq!(b.add_goal("z", WorldState::new(), 1, None), 1);
        a.clear();
        assert_eq!(a.add_goal("w", WorldState::new(), 1, None), 3);
    }

    #[test]
    fn test_queue_order_priority_deadline_creation() {
        let (mut m, clock) = manager();
        m.add_goal("low", WorldState::new(), 1, None);
        clock.advance(1);
        m.add_goal("high_late", WorldState::new(), 5, Some(9_000));
        clock.advance(1);
        m.add_goal("high_soon", WorldState::new(), 5, Some(5_000));
        clock.advance(1);
        m.add_goal("mid_a", WorldState::new(), 3, None);
        clock.advance(1);
        m.add_goal("mid_b", WorldState::new(), 3, Some(2_000));
        assert_eq!(
            queue_names(&m),
            vec!["high_soon", "high_late", "mid_a", "mid_b", "low"]
        );
    }

    #[test]
    fn test_same_timestamp_keeps_fifo() {
        let (mut m, _) = manager();
        m.add_goal("first", WorldState::new(), 2, None);
        m.add_goal("second", WorldState::new(), 2, None);
        m.add_goal("third", WorldState::new(), 2, None);
        assert_eq!(queue_names(&m), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_get_current_goal_activates_highest() {
        let (mut m, _) = manager();
        let low = m.add_goal("low", WorldState::new(), 1, None);
        let high = m.add_goal("high", WorldState::new(), 9, None);
        let current = m.get_current_goal().unwrap();
        assert_eq!(current.id, high);
        assert_eq!(current.status, GoalStatus::Active);
        assert_eq!(current.started_at, Some(1_000));
        // Active goal is returned again, not re-selected.
        assert_eq!(m.get_current_goal().unwrap().id, high);
        assert_eq!(m.goal(low).unwrap().status, GoalStatus::Pending);
    }

    #[test]
    fn test_expired_goals_failed_during_scan() {
        let (mut m, clock) = manager();
        let urgent = m.add_goal("urgent", WorldState::new(), 9, Some(1_500));
        let normal = m.add_goal("normal", WorldState::new(), 1, None);
        clock.set(2_000);
        let current = m.get_current_goal().unwrap();
        assert_eq!(current.id, normal);
        let failed = m.goal(urgent).unwrap();
        assert_eq!(failed.status, GoalStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some(DEADLINE_EXCEEDED));
    }

    #[test]
    fn test_deadline_equal_to_now_is_not_expired() {
        let (mut m, clock) = manager();
        let id = m.add_goal("edge", WorldState::new(), 1, Some(2_000));
        clock.set(2_000);
        assert_eq!(m.get_current_goal().unwrap().id, id);
    }

    #[test]
    fn test_expired_active_goal_is_failed() {
        let (mut m, clock) = manager();
        let a = m.add_goal("a", WorldState::new(), 9, Some(1_500));
        let b = m.add_goal("b", WorldState::new(), 1, None);
        assert_eq!(m.get_current_goal().unwrap().id, a);
        clock.set(3_000);
        assert_eq!(m.get_current_goal().unwrap().id, b);
        assert_eq!(m.goal(a).unwrap().status, GoalStatus::Failed);
    }

    #[test]
    fn test_no_eligible_goal() {
        let (mut m, clock) = manager();
        assert!(m.get_current_goal().is_none());
        m.add_goal("gone", WorldState::new(), 1, Some(1_100));
        clock.set(5_000);
        assert!(m.get_current_goal().is_none());
        assert_eq!(m.statistics().failed, 1);
    }

    #[test]
    fn test_activate_deactivates_previous() {
        let (mut m, _) = manager();
        let a = m.add_goal("a", WorldState::new(), 1, None);
        let b = m.add_goal("b", WorldState::new(), 1, None);
        m.activate_goal(a).unwrap();
        m.activate_goal(b).unwrap();
        assert_eq!(m.goal(a).unwrap().status, GoalStatus::Pending);
        assert_eq!(m.active_goal().unwrap().id, b);
        assert_eq!(m.statistics().active, 1);
    }

    #[test]
    fn test_completion_clears_active_slot() {
        let (mut m, clock) = manager();
        let a = m.add_goal("a", WorldState::new(), 5, None);
        let b = m.add_goal("b", WorldState::new(), 1, None);
        m.get_current_goal();
        clock.advance(10);
        m.mark_completed(a).unwrap();
        assert!(m.active_goal().is_none());
        assert_eq!(m.goal(a).unwrap().completed_at, Some(1_010));
        assert_eq!(m.get_current_goal().unwrap().id, b);
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let (mut m, _) = manager();
        assert_eq!(m.activate_goal(42), Err(GoalError::NotFound(42)));
        assert_eq!(m.mark_completed(42), Err(GoalError::NotFound(42)));
        assert_eq!(m.mark_failed(42, "x"), Err(GoalError::NotFound(42)));
        assert_eq!(m.cancel_goal(42), Err(GoalError::NotFound(42)));
        assert_eq!(m.update_progress(42, 0.5), Err(GoalError::NotFound(42)));
        assert!(m.on_goal_finished(42, |_, _, _| {}).is_err());
    }

    #[test]
    fn test_terminal_goals_do_not_transition() {
        let (mut m, _) = manager();
        let id = m.add_goal("a", WorldState::new(), 1, None);
        m.cancel_goal(id).unwrap();
        assert!(matches!(
            m.activate_goal(id),
            Err(GoalError::InvalidTransition { from: GoalStatus::Canceled, .. })
        ));
        assert!(m.mark_completed(id).is_err());
        assert_eq!(m.goal(id).unwrap().status, GoalStatus::Canceled);
    }

    #[test]
    fn test_progress_clamped() {
        let (mut m, _) = manager();
        let id = m.add_goal("a", WorldState::new(), 1, None);
        m.update_progress(id, 1.7).unwrap();
        assert!((m.goal(id).unwrap().progress - 1.0).abs() < f64::EPSILON);
        m.update_progress(id, -3.0).unwrap();
        assert!(m.goal(id).unwrap().progress.abs() < f64::EPSILON);
        m.update_progress(id, 0.25).unwrap();
        assert!((m.goal(id).unwrap().progress - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolve_conflict_matches_queue() {
        let (mut m, clock) = manager();
        let a = m.add_goal("a", WorldState::new(), 3, Some(8_000));
        clock.advance(5);
        let b = m.add_goal("b", WorldState::new(), 3, Some(4_000));
        clock.advance(5);
        let c = m.add_goal("c", WorldState::new(), 1, Some(2_000));
        assert_eq!(m.resolve_conflict(&[a, b, c]), Some(b));
        assert_eq!(m.resolve_conflict(&[a, c]), Some(a));
        assert_eq!(m.resolve_conflict(&[c, 999]), Some(c));
        assert_eq!(m.resolve_conflict(&[]), None);
        assert_eq!(m.goals()[0].id, b);
    }

    #[test]
    fn test_resolve_conflict_mixed_deadlines_ignores_argument_order() {
        let (mut m, clock) = manager();
        let c = m.add_goal("c", WorldState::new(), 1, Some(10_000));
        clock.advance(1);
        let b = m.add_goal("b", WorldState::new(), 1, None);
        clock.advance(1);
        let a = m.add_goal("a", WorldState::new(), 1, Some(5_000));

        let forward = m.resolve_conflict(&[a, b, c]);
        let backward = m.resolve_conflict(&[c, b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward, Some(m.goals()[0].id));
        assert_eq!(m.get_current_goal().map(|g| g.id), forward);
    }

    #[test]
    fn test_cancel_drops_callbacks() {
        let (mut m, _) = manager();
        let id = m.add_goal("a", WorldState::new(), 1, None);
        m.on_goal_finished(id, |_, _, _| {}).unwrap();
        assert_eq!(m.callback_count(), 1);
        m.cancel_goal(id).unwrap();
        assert_eq!(m.callback_count(), 0);
    }

    #[test]
    fn test_callbacks_fire_once_in_order() {
        let (mut m, _) = manager();
        let id = m.add_goal("dock", world_state! { "docked" => true }, 1, None);
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            m.on_goal_finished(id, move |gid, status, goal| {
                log.lock().unwrap().push((tag, gid, status, goal.name.clone()));
            })
            .unwrap();
        }
        m.get_current_goal();
        m.mark_completed(id).unwrap();
        let _ = m.mark_completed(id);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], ("first", id, GoalStatus::Completed, "dock".to_string()));
        assert_eq!(log[1].0, "second");
    }

    #[test]
    fn test_callbacks_fire_on_deadline_failure_not_cancel() {
        let (mut m, clock) = manager();
        let expiring = m.add_goal("expiring", WorldState::new(), 1, Some(1_200));
        let canceled = m.add_goal("canceled", WorldState::new(), 1, None);
        let fired = Arc::new(Mutex::new(Vec::new()));
        for id in [expiring, canceled] {
            let fired = Arc::clone(&fired);
            m.on_goal_finished(id, move |gid, status, _| fired.lock().unwrap().push((gid, status)))
                .unwrap();
        }
        m.cancel_goal(canceled).unwrap();
        clock.set(2_000);
        m.get_current_goal();
        assert_eq!(*fired.lock().unwrap(), vec![(expiring, GoalStatus::Failed)]);
    }

    #[test]
    fn test_to_planning_goal() {
        let (mut m, _) = manager();
        let id = m.add_goal("rest", world_state! { "robot_state" => "idle" }, 1, None);
        let pg = m.goal(id).unwrap().to_planning_goal();
        assert_eq!(pg.name, "rest");
        assert!(pg.tasks.is_empty());
    }
}
