//! Resumable behavior trees for robot task execution.
//!
//! Trees are built from composites (sequence, selector, parallel),
//! decorators (inverter, repeater, until-fail), and leaves (actions,
//! conditions) that call externally supplied [`Behavior`] capabilities.
//! Nodes keep their own progress between ticks, so a sequence whose child
//! returned `Running` resumes at that child on the next tick.
//!
//! ```rust
//! use ruvector_cognition::cognitive::{BehaviorNode, BehaviorStatus, BehaviorTree};
//!
//! let root = BehaviorNode::sequence("patrol", vec![
//!     BehaviorNode::condition("battery_ok", |bb| bb.flag("battery_ok")),
//!     BehaviorNode::action("drive", |_| BehaviorStatus::Running),
//! ]);
//! let mut tree = BehaviorTree::new(root);
//! tree.blackboard_mut().set("battery_ok", true);
//! assert_eq!(tree.tick(), BehaviorStatus::Running);
//! ```

use super::blackboard::Blackboard;
use crate::planning::{Operator, Plan};
use crate::state::Value;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Status & capability
// ---------------------------------------------------------------------------

/// Result of ticking a behavior tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorStatus {
    Success,
    Failure,
    Running,
}

impl From<bool> for BehaviorStatus {
    fn from(ok: bool) -> Self {
        if ok {
            BehaviorStatus::Success
        } else {
            BehaviorStatus::Failure
        }
    }
}

/// An externally supplied leaf capability.
///
/// Implemented for any `FnMut(&mut Blackboard) -> R` closure where `R`
/// converts into a [`BehaviorStatus`] (`bool` or `BehaviorStatus`).
pub trait Behavior: Send {
    fn tick(&mut self, blackboard: &mut Blackboard) -> BehaviorStatus;
}

impl<F, R> Behavior for F
where
    F: FnMut(&mut Blackboard) -> R + Send,
    R: Into<BehaviorStatus>,
{
    fn tick(&mut self, blackboard: &mut Blackboard) -> BehaviorStatus {
        self(blackboard).into()
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Variant-specific node state.
pub enum NodeKind {
    /// Runs children in order from `current`; stops on the first non-Success.
    Sequence {
        children: Vec<BehaviorNode>,
        current: usize,
    },
    /// Runs children in order from `current`; stops on the first non-Failure.
    Selector {
        children: Vec<BehaviorNode>,
        current: usize,
    },
    /// Ticks every child each tick; succeeds once `threshold` children succeed.
    Parallel {
        children: Vec<BehaviorNode>,
        threshold: usize,
    },
    /// Swaps Success and Failure.
    Inverter(Box<BehaviorNode>),
    /// Re-runs the child `max_iterations` times (unbounded when <= 0).
    Repeater {
        child: Box<BehaviorNode>,
        max_iterations: i64,
        count: u64,
    },
    /// Re-runs the child until it fails.
    UntilFail(Box<BehaviorNode>),
    Action(Option<Box<dyn Behavior>>),
    Condition(Option<Box<dyn Behavior>>),
}

/// A named node with its last status (`None` until first ticked).
pub struct BehaviorNode {
    name: String,
    status: Option<BehaviorStatus>,
    kind: NodeKind,
}

impl BehaviorNode {
    /// Create a node from an explicit kind.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            status: None,
            kind,
        }
    }

    /// Succeeds when every child succeeds, in order.
    pub fn sequence(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::new(name, NodeKind::Sequence { children, current: 0 })
    }

    /// Succeeds on the first child that succeeds.
    pub fn selector(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::new(name, NodeKind::Selector { children, current: 0 })
    }

    /// Ticks all children; succeeds once `threshold` of them succeed.
    pub fn parallel(name: impl Into<String>, threshold: usize, children: Vec<BehaviorNode>) -> Self {
        Self::new(name, NodeKind::Parallel { children, threshold })
    }

    /// Swaps the child's Success and Failure.
    pub fn inverter(name: impl Into<String>, child: BehaviorNode) -> Self {
        Self::new(name, NodeKind::Inverter(Box::new(child)))
    }

    /// Repeat `child`; a non-positive `max_iterations` repeats forever.
    pub fn repeater(name: impl Into<String>, max_iterations: i64, child: BehaviorNode) -> Self {
        Self::new(
            name,
            NodeKind::Repeater {
                child: Box::new(child),
                max_iterations,
                count: 0,
            },
        )
    }

    /// Repeats the child until it fails.
    pub fn until_fail(name: impl Into<String>, child: BehaviorNode) -> Self {
        Self::new(name, NodeKind::UntilFail(Box::new(child)))
    }

    /// Action leaf backed by a closure.
    pub fn action<F, R>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&mut Blackboard) -> R + Send + 'static,
        R: Into<BehaviorStatus>,
    {
        Self::new(name, NodeKind::Action(Some(Box::new(f))))
    }

    /// Action leaf backed by a boxed capability, or none at all.
    pub fn action_with(name: impl Into<String>, behavior: Option<Box<dyn Behavior>>) -> Self {
        Self::new(name, NodeKind::Action(behavior))
    }

    /// Condition leaf backed by a read-only predicate.
    pub fn condition<F>(name: impl Into<String>, mut f: F) -> Self
    where
        F: FnMut(&Blackboard) -> bool + Send + 'static,
    {
        let check = move |bb: &mut Blackboard| -> BehaviorStatus { f(bb).into() };
        Self::new(name, NodeKind::Condition(Some(Box::new(check))))
    }

    /// Condition leaf backed by a boxed capability, or none at all.
    pub fn condition_with(name: impl Into<String>, behavior: Option<Box<dyn Behavior>>) -> Self {
        Self::new(name, NodeKind::Condition(behavior))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status from the most recent tick, `None` if unticked since reset.
    pub fn status(&self) -> Option<BehaviorStatus> {
        self.status
    }

    /// The node's kind and any kind-specific state.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Direct children, in order.
    pub fn children(&self) -> Vec<&BehaviorNode> {
        match &self.kind {
            NodeKind::Sequence { children, .. }
            | NodeKind::Selector { children, .. }
            | NodeKind::Parallel { children, .. } => children.iter().collect(),
            NodeKind::Inverter(child)
            | NodeKind::UntilFail(child)
            | NodeKind::Repeater { child, .. } => vec![child.as_ref()],
            NodeKind::Action(_) | NodeKind::Condition(_) => Vec::new(),
        }
    }

    /// Resume index of a sequence or selector.
    pub fn current_child(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::Sequence { current, .. } | NodeKind::Selector { current, .. } => {
                Some(*current)
            }
            _ => None,
        }
    }

    /// Completed iterations of a repeater.
    pub fn iterations(&self) -> Option<u64> {
        match &self.kind {
            NodeKind::Repeater { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// Execute one tick of this node.
    pub fn tick(&mut self, bb: &mut Blackboard) -> BehaviorStatus {
        let status = match &mut self.kind {
            NodeKind::Sequence { children, current } => loop {
                let Some(child) = children.get_mut(*current) else {
                    *current = 0;
                    break BehaviorStatus::Success;
                };
                match child.tick(bb) {
                    BehaviorStatus::Success => *current += 1,
                    BehaviorStatus::Running => break BehaviorStatus::Running,
                    BehaviorStatus::Failure => {
                        *current = 0;
                        break BehaviorStatus::Failure;
                    }
                }
            },

            NodeKind::Selector { children, current } => loop {
                let Some(child) = children.get_mut(*current) else {
                    *current = 0;
                    break BehaviorStatus::Failure;
                };
                match child.tick(bb) {
                    BehaviorStatus::Failure => *current += 1,
                    BehaviorStatus::Running => break BehaviorStatus::Running,
                    BehaviorStatus::Success => {
                        *current = 0;
                        break BehaviorStatus::Success;
                    }
                }
            },

            NodeKind::Parallel { children, threshold } => {
                let mut successes = 0usize;
                let mut running = 0usize;
                for child in children.iter_mut() {
                    match child.tick(bb) {
                        BehaviorStatus::Success => successes += 1,
                        BehaviorStatus::Running => running += 1,
                        BehaviorStatus::Failure => {}
                    }
                }
                if successes >= *threshold {
                    BehaviorStatus::Success
                } else if successes + running < *threshold {
                    BehaviorStatus::Failure
                } else {
                    BehaviorStatus::Running
                }
            }

            NodeKind::Inverter(child) => match child.tick(bb) {
                BehaviorStatus::Success => BehaviorStatus::Failure,
                BehaviorStatus::Failure => BehaviorStatus::Success,
                BehaviorStatus::Running => BehaviorStatus::Running,
            },

            NodeKind::Repeater {
                child,
                max_iterations,
                count,
            } => {
                if *max_iterations > 0 && *count >= *max_iterations as u64 {
                    *count = 0;
                    BehaviorStatus::Success
                } else {
                    if child.tick(bb) != BehaviorStatus::Running {
                        child.reset();
                        *count += 1;
                    }
                    BehaviorStatus::Running
                }
            }

            NodeKind::UntilFail(child) => match child.tick(bb) {
                BehaviorStatus::Failure => {
                    child.reset();
                    BehaviorStatus::Success
                }
                BehaviorStatus::Success => {
                    child.reset();
                    BehaviorStatus::Running
                }
                BehaviorStatus::Running => BehaviorStatus::Running,
            },

            NodeKind::Action(behavior) | NodeKind::Condition(behavior) => match behavior {
                Some(behavior) => behavior.tick(bb),
                None => {
                    warn!(node = %self.name, "leaf has no behavior bound, failing");
                    BehaviorStatus::Failure
                }
            },
        };

        self.status = Some(status);
        status
    }

    /// Clear indices, counters, and statuses in this subtree.
    pub fn reset(&mut self) {
        self.status = None;
        match &mut self.kind {
            NodeKind::Sequence { children, current } | NodeKind::Selector { children, current } => {
                *current = 0;
                children.iter_mut().for_each(BehaviorNode::reset);
            }
            NodeKind::Parallel { children, .. } => {
                children.iter_mut().for_each(BehaviorNode::reset);
            }
            NodeKind::Inverter(child) | NodeKind::UntilFail(child) => child.reset(),
            NodeKind::Repeater { child, count, .. } => {
                *count = 0;
                child.reset();
            }
            NodeKind::Action(_) | NodeKind::Condition(_) => {}
        }
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            NodeKind::Sequence { .. } => "Sequence",
            NodeKind::Selector { .. } => "Selector",
            NodeKind::Parallel { .. } => "Parallel",
            NodeKind::Inverter(_) => "Inverter",
            NodeKind::Repeater { .. } => "Repeater",
            NodeKind::UntilFail(_) => "UntilFail",
            NodeKind::Action(_) => "Action",
            NodeKind::Condition(_) => "Condition",
        }
    }
}

impl fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind_label())
            .field("name", &self.name)
            .field("status", &self.status)
            .field("children", &self.children())
            .finish()
    }
}

/// Build a sequence with one leaf per plan step, in plan order.
pub fn sequence_from_plan<F>(name: impl Into<String>, plan: &Plan, mut leaf: F) -> BehaviorNode
where
    F: FnMut(&Operator) -> BehaviorNode,
{
    BehaviorNode::sequence(name, plan.operators.iter().map(|op| leaf(op)).collect())
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A behavior tree with a root node and its blackboard.
#[derive(Debug)]
pub struct BehaviorTree {
    root: BehaviorNode,
    blackboard: Blackboard,
    tick_count: u64,
}

impl BehaviorTree {
    /// Create a tree with an empty blackboard.
    pub fn new(root: BehaviorNode) -> Self {
        Self::with_blackboard(root, Blackboard::new())
    }

    /// Create a tree over an existing blackboard.
    pub fn with_blackboard(root: BehaviorNode, blackboard: Blackboard) -> Self {
        Self {
            root,
            blackboard,
            tick_count: 0,
        }
    }

    /// Tick the tree once with no new context.
    pub fn tick(&mut self) -> BehaviorStatus {
        self.tick_with_context(Vec::<(String, Value)>::new())
    }

    /// Merge `context` into the blackboard, then tick the root.
    pub fn tick_with_context<K, I>(&mut self, context: I) -> BehaviorStatus
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        self.blackboard.merge(context);
        self.tick_count += 1;
        let status = self.root.tick(&mut self.blackboard);
        trace!(tree = %self.root.name(), tick = self.tick_count, ?status, "tick");
        status
    }

    /// Reset every node and the tick counter. The blackboard is kept.
    pub fn reset(&mut self) {
        self.root.reset();
        self.tick_count = 0;
    }

    /// The root node.
    pub fn root(&self) -> &BehaviorNode {
        &self.root
    }

    /// Status of the root from the last tick.
    pub fn status(&self) -> Option<BehaviorStatus> {
        self.root.status()
    }

    /// Ticks since creation or the last reset.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Read-only access to the blackboard.
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Mutable access to the blackboard.
    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
