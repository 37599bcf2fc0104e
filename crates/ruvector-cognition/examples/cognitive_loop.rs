//! Example: goal -> plan -> behavior tree -> outcome loop.
//!
//! Demonstrates:
//! - Queuing goals with priorities and deadlines
//! - Planning for the current goal (HTN first, A* fallback)
//! - Executing plans as behavior trees over a blackboard
//! - Choosing between recovery options with the decision engine
//!
//! Run with `RUST_LOG=debug` to see planner and goal transitions.

use ruvector_cognition::cognitive::{sequence_from_plan, ActionOption, Situation};
use ruvector_cognition::planning::{Constraints, Method};
use ruvector_cognition::{
    world_state, BehaviorNode, BehaviorStatus, BehaviorTree, CognitionConfig, CognitiveCore,
    ManualClock, WorldState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    println!("=== Cognitive Loop Demo ===\n");

    let clock = ManualClock::new(0);
    let mut core = CognitiveCore::with_clock(CognitionConfig::default(), clock.clone());

    let planner = core.planner_mut();
    planner.register_operator(
        "undock",
        world_state! { "docked" => true },
        world_state! { "docked" => false },
        1.0,
        2.0,
    );
    planner.register_operator(
        "drive_to_shelf",
        world_state! { "docked" => false, "at" => "base" },
        world_state! { "at" => "shelf" },
        3.0,
        10.0,
    );
    planner.register_operator(
        "pick",
        world_state! { "at" => "shelf", "holding" => false },
        world_state! { "holding" => true },
        1.0,
        2.0,
    );
    planner.register_operator(
        "drive_to_base",
        world_state! { "at" => "shelf" },
        world_state! { "at" => "base" },
        3.0,
        10.0,
    );
    planner.register_operator(
        "dock",
        world_state! { "docked" => false, "at" => "base" },
        world_state! { "docked" => true },
        1.0,
        2.0,
    );
    planner.add_method(Method::new(
        "fetch_part",
        world_state! { "docked" => true },
        vec![
            "undock".into(),
            "drive_to_shelf".into(),
            "pick".into(),
            "drive_to_base".into(),
            "dock".into(),
        ],
    ));

    let goals = core.goals_mut();
    goals.add_goal(
        "fetch_part",
        world_state! { "holding" => true, "docked" => true },
        5,
        Some(60_000_000),
    );
    goals.add_goal("recharge", world_state! { "docked" => true }, 1, None);

    let mut world = world_state! {
        "docked" => true,
        "at" => "base",
        "holding" => false,
    };

    let mut cycle = 0;
    loop {
        let (id, plan) = match core.plan_next(&world, &Constraints::default()) {
            Ok(Some(next)) => next,
            Ok(None) => break,
            Err(err) => {
                println!("  planning failed: {err}");
                break;
            }
        };
        cycle += 1;
        println!("--- Cycle {cycle}: goal {id} ---");
        println!(
            "  Plan ({:?}): {:?}  cost={:.1} duration={:.1}",
            plan.strategy,
            plan.names(),
            plan.total_cost,
            plan.total_duration
        );

        let root = sequence_from_plan("execute", &plan, |op| {
            let op = op.clone();
            BehaviorNode::action(op.name.clone(), move |bb| {
                for (k, v) in op.effects.iter() {
                    bb.set(k.clone(), v.clone());
                }
                println!("    -> {}", op.name);
                BehaviorStatus::Success
            })
        });
        let mut tree = BehaviorTree::new(root);
        tree.blackboard_mut().merge_state(&world);
        let status = tree.tick();
        world = tree
            .blackboard()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<WorldState>();
        clock.advance((plan.total_duration * 1_000_000.0) as i64);

        let success = status == BehaviorStatus::Success;
        if let Err(err) = core.report_outcome(id, success, "execution failed") {
            println!("  could not record outcome: {err}");
        }
        println!("  Tree status: {status:?}, world: {}", describe(&world));
    }

    println!("\n--- Recovery choice ---");
    let options = [
        ActionOption::new("retry_grasp")
            .with_criterion("effectiveness", 0.8)
            .with_cost(0.2)
            .with_outcome(0.7, 1.0)
            .with_outcome(0.3, -0.5),
        ActionOption::new("ask_operator")
            .with_criterion("effectiveness", 0.95)
            .with_criterion("efficiency", 0.2)
            .with_cost(0.6)
            .with_risk(0.05),
    ];
    match core.choose(&Situation::safety_critical(), &options) {
        Ok(decision) => {
            for c in &decision.candidates {
                println!(
                    "  {:<13} utility={:.3} risk={:.2} prospect={:.3} score={:.3}",
                    c.action, c.utility, c.risk, c.prospect_value, c.final_score
                );
            }
            println!(
                "  Chosen: {} (confidence {:.2})",
                decision.best.action, decision.confidence
            );
        }
        Err(err) => println!("  decision failed: {err}"),
    }

    println!("\nGoal summary: {:?}", core.goals().statistics());
}

fn describe(state: &WorldState) -> String {
    state
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
