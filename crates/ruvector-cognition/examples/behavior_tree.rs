//! Example: behavior tree patrol with a blackboard.
//!
//! Demonstrates:
//! - Selector fallback between an obstacle response and target tracking
//! - Sequences that resume at a running child
//! - Passing sensor context into a tick
//! - Repeater and inverter decorators

use ruvector_cognition::{BehaviorNode, BehaviorStatus, BehaviorTree, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    println!("=== Behavior Tree Demo ===\n");

    let avoid = BehaviorNode::sequence(
        "avoid",
        vec![
            BehaviorNode::condition("has_obstacle", |bb| bb.flag("has_obstacle")),
            BehaviorNode::action("steer_away", |bb| {
                bb.set("heading", "away");
                BehaviorStatus::Success
            }),
        ],
    );

    // Approaching takes two ticks per target.
    let mut approach_ticks = 0;
    let track = BehaviorNode::sequence(
        "track",
        vec![
            BehaviorNode::condition("has_target", |bb| bb.flag("has_target")),
            BehaviorNode::action("approach", move |_| {
                approach_ticks += 1;
                if approach_ticks % 2 == 1 {
                    BehaviorStatus::Running
                } else {
                    BehaviorStatus::Success
                }
            }),
            BehaviorNode::action("interact", |bb| {
                let count = bb.number("interactions").unwrap_or(0.0) as i64 + 1;
                bb.set("interactions", count);
                BehaviorStatus::Success
            }),
        ],
    );

    let idle = BehaviorNode::action("idle", |_| BehaviorStatus::Success);
    let mut tree = BehaviorTree::new(BehaviorNode::selector("patrol", vec![avoid, track, idle]));

    let scenarios: [(&str, bool, bool); 4] = [
        ("Nothing sensed", false, false),
        ("Obstacle ahead", true, false),
        ("Target acquired", false, true),
        ("Still approaching", false, true),
    ];
    for (i, (label, obstacle, target)) in scenarios.iter().enumerate() {
        let status = tree.tick_with_context([
            ("has_obstacle", Value::from(*obstacle)),
            ("has_target", Value::from(*target)),
        ]);
        println!("--- Scenario {}: {label} ---", i + 1);
        println!("  Tick result: {status:?}");
        println!(
            "  heading={:?} interactions={:?}\n",
            tree.blackboard().get("heading").map(ToString::to_string),
            tree.blackboard().number("interactions")
        );
    }

    println!("--- Repeater ---");
    let mut beeps = BehaviorTree::new(BehaviorNode::repeater(
        "beep_x3",
        3,
        BehaviorNode::action("beep", |bb| {
            let n = bb.number("beeps").unwrap_or(0.0) as i64 + 1;
            bb.set("beeps", n);
            BehaviorStatus::Success
        }),
    ));
    for i in 1..=4 {
        println!("  Tick {i}: {:?}", beeps.tick());
    }
    println!("  beeps = {:?}", beeps.blackboard().number("beeps"));

    println!("\n--- Inverter ---");
    let mut clear = BehaviorTree::new(BehaviorNode::inverter(
        "path_clear",
        BehaviorNode::condition("blocked", |bb| bb.flag("blocked")),
    ));
    clear.blackboard_mut().set("blocked", true);
    println!("  blocked=true  -> {:?}", clear.tick());
    clear.blackboard_mut().set("blocked", false);
    println!("  blocked=false -> {:?}", clear.tick());

    println!("\nFinal tick count: {}", tree.tick_count());
}
