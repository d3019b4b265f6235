//! Agents following a shared flow field across the wall while avoiding
//! each other.
//!
//! Run: RUST_LOG=debug cargo run --bin flow-crowd

use tilenav_core::Point;
use tilenav_demos::{GOAL, HEIGHT, WIDTH, wall_grid};
use tilenav_paths::{CrowdField, Planner, PlannerConfig};

const AGENTS: i32 = 12;
const TICKS: usize = 120;

fn main() {
    env_logger::init();

    let grid = wall_grid(&[5, 12]);
    let mut planner = Planner::new(PlannerConfig {
        crowd_jitter: 0.25,
        ..PlannerConfig::default()
    });
    planner.attach(&grid);

    let field = planner.compute_flow_field(&grid, GOAL, true, None, 0.0);
    print!("{}", planner.debug_dump_flow(&grid, &field));

    let mut agents: Vec<Point> = (0..AGENTS).map(|i| Point::new(1 + i % 3, 1 + i)).collect();
    let mut crowd = CrowdField::new(WIDTH, HEIGHT);
    for tick in 0..TICKS {
        crowd.begin_frame();
        for &a in &agents {
            crowd.stamp(a, 1.0);
        }
        for a in &mut agents {
            if *a == GOAL {
                continue;
            }
            let desired = field.step(*a);
            if desired != *a {
                *a = planner.avoid_crowd(&grid, *a, desired, &crowd, 2.0);
            }
        }
        let arrived = agents.iter().filter(|&&a| field.dist_at(a) < 3.0).count();
        log::debug!("tick {tick}: {arrived} agents near the goal");
    }

    let arrived = agents.iter().filter(|&&a| field.dist_at(a) < 3.0).count();
    println!("{arrived} of {AGENTS} agents within reach of {GOAL}");
}
