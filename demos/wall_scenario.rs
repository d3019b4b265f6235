//! Wall-and-doors walkthrough: one-shot search, cache, HPA*, then a door
//! swap handled incrementally by D*-Lite.
//!
//! Run: RUST_LOG=debug cargo run --bin wall-scenario

use tilenav_demos::{GOAL, START, log_stats, set_door, wall_grid};
use tilenav_paths::{Planner, PlannerConfig, SearchParams};

fn main() {
    env_logger::init();

    let mut grid = wall_grid(&[5, 12]);
    let mut planner = Planner::new(PlannerConfig::default());
    planner.attach(&grid);

    let raw = SearchParams {
        smooth: false,
        ..SearchParams::default()
    };
    let path = planner.find_path(&grid, START, GOAL, &raw);
    println!("one-shot: {} cells, cost {:.2}", path.path.len(), path.cost);
    print!("{}", planner.debug_dump_path(&grid, &path));

    let again = planner.find_path(&grid, START, GOAL, &raw);
    println!("repeated query identical: {}", again == path);

    let smoothed = planner.find_path(&grid, START, GOAL, &SearchParams::default());
    println!("smoothed waypoints: {:?}", smoothed.path);

    let hpa = SearchParams {
        use_hpa: true,
        hpa_cluster_size: 8,
        ..raw
    };
    let coarse = planner.find_path(&grid, START, GOAL, &hpa);
    println!(
        "hpa*: {} cells, cost {:.2} over {} portals",
        coarse.path.len(),
        coarse.cost,
        planner.hpa().nodes().len()
    );

    let first = planner.replan(&grid, START, GOAL, &raw);
    println!("d*-lite: cost {:.2}", first.cost);

    let changed: Vec<_> = [set_door(&mut grid, 5, false), set_door(&mut grid, 8, true)]
        .into_iter()
        .flatten()
        .collect();
    planner.notify_terrain_changed(&grid, &changed);
    let repaired = planner.replan(&grid, START, GOAL, &raw);
    println!("after door swap: {} cells, cost {:.2}", repaired.path.len(), repaired.cost);
    print!("{}", planner.debug_dump_path(&grid, &repaired));

    log_stats(&planner.stats());
    if !repaired.success {
        eprintln!("Error: no path after the door swap");
        std::process::exit(1);
    }
}
