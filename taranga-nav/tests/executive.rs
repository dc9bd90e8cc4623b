//! System tests: the executive, planner, and simulated controller running
//! together end to end.

use std::f64::consts::FRAC_PI_2;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use taranga_nav::config::NavConfig;
use taranga_nav::executive::Executive;
use taranga_nav::publisher::TrajectoryPublisher;
use taranga_nav::sim::SimPublisher;

fn config(planning_time: f64) -> NavConfig {
    let mut c = NavConfig::default();
    c.timing.planning_time_seconds = planning_time;
    c
}

/// Feed the published trajectory back as pose updates, the way a tracking
/// controller would, until `all_done` fires or the budget runs out.
fn follow_until_done(
    executive: &Executive,
    publisher: &SimPublisher,
    budget: Duration,
) -> bool {
    let interval = Duration::from_millis(250);
    let mut waited = Duration::ZERO;
    while waited < budget {
        if publisher.all_done_called() {
            return true;
        }
        let trajectory = publisher.last_trajectory();
        if trajectory.len() > 1 {
            let next = trajectory[1];
            executive.update_covered(
                next.x,
                next.y,
                next.speed,
                next.heading,
                publisher.get_time(),
            );
        }
        std::thread::sleep(interval);
        waited += interval;
    }
    publisher.all_done_called()
}

#[test]
fn test_single_ribbon_coverage_reaches_all_done() {
    let cfg = config(0.5);
    let publisher = Arc::new(SimPublisher::new(0.5));
    let executive = Executive::new(publisher.clone(), &cfg);

    executive.add_ribbon(0.0, 0.0, 0.0, 20.0);
    executive.update_covered(0.0, 0.0, 2.5, FRAC_PI_2, publisher.get_time());
    executive.start_planner();

    let done = follow_until_done(&executive, &publisher, Duration::from_secs(120));
    executive.cancel_planner();
    assert!(done, "single ribbon was not covered in time");
}

#[test]
fn test_box_pattern_reaches_all_done() {
    let mut cfg = config(1.0);
    // Tight radii so the whole box fits one planning horizon.
    cfg.planner.turning_radius = 2.0;
    cfg.planner.coverage_turning_radius = 2.0;
    cfg.planner.heuristic = 2;
    let publisher = Arc::new(SimPublisher::new(1.0));
    let executive = Executive::new(publisher.clone(), &cfg);

    let corners = [
        (10.0, 10.0, 20.0, 10.0),
        (20.0, 10.0, 20.0, 20.0),
        (20.0, 20.0, 10.0, 20.0),
        (10.0, 20.0, 10.0, 10.0),
    ];
    for (x1, y1, x2, y2) in corners {
        executive.add_ribbon(x1, y1, x2, y2);
    }
    executive.update_covered(0.0, 0.0, 2.5, 0.0, publisher.get_time());
    executive.start_planner();

    let done = follow_until_done(&executive, &publisher, Duration::from_secs(120));
    executive.cancel_planner();
    assert!(done, "box pattern was not covered in time");
}

#[test]
fn test_map_load_success_swaps_map_in() {
    // 60 x 60 m of open water in grid-world format.
    let mut file = tempfile::Builder::new().suffix(".map").tempfile().unwrap();
    writeln!(file, "2.0").unwrap();
    for _ in 0..30 {
        writeln!(file, "{}", ".".repeat(30)).unwrap();
    }
    file.flush().unwrap();
    let path = file.path().to_string_lossy().to_string();

    let cfg = config(0.5);
    let publisher = Arc::new(SimPublisher::new(0.5));
    let executive = Executive::new(publisher.clone(), &cfg);
    executive.add_ribbon(0.0, 0.0, 0.0, 20.0);
    executive.update_covered(0.0, 0.0, 2.5, FRAC_PI_2, publisher.get_time());
    executive.start_planner();
    executive.refresh_map(path.clone(), 43.0, -70.0);

    let mut loaded = false;
    for _ in 0..240 {
        if executive.current_map_path() == path {
            loaded = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    assert!(loaded, "map never finished loading");
    assert!(executive.planner_is_running());
    executive.cancel_planner();
}

#[test]
fn test_map_load_failure_keeps_planner_running() {
    let cfg = config(0.5);
    let publisher = Arc::new(SimPublisher::new(0.5));
    let executive = Executive::new(publisher.clone(), &cfg);
    executive.add_ribbon(0.0, 0.0, 0.0, 20.0);
    executive.update_covered(0.0, 0.0, 2.5, FRAC_PI_2, publisher.get_time());
    executive.start_planner();
    executive.refresh_map("/nonexistent/depths.map".to_string(), 43.0, -70.0);

    std::thread::sleep(Duration::from_secs(2));
    // The failed load staged nothing and the loop keeps planning.
    assert_eq!(executive.current_map_path(), "");
    assert!(executive.planner_is_running());
    executive.cancel_planner();
}

#[test]
fn test_controller_divergence_resets_plan_and_shrink() {
    let mut cfg = config(0.5);
    cfg.timing.radius_shrink = true;
    cfg.timing.radius_shrink_amount = 0.001;
    let publisher = Arc::new(SimPublisher::new(0.5));
    // Every committed start state is 5 m off the plan.
    publisher.set_divergence(Some((5.0, 0.0)));

    let executive = Executive::new(publisher.clone(), &cfg);
    executive.add_ribbon(0.0, 0.0, 0.0, 20.0);
    executive.update_covered(0.0, 0.0, 2.5, FRAC_PI_2, publisher.get_time());
    executive.start_planner();

    let mut resets = 0;
    for _ in 0..240 {
        resets = executive.plan_resets();
        if resets >= 2 {
            break;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    executive.cancel_planner();
    for _ in 0..20 {
        if !executive.planner_is_running() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    assert!(resets >= 2, "controller divergence never reset the plan");
    // Every divergence rolls the cumulative shrink back, so it can never
    // exceed a single iteration's worth.
    assert!(
        executive.radius_shrink() <= cfg.timing.radius_shrink_amount + 1e-12,
        "radius shrink was not rolled back: {}",
        executive.radius_shrink()
    );
}

#[test]
fn test_cancellation_returns_to_inactive_within_two_seconds() {
    let cfg = config(0.5);
    let publisher = Arc::new(SimPublisher::new(0.5));
    let executive = Executive::new(publisher.clone(), &cfg);
    executive.add_ribbon(0.0, 0.0, 0.0, 20.0);
    executive.update_covered(0.0, 0.0, 2.5, FRAC_PI_2, publisher.get_time());
    executive.start_planner();

    // Let it spin up.
    for _ in 0..20 {
        if executive.planner_is_running() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(executive.planner_is_running());

    executive.cancel_planner();
    let mut stopped = false;
    for _ in 0..20 {
        if !executive.planner_is_running() {
            stopped = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(stopped, "planner did not stop within two seconds");
}

#[test]
fn test_empty_mission_reports_all_done_immediately() {
    let cfg = config(0.5);
    let publisher = Arc::new(SimPublisher::new(0.5));
    let executive = Executive::new(publisher.clone(), &cfg);
    executive.start_planner();

    let mut done = false;
    for _ in 0..20 {
        if publisher.all_done_called() {
            done = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(done, "empty mission should complete immediately");
    assert!(!executive.planner_is_running());
}
