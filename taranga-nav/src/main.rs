//! TarangaNav demo binary: runs the coverage executive against the
//! simulated controller until the mission finishes or times out.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use taranga_nav::config::NavConfig;
use taranga_nav::error::Result;
use taranga_nav::executive::Executive;
use taranga_nav::publisher::TrajectoryPublisher;
use taranga_nav::sim::SimPublisher;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taranga_nav=info".parse().unwrap())
                .add_directive("taranga_plan=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config = if args.len() > 1 {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        NavConfig::load(config_path)?
    } else if Path::new("taranga.toml").exists() {
        info!("Loading configuration from taranga.toml");
        NavConfig::load(Path::new("taranga.toml"))?
    } else {
        info!("Using default configuration");
        NavConfig::default()
    };

    info!("TarangaNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Planning at {:.1}s cadence, {:.1} m/s, turning radius {:.1} m",
        config.timing.planning_time_seconds, config.planner.max_speed, config.planner.turning_radius
    );

    let publisher = Arc::new(SimPublisher::new(config.timing.planning_time_seconds));
    let executive = Executive::new(publisher.clone(), &config);

    if config.mission.ribbons.is_empty() {
        info!("No mission ribbons configured; using a 20 m demo line");
        executive.add_ribbon(0.0, 0.0, 0.0, 20.0);
    } else {
        for &[x1, y1, x2, y2] in &config.mission.ribbons {
            executive.add_ribbon(x1, y1, x2, y2);
        }
    }

    // Seed the pose estimate at the origin and go.
    executive.update_covered(0.0, 0.0, config.planner.max_speed, 0.0, publisher.get_time());
    executive.start_planner();

    // Main thread: follow the published trajectory and wait for coverage.
    let check_interval = Duration::from_millis(500);
    let deadline = publisher.get_time() + config.mission.timeout_seconds;

    loop {
        std::thread::sleep(check_interval);

        if publisher.all_done_called() {
            info!("Mission complete: all ribbons covered");
            break;
        }
        if publisher.get_time() > deadline {
            warn!("Mission timed out after {:.0}s", config.mission.timeout_seconds);
            break;
        }
        if !executive.planner_is_running() && executive.iterations() > 0 {
            warn!("Planner stopped before the mission completed");
            break;
        }

        // Simulate the vehicle tracking the plan: report the next
        // trajectory sample back as the current pose.
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
    }

    executive.cancel_planner();
    info!("TarangaNav finished");
    Ok(())
}
