//! Executive: couples sensor, obstacle, and map updates with the periodic
//! planner invocation, and owns the planning thread's lifecycle.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{error, info, warn};

use taranga_plan::geometry::{normalize_angle, State};
use taranga_plan::map::{load_map, EmptyMap, Map};
use taranga_plan::obstacles::{Distribution, DynamicObstaclesManager};
use taranga_plan::plan::DubinsPlan;
use taranga_plan::planner::{AStarPlanner, NowFn, PlannerConfig, Visualizer};
use taranga_plan::ribbon::{self, Heuristic, RibbonManager};

use crate::config::NavConfig;
use crate::publisher::TrajectoryPublisher;

/// Covariance used when a single observed obstacle state has to stand in
/// for a real prediction. Placeholder by contract: callers with a real
/// predictor should use [`Executive::update_dynamic_obstacle_distributions`].
const INVENTED_COVARIANCE: [[f64; 2]; 2] = [[1.0, 0.0], [0.0, 1.0]];

/// Planning-thread lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannerState {
    Inactive,
    Running,
    Cancelled,
}

/// Loop constants fixed at construction.
#[derive(Clone, Copy, Debug)]
struct LoopConstants {
    planning_time_seconds: f64,
    reuse_plan: bool,
    radius_shrink_enabled: bool,
    radius_shrink_amount: f64,
    coverage_heading_rate_max: f64,
}

/// Mutable planner settings, shared between callers and the loop.
struct Settings {
    turning_radius: f64,
    coverage_turning_radius: f64,
    max_speed: f64,
    branching_factor: usize,
    /// Cumulative radius shrink applied since the last divergence.
    radius_shrink: f64,
    visualizer: Option<Arc<std::sync::Mutex<Visualizer>>>,
}

/// Last pose observation, written only by `update_covered`.
#[derive(Clone, Copy)]
struct LastObservation {
    state: State,
    heading: f64,
    time: f64,
    valid: bool,
}

/// Map staged by a loader thread, waiting for the loop to swap it in.
#[derive(Default)]
struct MapSlot {
    staged: Option<Arc<dyn Map>>,
    current_path: String,
}

struct Shared {
    publisher: Arc<dyn TrajectoryPublisher>,
    constants: LoopConstants,
    ribbons: Mutex<RibbonManager>,
    obstacles: Mutex<DynamicObstaclesManager>,
    map_slot: Mutex<MapSlot>,
    /// Map currently installed in the planner, kept across restarts.
    current_map: Mutex<Arc<dyn Map>>,
    settings: Mutex<Settings>,
    planner_state: Mutex<PlannerState>,
    cancel_cv: Condvar,
    last: Mutex<LastObservation>,
    /// Times the plan was reset because the controller diverged.
    plan_resets: AtomicU32,
    /// Completed planning-loop iterations.
    iterations: AtomicU32,
}

/// Planning-loop driver.
///
/// All public operations are thread-safe; the planning loop itself runs on
/// a dedicated thread between `start_planner` and `cancel_planner`.
pub struct Executive {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Executive {
    pub fn new(publisher: Arc<dyn TrajectoryPublisher>, config: &NavConfig) -> Self {
        let constants = LoopConstants {
            planning_time_seconds: config.timing.planning_time_seconds,
            reuse_plan: config.timing.reuse_plan,
            radius_shrink_enabled: config.timing.radius_shrink,
            radius_shrink_amount: config.timing.radius_shrink_amount,
            coverage_heading_rate_max: config.timing.coverage_heading_rate_max,
        };
        let shared = Arc::new(Shared {
            publisher,
            constants,
            ribbons: Mutex::new(RibbonManager::new(
                Heuristic::MaxDistance,
                config.planner.turning_radius,
                2,
            )),
            obstacles: Mutex::new(DynamicObstaclesManager::default()),
            map_slot: Mutex::new(MapSlot::default()),
            current_map: Mutex::new(Arc::new(EmptyMap)),
            settings: Mutex::new(Settings {
                turning_radius: config.planner.turning_radius,
                coverage_turning_radius: config.planner.coverage_turning_radius,
                max_speed: config.planner.max_speed,
                branching_factor: config.planner.branching_factor,
                radius_shrink: 0.0,
                visualizer: None,
            }),
            planner_state: Mutex::new(PlannerState::Inactive),
            cancel_cv: Condvar::new(),
            last: Mutex::new(LastObservation {
                state: State::default(),
                heading: 0.0,
                time: 0.0,
                valid: false,
            }),
            plan_resets: AtomicU32::new(0),
            iterations: AtomicU32::new(0),
        });

        let executive = Self {
            shared,
            handle: Mutex::new(None),
        };
        executive.set_configuration(
            config.planner.turning_radius,
            config.planner.coverage_turning_radius,
            config.planner.max_speed,
            config.planner.line_width,
            config.planner.branching_factor,
            config.planner.heuristic,
        );
        if config.planner.visualize {
            executive.set_planner_visualization(true, &config.planner.visualization_file_path);
        }
        executive
    }

    /// Record the vehicle pose. Coverage is only applied while the heading
    /// rate stays within the configured limit, so tight turns near a ribbon
    /// do not count as driving over it.
    pub fn update_covered(&self, x: f64, y: f64, speed: f64, heading: f64, t: f64) {
        let apply = {
            let last = self.shared.last.lock();
            if !last.valid {
                true
            } else {
                let dt = t - last.time;
                dt > 0.0
                    && normalize_angle(heading - last.heading).abs() / dt
                        <= self.shared.constants.coverage_heading_rate_max
            }
        };
        if apply {
            self.shared.ribbons.lock().cover(x, y);
        }
        let mut last = self.shared.last.lock();
        last.state = State::new(x, y, heading, speed, t);
        last.heading = heading;
        last.time = t;
        last.valid = true;
    }

    pub fn add_ribbon(&self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.shared.ribbons.lock().add(x1, y1, x2, y2);
    }

    /// Drop every ribbon, resetting the manager the way a fresh survey
    /// upload does.
    pub fn clear_ribbons(&self) {
        let turning_radius = self.shared.settings.lock().turning_radius;
        *self.shared.ribbons.lock() =
            RibbonManager::new(Heuristic::TspPointRobotNoSplitKRibbons, turning_radius, 2);
    }

    /// Report a dynamic obstacle from a single observed state. Two
    /// unit-covariance distributions (now and one second ahead) stand in
    /// for a real prediction.
    pub fn update_dynamic_obstacle(&self, mmsi: u32, obstacle: State) {
        self.update_dynamic_obstacle_distributions(mmsi, invent_distributions(obstacle));
    }

    /// Report a dynamic obstacle with a real predicted trajectory.
    pub fn update_dynamic_obstacle_distributions(
        &self,
        mmsi: u32,
        distributions: Vec<Distribution>,
    ) {
        self.shared.obstacles.lock().update(mmsi, distributions);
    }

    /// Load a map file asynchronously and stage it for the planning loop.
    /// Errors are contained in the loader thread; the previous map stays
    /// installed.
    pub fn refresh_map(&self, path_to_map_file: String, latitude: f64, longitude: f64) {
        let shared = Arc::clone(&self.shared);
        std::thread::spawn(move || {
            let mut slot = shared.map_slot.lock();
            if slot.current_path == path_to_map_file {
                return;
            }
            match load_map(Path::new(&path_to_map_file), latitude, longitude) {
                Ok(map) => {
                    slot.staged = Some(map);
                    slot.current_path = path_to_map_file;
                    info!("Done loading map");
                }
                Err(e) => {
                    error!(
                        "Encountered an error loading map at path {}: {}. Map was not updated.",
                        path_to_map_file, e
                    );
                    slot.staged = None;
                    slot.current_path.clear();
                }
            }
        });
    }

    /// Update planner geometry and search settings. `line_width` is the
    /// process-wide ribbon width; unknown heuristic ids are ignored with a
    /// warning.
    pub fn set_configuration(
        &self,
        turning_radius: f64,
        coverage_turning_radius: f64,
        max_speed: f64,
        line_width: f64,
        branching_factor: usize,
        heuristic: u32,
    ) {
        {
            let mut s = self.shared.settings.lock();
            s.turning_radius = turning_radius;
            s.coverage_turning_radius = coverage_turning_radius;
            s.max_speed = max_speed;
            s.branching_factor = branching_factor;
        }
        ribbon::set_ribbon_width(line_width);
        match Heuristic::from_id(heuristic) {
            Some(h) => self.shared.ribbons.lock().set_heuristic(h),
            None => warn!("Unknown heuristic {}. Ignoring.", heuristic),
        }
    }

    /// Launch the planning loop. A map is always installed first (an empty
    /// one when nothing has been loaded yet).
    pub fn start_planner(&self) {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("planner already running; ignoring start request");
            return;
        }
        let shared = Arc::clone(&self.shared);
        *handle = Some(
            std::thread::Builder::new()
                .name("planner".into())
                .spawn(move || plan_loop(shared))
                .expect("Failed to spawn planner thread"),
        );
    }

    /// Ask the planning loop to exit; it observes the flag at the top of
    /// its next iteration.
    pub fn cancel_planner(&self) {
        let mut state = self.shared.planner_state.lock();
        if *state == PlannerState::Running {
            *state = PlannerState::Cancelled;
        }
        self.shared.cancel_cv.notify_all();
    }

    /// Toggle search-tree visualization.
    pub fn set_planner_visualization(&self, visualize: bool, visualization_file_path: &str) {
        let mut settings = self.shared.settings.lock();
        if !visualize {
            settings.visualizer = None;
            return;
        }
        match Visualizer::open(Path::new(visualization_file_path)) {
            Ok(v) => settings.visualizer = Some(Arc::new(std::sync::Mutex::new(v))),
            Err(e) => {
                warn!(
                    "could not open visualization file {}: {}",
                    visualization_file_path, e
                );
                settings.visualizer = None;
            }
        }
    }

    pub fn planner_is_running(&self) -> bool {
        *self.shared.planner_state.lock() == PlannerState::Running
    }

    /// Path of the most recently loaded map, empty when none.
    pub fn current_map_path(&self) -> String {
        self.shared.map_slot.lock().current_path.clone()
    }

    /// Cumulative turning-radius shrink currently applied.
    pub fn radius_shrink(&self) -> f64 {
        self.shared.settings.lock().radius_shrink
    }

    /// Times the plan was reset because the controller diverged.
    pub fn plan_resets(&self) -> u32 {
        self.shared.plan_resets.load(Ordering::Relaxed)
    }

    /// Completed planning-loop iterations.
    pub fn iterations(&self) -> u32 {
        self.shared.iterations.load(Ordering::Relaxed)
    }

    /// Total uncovered ribbon length remaining, meters.
    pub fn uncovered_length(&self) -> f64 {
        self.shared.ribbons.lock().total_uncovered_length()
    }
}

impl Drop for Executive {
    fn drop(&mut self) {
        self.cancel_planner();
        {
            let mut state = self.shared.planner_state.lock();
            if *state != PlannerState::Inactive {
                let _ = self.shared.cancel_cv.wait_while_for(
                    &mut state,
                    |s| *s != PlannerState::Inactive,
                    Duration::from_secs(2),
                );
            }
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn invent_distributions(obstacle: State) -> Vec<Distribution> {
    let next = obstacle.push(1.0);
    vec![
        Distribution::new(
            [obstacle.x, obstacle.y],
            INVENTED_COVARIANCE,
            obstacle.heading,
            obstacle.time,
        ),
        Distribution::new([next.x, next.y], INVENTED_COVARIANCE, next.heading, next.time),
    ]
}

/// The planning loop body. Runs on the dedicated planner thread until
/// cancelled, coverage completes, or the planner fails.
fn plan_loop(shared: Arc<Shared>) {
    info!("initializing planner");

    let publisher = Arc::clone(&shared.publisher);
    let now_fn: NowFn = {
        let p = Arc::clone(&publisher);
        Arc::new(move || p.get_time())
    };

    // Startup handshake: a stale Cancelled flag from a failed previous run
    // gets two seconds to clear before this thread gives up.
    {
        let mut state = shared.planner_state.lock();
        if *state == PlannerState::Cancelled {
            let _ = shared.cancel_cv.wait_while_for(
                &mut state,
                |s| *s == PlannerState::Cancelled,
                Duration::from_secs(2),
            );
        }
        if *state == PlannerState::Cancelled {
            error!(
                "Planner initialization timed out: the cancel flag is still set. \
                 A previous planning iteration likely failed; restart the planner \
                 node to keep using it."
            );
            return;
        }
        *state = PlannerState::Running;
    }

    let mut planner = AStarPlanner::new();
    let planning_time = shared.constants.planning_time_seconds;

    // The plan and its expected start state persist across iterations.
    let mut plan = DubinsPlan::new();
    let mut start_state: Option<State> = None;

    loop {
        let iteration_start = publisher.get_time();

        if *shared.planner_state.lock() == PlannerState::Cancelled {
            break;
        }

        if shared.ribbons.lock().done() {
            info!("finished covering ribbons");
            publisher.all_done();
            break;
        }

        {
            let ribbons = shared.ribbons.lock();
            publisher.display_ribbons(&ribbons);
        }

        // Swap in a freshly loaded map if one is staged. Non-blocking: a
        // loader mid-parse holds the lock for a while and the deadline
        // matters more than the new map.
        if let Some(mut slot) = shared.map_slot.try_lock() {
            if let Some(staged) = slot.staged.take() {
                *shared.current_map.lock() = staged;
            }
        }

        // When the previous iteration left no valid start state, predict
        // one by pushing the last observed pose to the end of this period.
        let last = *shared.last.lock();
        let start = match start_state {
            Some(s) => s,
            None => last
                .state
                .push(publisher.get_time() + planning_time - last.state.time),
        };

        if !shared.constants.reuse_plan {
            plan = DubinsPlan::new();
        }
        if !plan.empty() {
            plan.change_into_suffix(start.time);
        }

        if shared.constants.radius_shrink_enabled {
            let mut settings = shared.settings.lock();
            settings.turning_radius -= shared.constants.radius_shrink_amount;
            settings.coverage_turning_radius -= shared.constants.radius_shrink_amount;
            settings.radius_shrink += shared.constants.radius_shrink_amount;
        }

        // Snapshot inputs under their locks, then plan without holding any.
        let obstacles = shared.obstacles.lock().clone();
        let config = {
            let settings = shared.settings.lock();
            PlannerConfig {
                max_speed: settings.max_speed,
                turning_radius: settings.turning_radius,
                coverage_turning_radius: settings.coverage_turning_radius,
                branching_factor: settings.branching_factor,
                obstacles,
                map: Arc::clone(&shared.current_map.lock()),
                start_state_time: start.time,
                now_fn: Arc::clone(&now_fn),
                visualizer: settings.visualizer.clone(),
            }
        };
        let mut ribbons_copy = shared.ribbons.lock().clone();
        // Account for motion that will happen while this iteration plans.
        ribbons_copy.cover_between(last.state.x, last.state.y, start.x, start.y);

        let budget = iteration_start + planning_time - publisher.get_time();
        if budget > 0.0 {
            let result = catch_unwind(AssertUnwindSafe(|| {
                planner.plan(ribbons_copy, start, config, plan.clone(), budget)
            }));
            match result {
                Ok(Ok(new_plan)) => plan = new_plan,
                Ok(Err(e)) => {
                    error!("Exception thrown while planning: {}. Pausing.", e);
                    cancel(&shared);
                    plan = DubinsPlan::new();
                }
                Err(payload) => {
                    // State stays Cancelled: the next start_planner's
                    // handshake reports the failed run.
                    error!("Unknown panic thrown while planning; pausing");
                    cancel(&shared);
                    resume_unwind(payload);
                }
            }
        } else {
            warn!("planning window exhausted before the planner could start");
            plan = DubinsPlan::new();
        }

        // Sleep out the rest of the period; an overrun skips the sleep and
        // gets logged.
        let elapsed = publisher.get_time() - iteration_start;
        if elapsed <= planning_time {
            std::thread::sleep(Duration::from_secs_f64(planning_time - elapsed));
        } else {
            warn!(
                "planning iteration overran its period: {:.3}s > {:.3}s",
                elapsed, planning_time
            );
        }

        publisher.display_trajectory(&plan.half_second_samples(), true);

        if !plan.empty() {
            let committed = publisher.publish_plan(&plan);
            start_state = Some(committed);
            let expected = plan.state_at_time(committed.time);
            let diverged = match &expected {
                Some(expected) => !committed.is_co_located(expected),
                None => true,
            };
            if diverged {
                // The controller cannot make our plan; drop it and undo
                // any accumulated radius shrink.
                plan = DubinsPlan::new();
                shared.plan_resets.fetch_add(1, Ordering::Relaxed);
                if shared.constants.radius_shrink_enabled {
                    let mut settings = shared.settings.lock();
                    settings.turning_radius += settings.radius_shrink;
                    settings.coverage_turning_radius += settings.radius_shrink;
                    settings.radius_shrink = 0.0;
                }
                if let Some(expected) = expected {
                    warn!(
                        "start state is not along the previous plan: \
                         ({:.2}, {:.2}, {:.4}) vs expected ({:.2}, {:.2}, {:.4})",
                        committed.x,
                        committed.y,
                        committed.heading,
                        expected.x,
                        expected.y,
                        expected.heading
                    );
                }
            }
        } else {
            info!("Planner returned empty trajectory.");
            start_state = None;
        }

        shared.iterations.fetch_add(1, Ordering::Relaxed);
    }

    *shared.planner_state.lock() = PlannerState::Inactive;
    shared.cancel_cv.notify_all();
}

fn cancel(shared: &Shared) {
    let mut state = shared.planner_state.lock();
    if *state == PlannerState::Running {
        *state = PlannerState::Cancelled;
    }
}
