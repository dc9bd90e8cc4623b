//! Planner configuration, copied by value into each planning call.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::geometry::State;
use crate::map::{EmptyMap, Map};
use crate::obstacles::DynamicObstaclesManager;

/// Injectable clock source, seconds. Tests drive this deterministically;
/// production uses the wall clock.
pub type NowFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Wall-clock `NowFn` (seconds since the Unix epoch).
pub fn wall_clock() -> NowFn {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    })
}

/// Value bundle handed to [`super::AStarPlanner::plan`] each iteration.
#[derive(Clone)]
pub struct PlannerConfig {
    pub max_speed: f64,
    pub turning_radius: f64,
    pub coverage_turning_radius: f64,
    /// Children generated per vertex expansion.
    pub branching_factor: usize,
    /// Dynamic-obstacle snapshot for this iteration.
    pub obstacles: DynamicObstaclesManager,
    pub map: Arc<dyn Map>,
    /// Timestamp of the state the plan starts from.
    pub start_state_time: f64,
    pub now_fn: NowFn,
    pub visualizer: Option<Arc<Mutex<Visualizer>>>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_speed: 2.5,
            turning_radius: 8.0,
            coverage_turning_radius: 8.0,
            branching_factor: 4,
            obstacles: DynamicObstaclesManager::default(),
            map: Arc::new(EmptyMap),
            start_state_time: 0.0,
            now_fn: wall_clock(),
            visualizer: None,
        }
    }
}

impl PlannerConfig {
    #[inline]
    pub fn now(&self) -> f64 {
        (self.now_fn)()
    }

    pub(crate) fn visualize_vertex(&self, state: &State, f: f64, g: f64, h: f64, tag: &str) {
        if let Some(viz) = &self.visualizer {
            if let Ok(mut viz) = viz.lock() {
                viz.vertex(state, f, g, h, tag);
            }
        }
    }
}

impl std::fmt::Debug for PlannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerConfig")
            .field("max_speed", &self.max_speed)
            .field("turning_radius", &self.turning_radius)
            .field("coverage_turning_radius", &self.coverage_turning_radius)
            .field("branching_factor", &self.branching_factor)
            .field("start_state_time", &self.start_state_time)
            .finish_non_exhaustive()
    }
}

/// Best-effort sink for search-tree snapshots, one whitespace-separated
/// record per vertex. Write failures are ignored: visualization must never
/// take the planner down.
pub struct Visualizer {
    out: BufWriter<File>,
}

impl Visualizer {
    pub fn open(path: &Path) -> std::io::Result<Visualizer> {
        Ok(Visualizer {
            out: BufWriter::new(File::create(path)?),
        })
    }

    pub fn vertex(&mut self, state: &State, f: f64, g: f64, h: f64, tag: &str) {
        let _ = writeln!(
            self.out,
            "{:.3} {:.3} {:.4} {:.2} {:.3} {:.3} {:.3} {:.3} {}",
            state.x, state.y, state.heading, state.speed, state.time, f, g, h, tag
        );
        let _ = self.out.flush();
    }
}
