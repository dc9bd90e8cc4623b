//! Executable trajectory: a time-stamped chain of Dubins paths.

use crate::geometry::dubins::DubinsPath;
use crate::geometry::State;

/// One Dubins path traversed at constant speed, anchored at a start time.
#[derive(Clone, Debug)]
pub struct PlanEdge {
    path: DubinsPath,
    speed: f64,
    start_time: f64,
    coverage_allowed: bool,
}

impl PlanEdge {
    pub fn new(path: DubinsPath, speed: f64, start_time: f64, coverage_allowed: bool) -> Self {
        debug_assert!(speed > 0.0);
        Self {
            path,
            speed,
            start_time,
            coverage_allowed,
        }
    }

    #[inline]
    pub fn path(&self) -> &DubinsPath {
        &self.path
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.path.length() / self.speed
    }

    #[inline]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration()
    }

    #[inline]
    pub fn coverage_allowed(&self) -> bool {
        self.coverage_allowed
    }

    /// State along the edge at absolute time `t` (clamped to the edge).
    pub fn state_at(&self, t: f64) -> State {
        let s = ((t - self.start_time) * self.speed).clamp(0.0, self.path.length());
        let (x, y, heading) = self.path.sample(s);
        State::new(x, y, heading, self.speed, t)
    }

    /// State at the far end of the edge.
    pub fn end_state(&self) -> State {
        self.state_at(self.end_time())
    }
}

/// Ordered sequence of [`PlanEdge`]s forming a continuous trajectory.
#[derive(Clone, Debug, Default)]
pub struct DubinsPlan {
    edges: Vec<PlanEdge>,
}

impl DubinsPlan {
    /// How far into the future a plan may reach, seconds.
    pub const TIME_HORIZON: f64 = 30.0;

    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[inline]
    pub fn edges(&self) -> &[PlanEdge] {
        &self.edges
    }

    pub fn append(&mut self, edge: PlanEdge) {
        self.edges.push(edge);
    }

    pub fn start_time(&self) -> Option<f64> {
        self.edges.first().map(PlanEdge::start_time)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.edges.last().map(PlanEdge::end_time)
    }

    /// State along the plan at time `t`, clamped into the plan's span.
    /// `None` only for an empty plan.
    pub fn state_at_time(&self, t: f64) -> Option<State> {
        if self.edges.is_empty() {
            return None;
        }
        let edge = self
            .edges
            .iter()
            .find(|e| t <= e.end_time())
            .unwrap_or_else(|| self.edges.last().expect("non-empty"));
        Some(edge.state_at(t))
    }

    /// Drop every edge that ends at or before `t`, keeping the suffix that
    /// is still ahead of the controller. Idempotent at a fixed `t`.
    pub fn change_into_suffix(&mut self, t: f64) {
        self.edges.retain(|e| e.end_time() > t);
    }

    /// States sampled every half second along the plan, for display.
    pub fn half_second_samples(&self) -> Vec<State> {
        let (Some(start), Some(end)) = (self.start_time(), self.end_time()) else {
            return Vec::new();
        };
        let mut samples = Vec::new();
        let mut t = start;
        while t <= end {
            if let Some(s) = self.state_at_time(t) {
                samples.push(s);
            }
            t += 0.5;
        }
        samples
    }
}
