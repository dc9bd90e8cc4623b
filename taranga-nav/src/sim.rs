//! Simulated controller/host stand-in.
//!
//! Implements [`TrajectoryPublisher`] with a monotonic clock and a
//! perfectly tracking controller: publishing a plan commits to the plan
//! state one planning period ahead. Tests can inject a fixed position
//! offset to simulate a controller that cannot follow the plan.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use taranga_plan::geometry::State;
use taranga_plan::plan::DubinsPlan;
use taranga_plan::ribbon::RibbonManager;

use crate::publisher::TrajectoryPublisher;

pub struct SimPublisher {
    epoch: Instant,
    period: f64,
    divergence: Mutex<Option<(f64, f64)>>,
    last_trajectory: Mutex<Vec<State>>,
    all_done: AtomicBool,
}

impl SimPublisher {
    /// `period` is the planning period the executive runs at; committed
    /// start states are sampled that far ahead of the current time.
    pub fn new(period: f64) -> Self {
        Self {
            epoch: Instant::now(),
            period,
            divergence: Mutex::new(None),
            last_trajectory: Mutex::new(Vec::new()),
            all_done: AtomicBool::new(false),
        }
    }

    /// Make every committed start state sit `offset` away from the plan,
    /// simulating a controller that diverged.
    pub fn set_divergence(&self, offset: Option<(f64, f64)>) {
        *self.divergence.lock() = offset;
    }

    pub fn all_done_called(&self) -> bool {
        self.all_done.load(Ordering::Acquire)
    }

    /// Most recently displayed trajectory samples.
    pub fn last_trajectory(&self) -> Vec<State> {
        self.last_trajectory.lock().clone()
    }
}

impl TrajectoryPublisher for SimPublisher {
    fn get_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn publish_plan(&self, plan: &DubinsPlan) -> State {
        let commit_time = self.get_time() + self.period;
        let mut state = plan
            .state_at_time(commit_time)
            .unwrap_or_else(|| State::new(0.0, 0.0, 0.0, 0.0, commit_time));
        if let Some((dx, dy)) = *self.divergence.lock() {
            state.x += dx;
            state.y += dy;
        }
        state
    }

    fn display_trajectory(&self, states: &[State], _is_new: bool) {
        if !states.is_empty() {
            *self.last_trajectory.lock() = states.to_vec();
        }
    }

    fn display_ribbons(&self, _ribbons: &RibbonManager) {}

    fn all_done(&self) {
        self.all_done.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use taranga_plan::geometry::dubins::DubinsPath;
    use taranga_plan::plan::PlanEdge;

    #[test]
    fn test_publish_commits_one_period_ahead() {
        let sim = SimPublisher::new(0.5);
        let now = sim.get_time();

        let a = State::new(0.0, 0.0, 0.0, 2.0, now);
        let b = State::new(20.0, 0.0, 0.0, 2.0, now + 10.0);
        let path = DubinsPath::shortest(&a, &b, 4.0).unwrap();
        let mut plan = DubinsPlan::new();
        plan.append(PlanEdge::new(path, 2.0, now, false));

        let committed = sim.publish_plan(&plan);
        // About one period down the plan at 2 m/s.
        assert_relative_eq!(committed.x, 1.0, epsilon = 0.2);
        assert_relative_eq!(committed.y, 0.0, epsilon = 1e-9);

        sim.set_divergence(Some((5.0, 0.0)));
        let diverged = sim.publish_plan(&plan);
        assert!(diverged.x > 5.0);
    }
}
