//! Anytime A* over the Dubins sample graph.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, info, warn};

use crate::error::{PlanError, Result};
use crate::geometry::dubins::DubinsPath;
use crate::geometry::State;
use crate::plan::DubinsPlan;
use crate::ribbon::RibbonManager;

use super::config::PlannerConfig;
use super::graph::{SearchGraph, VertexId};
use super::samples::{SampleState, StateGenerator};

/// Samples added to the pool on every outer iteration (linear growth).
pub const INITIAL_SAMPLES: usize = 100;

/// PRNG seed for the sample generator; fixed so planning is reproducible
/// for a given input.
const GENERATOR_SEED: u64 = 7;

/// Priority-queue entry. The heap is a max-heap, so ordering is reversed:
/// lowest `f` pops first, ties broken by insertion order.
struct QueueEntry {
    f: f64,
    seq: u64,
    id: VertexId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Anytime sampling-based planner producing [`DubinsPlan`]s toward full
/// ribbon coverage.
///
/// A single instance is reused across planning iterations; all per-call
/// state is reset at the top of [`plan`](AStarPlanner::plan).
#[derive(Default)]
pub struct AStarPlanner {
    graph: SearchGraph,
    queue: BinaryHeap<QueueEntry>,
    samples: Vec<SampleState>,
    best: Option<VertexId>,
    expanded_count: usize,
    iteration_count: usize,
    seq: u64,
    config: PlannerConfig,
}

impl AStarPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `f` value of the best vertex found by the most recent call to
    /// [`plan`](AStarPlanner::plan), if any. Diagnostic only.
    pub fn best_f(&self) -> Option<f64> {
        self.best.map(|b| self.graph.f(b))
    }

    /// Plan toward full coverage of `ribbons` from `start`, spending at
    /// most `time_remaining` seconds of the configured clock. An empty
    /// plan is a valid "found nothing" result; errors are reserved for
    /// violated preconditions.
    pub fn plan(
        &mut self,
        ribbons: RibbonManager,
        start: State,
        config: PlannerConfig,
        previous_plan: DubinsPlan,
        time_remaining: f64,
    ) -> Result<DubinsPlan> {
        if time_remaining <= 0.0 {
            return Err(PlanError::Precondition(format!(
                "non-positive planning budget: {time_remaining}"
            )));
        }

        self.config = config;
        let end_time = self.config.now() + time_remaining;
        self.config.start_state_time = start.time;

        let mut ribbons = ribbons;
        ribbons.change_heuristic_if_too_many_ribbons();

        self.graph.clear();
        self.queue.clear();
        self.samples.clear();
        self.best = None;
        self.expanded_count = 0;
        self.iteration_count = 0;
        self.seq = 0;

        let magnitude = self.config.max_speed * DubinsPlan::TIME_HORIZON;
        let mut generator = StateGenerator::new(
            &start,
            magnitude,
            self.config.max_speed,
            self.config.max_speed,
            GENERATOR_SEED,
            &ribbons,
        );

        let start_v = self.graph.make_root(start, ribbons.clone(), &self.config);

        let circle_radius = self.config.coverage_turning_radius * 2.0 + 1.0;
        let ribbon_samples = ribbons.find_states_on_ribbons_on_circle(&start, circle_radius);
        let other_ribbon_samples =
            ribbons.find_near_states_on_ribbons(&start, self.config.coverage_turning_radius);

        // Collision-check the previous plan by re-connecting it edge by
        // edge; a feasible chain becomes a hot start for this iteration.
        let mut last_plan_end = start_v;
        for edge in previous_plan.edges() {
            let next = self.graph.connect(
                last_plan_end,
                &edge.end_state(),
                edge.path().radius(),
                edge.coverage_allowed(),
                &self.config,
            );
            match next {
                Some(v) if self.graph.compute_true_cost(v, &self.config) => last_plan_end = v,
                _ => {
                    last_plan_end = start_v;
                    break;
                }
            }
        }

        while self.config.now() < end_time {
            self.queue.clear();
            if let Some(best) = self.best {
                if self.graph.f(best) <= self.graph.f(start_v) {
                    info!("found best possible plan, assuming heuristic admissibility");
                    break;
                }
            }

            let start_vertex = self.graph.vertex(start_v);
            self.config
                .visualize_vertex(&start_vertex.state, start_vertex.f(), start_vertex.g, start_vertex.h, "start");

            self.push(start_v);
            if last_plan_end != start_v {
                self.push(last_plan_end);
            }

            // Expand the root toward states on nearby ribbons: far enough
            // away to be reachable without looping, plus anything already
            // within one coverage turn.
            self.expand_to_cover_specific_samples(start_v, &ribbon_samples);
            self.expand_to_cover_specific_samples(start_v, &other_ribbon_samples);

            for _ in 0..INITIAL_SAMPLES {
                self.samples.push(generator.generate());
            }

            let found = self.a_star(end_time);
            if let Some(v) = found {
                let improved = self
                    .best
                    .is_none_or(|b| self.graph.f(v) < self.graph.f(b));
                if improved {
                    let vertex = self.graph.vertex(v);
                    self.config
                        .visualize_vertex(&vertex.state, vertex.f(), vertex.g, vertex.h, "goal");
                    self.best = Some(v);
                }
            }
            self.iteration_count += 1;
        }

        debug!(
            samples = self.samples.len(),
            expanded = self.expanded_count,
            iterations = self.iteration_count,
            "planning cycle finished"
        );

        match self.best {
            None => {
                warn!("failed to find a plan");
                Ok(DubinsPlan::new())
            }
            Some(best) => Ok(self.graph.trace_plan(best)),
        }
    }

    /// Inner best-first search until the deadline or queue exhaustion.
    fn a_star(&mut self, end_time: f64) -> Option<VertexId> {
        let mut vertex = self.pop()?;
        while self.config.now() < end_time {
            let done = self.graph.vertex(vertex).ribbons.done();
            if done {
                let beats_best = self
                    .best
                    .is_none_or(|b| self.graph.f(vertex) < self.graph.f(b));
                if beats_best {
                    return Some(vertex);
                }
            }
            self.expand(vertex);
            vertex = self.pop()?;
        }
        None
    }

    /// Expand `vertex` toward the `branching_factor` nearest untried pool
    /// samples under the Dubins reach metric.
    fn expand(&mut self, vertex: VertexId) {
        let state = self.graph.vertex(vertex).state;
        let turning_radius = self.config.turning_radius;

        let mut scored: Vec<(f64, usize)> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.graph.vertex(vertex).tried_samples.contains(i))
            .filter_map(|(i, sample)| {
                DubinsPath::shortest_length(&state, &sample.state, turning_radius)
                    .map(|len| (len, i))
            })
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        for &(_, i) in scored.iter().take(self.config.branching_factor) {
            self.graph.vertex_mut(vertex).tried_samples.insert(i);
            let sample = self.samples[i];
            let (radius, coverage) = if sample.on_ribbon {
                (self.config.coverage_turning_radius, true)
            } else {
                (self.config.turning_radius, false)
            };
            if let Some(child) =
                self.graph
                    .connect(vertex, &sample.state, radius, coverage, &self.config)
            {
                if self.graph.compute_true_cost(child, &self.config) {
                    self.push(child);
                }
            }
        }
        self.expanded_count += 1;
    }

    /// Connect the root directly to ribbon-derived sample states with the
    /// coverage turning radius.
    fn expand_to_cover_specific_samples(&mut self, root: VertexId, samples: &[State]) {
        if self.config.coverage_turning_radius <= 0.0 {
            return;
        }
        for s in samples {
            let mut s = *s;
            s.speed = self.config.max_speed;
            if let Some(child) =
                self.graph
                    .connect(root, &s, self.config.coverage_turning_radius, true, &self.config)
            {
                if self.graph.compute_true_cost(child, &self.config) {
                    self.push(child);
                }
            }
        }
    }

    fn push(&mut self, id: VertexId) {
        let f = self.graph.f(id);
        if !f.is_finite() {
            return;
        }
        if let Some(best) = self.best {
            if f >= self.graph.f(best) {
                return;
            }
        }
        self.queue.push(QueueEntry {
            f,
            seq: self.seq,
            id,
        });
        self.seq += 1;
    }

    /// Pop the best queue entry, lazily discarding entries that can no
    /// longer beat the incumbent.
    fn pop(&mut self) -> Option<VertexId> {
        while let Some(entry) = self.queue.pop() {
            if let Some(best) = self.best {
                if entry.f >= self.graph.f(best) {
                    continue;
                }
            }
            return Some(entry.id);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ribbon::{set_ribbon_width, Heuristic};
    use std::f64::consts::FRAC_PI_2;
    use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
    use std::sync::Arc;

    /// Deterministic clock advancing a fixed amount per query, so the
    /// planner's deadline polling terminates without wall time.
    fn step_clock(step_us: u64) -> super::super::config::NowFn {
        let ticks = Arc::new(AtomicU64::new(0));
        Arc::new(move || {
            let t = ticks.fetch_add(1, AtomicOrdering::Relaxed);
            (t * step_us) as f64 * 1e-6
        })
    }

    fn test_config() -> PlannerConfig {
        PlannerConfig {
            now_fn: step_clock(200),
            ..PlannerConfig::default()
        }
    }

    fn single_ribbon() -> RibbonManager {
        set_ribbon_width(2.0);
        let mut m = RibbonManager::new(Heuristic::MaxDistance, 8.0, 2);
        m.add(0.0, 0.0, 0.0, 10.0);
        m
    }

    #[test]
    fn test_rejects_non_positive_budget() {
        let mut planner = AStarPlanner::new();
        let start = State::new(0.0, 0.0, 0.0, 2.5, 0.0);
        let result = planner.plan(
            single_ribbon(),
            start,
            test_config(),
            DubinsPlan::new(),
            0.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_finds_plan_for_single_ribbon() {
        let mut planner = AStarPlanner::new();
        // Start below the ribbon, already pointed along it.
        let start = State::new(0.0, -5.0, FRAC_PI_2, 2.5, 0.0);
        let plan = planner
            .plan(single_ribbon(), start, test_config(), DubinsPlan::new(), 2.0)
            .unwrap();
        assert!(!plan.empty());
        // The plan starts at the start state's time.
        assert_eq!(plan.start_time().unwrap(), 0.0);
        // Driving the plan must cover the whole ribbon.
        let mut check = single_ribbon();
        let samples = plan.half_second_samples();
        for pair in samples.windows(2) {
            check.cover_between(pair[0].x, pair[0].y, pair[1].x, pair[1].y);
        }
        let end = plan.state_at_time(plan.end_time().unwrap()).unwrap();
        let last = samples.last().unwrap();
        check.cover_between(last.x, last.y, end.x, end.y);
        assert!(check.done(), "plan does not cover the ribbon");
    }

    #[test]
    fn test_plan_stays_inside_dubins_envelope() {
        let mut planner = AStarPlanner::new();
        let start = State::new(0.0, -5.0, FRAC_PI_2, 2.5, 0.0);
        let config = test_config();
        let max_speed = config.max_speed;
        let plan = planner
            .plan(single_ribbon(), start, config, DubinsPlan::new(), 2.0)
            .unwrap();
        for s in plan.half_second_samples() {
            let reach = max_speed * (s.time - start.time) + 1e-6;
            assert!(
                start.distance_to(s.x, s.y) <= reach,
                "state at t={} escapes the reachable envelope",
                s.time
            );
        }
    }

    #[test]
    fn test_anytime_quality_is_monotone_in_budget() {
        let start = State::new(0.0, -5.0, FRAC_PI_2, 2.5, 0.0);
        let mut costs = Vec::new();
        for budget in [0.5, 1.0, 2.0] {
            let mut planner = AStarPlanner::new();
            planner
                .plan(single_ribbon(), start, test_config(), DubinsPlan::new(), budget)
                .unwrap();
            // Same pool seed, so a longer budget can only match or improve.
            costs.push(planner.best_f().unwrap_or(f64::INFINITY));
        }
        assert!(costs[1] <= costs[0] + 1e-9);
        assert!(costs[2] <= costs[1] + 1e-9);
    }

    #[test]
    fn test_feasible_previous_plan_is_not_discarded() {
        let start = State::new(0.0, -5.0, FRAC_PI_2, 2.5, 0.0);
        let mut first_planner = AStarPlanner::new();
        let first = first_planner
            .plan(single_ribbon(), start, test_config(), DubinsPlan::new(), 2.0)
            .unwrap();
        assert!(!first.empty());
        let first_cost = first_planner.best_f().unwrap();

        // Re-plan from the same state with the old plan offered back: the
        // reconnected chain is a hot start, so quality cannot regress.
        let mut second_planner = AStarPlanner::new();
        let second = second_planner
            .plan(single_ribbon(), start, test_config(), first, 2.0)
            .unwrap();
        assert!(!second.empty());
        assert!(second_planner.best_f().unwrap() <= first_cost + 1e-6);
    }

    #[test]
    fn test_done_ribbons_yield_trivial_plan() {
        set_ribbon_width(2.0);
        let ribbons = RibbonManager::default();
        let mut planner = AStarPlanner::new();
        let start = State::new(0.0, 0.0, 0.0, 2.5, 0.0);
        let plan = planner
            .plan(ribbons, start, test_config(), DubinsPlan::new(), 0.5)
            .unwrap();
        // Root is already a goal with f = 0; nothing to drive.
        assert!(plan.empty());
    }
}
