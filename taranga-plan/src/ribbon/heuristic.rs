//! Cost-to-go heuristics over the remaining ribbons.
//!
//! All heuristics return meters of remaining travel and never overestimate
//! the true remaining distance, so the planner may treat cost-to-go divided
//! by the speed cap as an admissible time bound.

use crate::geometry::dubins::DubinsPath;
use crate::geometry::State;

use super::{Ribbon, RibbonManager};

/// Selectable cost-to-go heuristic (configuration ids 0..4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heuristic {
    /// Max over ribbons of distance-to-nearest-endpoint plus length.
    MaxDistance,
    /// Exact TSP over all ribbon endpoints, point-robot travel.
    TspPointRobotNoSplitAllRibbons,
    /// TSP restricted to the K nearest ribbons, point-robot travel.
    TspPointRobotNoSplitKRibbons,
    /// Exact TSP over all ribbons, Dubins lower-bound travel.
    TspDubinsNoSplitAllRibbons,
    /// TSP over the K nearest ribbons, Dubins lower-bound travel.
    TspDubinsNoSplitKRibbons,
}

impl Heuristic {
    pub fn from_id(id: u32) -> Option<Heuristic> {
        match id {
            0 => Some(Heuristic::MaxDistance),
            1 => Some(Heuristic::TspPointRobotNoSplitAllRibbons),
            2 => Some(Heuristic::TspPointRobotNoSplitKRibbons),
            3 => Some(Heuristic::TspDubinsNoSplitAllRibbons),
            4 => Some(Heuristic::TspDubinsNoSplitKRibbons),
            _ => None,
        }
    }
}

impl RibbonManager {
    /// Lower bound on the remaining travel distance (meters) from `s`
    /// until every ribbon is covered. Zero when done.
    pub fn approx_to_go(&self, s: &State) -> f64 {
        if self.done() {
            return 0.0;
        }
        match self.heuristic {
            Heuristic::MaxDistance => max_distance(self.ribbons(), s),
            Heuristic::TspPointRobotNoSplitAllRibbons => tsp_point_robot(self.ribbons(), s),
            Heuristic::TspPointRobotNoSplitKRibbons => {
                tsp_point_robot(&nearest_k(self.ribbons(), s, self.k), s)
            }
            Heuristic::TspDubinsNoSplitAllRibbons => {
                tsp_dubins(self.ribbons(), s, self.turning_radius)
            }
            Heuristic::TspDubinsNoSplitKRibbons => tsp_dubins(
                &nearest_k(self.ribbons(), s, self.k),
                s,
                self.turning_radius,
            ),
        }
    }
}

fn endpoint_distance(r: &Ribbon, x: f64, y: f64) -> f64 {
    let d1 = ((r.x1 - x).powi(2) + (r.y1 - y).powi(2)).sqrt();
    let d2 = ((r.x2 - x).powi(2) + (r.y2 - y).powi(2)).sqrt();
    d1.min(d2)
}

fn max_distance(ribbons: &[Ribbon], s: &State) -> f64 {
    ribbons
        .iter()
        .map(|r| endpoint_distance(r, s.x, s.y) + r.length())
        .fold(0.0, f64::max)
}

fn nearest_k(ribbons: &[Ribbon], s: &State, k: usize) -> Vec<Ribbon> {
    let mut sorted: Vec<Ribbon> = ribbons.to_vec();
    sorted.sort_by(|a, b| {
        endpoint_distance(a, s.x, s.y)
            .partial_cmp(&endpoint_distance(b, s.x, s.y))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(k);
    sorted
}

/// Entry/exit endpoint pairs for traversing a ribbon without splitting it.
fn traversals(r: &Ribbon) -> [((f64, f64), (f64, f64)); 2] {
    [
        ((r.x1, r.y1), (r.x2, r.y2)),
        ((r.x2, r.y2), (r.x1, r.y1)),
    ]
}

fn tsp_point_robot(ribbons: &[Ribbon], s: &State) -> f64 {
    let mut visited = vec![false; ribbons.len()];
    let mut best = f64::INFINITY;
    tsp_point_recurse(ribbons, &mut visited, (s.x, s.y), 0.0, &mut best);
    if best.is_finite() { best } else { 0.0 }
}

fn tsp_point_recurse(
    ribbons: &[Ribbon],
    visited: &mut [bool],
    from: (f64, f64),
    acc: f64,
    best: &mut f64,
) {
    if acc >= *best {
        return;
    }
    if visited.iter().all(|&v| v) {
        *best = acc;
        return;
    }
    for i in 0..ribbons.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        for (entry, exit) in traversals(&ribbons[i]) {
            let leg = ((entry.0 - from.0).powi(2) + (entry.1 - from.1).powi(2)).sqrt();
            tsp_point_recurse(
                ribbons,
                visited,
                exit,
                acc + leg + ribbons[i].length(),
                best,
            );
        }
        visited[i] = false;
    }
}

fn tsp_dubins(ribbons: &[Ribbon], s: &State, turning_radius: f64) -> f64 {
    let mut visited = vec![false; ribbons.len()];
    let mut best = f64::INFINITY;
    tsp_dubins_recurse(ribbons, &mut visited, *s, 0.0, turning_radius, &mut best);
    if best.is_finite() { best } else { 0.0 }
}

fn tsp_dubins_recurse(
    ribbons: &[Ribbon],
    visited: &mut [bool],
    from: State,
    acc: f64,
    turning_radius: f64,
    best: &mut f64,
) {
    if acc >= *best {
        return;
    }
    if visited.iter().all(|&v| v) {
        *best = acc;
        return;
    }
    for i in 0..ribbons.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let r = &ribbons[i];
        let heading = r.heading();
        for ((entry, exit), h) in traversals(r)
            .into_iter()
            .zip([heading, heading + std::f64::consts::PI])
        {
            let entry_state = State::new(entry.0, entry.1, h, from.speed, 0.0);
            let leg = DubinsPath::shortest_length(&from, &entry_state, turning_radius)
                .unwrap_or_else(|| from.distance_to(entry.0, entry.1));
            let exit_state = State::new(exit.0, exit.1, h, from.speed, 0.0);
            tsp_dubins_recurse(
                ribbons,
                visited,
                exit_state,
                acc + leg + r.length(),
                turning_radius,
                best,
            );
        }
        visited[i] = false;
    }
}
