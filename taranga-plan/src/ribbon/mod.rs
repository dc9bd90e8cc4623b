//! Ribbon coverage bookkeeping.
//!
//! A ribbon is an oriented survey line with a process-wide lateral width.
//! The manager stores only the uncovered remainders: covering a middle
//! stretch of a ribbon splits it into two shorter ribbons, and a ribbon
//! disappears entirely once its whole parameter range has been driven over.

mod heuristic;

pub use heuristic::Heuristic;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::geometry::State;

/// Remainders shorter than this are considered covered.
pub const MIN_RIBBON_LENGTH: f64 = 0.01;

/// Uncovered-ribbon count above which the all-ribbons TSP heuristics are
/// no longer computable in bounded time.
const RIBBON_TSP_LIMIT: usize = 8;

// Ribbon width is process-wide configuration, shared by every manager copy
// and every planner snapshot (bit-cast storage, same trick as an AtomicF32
// pose component).
static RIBBON_WIDTH: AtomicU64 = AtomicU64::new(0x4000_0000_0000_0000); // 2.0

/// Set the process-wide ribbon width in meters.
pub fn set_ribbon_width(width: f64) {
    RIBBON_WIDTH.store(width.to_bits(), Ordering::Release);
}

/// Current process-wide ribbon width in meters.
pub fn ribbon_width() -> f64 {
    f64::from_bits(RIBBON_WIDTH.load(Ordering::Acquire))
}

/// An uncovered oriented line segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ribbon {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Ribbon {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }

    /// Orientation of the segment, radians CCW from +x.
    #[inline]
    pub fn heading(&self) -> f64 {
        (self.y2 - self.y1).atan2(self.x2 - self.x1)
    }

    /// Point at parameter `t ∈ [0, length]` along the segment.
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        let len = self.length();
        if len <= 0.0 {
            return (self.x1, self.y1);
        }
        let f = t / len;
        (
            self.x1 + (self.x2 - self.x1) * f,
            self.y1 + (self.y2 - self.y1) * f,
        )
    }

    /// Project `(x, y)` onto the segment's supporting line. Returns the
    /// parameter along the segment (possibly outside `[0, length]`) and
    /// the perpendicular distance to the line.
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        let len = self.length();
        if len <= 0.0 {
            let d = ((x - self.x1).powi(2) + (y - self.y1).powi(2)).sqrt();
            return (0.0, d);
        }
        let ux = (self.x2 - self.x1) / len;
        let uy = (self.y2 - self.y1) / len;
        let dx = x - self.x1;
        let dy = y - self.y1;
        let t = dx * ux + dy * uy;
        let perp = (dx * uy - dy * ux).abs();
        (t, perp)
    }

    /// Nearest point on the segment (projection clamped to the endpoints).
    pub fn nearest_point(&self, x: f64, y: f64) -> (f64, f64) {
        let (t, _) = self.project(x, y);
        self.point_at(t.clamp(0.0, self.length()))
    }

    /// Sub-ribbon between parameters `lo` and `hi`.
    fn sub(&self, lo: f64, hi: f64) -> Ribbon {
        let (x1, y1) = self.point_at(lo);
        let (x2, y2) = self.point_at(hi);
        Ribbon::new(x1, y1, x2, y2)
    }

    /// Sample states at parameter `t`, one per travel direction.
    fn states_at(&self, t: f64) -> [State; 2] {
        let (x, y) = self.point_at(t);
        let h = self.heading();
        [
            State::new(x, y, h, 0.0, 0.0),
            State::new(x, y, h + std::f64::consts::PI, 0.0, 0.0),
        ]
    }

    fn endpoints_equal(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> bool {
        const EPS: f64 = 1e-6;
        let same = |ax: f64, ay: f64, bx: f64, by: f64| {
            (ax - bx).abs() < EPS && (ay - by).abs() < EPS
        };
        (same(self.x1, self.y1, x1, y1) && same(self.x2, self.y2, x2, y2))
            || (same(self.x1, self.y1, x2, y2) && same(self.x2, self.y2, x1, y1))
    }
}

/// Ordered collection of uncovered ribbons plus the cost-to-go heuristic
/// used by the planner.
///
/// Cloning is cheap and is how the executive hands the planner a coverage
/// snapshot; the planner's search graph shares snapshots between vertices
/// and clones only when an edge actually covers something.
#[derive(Clone, Debug)]
pub struct RibbonManager {
    ribbons: Vec<Ribbon>,
    heuristic: Heuristic,
    turning_radius: f64,
    k: usize,
}

impl Default for RibbonManager {
    fn default() -> Self {
        Self::new(Heuristic::MaxDistance, 8.0, 2)
    }
}

impl RibbonManager {
    pub fn new(heuristic: Heuristic, turning_radius: f64, k: usize) -> Self {
        Self {
            ribbons: Vec::new(),
            heuristic,
            turning_radius,
            k: k.max(1),
        }
    }

    /// Insert a ribbon. No-op when a ribbon with equivalent endpoints (in
    /// either orientation) is already present, or when the segment is
    /// degenerate.
    pub fn add(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        if self
            .ribbons
            .iter()
            .any(|r| r.endpoints_equal(x1, y1, x2, y2))
        {
            return;
        }
        let r = Ribbon::new(x1, y1, x2, y2);
        if r.length() < MIN_RIBBON_LENGTH {
            return;
        }
        self.ribbons.push(r);
    }

    /// Cover a width-`W` interval around the projection of `(x, y)` on
    /// every ribbon the point is laterally within `W/2` of. Covering a
    /// middle interval splits the ribbon into two remainders.
    pub fn cover(&mut self, x: f64, y: f64) {
        let half = ribbon_width() / 2.0;
        let mut kept = Vec::with_capacity(self.ribbons.len() + 1);
        for r in self.ribbons.drain(..) {
            let len = r.length();
            let (t, perp) = r.project(x, y);
            if perp > half || t < -half || t > len + half {
                kept.push(r);
                continue;
            }
            let lo = (t - half).max(0.0);
            let hi = (t + half).min(len);
            if hi <= lo {
                kept.push(r);
                continue;
            }
            if lo > MIN_RIBBON_LENGTH {
                kept.push(r.sub(0.0, lo));
            }
            if len - hi > MIN_RIBBON_LENGTH {
                kept.push(r.sub(hi, len));
            }
        }
        self.ribbons = kept;
    }

    /// Cover the corridor swept when moving from `(x1, y1)` to `(x2, y2)`,
    /// by covering along a dense sampling of the segment. Monotone: never
    /// reduces covered area.
    pub fn cover_between(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let dist = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        let step = (ribbon_width() / 4.0).max(MIN_RIBBON_LENGTH);
        let n = (dist / step).ceil() as usize;
        for i in 0..=n {
            let f = if n == 0 { 0.0 } else { i as f64 / n as f64 };
            self.cover(x1 + (x2 - x1) * f, y1 + (y2 - y1) * f);
        }
    }

    /// True when every ribbon is fully covered.
    #[inline]
    pub fn done(&self) -> bool {
        self.ribbons.is_empty()
    }

    #[inline]
    pub fn ribbons(&self) -> &[Ribbon] {
        &self.ribbons
    }

    pub fn total_uncovered_length(&self) -> f64 {
        self.ribbons.iter().map(Ribbon::length).sum()
    }

    pub fn set_heuristic(&mut self, heuristic: Heuristic) {
        self.heuristic = heuristic;
    }

    #[inline]
    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }

    /// Fall back to a cheap heuristic for this instance when the selected
    /// one is superlinear in the ribbon count and too many ribbons remain.
    pub fn change_heuristic_if_too_many_ribbons(&mut self) {
        if self.ribbons.len() > RIBBON_TSP_LIMIT
            && matches!(
                self.heuristic,
                Heuristic::TspPointRobotNoSplitAllRibbons | Heuristic::TspDubinsNoSplitAllRibbons
            )
        {
            tracing::debug!(
                ribbons = self.ribbons.len(),
                "too many ribbons for an all-ribbons TSP heuristic, using max-distance"
            );
            self.heuristic = Heuristic::MaxDistance;
        }
    }

    /// Sample states on uncovered ribbons at distance `radius` from `s`
    /// (circle/segment intersections), heading set to the ribbon
    /// orientation in both travel directions.
    pub fn find_states_on_ribbons_on_circle(&self, s: &State, radius: f64) -> Vec<State> {
        let mut states = Vec::new();
        for r in &self.ribbons {
            let len = r.length();
            if len <= 0.0 {
                continue;
            }
            let ux = (r.x2 - r.x1) / len;
            let uy = (r.y2 - r.y1) / len;
            let dx = r.x1 - s.x;
            let dy = r.y1 - s.y;
            // |p1 + t·u - s|² = radius²  →  t² + 2bt + c = 0
            let b = dx * ux + dy * uy;
            let c = dx * dx + dy * dy - radius * radius;
            let disc = b * b - c;
            if disc < 0.0 {
                continue;
            }
            let sq = disc.sqrt();
            for t in [-b - sq, -b + sq] {
                if (0.0..=len).contains(&t) {
                    states.extend(r.states_at(t));
                }
            }
        }
        states
    }

    /// Sample states on uncovered ribbons within `radius` of `s` (nearest
    /// point per ribbon), both travel directions.
    pub fn find_near_states_on_ribbons(&self, s: &State, radius: f64) -> Vec<State> {
        let mut states = Vec::new();
        for r in &self.ribbons {
            let (nx, ny) = r.nearest_point(s.x, s.y);
            if s.distance_to(nx, ny) <= radius {
                let (t, _) = r.project(nx, ny);
                states.extend(r.states_at(t.clamp(0.0, r.length())));
            }
        }
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn manager_with(ribbons: &[(f64, f64, f64, f64)]) -> RibbonManager {
        set_ribbon_width(2.0);
        let mut m = RibbonManager::default();
        for &(x1, y1, x2, y2) in ribbons {
            m.add(x1, y1, x2, y2);
        }
        m
    }

    #[test]
    fn test_add_deduplicates_either_orientation() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.add(0.0, 0.0, 0.0, 10.0);
        m.add(0.0, 10.0, 0.0, 0.0);
        assert_eq!(m.ribbons().len(), 1);
    }

    #[test]
    fn test_cover_middle_splits() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.cover(0.5, 5.0); // within W/2 laterally
        assert_eq!(m.ribbons().len(), 2);
        assert_relative_eq!(m.total_uncovered_length(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cover_far_point_is_noop() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.cover(5.0, 5.0);
        assert_eq!(m.ribbons().len(), 1);
        assert_relative_eq!(m.total_uncovered_length(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cover_end_trims() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.cover(0.0, 0.0);
        assert_eq!(m.ribbons().len(), 1);
        assert_relative_eq!(m.total_uncovered_length(), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cover_between_finishes_ribbon() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.cover_between(0.0, -1.0, 0.0, 11.0);
        assert!(m.done());
        assert_relative_eq!(m.total_uncovered_length(), 0.0);
    }

    #[test]
    fn test_cover_between_is_monotone() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.cover_between(0.0, 0.0, 0.0, 4.0);
        let after_first = m.total_uncovered_length();
        m.cover_between(0.0, 0.0, 0.0, 4.0);
        assert_relative_eq!(m.total_uncovered_length(), after_first, epsilon = 1e-9);
        m.cover_between(0.0, 4.0, 0.0, 10.0);
        assert!(m.total_uncovered_length() <= after_first);
        assert!(m.done());
    }

    #[test]
    fn test_done_implies_zero_to_go() {
        let mut m = manager_with(&[(0.0, 0.0, 0.0, 10.0)]);
        m.cover_between(0.0, -1.0, 0.0, 11.0);
        assert!(m.done());
        let s = State::new(50.0, 50.0, 0.0, 2.5, 0.0);
        assert_relative_eq!(m.approx_to_go(&s), 0.0);
    }

    #[test]
    fn test_circle_states_sit_on_circle_and_ribbon() {
        let m = manager_with(&[(0.0, -20.0, 0.0, 20.0)]);
        let s = State::new(10.0, 0.0, 0.0, 2.5, 0.0);
        let states = m.find_states_on_ribbons_on_circle(&s, 12.0);
        // Circle of radius 12 around (10, 0) crosses x = 0 twice, two
        // travel directions each.
        assert_eq!(states.len(), 4);
        for st in &states {
            assert_relative_eq!(st.distance_to(s.x, s.y), 12.0, epsilon = 1e-9);
            assert_relative_eq!(st.x, 0.0, epsilon = 1e-9);
            let along = (st.heading - FRAC_PI_2).abs() < 1e-9
                || (st.heading - 3.0 * FRAC_PI_2).abs() < 1e-9;
            assert!(along, "heading {} not aligned with ribbon", st.heading);
        }
    }

    #[test]
    fn test_near_states_within_radius_only() {
        let m = manager_with(&[(0.0, 0.0, 0.0, 10.0), (100.0, 0.0, 100.0, 10.0)]);
        let s = State::new(3.0, 5.0, 0.0, 2.5, 0.0);
        let states = m.find_near_states_on_ribbons(&s, 5.0);
        assert_eq!(states.len(), 2);
        assert_relative_eq!(states[0].x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(states[0].y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heuristic_fallback_on_many_ribbons() {
        set_ribbon_width(2.0);
        let mut m = RibbonManager::new(Heuristic::TspPointRobotNoSplitAllRibbons, 8.0, 2);
        for i in 0..10 {
            let y = i as f64 * 10.0;
            m.add(0.0, y, 20.0, y);
        }
        m.change_heuristic_if_too_many_ribbons();
        assert_eq!(m.heuristic(), Heuristic::MaxDistance);
    }
}
