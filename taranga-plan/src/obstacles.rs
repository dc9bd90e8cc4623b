//! Dynamic obstacle tracking.
//!
//! Each reported contact (keyed by its opaque `mmsi`) carries a short
//! predicted trajectory as a time-ordered list of Gaussian position
//! distributions. Collision cost at a query point interpolates between the
//! two surrounding time slices; outside the sampled range the nearest slice
//! is used unchanged.

use std::collections::HashMap;

/// One Gaussian position estimate at a fixed time.
#[derive(Clone, Copy, Debug)]
pub struct Distribution {
    pub mean: [f64; 2],
    pub covariance: [[f64; 2]; 2],
    pub heading: f64,
    pub time: f64,
}

impl Distribution {
    pub fn new(mean: [f64; 2], covariance: [[f64; 2]; 2], heading: f64, time: f64) -> Self {
        Self {
            mean,
            covariance,
            heading,
            time,
        }
    }

    /// Bivariate normal density at `(x, y)`. Degenerate covariance yields
    /// zero rather than an infinite cost.
    pub fn density(&self, x: f64, y: f64) -> f64 {
        let [[a, b], [c, d]] = self.covariance;
        let det = a * d - b * c;
        if det <= 0.0 {
            return 0.0;
        }
        let dx = x - self.mean[0];
        let dy = y - self.mean[1];
        // Mahalanobis form with the 2x2 inverse written out.
        let quad = (d * dx * dx - (b + c) * dx * dy + a * dy * dy) / det;
        (-0.5 * quad).exp() / (std::f64::consts::TAU * det.sqrt())
    }

    fn interpolate(&self, other: &Distribution, time: f64) -> Distribution {
        let span = other.time - self.time;
        if span <= 0.0 {
            return *self;
        }
        let f = ((time - self.time) / span).clamp(0.0, 1.0);
        let lerp = |a: f64, b: f64| a + (b - a) * f;
        Distribution {
            mean: [
                lerp(self.mean[0], other.mean[0]),
                lerp(self.mean[1], other.mean[1]),
            ],
            covariance: [
                [
                    lerp(self.covariance[0][0], other.covariance[0][0]),
                    lerp(self.covariance[0][1], other.covariance[0][1]),
                ],
                [
                    lerp(self.covariance[1][0], other.covariance[1][0]),
                    lerp(self.covariance[1][1], other.covariance[1][1]),
                ],
            ],
            heading: self.heading,
            time,
        }
    }
}

/// Indexed Gaussian trajectories per obstacle id.
///
/// The planner receives a cloned snapshot per iteration, so `update` is
/// atomic from its point of view.
#[derive(Clone, Debug, Default)]
pub struct DynamicObstaclesManager {
    obstacles: HashMap<u32, Vec<Distribution>>,
}

impl DynamicObstaclesManager {
    /// Replace the predicted trajectory for `mmsi`. The list is kept
    /// sorted by time; an empty list removes the obstacle.
    pub fn update(&mut self, mmsi: u32, mut distributions: Vec<Distribution>) {
        if distributions.is_empty() {
            self.obstacles.remove(&mmsi);
            return;
        }
        distributions.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.obstacles.insert(mmsi, distributions);
    }

    pub fn forget(&mut self, mmsi: u32) {
        self.obstacles.remove(&mmsi);
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    /// Finite non-negative collision cost at `(x, y, t)`, proportional to
    /// the summed probability density of all tracked obstacles.
    pub fn collision_cost(&self, x: f64, y: f64, t: f64) -> f64 {
        let mut cost = 0.0;
        for dists in self.obstacles.values() {
            let d = match dists.iter().position(|d| d.time >= t) {
                // Before (or at) the first slice: nearest is the first.
                Some(0) => dists[0],
                Some(i) => dists[i - 1].interpolate(&dists[i], t),
                // Past the last slice: nearest is the last.
                None => dists[dists.len() - 1],
            };
            cost += d.density(x, y);
        }
        cost
    }
}
