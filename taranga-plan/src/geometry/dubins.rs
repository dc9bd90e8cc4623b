//! Dubins-car paths between oriented states.
//!
//! A Dubins path is the shortest path for a vehicle that only moves forward
//! with a minimum turning radius. Every shortest path is one of six words,
//! each at most three segments of arc (L/R) or straight line (S).

use super::{mod_2pi, State};

/// Segment of a Dubins path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Left,
    Straight,
    Right,
}

/// Dubins path family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Word {
    Lsl,
    Rsr,
    Lsr,
    Rsl,
    Rlr,
    Lrl,
}

impl Word {
    fn segments(self) -> [SegmentKind; 3] {
        use SegmentKind::*;
        match self {
            Word::Lsl => [Left, Straight, Left],
            Word::Rsr => [Right, Straight, Right],
            Word::Lsr => [Left, Straight, Right],
            Word::Rsl => [Right, Straight, Left],
            Word::Rlr => [Right, Left, Right],
            Word::Lrl => [Left, Right, Left],
        }
    }
}

/// A concrete Dubins path from a start pose.
#[derive(Clone, Debug)]
pub struct DubinsPath {
    start: (f64, f64, f64),
    radius: f64,
    word: Word,
    /// Segment lengths in world units (arcs already scaled by the radius).
    lengths: [f64; 3],
    total: f64,
}

impl DubinsPath {
    /// Shortest Dubins path from `from` to `to` with turning radius
    /// `radius`. Returns `None` for a non-positive radius or when no word
    /// is numerically valid (degenerate inputs).
    pub fn shortest(from: &State, to: &State, radius: f64) -> Option<DubinsPath> {
        if radius <= 0.0 {
            return None;
        }

        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let d = (dx * dx + dy * dy).sqrt() / radius;
        let phi = dy.atan2(dx);
        let alpha = mod_2pi(from.heading - phi);
        let beta = mod_2pi(to.heading - phi);

        let mut best: Option<(Word, [f64; 3], f64)> = None;
        for (word, tpq) in [
            (Word::Lsl, lsl(d, alpha, beta)),
            (Word::Rsr, rsr(d, alpha, beta)),
            (Word::Lsr, lsr(d, alpha, beta)),
            (Word::Rsl, rsl(d, alpha, beta)),
            (Word::Rlr, rlr(d, alpha, beta)),
            (Word::Lrl, lrl(d, alpha, beta)),
        ] {
            if let Some([t, p, q]) = tpq {
                let total = t + p + q;
                if best.as_ref().is_none_or(|(_, _, b)| total < *b) {
                    best = Some((word, [t, p, q], total));
                }
            }
        }

        best.map(|(word, tpq, total)| DubinsPath {
            start: (from.x, from.y, from.heading),
            radius,
            word,
            lengths: [tpq[0] * radius, tpq[1] * radius, tpq[2] * radius],
            total: total * radius,
        })
    }

    /// Length of the shortest path, without keeping the path.
    pub fn shortest_length(from: &State, to: &State, radius: f64) -> Option<f64> {
        Self::shortest(from, to, radius).map(|p| p.total)
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.total
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn word(&self) -> Word {
        self.word
    }

    /// Pose `(x, y, heading)` at arc parameter `s ∈ [0, length]`.
    /// Out-of-range parameters are clamped.
    pub fn sample(&self, s: f64) -> (f64, f64, f64) {
        let mut remaining = s.clamp(0.0, self.total);
        let (mut x, mut y, mut heading) = self.start;
        let kinds = self.word.segments();

        for (kind, len) in kinds.iter().zip(self.lengths.iter()) {
            if remaining <= 0.0 {
                break;
            }
            let step = remaining.min(*len);
            (x, y, heading) = propagate(x, y, heading, *kind, step, self.radius);
            remaining -= step;
        }

        (x, y, heading)
    }

    /// Pose at the end of the path.
    pub fn end(&self) -> (f64, f64, f64) {
        self.sample(self.total)
    }
}

fn propagate(
    x: f64,
    y: f64,
    heading: f64,
    kind: SegmentKind,
    step: f64,
    radius: f64,
) -> (f64, f64, f64) {
    match kind {
        SegmentKind::Straight => (
            x + heading.cos() * step,
            y + heading.sin() * step,
            heading,
        ),
        SegmentKind::Left => {
            let new_heading = mod_2pi(heading + step / radius);
            (
                x + radius * (new_heading.sin() - heading.sin()),
                y + radius * (heading.cos() - new_heading.cos()),
                new_heading,
            )
        }
        SegmentKind::Right => {
            let new_heading = mod_2pi(heading - step / radius);
            (
                x + radius * (heading.sin() - new_heading.sin()),
                y + radius * (new_heading.cos() - heading.cos()),
                new_heading,
            )
        }
    }
}

// Word solvers in normalized units (distance d = |goal - start| / radius,
// alpha/beta relative to the start→goal bearing). Each returns the segment
// parameters [t, p, q]; arc parameters are radians, p is the normalized
// straight length for CSC words.

fn lsl(d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();

    let tmp = 2.0 + d * d - 2.0 * (ca * cb + sa * sb - d * (sa - sb));
    if tmp < 0.0 {
        return None;
    }
    let p = tmp.sqrt();
    let theta = (cb - ca).atan2(d + sa - sb);
    Some([mod_2pi(-alpha + theta), p, mod_2pi(beta - theta)])
}

fn rsr(d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();

    let tmp = 2.0 + d * d - 2.0 * (ca * cb + sa * sb - d * (sb - sa));
    if tmp < 0.0 {
        return None;
    }
    let p = tmp.sqrt();
    let theta = (ca - cb).atan2(d - sa + sb);
    Some([mod_2pi(alpha - theta), p, mod_2pi(-beta + theta)])
}

fn lsr(d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();

    let tmp = -2.0 + d * d + 2.0 * (ca * cb + sa * sb + d * (sa + sb));
    if tmp < 0.0 {
        return None;
    }
    let p = tmp.sqrt();
    let theta = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
    Some([mod_2pi(-alpha + theta), p, mod_2pi(-beta + theta)])
}

fn rsl(d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();

    let tmp = -2.0 + d * d + 2.0 * (ca * cb + sa * sb - d * (sa + sb));
    if tmp < 0.0 {
        return None;
    }
    let p = tmp.sqrt();
    let theta = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
    Some([mod_2pi(alpha - theta), p, mod_2pi(beta - theta)])
}

fn rlr(d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();

    let tmp = (6.0 - d * d + 2.0 * (ca * cb + sa * sb + d * (sa - sb))) / 8.0;
    if tmp.abs() > 1.0 {
        return None;
    }
    let p = mod_2pi(std::f64::consts::TAU - tmp.acos());
    let theta = (ca - cb).atan2(d - sa + sb);
    let t = mod_2pi(alpha - theta + p / 2.0);
    Some([t, p, mod_2pi(alpha - beta - t + p)])
}

fn lrl(d: f64, alpha: f64, beta: f64) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();

    let tmp = (6.0 - d * d + 2.0 * (ca * cb + sa * sb - d * (sa - sb))) / 8.0;
    if tmp.abs() > 1.0 {
        return None;
    }
    let p = mod_2pi(std::f64::consts::TAU - tmp.acos());
    let theta = (cb - ca).atan2(d + sa - sb);
    let t = mod_2pi(-alpha + theta + p / 2.0);
    Some([t, p, mod_2pi(beta - alpha - t + p)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_straight_line() {
        let a = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let b = State::new(10.0, 0.0, 0.0, 1.0, 0.0);
        let path = DubinsPath::shortest(&a, &b, 2.0).unwrap();
        assert_relative_eq!(path.length(), 10.0, epsilon = 1e-9);

        let (x, y, h) = path.sample(5.0);
        assert_relative_eq!(x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(h, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_end_reaches_goal_pose() {
        let a = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let b = State::new(6.0, 6.0, FRAC_PI_2, 1.0, 0.0);
        let path = DubinsPath::shortest(&a, &b, 2.0).unwrap();
        let (x, y, h) = path.end();
        assert_relative_eq!(x, b.x, epsilon = 1e-6);
        assert_relative_eq!(y, b.y, epsilon = 1e-6);
        assert_relative_eq!(h, b.heading, epsilon = 1e-6);
    }

    #[test]
    fn test_length_bounded_below_by_euclidean() {
        let a = State::new(0.0, 0.0, 1.0, 1.0, 0.0);
        let b = State::new(-7.0, 3.0, 4.0, 1.0, 0.0);
        let path = DubinsPath::shortest(&a, &b, 3.0).unwrap();
        let euclid = a.distance_to(b.x, b.y);
        assert!(path.length() >= euclid - 1e-9);
    }

    #[test]
    fn test_u_turn_uses_arcs() {
        // Goal directly behind the start with opposite heading: the path
        // must be at least a half circle at the turning radius.
        let a = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let b = State::new(0.0, 4.0, std::f64::consts::PI, 1.0, 0.0);
        let path = DubinsPath::shortest(&a, &b, 2.0).unwrap();
        assert!(path.length() >= std::f64::consts::PI * 2.0 - 1e-9);
        let (x, y, h) = path.end();
        assert_relative_eq!(x, b.x, epsilon = 1e-6);
        assert_relative_eq!(y, b.y, epsilon = 1e-6);
        assert_relative_eq!(h, b.heading, epsilon = 1e-6);
    }

    #[test]
    fn test_sample_clamps_parameter() {
        let a = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let b = State::new(10.0, 0.0, 0.0, 1.0, 0.0);
        let path = DubinsPath::shortest(&a, &b, 2.0).unwrap();
        let (x0, ..) = path.sample(-5.0);
        let (x1, ..) = path.sample(path.length() + 5.0);
        assert_relative_eq!(x0, 0.0, epsilon = 1e-9);
        assert_relative_eq!(x1, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tight_goal_inside_turning_circle() {
        // Goal closer than the turning radius still yields a path (CCC or
        // a long way around), never a panic.
        let a = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let b = State::new(0.5, 0.5, FRAC_PI_2, 1.0, 0.0);
        let path = DubinsPath::shortest(&a, &b, 2.0).unwrap();
        assert!(path.length() > 0.0);
        let (x, y, _) = path.end();
        assert_relative_eq!(x, b.x, epsilon = 1e-6);
        assert_relative_eq!(y, b.y, epsilon = 1e-6);
    }
}
