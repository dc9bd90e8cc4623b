//! Anytime sampling-based trajectory planner.
//!
//! The planner grows a tree of Dubins-connected vertices over a pool of
//! random states, restarting an A* search with a denser pool while the
//! caller's deadline allows, and always returning the best coverage plan
//! found so far.

mod astar;
pub mod config;
mod graph;
mod samples;

pub use astar::{AStarPlanner, INITIAL_SAMPLES};
pub use config::{wall_clock, NowFn, PlannerConfig, Visualizer};
pub use graph::{DubinsEdge, SearchGraph, Vertex, VertexId};
pub use samples::{SampleState, StateGenerator};

/// Spacing of path samples when integrating an edge's true cost, meters.
pub(crate) const DUBINS_INCREMENT: f64 = 0.1;

/// Obstacle probability density above which a single path sample makes the
/// whole edge infeasible.
pub(crate) const COLLISION_FATAL_DENSITY: f64 = 0.08;

/// Weight turning integrated obstacle density into seconds of penalty.
pub(crate) const OBSTACLE_PENALTY: f64 = 30.0;

/// Fraction of the time spent driving over new ribbon that is paid back as
/// a reward, keeping edge costs non-negative.
pub(crate) const COVERAGE_REWARD_FRACTION: f64 = 0.25;
