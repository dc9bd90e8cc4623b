//! # Taranga-Plan: Ribbon-Coverage Trajectory Planning
//!
//! Planning library for autonomous surface vehicles that must drive over a
//! set of linear "ribbons" (survey lines with a fixed lateral width) while
//! avoiding static map obstacles and dynamic contacts.
//!
//! ## Architecture
//!
//! The library is organized into modules:
//!
//! - [`geometry`]: Vehicle state, angle arithmetic, and Dubins-car paths
//! - [`ribbon`]: Uncovered-ribbon bookkeeping and cost-to-go heuristics
//! - [`obstacles`]: Gaussian dynamic-obstacle trajectories and collision cost
//! - [`map`]: Static blocked/free map sources
//! - [`planner`]: The anytime sampling-based trajectory planner
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taranga_plan::geometry::State;
//! use taranga_plan::planner::{AStarPlanner, PlannerConfig};
//! use taranga_plan::ribbon::RibbonManager;
//! use taranga_plan::plan::DubinsPlan;
//!
//! let mut ribbons = RibbonManager::default();
//! ribbons.add(0.0, 0.0, 0.0, 20.0);
//!
//! let start = State::new(0.0, -10.0, std::f64::consts::FRAC_PI_2, 2.5, 0.0);
//! let config = PlannerConfig::default();
//!
//! let mut planner = AStarPlanner::new();
//! let plan = planner
//!     .plan(ribbons, start, config, DubinsPlan::new(), 1.0)
//!     .unwrap();
//! assert!(!plan.empty());
//! ```
//!
//! ## Coordinate Frame
//!
//! World coordinates are meters in a local East-North frame; headings are
//! radians counter-clockwise from +x, normalized to `[0, 2π)`. Time is
//! seconds on whatever clock the caller injects through
//! [`planner::PlannerConfig::now`].

pub mod error;
pub mod geometry;
pub mod map;
pub mod obstacles;
pub mod plan;
pub mod planner;
pub mod ribbon;

pub use error::{PlanError, Result};
pub use geometry::State;
pub use plan::DubinsPlan;
pub use planner::{AStarPlanner, PlannerConfig};
pub use ribbon::RibbonManager;
