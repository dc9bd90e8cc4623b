//! TarangaNav - Coverage Controller for Autonomous Surface Vehicles
//!
//! A planning controller that keeps a survey vessel driving over a set of
//! ribbons (survey lines) until every line is fully covered, replanning on
//! a fixed cadence against live pose, obstacle, and map updates.
//!
//! ## Architecture
//!
//! The controller couples asynchronous inputs with one planning thread:
//!
//! - **Caller threads** push pose updates (`update_covered`), ribbon edits,
//!   dynamic-obstacle reports, and configuration changes
//! - **Map loader threads** (one per `refresh_map` call) parse map files
//!   and stage the result for the planning loop to swap in
//! - **Planning thread** (~1 Hz): snapshots the shared state, runs the
//!   anytime planner for the rest of the period, and publishes the plan

pub mod config;
pub mod error;
pub mod executive;
pub mod publisher;
pub mod sim;

pub use config::NavConfig;
pub use error::{NavError, Result};
pub use executive::Executive;
pub use publisher::TrajectoryPublisher;
pub use sim::SimPublisher;
