//! Configuration loading for TarangaNav

use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default, rename = "loop")]
    pub timing: LoopSection,
    #[serde(default)]
    pub mission: MissionSection,
}

/// Planner geometry and search settings
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerSection {
    /// Minimum turning radius for transit maneuvers (meters)
    #[serde(default = "default_turning_radius")]
    pub turning_radius: f64,

    /// Turning radius allowed while actively covering a ribbon (meters)
    #[serde(default = "default_coverage_turning_radius")]
    pub coverage_turning_radius: f64,

    /// Speed the vehicle plans at (m/s)
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Ribbon coverage width (meters)
    #[serde(default = "default_line_width")]
    pub line_width: f64,

    /// Children generated per vertex expansion
    #[serde(default = "default_branching_factor")]
    pub branching_factor: usize,

    /// Cost-to-go heuristic id (0..4)
    #[serde(default)]
    pub heuristic: u32,

    /// Write search-tree snapshots for offline inspection
    #[serde(default)]
    pub visualize: bool,

    /// Where search-tree snapshots go when `visualize` is set
    #[serde(default)]
    pub visualization_file_path: String,
}

/// Planning-loop timing and experiments
#[derive(Clone, Debug, Deserialize)]
pub struct LoopSection {
    /// Planning period, seconds; the planner gets whatever part of it is
    /// left after snapshotting
    #[serde(default = "default_planning_time")]
    pub planning_time_seconds: f64,

    /// Offer the previous plan back to the planner as a hot start
    #[serde(default = "default_reuse_plan")]
    pub reuse_plan: bool,

    /// Shrink turning radii while the controller tracks the plan
    #[serde(default)]
    pub radius_shrink: bool,

    /// Radius decrement per iteration when shrinking (meters)
    #[serde(default = "default_radius_shrink_amount")]
    pub radius_shrink_amount: f64,

    /// Heading rate above which pose updates do not count as coverage
    /// (rad/s)
    #[serde(default = "default_coverage_heading_rate_max")]
    pub coverage_heading_rate_max: f64,
}

/// Mission definition for the demo binary
#[derive(Clone, Debug, Deserialize)]
pub struct MissionSection {
    /// Ribbons as `[x1, y1, x2, y2]` rows
    #[serde(default)]
    pub ribbons: Vec<[f64; 4]>,

    /// Give up after this much wall time (seconds)
    #[serde(default = "default_mission_timeout")]
    pub timeout_seconds: f64,
}

impl Default for MissionSection {
    fn default() -> Self {
        Self {
            ribbons: Vec::new(),
            timeout_seconds: default_mission_timeout(),
        }
    }
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            turning_radius: default_turning_radius(),
            coverage_turning_radius: default_coverage_turning_radius(),
            max_speed: default_max_speed(),
            line_width: default_line_width(),
            branching_factor: default_branching_factor(),
            heuristic: 0,
            visualize: false,
            visualization_file_path: String::new(),
        }
    }
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            planning_time_seconds: default_planning_time(),
            reuse_plan: default_reuse_plan(),
            radius_shrink: false,
            radius_shrink_amount: default_radius_shrink_amount(),
            coverage_heading_rate_max: default_coverage_heading_rate_max(),
        }
    }
}

// Default value functions
fn default_turning_radius() -> f64 {
    8.0
}
fn default_coverage_turning_radius() -> f64 {
    8.0
}
fn default_max_speed() -> f64 {
    2.5
}
fn default_line_width() -> f64 {
    2.0
}
fn default_branching_factor() -> usize {
    4
}
fn default_planning_time() -> f64 {
    1.0
}
fn default_reuse_plan() -> bool {
    true
}
fn default_radius_shrink_amount() -> f64 {
    1e-6
}
fn default_coverage_heading_rate_max() -> f64 {
    0.1
}
fn default_mission_timeout() -> f64 {
    300.0
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let c = NavConfig::default();
        assert_eq!(c.planner.turning_radius, 8.0);
        assert_eq!(c.planner.max_speed, 2.5);
        assert_eq!(c.timing.planning_time_seconds, 1.0);
        assert!(c.timing.reuse_plan);
        assert!(!c.timing.radius_shrink);
        assert!(c.mission.ribbons.is_empty());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let c: NavConfig = toml::from_str(
            r#"
            [planner]
            max_speed = 2.0
            heuristic = 2

            [loop]
            planning_time_seconds = 0.5

            [mission]
            ribbons = [[0.0, 0.0, 0.0, 20.0]]
            "#,
        )
        .unwrap();
        assert_eq!(c.planner.max_speed, 2.0);
        assert_eq!(c.planner.heuristic, 2);
        assert_eq!(c.planner.turning_radius, 8.0);
        assert_eq!(c.timing.planning_time_seconds, 0.5);
        assert_eq!(c.mission.ribbons.len(), 1);
    }
}
