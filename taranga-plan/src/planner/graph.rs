//! Arena-allocated search tree of Dubins-connected vertices.
//!
//! Vertices form a tree within one planning call, referenced by integer
//! ids and freed wholesale when the next call clears the arena. Each
//! vertex carries a shared ribbon-coverage snapshot; an edge that covers
//! new ribbon clones its parent's snapshot, everything else shares it.

use std::collections::HashSet;
use std::sync::Arc;

use crate::geometry::dubins::DubinsPath;
use crate::geometry::State;
use crate::plan::{DubinsPlan, PlanEdge};
use crate::ribbon::{RibbonManager, MIN_RIBBON_LENGTH};

use super::config::PlannerConfig;
use super::{COLLISION_FATAL_DENSITY, COVERAGE_REWARD_FRACTION, DUBINS_INCREMENT, OBSTACLE_PENALTY};

pub type VertexId = usize;

/// Dubins path from a parent vertex to a child state, with lazily computed
/// costs. Once `compute_true_cost` has run, feasibility never reverts.
#[derive(Clone, Debug)]
pub struct DubinsEdge {
    path: DubinsPath,
    speed: f64,
    start_time: f64,
    coverage_allowed: bool,
    true_cost: Option<f64>,
    infeasible: bool,
}

impl DubinsEdge {
    /// Traversal time ignoring obstacles and coverage, seconds.
    #[inline]
    pub fn approx_cost(&self) -> f64 {
        self.path.length() / self.speed
    }

    #[inline]
    pub fn true_cost(&self) -> Option<f64> {
        self.true_cost
    }

    #[inline]
    pub fn infeasible(&self) -> bool {
        self.infeasible
    }

    #[inline]
    pub fn path(&self) -> &DubinsPath {
        &self.path
    }

    #[inline]
    pub fn coverage_allowed(&self) -> bool {
        self.coverage_allowed
    }
}

/// Node in the search tree.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub state: State,
    /// Coverage snapshot at this vertex, shared with the parent unless the
    /// incoming edge covered something.
    pub ribbons: Arc<RibbonManager>,
    pub parent: Option<VertexId>,
    pub edge: Option<DubinsEdge>,
    /// Accumulated true cost from the root, seconds.
    pub g: f64,
    /// Heuristic cost-to-go, seconds.
    pub h: f64,
    /// Sample-pool indices already tried as children of this vertex.
    pub tried_samples: HashSet<usize>,
}

impl Vertex {
    #[inline]
    pub fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// The arena.
#[derive(Default)]
pub struct SearchGraph {
    vertices: Vec<Vertex>,
}

impl SearchGraph {
    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    #[inline]
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id]
    }

    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id]
    }

    #[inline]
    pub fn f(&self, id: VertexId) -> f64 {
        self.vertices[id].f()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Root vertex from the planning start state. Speed is forced to the
    /// configured cap before the heuristic is evaluated.
    pub fn make_root(
        &mut self,
        mut state: State,
        ribbons: RibbonManager,
        config: &PlannerConfig,
    ) -> VertexId {
        state.speed = config.max_speed;
        let h = ribbons.approx_to_go(&state) / config.max_speed;
        self.vertices.push(Vertex {
            state,
            ribbons: Arc::new(ribbons),
            parent: None,
            edge: None,
            g: 0.0,
            h,
            tried_samples: HashSet::new(),
        });
        self.vertices.len() - 1
    }

    /// Connect `parent` to `child_state` with a Dubins edge at `radius`.
    /// The child's speed is forced to the cap and its time follows from
    /// the edge length. Costs stay unset until `compute_true_cost`.
    pub fn connect(
        &mut self,
        parent: VertexId,
        child_state: &State,
        radius: f64,
        coverage_allowed: bool,
        config: &PlannerConfig,
    ) -> Option<VertexId> {
        let parent_state = self.vertices[parent].state;
        let mut state = *child_state;
        state.speed = config.max_speed;

        let path = DubinsPath::shortest(&parent_state, &state, radius)?;
        state.time = parent_state.time + path.length() / config.max_speed;

        let ribbons = Arc::clone(&self.vertices[parent].ribbons);
        self.vertices.push(Vertex {
            state,
            ribbons,
            parent: Some(parent),
            edge: Some(DubinsEdge {
                path,
                speed: config.max_speed,
                start_time: parent_state.time,
                coverage_allowed,
                true_cost: None,
                infeasible: false,
            }),
            g: f64::INFINITY,
            h: f64::INFINITY,
            tried_samples: HashSet::new(),
        });
        Some(self.vertices.len() - 1)
    }

    /// Integrate the true cost of `id`'s parent edge: obstacle and map
    /// terms sampled along the path, coverage applied to the child's
    /// ribbon snapshot. Returns whether the edge is feasible.
    pub fn compute_true_cost(&mut self, id: VertexId, config: &PlannerConfig) -> bool {
        let parent = match self.vertices[id].parent {
            Some(p) => p,
            None => return true, // root has no edge
        };
        if let Some(edge) = &self.vertices[id].edge {
            if edge.true_cost.is_some() {
                return !edge.infeasible;
            }
        }

        let parent_g = self.vertices[parent].g;
        let parent_time = self.vertices[parent].state.time;
        let parent_ribbons = Arc::clone(&self.vertices[parent].ribbons);

        let (path, speed, start_time, coverage_allowed) = {
            let edge = self.vertices[id].edge.as_ref().expect("non-root edge");
            (
                edge.path.clone(),
                edge.speed,
                edge.start_time,
                edge.coverage_allowed,
            )
        };

        let length = path.length();
        let duration = length / speed;

        // An edge that cannot finish inside the remaining time horizon is
        // not worth integrating.
        let remaining = DubinsPlan::TIME_HORIZON - (parent_time - config.start_state_time);
        let mut infeasible = length > config.max_speed * remaining;

        let mut obstacle_cost = 0.0;
        let mut ribbons = if coverage_allowed {
            Some((*parent_ribbons).clone())
        } else {
            None
        };
        let before = parent_ribbons.total_uncovered_length();

        if !infeasible {
            let steps = (length / DUBINS_INCREMENT).ceil().max(1.0) as usize;
            let ds = length / steps as f64;
            for i in 0..=steps {
                let s = ds * i as f64;
                let (x, y, _) = path.sample(s);
                if config.map.is_blocked(x, y) {
                    infeasible = true;
                    break;
                }
                let density = config.obstacles.collision_cost(x, y, start_time + s / speed);
                if density > COLLISION_FATAL_DENSITY {
                    infeasible = true;
                    break;
                }
                obstacle_cost += density * OBSTACLE_PENALTY * ds / speed;
                if let Some(r) = ribbons.as_mut() {
                    r.cover(x, y);
                }
            }
        }

        let covered = match &ribbons {
            Some(r) => before - r.total_uncovered_length(),
            None => 0.0,
        };

        let cost = (duration + obstacle_cost - COVERAGE_REWARD_FRACTION / speed * covered)
            .max(0.0);

        let child_ribbons = match ribbons {
            Some(r) if covered > MIN_RIBBON_LENGTH => Arc::new(r),
            _ => parent_ribbons,
        };

        let vertex = &mut self.vertices[id];
        if let Some(edge) = vertex.edge.as_mut() {
            edge.true_cost = Some(cost);
            edge.infeasible = infeasible;
        }
        if infeasible {
            vertex.g = f64::INFINITY;
            vertex.h = f64::INFINITY;
            return false;
        }
        vertex.ribbons = child_ribbons;
        vertex.g = parent_g + cost;
        vertex.h = vertex.ribbons.approx_to_go(&vertex.state) / config.max_speed;
        true
    }

    /// Emit the plan formed by the parent chain from the root to `id`.
    pub fn trace_plan(&self, id: VertexId) -> DubinsPlan {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(v) = cursor {
            chain.push(v);
            cursor = self.vertices[v].parent;
        }
        chain.reverse();

        let mut plan = DubinsPlan::new();
        for v in chain {
            if let Some(edge) = &self.vertices[v].edge {
                plan.append(PlanEdge::new(
                    edge.path.clone(),
                    edge.speed,
                    edge.start_time,
                    edge.coverage_allowed,
                ));
            }
        }
        plan
    }
}
