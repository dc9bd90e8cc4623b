//! Seam between the planning core and the host robotics framework.

use taranga_plan::geometry::State;
use taranga_plan::plan::DubinsPlan;
use taranga_plan::ribbon::RibbonManager;

/// Capability set the planning loop consumes. The host framework (or a
/// simulator in tests) implements this; the loop never talks to transport
/// directly.
pub trait TrajectoryPublisher: Send + Sync {
    /// Monotonic time, seconds. Every timestamp the loop handles is on
    /// this clock.
    fn get_time(&self) -> f64;

    /// Submit a plan to the controller. Returns the state the controller
    /// actually committed to start from, which the loop checks against
    /// the plan to detect divergence.
    fn publish_plan(&self, plan: &DubinsPlan) -> State;

    /// Best-effort trajectory display.
    fn display_trajectory(&self, states: &[State], is_new: bool);

    /// Best-effort ribbon display.
    fn display_ribbons(&self, ribbons: &RibbonManager);

    /// One-shot notification that every ribbon is covered.
    fn all_done(&self);
}
