use crate::bus::{self, PropertyBus};
use crate::earth::GroundCallback;
use crate::executive::frame::FrameData;
use crate::utils::Result;

/// Executive run state. Transitions happen only at tick boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Normal integration.
    Running,
    /// Integration suspended; state frozen.
    Holding,
    /// Integration suspended while the trim loop adjusts controls.
    Trimming,
    /// Attached to the rotating ground: body accelerations forced to zero.
    HoldDown,
}

/// Per-tick immutable context handed to every module.
pub struct TickEnv<'a> {
    /// Base time step (s).
    pub dt: f64,
    /// Simulated time since run start (s).
    pub sim_time: f64,
    /// Base tick counter.
    pub frame: u64,
    pub run_state: RunState,
    /// False while Holding or Trimming: propagation is suspended.
    pub integrate: bool,
    pub ground: &'a dyn GroundCallback,
}

/// A physics module in the fixed pipeline.
///
/// Modules publish bus properties in `bind` and read the outputs of earlier
/// modules for the current tick (later modules' outputs are last tick's)
/// through [`FrameData`]. An error return is terminal for the tick; modules
/// must not commit partial state before failing.
pub trait Module {
    fn name(&self) -> &'static str;

    /// Rate divisor: the module runs every n-th base tick.
    fn rate(&self) -> u64 {
        1
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()>;

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv)
        -> Result<()>;
}
