//! kestrel: a six-degree-of-freedom flight dynamics simulator.
//!
//! The executive drives an ordered pipeline of physics modules at a fixed
//! base rate: earth model, atmosphere, flight controls, mass balance,
//! aerodynamics, propulsion, ground reactions, force aggregation,
//! accelerations (with a projected Gauss-Seidel contact friction solver),
//! state propagation over a rotating Earth, and derived observables.
//! Modules share typed per-tick data through [`executive::FrameData`] and
//! named scalars through the [`bus::PropertyBus`].

pub mod bus;
pub mod config;
pub mod dynamics;
pub mod earth;
pub mod environment;
pub mod executive;
pub mod output;
pub mod script;
pub mod utils;
pub mod vehicle;

pub use bus::PropertyBus;
pub use config::{AircraftConfig, InitConfig};
pub use executive::{Command, Executive, RunState};
pub use script::{RunScript, ScriptRunner};
pub use utils::{Result, SimError};
