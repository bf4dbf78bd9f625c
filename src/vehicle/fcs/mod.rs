//! Flight control system: pilot commands in, effector positions out.

pub mod components;

pub use components::{Comparison, ComponentKind, FcsComponent, InputRef, SwitchCase};

use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::Result;

/// Default surface throws used when the aircraft file supplies no channel
/// for a surface (rad; flaps in normalized position).
const DEFAULT_ELEVATOR_MAX: f64 = 0.43;
const DEFAULT_AILERON_MAX: f64 = 0.35;
const DEFAULT_RUDDER_MAX: f64 = 0.52;
/// Gear traverse time when no kinematic channel drives it (s).
const DEFAULT_GEAR_TRAVERSE: f64 = 5.0;

/// Effector positions consumed by aerodynamics, propulsion, and gear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Effectors {
    /// rad, positive trailing-edge down
    pub elevator_pos: f64,
    /// rad, positive right-wing down rolling moment sense
    pub aileron_pos: f64,
    /// rad, positive trailing-edge left
    pub rudder_pos: f64,
    /// normalized 0..1
    pub flap_pos: f64,
    pub speedbrake_pos: f64,
    pub throttle: Vec<f64>,
    pub mixture: Vec<f64>,
    pub brake_left: f64,
    pub brake_right: f64,
    pub brake_center: f64,
    /// 0 = up, 1 = down and locked
    pub gear_pos: f64,
    /// normalized steering command [-1, 1]
    pub steering: f64,
}

struct CommandSet {
    aileron: PropertyId,
    elevator: PropertyId,
    rudder: PropertyId,
    flap: PropertyId,
    speedbrake: PropertyId,
    steer: PropertyId,
    gear: PropertyId,
    brake_left: PropertyId,
    brake_right: PropertyId,
    brake_center: PropertyId,
    throttle: Vec<PropertyId>,
    mixture: Vec<PropertyId>,
}

struct PositionSet {
    aileron: PropertyId,
    elevator: PropertyId,
    rudder: PropertyId,
    flap: PropertyId,
    speedbrake: PropertyId,
    gear: PropertyId,
}

/// C13: runs the loaded control channels in order, then gathers the
/// standard effector positions for the force producers.
pub struct FlightControls {
    channels: Vec<FcsComponent>,
    engine_count: usize,
    commands: Option<CommandSet>,
    positions: Option<PositionSet>,
    /// Surfaces not driven by any channel fall back to a direct mapping.
    drives_elevator: bool,
    drives_aileron: bool,
    drives_rudder: bool,
    drives_flap: bool,
    drives_speedbrake: bool,
    drives_gear: bool,
    gear_state: f64,
}

impl FlightControls {
    pub fn new(channels: Vec<FcsComponent>, engine_count: usize, gear_down: bool) -> Self {
        let drives = |path: &str| channels.iter().any(|c| c.output == path);
        Self {
            drives_elevator: drives("fcs/elevator-pos-rad"),
            drives_aileron: drives("fcs/aileron-pos-rad"),
            drives_rudder: drives("fcs/rudder-pos-rad"),
            drives_flap: drives("fcs/flap-pos-norm"),
            drives_speedbrake: drives("fcs/speedbrake-pos-norm"),
            drives_gear: drives("gear/gear-pos-norm"),
            channels,
            engine_count,
            commands: None,
            positions: None,
            gear_state: if gear_down { 1.0 } else { 0.0 },
        }
    }
}

impl Module for FlightControls {
    fn name(&self) -> &'static str {
        "fcs"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "fcs";
        let mut throttle = Vec::new();
        let mut mixture = Vec::new();
        for i in 0..self.engine_count {
            throttle.push(bus.publish(
                o,
                &format!("fcs/throttle-cmd-norm[{}]", i),
                0.0,
                Access::ReadWrite,
            )?);
            mixture.push(bus.publish(
                o,
                &format!("fcs/mixture-cmd-norm[{}]", i),
                1.0,
                Access::ReadWrite,
            )?);
        }
        self.commands = Some(CommandSet {
            aileron: bus.publish(o, "fcs/aileron-cmd-norm", 0.0, Access::ReadWrite)?,
            elevator: bus.publish(o, "fcs/elevator-cmd-norm", 0.0, Access::ReadWrite)?,
            rudder: bus.publish(o, "fcs/rudder-cmd-norm", 0.0, Access::ReadWrite)?,
            flap: bus.publish(o, "fcs/flap-cmd-norm", 0.0, Access::ReadWrite)?,
            speedbrake: bus.publish(o, "fcs/speedbrake-cmd-norm", 0.0, Access::ReadWrite)?,
            steer: bus.publish(o, "fcs/steer-cmd-norm", 0.0, Access::ReadWrite)?,
            gear: bus.publish(o, "gear/gear-cmd-norm", self.gear_state, Access::ReadWrite)?,
            brake_left: bus.publish(o, "fcs/left-brake-cmd-norm", 0.0, Access::ReadWrite)?,
            brake_right: bus.publish(o, "fcs/right-brake-cmd-norm", 0.0, Access::ReadWrite)?,
            brake_center: bus.publish(o, "fcs/center-brake-cmd-norm", 0.0, Access::ReadWrite)?,
            throttle,
            mixture,
        });

        let touch = |bus: &mut PropertyBus, path: &str, v: f64| {
            let id = bus.touch(o, path);
            bus.set(id, v);
            id
        };
        self.positions = Some(PositionSet {
            aileron: touch(bus, "fcs/aileron-pos-rad", 0.0),
            elevator: touch(bus, "fcs/elevator-pos-rad", 0.0),
            rudder: touch(bus, "fcs/rudder-pos-rad", 0.0),
            flap: touch(bus, "fcs/flap-pos-norm", 0.0),
            speedbrake: touch(bus, "fcs/speedbrake-pos-norm", 0.0),
            gear: touch(bus, "gear/gear-pos-norm", self.gear_state),
        });

        for channel in &mut self.channels {
            channel.resolve(bus);
        }
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        for channel in &mut self.channels {
            channel.update(bus, env.dt);
        }

        let commands = self.commands.as_ref().expect("bound");
        let positions = self.positions.as_ref().expect("bound");

        // Direct command-to-surface mapping for anything the aircraft file
        // leaves to the default control layout.
        if !self.drives_elevator {
            let cmd = bus.get(commands.elevator).clamp(-1.0, 1.0);
            bus.set(positions.elevator, cmd * DEFAULT_ELEVATOR_MAX);
        }
        if !self.drives_aileron {
            let cmd = bus.get(commands.aileron).clamp(-1.0, 1.0);
            bus.set(positions.aileron, cmd * DEFAULT_AILERON_MAX);
        }
        if !self.drives_rudder {
            let cmd = bus.get(commands.rudder).clamp(-1.0, 1.0);
            bus.set(positions.rudder, cmd * DEFAULT_RUDDER_MAX);
        }
        if !self.drives_flap {
            let cmd = bus.get(commands.flap).clamp(0.0, 1.0);
            bus.set(positions.flap, cmd);
        }
        if !self.drives_speedbrake {
            let cmd = bus.get(commands.speedbrake).clamp(0.0, 1.0);
            bus.set(positions.speedbrake, cmd);
        }
        if !self.drives_gear {
            let cmd = bus.get(commands.gear).clamp(0.0, 1.0);
            let step = env.dt / DEFAULT_GEAR_TRAVERSE;
            if (cmd - self.gear_state).abs() <= step {
                self.gear_state = cmd;
            } else {
                self.gear_state += step * (cmd - self.gear_state).signum();
            }
            bus.set(positions.gear, self.gear_state);
        }

        frame.controls = Effectors {
            elevator_pos: bus.get(positions.elevator),
            aileron_pos: bus.get(positions.aileron),
            rudder_pos: bus.get(positions.rudder),
            flap_pos: bus.get(positions.flap),
            speedbrake_pos: bus.get(positions.speedbrake),
            throttle: commands.throttle.iter().map(|&id| bus.get(id)).collect(),
            mixture: commands.mixture.iter().map(|&id| bus.get(id)).collect(),
            brake_left: bus.get(commands.brake_left),
            brake_right: bus.get(commands.brake_right),
            brake_center: bus.get(commands.brake_center),
            gear_pos: bus.get(positions.gear),
            steering: bus.get(commands.steer),
        };
        Ok(())
    }
}
