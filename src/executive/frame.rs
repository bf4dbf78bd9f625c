use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::dynamics::accelerations::AccelOutput;
use crate::dynamics::auxiliary::AirData;
use crate::dynamics::state::VehicleState;
use crate::environment::AtmosphereState;
use crate::vehicle::aero::AeroOutput;
use crate::vehicle::fcs::Effectors;
use crate::vehicle::gear::GearOutput;
use crate::vehicle::mass::{MassProperties, TankMass};

/// A body-frame force and moment pair about the CG (lbf, lbf*ft).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ForceMoment {
    pub force: Vector3<f64>,
    pub moment: Vector3<f64>,
}

impl ForceMoment {
    pub fn add(&mut self, other: &ForceMoment) {
        self.force += other.force;
        self.moment += other.moment;
    }

    pub fn clear(&mut self) {
        self.force = Vector3::zeros();
        self.moment = Vector3::zeros();
    }
}

/// Shared per-tick data crossing module boundaries.
///
/// Each field is written by exactly one module in pipeline order; everything
/// downstream reads it for the current tick, everything upstream sees the
/// previous tick's value. Components never hold references into this struct
/// across frame boundaries.
#[derive(Debug, Clone, Default)]
pub struct FrameData {
    pub state: VehicleState,

    /// Gravitation at the current position, ECEF frame (ft/s^2). Earth model.
    pub gravity_ecef: Vector3<f64>,
    /// Atmosphere, winds, turbulence.
    pub atmos: AtmosphereState,
    /// Mass, CG, inertia.
    pub mass: MassProperties,
    /// Aerodynamic forces, moments, and observables.
    pub aero: AeroOutput,
    /// Propulsion force/moment sum.
    pub prop: ForceMoment,
    /// Tank mass summaries for the mass balance, refreshed by Propulsion.
    pub tanks: Vec<TankMass>,
    /// Ground reaction forces and contact records.
    pub gear: GearOutput,
    /// Host- or script-applied external force/moment (body frame).
    pub external: ForceMoment,
    /// Aircraft aggregate of all force/moment contributions.
    pub total: ForceMoment,
    /// Second derivatives and resolved friction.
    pub accel: AccelOutput,
    /// Derived flight observables.
    pub air: AirData,
    /// Effector positions out of the FCS.
    pub controls: Effectors,
}
