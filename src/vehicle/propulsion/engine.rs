use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::environment::AtmosphereState;
use crate::vehicle::aero::Table1D;

/// Engine model selection. Each kind produces shaft power or direct thrust
/// plus a fuel demand; the thruster turns that into a body-frame force.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineKind {
    /// Naturally aspirated piston engine with Gagg-Ferrar altitude lapse.
    Piston {
        /// Rated sea-level shaft power (ft*lbf/s).
        rated_power: f64,
        /// Brake specific fuel consumption (lbs/s per ft*lbf/s).
        bsfc: f64,
    },
    /// Thrust-rated turbojet/turbofan with first-order spool dynamics.
    Turbine {
        /// Static sea-level thrust (lbf).
        max_thrust: f64,
        /// Thrust specific fuel consumption (lbs/s per lbf).
        tsfc: f64,
        /// Spool time constant (s).
        spool_tau: f64,
    },
    /// Power-rated gas turbine driving a propeller.
    Turboprop {
        rated_power: f64,
        /// Power specific fuel consumption (lbs/s per ft*lbf/s).
        psfc: f64,
    },
    /// Constant-Isp rocket motor.
    Rocket {
        /// Specific impulse (s).
        isp: f64,
        /// Propellant flow at full throttle (lbs/s).
        max_flow: f64,
    },
    /// Battery-fed motor; no fuel demand.
    Electric { rated_power: f64 },
}

/// Converts engine output into thrust.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Thruster {
    /// Pass engine thrust straight through (turbine, rocket).
    Direct,
    /// Fixed-pitch propeller: efficiency over advance ratio, capped at the
    /// momentum-theory ideal static thrust.
    Propeller {
        /// ft
        diameter: f64,
        /// rev/s at rated conditions
        nominal_rps: f64,
        /// advance ratio -> efficiency
        efficiency: Table1D,
    },
    /// Converging nozzle with ambient back-pressure loss.
    Nozzle {
        /// ft^2
        exit_area: f64,
    },
}

/// What an engine produced on one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOutput {
    /// lbf along the thrust axis
    pub thrust: f64,
    /// lbs/s
    pub fuel_flow: f64,
}

/// One installed engine: model, thruster, placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub name: String,
    pub kind: EngineKind,
    pub thruster: Thruster,
    /// Structural frame (in).
    pub location: Vector3<f64>,
    /// Thrust-axis pitch offset, positive nose-up (rad).
    pub pitch: f64,
    /// Thrust-axis yaw offset, positive nose-right (rad).
    pub yaw: f64,
    /// Indices into the propulsion tank set.
    pub feed: Vec<usize>,
    /// Set when the feed tanks could not meet demand last tick; the
    /// combustion model observes it on this call.
    #[serde(default)]
    pub starved: bool,
    /// Internal spool state for turbine engines (lbf).
    #[serde(default)]
    pub spool_thrust: f64,
}

impl Engine {
    /// Unit thrust direction in the body frame.
    pub fn thrust_direction(&self) -> Vector3<f64> {
        let (sp, cp) = self.pitch.sin_cos();
        let (sy, cy) = self.yaw.sin_cos();
        Vector3::new(cp * cy, cp * sy, -sp)
    }

    /// Evaluate the engine and thruster for one tick.
    ///
    /// `throttle` and `mixture` are normalized commands; `vt` is true
    /// airspeed (ft/s).
    pub fn calculate(
        &mut self,
        dt: f64,
        throttle: f64,
        mixture: f64,
        vt: f64,
        atmos: &AtmosphereState,
    ) -> EngineOutput {
        let throttle = if self.starved { 0.0 } else { throttle.clamp(0.0, 1.0) };
        let sigma = atmos.sigma.max(0.0);

        let (power, direct_thrust, fuel_flow) = match &self.kind {
            EngineKind::Piston { rated_power, bsfc } => {
                // Gagg-Ferrar: available power falls off faster than density.
                let lapse = (sigma - (1.0 - sigma) / 7.55).max(0.0);
                let p = rated_power * throttle * mixture.clamp(0.0, 1.0) * lapse;
                (p, 0.0, bsfc * p)
            }
            EngineKind::Turbine {
                max_thrust,
                tsfc,
                spool_tau,
            } => {
                let target = max_thrust * throttle * sigma.powf(0.7);
                let tau = spool_tau.max(1.0e-3);
                self.spool_thrust += (target - self.spool_thrust) * (dt / tau).min(1.0);
                (0.0, self.spool_thrust, tsfc * self.spool_thrust.max(0.0))
            }
            EngineKind::Turboprop { rated_power, psfc } => {
                let p = rated_power * throttle * sigma.powf(0.7);
                (p, 0.0, psfc * p)
            }
            EngineKind::Rocket { isp, max_flow } => {
                let flow = max_flow * throttle;
                (0.0, isp * flow, flow)
            }
            EngineKind::Electric { rated_power } => (rated_power * throttle, 0.0, 0.0),
        };

        let thrust = match &self.thruster {
            Thruster::Direct => direct_thrust,
            Thruster::Propeller {
                diameter,
                nominal_rps,
                efficiency,
            } => {
                if power <= 0.0 {
                    0.0
                } else {
                    let v = vt.max(1.0e-3);
                    let j = v / (nominal_rps.max(0.1) * diameter);
                    let eta = efficiency.lookup(j).clamp(0.0, 1.0);
                    let disk = std::f64::consts::PI * diameter * diameter / 4.0;
                    // Ideal static thrust from momentum theory bounds the
                    // low-speed singularity of eta*P/V.
                    let static_cap = (2.0 * atmos.density * disk).cbrt() * power.powf(2.0 / 3.0);
                    (eta.max(0.5) * power / v).min(static_cap)
                }
            }
            Thruster::Nozzle { exit_area } => {
                (direct_thrust - atmos.pressure * exit_area).max(0.0)
            }
        };

        EngineOutput { thrust, fuel_flow }
    }
}
