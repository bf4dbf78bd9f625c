//! Vehicle subsystems: mass, aerodynamics, propulsion, gear, controls, and
//! the force/moment aggregate.

pub mod aero;
pub mod aircraft;
pub mod fcs;
pub mod gear;
pub mod mass;
pub mod propulsion;

pub use aircraft::Aircraft;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Airframe geometry from the `metrics` section of the aircraft file.
/// Lengths in feet, areas in square feet, angles in radians; reference
/// point locations stay in the structural frame (inches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    pub wing_area: f64,
    pub wing_span: f64,
    pub chord: f64,
    pub wing_incidence: f64,
    pub htail_area: f64,
    pub htail_arm: f64,
    pub vtail_area: f64,
    pub vtail_arm: f64,
    /// Aerodynamic reference point, structural frame (in).
    pub aero_rp: Vector3<f64>,
    /// Pilot eyepoint, structural frame (in).
    pub eyepoint: Vector3<f64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            wing_area: 174.0,
            wing_span: 36.0,
            chord: 4.9,
            wing_incidence: 0.0,
            htail_area: 21.9,
            htail_arm: 15.7,
            vtail_area: 16.5,
            vtail_arm: 15.7,
            aero_rp: Vector3::new(43.2, 0.0, 59.4),
            eyepoint: Vector3::new(37.0, 0.0, 48.0),
        }
    }
}
