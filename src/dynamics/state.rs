use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::earth::location::Location;

/// Euler angles in the 3-2-1 (yaw, pitch, roll) convention, radians.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EulerAngles {
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
}

/// Rotation matrices between the frames carried by the simulation, rebuilt
/// at the end of every propagation step and treated as read-only by all
/// other modules for the remainder of the tick.
///
/// Naming: `ti2b` transforms an ECI-frame vector into the body frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameTransforms {
    pub ti2ec: Matrix3<f64>,
    pub tec2i: Matrix3<f64>,
    pub tec2l: Matrix3<f64>,
    pub tl2ec: Matrix3<f64>,
    pub ti2l: Matrix3<f64>,
    pub tl2i: Matrix3<f64>,
    pub ti2b: Matrix3<f64>,
    pub tb2i: Matrix3<f64>,
    pub tl2b: Matrix3<f64>,
    pub tb2l: Matrix3<f64>,
    pub tec2b: Matrix3<f64>,
    pub tb2ec: Matrix3<f64>,
}

impl Default for FrameTransforms {
    fn default() -> Self {
        Self {
            ti2ec: Matrix3::identity(),
            tec2i: Matrix3::identity(),
            tec2l: Matrix3::identity(),
            tl2ec: Matrix3::identity(),
            ti2l: Matrix3::identity(),
            tl2i: Matrix3::identity(),
            ti2b: Matrix3::identity(),
            tb2i: Matrix3::identity(),
            tl2b: Matrix3::identity(),
            tb2l: Matrix3::identity(),
            tec2b: Matrix3::identity(),
            tb2ec: Matrix3::identity(),
        }
    }
}

/// The integrated vehicle state.
///
/// The attitude quaternion maps body-frame vectors into ECI and is kept raw
/// (possibly non-unit) during integration sub-steps; [`VehicleState::normalize_attitude`]
/// restores the unit norm at step end and reports the drift it removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleState {
    pub location: Location,
    /// ECI position (ft).
    pub r_eci: Vector3<f64>,
    /// ECI-frame inertial velocity (ft/s).
    pub v_eci: Vector3<f64>,
    /// Body-frame velocity relative to the rotating planet (ft/s).
    pub uvw: Vector3<f64>,
    /// Body-relative angular rate, body frame (rad/s).
    pub pqr: Vector3<f64>,
    /// Inertial angular rate, body frame (rad/s).
    pub pqr_i: Vector3<f64>,
    /// Body-to-ECI attitude quaternion (w, x, y, z).
    pub q_eci: Quaternion<f64>,
    /// Body-to-local attitude, derived each step.
    pub q_local: UnitQuaternion<f64>,
    /// Current attitude quaternion derivative.
    pub q_dot: Quaternion<f64>,
    /// Earth position angle: rotation of ECEF relative to ECI (rad).
    pub epa: f64,
    /// NED-frame velocity over ground (ft/s).
    pub v_ned: Vector3<f64>,
    pub euler: EulerAngles,
    pub transforms: FrameTransforms,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            location: Location::default(),
            r_eci: Vector3::zeros(),
            v_eci: Vector3::zeros(),
            uvw: Vector3::zeros(),
            pqr: Vector3::zeros(),
            pqr_i: Vector3::zeros(),
            q_eci: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            q_local: UnitQuaternion::identity(),
            q_dot: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            epa: 0.0,
            v_ned: Vector3::zeros(),
            euler: EulerAngles::default(),
            transforms: FrameTransforms::default(),
        }
    }
}

impl VehicleState {
    /// Restore unit norm after a non-exponential integration step.
    /// Returns the absolute drift that was removed.
    pub fn normalize_attitude(&mut self) -> f64 {
        let norm = self.q_eci.norm();
        if norm > 0.0 {
            self.q_eci = self.q_eci * (1.0 / norm);
        } else {
            self.q_eci = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        }
        (norm - 1.0).abs()
    }

    /// Rotation matrix taking ECI vectors to the body frame, from the
    /// attitude quaternion (normalized copy; the stored state is untouched).
    pub fn ti2b_from_quaternion(&self) -> Matrix3<f64> {
        let unit = UnitQuaternion::from_quaternion(self.q_eci);
        unit.to_rotation_matrix().matrix().transpose()
    }

    /// Attitude quaternion derivative for an inertial rate `omega_i`
    /// expressed in the body frame: q_dot = q * (0, omega) / 2.
    pub fn attitude_derivative(q: &Quaternion<f64>, omega_i: &Vector3<f64>) -> Quaternion<f64> {
        let omega = Quaternion::new(0.0, omega_i.x, omega_i.y, omega_i.z);
        (q * omega) * 0.5
    }

    /// 3-2-1 Euler angles from a local-to-body rotation matrix.
    pub fn euler_from_tl2b(tl2b: &Matrix3<f64>) -> EulerAngles {
        let theta = -tl2b[(0, 2)].clamp(-1.0, 1.0).asin();
        let phi = tl2b[(1, 2)].atan2(tl2b[(2, 2)]);
        let psi = tl2b[(0, 1)].atan2(tl2b[(0, 0)]);
        EulerAngles { phi, theta, psi }
    }

    /// Local-to-body quaternion from 3-2-1 Euler angles.
    pub fn quaternion_from_euler(euler: &EulerAngles) -> UnitQuaternion<f64> {
        // yaw, then pitch, then roll about the carried axes
        UnitQuaternion::from_euler_angles(euler.phi, euler.theta, euler.psi)
    }
}
