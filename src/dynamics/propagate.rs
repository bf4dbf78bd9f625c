use log::warn;
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::dynamics::integrators::{self, History, Scheme};
use crate::dynamics::state::{EulerAngles, VehicleState};
use crate::earth::{planet_rotation, Location};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::{Result, SimError};

/// Average per-step quaternion norm drift (over ten steps) above which a
/// warning is surfaced.
const DRIFT_WARN_THRESHOLD: f64 = 1.0e-6;

/// Frame-of-reference rotation about Z by the Earth position angle:
/// takes ECI coordinates into ECEF.
fn ti2ec_from_epa(epa: f64) -> Matrix3<f64> {
    let (s, c) = epa.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Build a full initial state from geodetic position, body velocity, and
/// local attitude.
pub fn initial_state(
    location: Location,
    uvw: Vector3<f64>,
    pqr: Vector3<f64>,
    euler: EulerAngles,
) -> VehicleState {
    let mut state = VehicleState::default();
    let epa = 0.0;
    let ti2ec = ti2ec_from_epa(epa);
    let tec2i = ti2ec.transpose();

    state.r_eci = tec2i * location.ecef();

    let q_local = VehicleState::quaternion_from_euler(&euler);
    let tb2l = q_local.to_rotation_matrix().matrix().to_owned();
    let tl2b = tb2l.transpose();
    let tec2l = *location.tec2l();
    let ti2l = tec2l * ti2ec;
    let ti2b = tl2b * ti2l;
    let tb2i = ti2b.transpose();

    state.q_eci = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(tb2i))
        .into_inner();
    state.q_local = q_local;
    state.euler = euler;
    state.uvw = uvw;
    state.pqr = pqr;

    let omega_e = planet_rotation();
    state.pqr_i = pqr + ti2b * omega_e;
    state.v_eci = tb2i * uvw + omega_e.cross(&state.r_eci);
    state.epa = epa;
    state.location = location;

    state.transforms.ti2ec = ti2ec;
    state.transforms.tec2i = tec2i;
    state.transforms.tec2l = tec2l;
    state.transforms.tl2ec = tec2l.transpose();
    state.transforms.ti2l = ti2l;
    state.transforms.tl2i = ti2l.transpose();
    state.transforms.ti2b = ti2b;
    state.transforms.tb2i = tb2i;
    state.transforms.tl2b = tl2b;
    state.transforms.tb2l = tb2l;
    state.transforms.tec2b = ti2b * tec2i;
    state.transforms.tb2ec = state.transforms.tec2b.transpose();
    state.v_ned = tb2l * uvw;
    state
}

/// C11: integrates the vehicle state and maintains every frame transform.
pub struct Propagate {
    h_qdot: History<Quaternion<f64>>,
    h_wdot: History<Vector3<f64>>,
    h_vdot: History<Vector3<f64>>,
    h_rdot: History<Vector3<f64>>,

    drift_accumulator: f64,
    drift_steps: u32,

    p_rot_rate: Option<PropertyId>,
    p_trans_rate: Option<PropertyId>,
    p_rot_pos: Option<PropertyId>,
    p_trans_pos: Option<PropertyId>,

    p_h_sl: Option<PropertyId>,
    p_h_agl: Option<PropertyId>,
    p_lat: Option<PropertyId>,
    p_lon: Option<PropertyId>,
    p_lat_geod: Option<PropertyId>,
    p_runway_radius: Option<PropertyId>,
    p_euler: [Option<PropertyId>; 3],
    p_pqr: [Option<PropertyId>; 3],
    p_uvw: [Option<PropertyId>; 3],
    p_vned: [Option<PropertyId>; 3],
}

impl Propagate {
    pub fn new() -> Self {
        let zero_q = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        Self {
            h_qdot: History::filled(zero_q),
            h_wdot: History::filled(Vector3::zeros()),
            h_vdot: History::filled(Vector3::zeros()),
            h_rdot: History::filled(Vector3::zeros()),
            drift_accumulator: 0.0,
            drift_steps: 0,
            p_rot_rate: None,
            p_trans_rate: None,
            p_rot_pos: None,
            p_trans_pos: None,
            p_h_sl: None,
            p_h_agl: None,
            p_lat: None,
            p_lon: None,
            p_lat_geod: None,
            p_runway_radius: None,
            p_euler: [None; 3],
            p_pqr: [None; 3],
            p_uvw: [None; 3],
            p_vned: [None; 3],
        }
    }

    /// Seed the derivative histories from the initial state so multi-step
    /// schemes start consistent.
    pub fn initialize(&mut self, state: &VehicleState) {
        let qdot = VehicleState::attitude_derivative(&state.q_eci, &state.pqr_i);
        self.h_qdot.fill(qdot);
        self.h_wdot.fill(Vector3::zeros());
        self.h_vdot.fill(Vector3::zeros());
        self.h_rdot.fill(state.v_eci);
        self.drift_accumulator = 0.0;
        self.drift_steps = 0;
    }

    /// Rebuild every dependent quantity from (r_eci, v_eci, q_eci, pqr_i,
    /// epa). Shared by the integration step and external state overrides.
    pub fn recompute_derived(state: &mut VehicleState) {
        let omega_e = planet_rotation();

        let ti2ec = ti2ec_from_epa(state.epa);
        let tec2i = ti2ec.transpose();
        state.location.set_ecef(&(ti2ec * state.r_eci));

        let tec2l = *state.location.tec2l();
        let ti2l = tec2l * ti2ec;
        let ti2b = state.ti2b_from_quaternion();
        let tb2i = ti2b.transpose();
        let tl2b = ti2b * ti2l.transpose();
        let tb2l = tl2b.transpose();

        state.transforms.ti2ec = ti2ec;
        state.transforms.tec2i = tec2i;
        state.transforms.tec2l = tec2l;
        state.transforms.tl2ec = tec2l.transpose();
        state.transforms.ti2l = ti2l;
        state.transforms.tl2i = ti2l.transpose();
        state.transforms.ti2b = ti2b;
        state.transforms.tb2i = tb2i;
        state.transforms.tl2b = tl2b;
        state.transforms.tb2l = tb2l;
        state.transforms.tec2b = ti2b * tec2i;
        state.transforms.tb2ec = state.transforms.tec2b.transpose();

        state.uvw = ti2b * (state.v_eci - omega_e.cross(&state.r_eci));
        state.pqr = state.pqr_i - ti2b * omega_e;
        state.q_local =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(tb2l));
        state.euler = VehicleState::euler_from_tl2b(&tl2b);
        state.v_ned = tb2l * state.uvw;
    }

    fn scheme(bus: &PropertyBus, id: Option<PropertyId>, fallback: Scheme) -> Scheme {
        id.map(|id| Scheme::from_index(bus.get(id))).unwrap_or(fallback)
    }
}

impl Default for Propagate {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Propagate {
    fn name(&self) -> &'static str {
        "propagate"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "propagate";
        self.p_rot_rate = Some(bus.publish(
            o,
            "simulation/integrator/rotational-rate",
            Scheme::AdamsBashforth2 as i64 as f64,
            Access::ReadWrite,
        )?);
        self.p_trans_rate = Some(bus.publish(
            o,
            "simulation/integrator/translational-rate",
            Scheme::AdamsBashforth2 as i64 as f64,
            Access::ReadWrite,
        )?);
        self.p_rot_pos = Some(bus.publish(
            o,
            "simulation/integrator/rotational-position",
            Scheme::Buss2 as i64 as f64,
            Access::ReadWrite,
        )?);
        self.p_trans_pos = Some(bus.publish(
            o,
            "simulation/integrator/translational-position",
            Scheme::Trapezoidal as i64 as f64,
            Access::ReadWrite,
        )?);

        self.p_h_sl = Some(bus.publish(o, "position/h-sl-ft", 0.0, Access::ReadOnly)?);
        self.p_h_agl = Some(bus.publish(o, "position/h-agl-ft", 0.0, Access::ReadOnly)?);
        self.p_lat = Some(bus.publish(o, "position/lat-gc-deg", 0.0, Access::ReadOnly)?);
        self.p_lon = Some(bus.publish(o, "position/long-gc-deg", 0.0, Access::ReadOnly)?);
        self.p_lat_geod = Some(bus.publish(o, "position/lat-geod-deg", 0.0, Access::ReadOnly)?);
        self.p_runway_radius =
            Some(bus.publish(o, "position/runway-radius-ft", 0.0, Access::ReadOnly)?);
        for (i, name) in ["phi", "theta", "psi"].iter().enumerate() {
            self.p_euler[i] = Some(bus.publish(
                o,
                &format!("attitude/{}-rad", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        for (i, name) in ["p", "q", "r"].iter().enumerate() {
            self.p_pqr[i] = Some(bus.publish(
                o,
                &format!("velocities/{}-rad_sec", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        for (i, name) in ["u", "v", "w"].iter().enumerate() {
            self.p_uvw[i] = Some(bus.publish(
                o,
                &format!("velocities/{}-fps", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        for (i, name) in ["north", "east", "down"].iter().enumerate() {
            self.p_vned[i] = Some(bus.publish(
                o,
                &format!("velocities/v-{}-fps", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        let dt = env.dt;
        let omega_e = planet_rotation();

        if env.integrate {
            // Restored on failure so no partially integrated state leaks.
            let saved = frame.state.clone();
            let state = &mut frame.state;

            // Current derivatives enter the histories first; the multi-step
            // schemes then reach back through them.
            let qdot = VehicleState::attitude_derivative(&state.q_eci, &state.pqr_i);
            state.q_dot = qdot;
            self.h_qdot.push(qdot);
            self.h_wdot.push(frame.accel.pqr_idot);
            let vdot_eci = state.transforms.tb2i * frame.accel.uvw_idot;
            self.h_vdot.push(vdot_eci);
            self.h_rdot.push(state.v_eci);

            let rot_pos = Self::scheme(bus, self.p_rot_pos, Scheme::Buss2);
            let rot_rate = Self::scheme(bus, self.p_rot_rate, Scheme::AdamsBashforth2);
            let trans_pos = Self::scheme(bus, self.p_trans_pos, Scheme::Trapezoidal);
            let trans_rate = Self::scheme(bus, self.p_trans_rate, Scheme::AdamsBashforth2);

            // 1. attitude, 2. angular rate, 3. position, 4. velocity
            state.q_eci = integrators::step_attitude(
                rot_pos,
                state.q_eci,
                dt,
                &state.pqr_i,
                &frame.accel.pqr_idot,
                &self.h_qdot,
            );
            state.pqr_i = integrators::step(rot_rate, state.pqr_i, dt, &self.h_wdot);
            state.r_eci = integrators::step(trans_pos, state.r_eci, dt, &self.h_rdot);
            state.v_eci = integrators::step(trans_rate, state.v_eci, dt, &self.h_vdot);

            // 5. the planet turned underneath us
            state.epa += omega_e.z * dt;

            if !rot_pos.is_exponential() {
                let drift = state.normalize_attitude();
                self.drift_accumulator += drift;
                self.drift_steps += 1;
                if self.drift_steps >= 10 {
                    if self.drift_accumulator / self.drift_steps as f64 > DRIFT_WARN_THRESHOLD {
                        warn!(
                            "attitude quaternion drifting {:.3e} per step",
                            self.drift_accumulator / self.drift_steps as f64
                        );
                    }
                    self.drift_accumulator = 0.0;
                    self.drift_steps = 0;
                }
            }

            if !state.q_eci.norm().is_finite() || !state.r_eci.iter().all(|v| v.is_finite()) {
                frame.state = saved;
                return Err(SimError::Numerical {
                    module: "propagate",
                    detail: "integrator produced a non-finite state".to_string(),
                });
            }

            // 6..11. rebuild transforms and derived velocities
            Self::recompute_derived(state);
        }

        let state = &frame.state;
        if let Some(id) = self.p_h_sl {
            bus.set(id, state.location.geodetic_altitude());
        }
        if let Some(id) = self.p_h_agl {
            let terrain = env.ground.terrain(env.sim_time, &state.location);
            bus.set(id, state.location.geodetic_altitude() - terrain.elevation);
        }
        if let Some(id) = self.p_lat {
            bus.set(id, state.location.latitude().to_degrees());
        }
        if let Some(id) = self.p_lon {
            bus.set(id, state.location.longitude().to_degrees());
        }
        if let Some(id) = self.p_lat_geod {
            bus.set(id, state.location.geodetic_latitude().to_degrees());
        }
        if let Some(id) = self.p_runway_radius {
            bus.set(id, state.location.sea_level_radius());
        }
        let euler = [state.euler.phi, state.euler.theta, state.euler.psi];
        for i in 0..3 {
            if let Some(id) = self.p_euler[i] {
                bus.set(id, euler[i]);
            }
            if let Some(id) = self.p_pqr[i] {
                bus.set(id, state.pqr[i]);
            }
            if let Some(id) = self.p_uvw[i] {
                bus.set(id, state.uvw[i]);
            }
            if let Some(id) = self.p_vned[i] {
                bus.set(id, state.v_ned[i]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn initial_state_round_trips_attitude() {
        let euler = EulerAngles {
            phi: 0.1,
            theta: -0.2,
            psi: 2.0,
        };
        let loc = Location::from_geodetic(0.3, 0.8, 5000.0);
        let mut state = initial_state(loc, Vector3::new(150.0, 0.0, 5.0), Vector3::zeros(), euler);
        Propagate::recompute_derived(&mut state);
        assert_relative_eq!(state.euler.phi, 0.1, epsilon = 1e-9);
        assert_relative_eq!(state.euler.theta, -0.2, epsilon = 1e-9);
        assert_relative_eq!(state.euler.psi, 2.0, epsilon = 1e-9);
        // Body velocity survives the ECI round trip.
        assert_relative_eq!(state.uvw.x, 150.0, epsilon = 1e-6);
        assert_relative_eq!(state.uvw.z, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn transforms_stay_orthonormal() {
        let loc = Location::from_geodetic(-1.2, 0.5, 12000.0);
        let euler = EulerAngles {
            phi: 0.4,
            theta: 0.1,
            psi: -1.0,
        };
        let mut state = initial_state(loc, Vector3::new(200.0, 5.0, -3.0), Vector3::zeros(), euler);
        Propagate::recompute_derived(&mut state);
        let t = &state.transforms;
        for m in [t.ti2b, t.tl2b, t.tec2l, t.ti2ec] {
            let eye = m * m.transpose();
            for i in 0..3 {
                for j in 0..3 {
                    let expect = if i == j { 1.0 } else { 0.0 };
                    assert_relative_eq!(eye[(i, j)], expect, epsilon = 1e-10);
                }
            }
        }
        // Tb2l really is the transpose of Tl2b.
        assert_relative_eq!((t.tb2l - t.tl2b.transpose()).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn epa_rotation_is_frame_of_reference() {
        // After a quarter turn of the planet, the ECI x-axis reads as -y in
        // ECEF coordinates.
        let t = ti2ec_from_epa(PI / 2.0);
        let v = t * Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, -1.0, epsilon = 1e-12);
    }
}
