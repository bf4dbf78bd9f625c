use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::dynamics::friction;
use crate::earth::planet_rotation;
use crate::executive::frame::{ForceMoment, FrameData};
use crate::executive::module::{Module, RunState, TickEnv};
use crate::utils::{Result, SimError};

/// Second derivatives of the vehicle state, body frame unless noted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccelOutput {
    /// Body-frame acceleration relative to the rotating planet (ft/s^2).
    pub uvw_dot: Vector3<f64>,
    /// Body-frame components of the ECI-frame linear acceleration;
    /// Propagate rotates this by Tb2i before integrating.
    pub uvw_idot: Vector3<f64>,
    /// Body-relative angular acceleration (rad/s^2).
    pub pqr_dot: Vector3<f64>,
    /// Inertial angular acceleration, body frame (rad/s^2).
    pub pqr_idot: Vector3<f64>,
    /// Resolved contact friction (body frame).
    pub friction: ForceMoment,
}

/// C10: Newton-Euler second derivatives plus the contact friction solve.
pub struct Accelerations {
    p_grav_torque: Option<PropertyId>,
    p_udot: [Option<PropertyId>; 3],
    p_pqrdot: [Option<PropertyId>; 3],
}

impl Accelerations {
    pub fn new() -> Self {
        Self {
            p_grav_torque: None,
            p_udot: [None; 3],
            p_pqrdot: [None; 3],
        }
    }
}

impl Default for Accelerations {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Accelerations {
    fn name(&self) -> &'static str {
        "accelerations"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "accelerations";
        self.p_grav_torque = Some(bus.publish(
            o,
            "simulation/gravitational-torque",
            0.0,
            Access::ReadWrite,
        )?);
        for (i, axis) in ["u", "v", "w"].iter().enumerate() {
            self.p_udot[i] = Some(bus.publish(
                o,
                &format!("accelerations/{}dot-ft_sec2", axis),
                0.0,
                Access::ReadOnly,
            )?);
        }
        for (i, axis) in ["p", "q", "r"].iter().enumerate() {
            self.p_pqrdot[i] = Some(bus.publish(
                o,
                &format!("accelerations/{}dot-rad_sec2", axis),
                0.0,
                Access::ReadOnly,
            )?);
        }
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        let state = &frame.state;
        let mass = frame.mass.mass;
        let j = &frame.mass.inertia;
        let j_inv = &frame.mass.inertia_inv;
        let ti2b = state.transforms.ti2b;
        let tec2b = state.transforms.tec2b;
        let omega_e = planet_rotation();
        let omega_e_b = ti2b * omega_e;
        let gravity_b = tec2b * frame.gravity_ecef;

        let mut out = AccelOutput::default();

        if env.run_state == RunState::HoldDown {
            // Attached to the rotating ground: the body state is frozen and
            // the ECI state follows the exact centripetal motion.
            out.uvw_dot = Vector3::zeros();
            out.pqr_dot = Vector3::zeros();
            out.pqr_idot = Vector3::zeros();
            out.uvw_idot = ti2b * omega_e.cross(&omega_e.cross(&state.r_eci));
        } else {
            // Moments are passed by value; the gravitational-torque path
            // augments a local copy, never the aircraft's accumulator.
            let mut moment = frame.total.moment;
            if self.p_grav_torque.map(|id| bus.get_bool(id)).unwrap_or(false) {
                let r = state.r_eci.norm();
                if r > 1.0 {
                    let r_hat = ti2b * (state.r_eci / r);
                    moment += 3.0 * frame.gravity_ecef.norm() / r * r_hat.cross(&(j * r_hat));
                }
            }

            let wi = state.pqr_i;
            out.pqr_idot = j_inv * (moment - wi.cross(&(j * wi)));
            // Transport of the (constant-in-ECI) planet rate into the
            // rotating body frame.
            out.pqr_dot = out.pqr_idot + state.pqr.cross(&omega_e_b);

            let specific_force = frame.total.force / mass;
            out.uvw_dot = specific_force
                - (state.pqr + 2.0 * omega_e_b).cross(&state.uvw)
                - ti2b * omega_e.cross(&omega_e.cross(&state.r_eci))
                + gravity_b;
            out.uvw_idot = specific_force + gravity_b;

            // Resolve multi-point friction against the pre-friction
            // accelerations, with a one-step kill of the residual motion
            // relative to the terrain.
            if !frame.gear.contacts.is_empty() {
                let terrain = env.ground.terrain(env.sim_time, &state.location);
                let v_terrain_b = state.transforms.tl2b * terrain.velocity;
                let w_terrain_b = state.transforms.tl2b * terrain.angular_velocity;
                let vdot_eff = out.uvw_dot + (state.uvw - v_terrain_b) / env.dt;
                let wdot_eff = out.pqr_dot + (state.pqr - w_terrain_b) / env.dt;
                out.friction = friction::solve(
                    &mut frame.gear.contacts,
                    mass,
                    j_inv,
                    &vdot_eff,
                    &wdot_eff,
                );
                let dv = out.friction.force / mass;
                let dw = j_inv * out.friction.moment;
                out.uvw_dot += dv;
                out.uvw_idot += dv;
                out.pqr_dot += dw;
                out.pqr_idot += dw;
            }
        }

        if !(out.uvw_dot.iter().all(|v| v.is_finite())
            && out.pqr_idot.iter().all(|v| v.is_finite()))
        {
            return Err(SimError::Numerical {
                module: "accelerations",
                detail: "non-finite acceleration".to_string(),
            });
        }

        for i in 0..3 {
            if let Some(id) = self.p_udot[i] {
                bus.set(id, out.uvw_dot[i]);
            }
            if let Some(id) = self.p_pqrdot[i] {
                bus.set(id, out.pqr_dot[i]);
            }
        }

        frame.accel = out;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earth::FlatGround;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    fn tick_env<'a>(ground: &'a FlatGround, run_state: RunState) -> TickEnv<'a> {
        TickEnv {
            dt: 1.0 / 120.0,
            sim_time: 0.0,
            frame: 0,
            run_state,
            integrate: true,
            ground,
        }
    }

    fn bound() -> (Accelerations, PropertyBus) {
        let mut module = Accelerations::new();
        let mut bus = PropertyBus::new();
        module.bind(&mut bus).unwrap();
        (module, bus)
    }

    #[test]
    fn pure_moment_spins_about_inertia() {
        let (mut module, mut bus) = bound();
        let mut frame = FrameData::default();
        frame.mass.mass = 100.0;
        frame.mass.weight = 3217.4;
        frame.mass.inertia = Matrix3::from_diagonal(&Vector3::new(500.0, 800.0, 1000.0));
        frame.mass.inertia_inv = Matrix3::from_diagonal(&Vector3::new(
            1.0 / 500.0,
            1.0 / 800.0,
            1.0 / 1000.0,
        ));
        frame.total.moment = Vector3::new(0.0, 400.0, 0.0);
        let ground = FlatGround::default();
        module
            .update(&mut frame, &mut bus, &tick_env(&ground, RunState::Running))
            .unwrap();
        assert_relative_eq!(frame.accel.pqr_idot.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn hold_down_zeroes_body_accelerations() {
        let (mut module, mut bus) = bound();
        let mut frame = FrameData::default();
        frame.mass.mass = 100.0;
        frame.total.force = Vector3::new(5000.0, 0.0, 0.0);
        frame.state.r_eci = Vector3::new(2.0e7, 0.0, 0.0);
        let ground = FlatGround::default();
        module
            .update(&mut frame, &mut bus, &tick_env(&ground, RunState::HoldDown))
            .unwrap();
        assert_eq!(frame.accel.uvw_dot, Vector3::zeros());
        assert_eq!(frame.accel.pqr_dot, Vector3::zeros());
        // The inertial acceleration is exactly the centripetal term.
        let omega_e = planet_rotation();
        let expected = omega_e.cross(&omega_e.cross(&frame.state.r_eci));
        assert_relative_eq!(frame.accel.uvw_idot.x, expected.x, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_force_is_a_numerical_fault() {
        let (mut module, mut bus) = bound();
        let mut frame = FrameData::default();
        frame.mass.mass = 100.0;
        frame.total.force = Vector3::new(f64::NAN, 0.0, 0.0);
        let ground = FlatGround::default();
        let err = module
            .update(&mut frame, &mut bus, &tick_env(&ground, RunState::Running))
            .unwrap_err();
        assert!(matches!(err, SimError::Numerical { .. }));
    }
}
