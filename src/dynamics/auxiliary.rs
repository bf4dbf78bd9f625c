use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::constants::{FPS_TO_KTS, G_ACCEL, SL_DENSITY, SL_PRESSURE, SL_SOUND_SPEED};
use crate::utils::{structural_to_body, Result};
use crate::vehicle::Metrics;

/// Derived flight observables, recomputed every tick after propagation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AirData {
    /// Velocity relative to the airmass, body frame (ft/s).
    pub v_aero: Vector3<f64>,
    pub vt: f64,
    pub mach: f64,
    pub mach_u: f64,
    pub alpha: f64,
    pub beta: f64,
    pub alpha_dot: f64,
    pub beta_dot: f64,
    pub qbar: f64,
    pub qbar_uw: f64,
    pub qbar_uv: f64,
    /// Calibrated airspeed (ft/s).
    pub vcas: f64,
    /// Equivalent airspeed (ft/s).
    pub veas: f64,
    /// Flight-path angle (rad).
    pub gamma: f64,
    /// Ground track (rad).
    pub psi_gt: f64,
    /// Ground speed (ft/s).
    pub vg: f64,
    /// Pilot-sensed specific force at the eyepoint, body frame (ft/s^2).
    pub n_pilot: Vector3<f64>,
    /// Normal load factor at the eyepoint, g.
    pub nz: f64,
}

/// Calibrated airspeed from impact pressure at the static port.
///
/// Subsonic: isentropic pitot formula. Supersonic: Rayleigh pitot, inverted
/// by bisection on the sea-level calibration.
pub fn calibrated_airspeed(mach: f64, pressure: f64) -> f64 {
    if mach <= 0.0 {
        return 0.0;
    }
    let qc = if mach <= 1.0 {
        pressure * ((1.0 + 0.2 * mach * mach).powf(3.5) - 1.0)
    } else {
        let m2 = mach * mach;
        pressure * (166.921_458 * mach.powi(7) / (7.0 * m2 - 1.0).powf(2.5) - 1.0)
    };
    let ratio = qc / SL_PRESSURE;

    let subsonic = (7.0 * SL_PRESSURE / SL_DENSITY * ((ratio + 1.0).powf(2.0 / 7.0) - 1.0))
        .max(0.0)
        .sqrt();
    if subsonic <= SL_SOUND_SPEED {
        return subsonic;
    }
    // The calibrated reading is itself supersonic; invert Rayleigh at SL.
    let target = ratio + 1.0;
    let rayleigh = |m: f64| 166.921_458 * m.powi(7) / (7.0 * m * m - 1.0).powf(2.5);
    let (mut lo, mut hi) = (1.0, 10.0);
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if rayleigh(mid) < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi) * SL_SOUND_SPEED
}

/// C12: derived observables.
pub struct Auxiliary {
    metrics: Metrics,

    p_vt: Option<PropertyId>,
    p_vc: Option<PropertyId>,
    p_ve: Option<PropertyId>,
    p_vg: Option<PropertyId>,
    p_mach: Option<PropertyId>,
    p_mach_u: Option<PropertyId>,
    p_alpha: Option<PropertyId>,
    p_alpha_deg: Option<PropertyId>,
    p_beta: Option<PropertyId>,
    p_beta_deg: Option<PropertyId>,
    p_alpha_dot: Option<PropertyId>,
    p_beta_dot: Option<PropertyId>,
    p_qbar: Option<PropertyId>,
    p_qbar_uw: Option<PropertyId>,
    p_qbar_uv: Option<PropertyId>,
    p_gamma: Option<PropertyId>,
    p_psi_gt: Option<PropertyId>,
    p_nz: Option<PropertyId>,
    p_epa: Option<PropertyId>,
    p_sim_time: Option<PropertyId>,
    p_uvw_aero: [Option<PropertyId>; 3],
    p_pqr_aero: [Option<PropertyId>; 3],
}

impl Auxiliary {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            p_vt: None,
            p_vc: None,
            p_ve: None,
            p_vg: None,
            p_mach: None,
            p_mach_u: None,
            p_alpha: None,
            p_alpha_deg: None,
            p_beta: None,
            p_beta_deg: None,
            p_alpha_dot: None,
            p_beta_dot: None,
            p_qbar: None,
            p_qbar_uw: None,
            p_qbar_uv: None,
            p_gamma: None,
            p_psi_gt: None,
            p_nz: None,
            p_epa: None,
            p_sim_time: None,
            p_uvw_aero: [None; 3],
            p_pqr_aero: [None; 3],
        }
    }
}

impl Module for Auxiliary {
    fn name(&self) -> &'static str {
        "auxiliary"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "auxiliary";
        self.p_vt = Some(bus.publish(o, "velocities/vt-fps", 0.0, Access::ReadOnly)?);
        self.p_vc = Some(bus.publish(o, "velocities/vc-kts", 0.0, Access::ReadOnly)?);
        self.p_ve = Some(bus.publish(o, "velocities/ve-kts", 0.0, Access::ReadOnly)?);
        self.p_vg = Some(bus.publish(o, "velocities/vg-fps", 0.0, Access::ReadOnly)?);
        self.p_mach = Some(bus.publish(o, "velocities/mach", 0.0, Access::ReadOnly)?);
        self.p_mach_u = Some(bus.publish(o, "velocities/machU", 0.0, Access::ReadOnly)?);
        self.p_alpha = Some(bus.publish(o, "aero/alpha-rad", 0.0, Access::ReadOnly)?);
        self.p_alpha_deg = Some(bus.publish(o, "aero/alpha-deg", 0.0, Access::ReadOnly)?);
        self.p_beta = Some(bus.publish(o, "aero/beta-rad", 0.0, Access::ReadOnly)?);
        self.p_beta_deg = Some(bus.publish(o, "aero/beta-deg", 0.0, Access::ReadOnly)?);
        self.p_alpha_dot = Some(bus.publish(o, "aero/alphadot-rad_sec", 0.0, Access::ReadOnly)?);
        self.p_beta_dot = Some(bus.publish(o, "aero/betadot-rad_sec", 0.0, Access::ReadOnly)?);
        self.p_qbar = Some(bus.publish(o, "aero/qbar-psf", 0.0, Access::ReadOnly)?);
        self.p_qbar_uw = Some(bus.publish(o, "aero/qbarUW-psf", 0.0, Access::ReadOnly)?);
        self.p_qbar_uv = Some(bus.publish(o, "aero/qbarUV-psf", 0.0, Access::ReadOnly)?);
        self.p_gamma = Some(bus.publish(o, "flight-path/gamma-rad", 0.0, Access::ReadOnly)?);
        self.p_psi_gt = Some(bus.publish(o, "flight-path/psi-gt-rad", 0.0, Access::ReadOnly)?);
        self.p_nz = Some(bus.publish(o, "accelerations/nz", 0.0, Access::ReadOnly)?);
        self.p_epa = Some(bus.publish(o, "position/epa-rad", 0.0, Access::ReadOnly)?);
        self.p_sim_time = Some(bus.publish(o, "sim-time-sec", 0.0, Access::ReadOnly)?);
        for (i, name) in ["u", "v", "w"].iter().enumerate() {
            self.p_uvw_aero[i] = Some(bus.publish(
                o,
                &format!("velocities/{}-aero-fps", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        // Body rates relative to the (possibly turbulent) airmass; the
        // aerodynamic damping terms look these up.
        for (i, name) in ["p", "q", "r"].iter().enumerate() {
            self.p_pqr_aero[i] = Some(bus.publish(
                o,
                &format!("velocities/{}-aero-rad_sec", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        let state = &frame.state;
        let atmos = &frame.atmos;

        let v_aero = state.uvw + state.transforms.tl2b * atmos.total_wind_ned;
        let (u, v, w) = (v_aero.x, v_aero.y, v_aero.z);
        let vt = v_aero.norm();
        let m_uw2 = u * u + w * w;
        let m_uw = m_uw2.sqrt();

        let alpha = if m_uw2 < 1.0e-12 { 0.0 } else { w.atan2(u) };
        let beta = if vt < 1.0e-6 {
            0.0
        } else {
            let reference = if u < 0.0 { -m_uw } else { m_uw };
            v.atan2(reference)
        };

        // Analytic rates from the body accelerations of the previous solve.
        let udot = frame.accel.uvw_dot.x;
        let vdot = frame.accel.uvw_dot.y;
        let wdot = frame.accel.uvw_dot.z;
        let alpha_dot = if m_uw2 > 1.0e-6 {
            (u * wdot - w * udot) / m_uw2
        } else {
            0.0
        };
        let beta_dot = if vt > 1.0 && m_uw > 1.0e-6 {
            (vdot * m_uw - v * (u * udot + w * wdot) / m_uw) / (vt * vt)
        } else {
            0.0
        };

        let qbar = 0.5 * atmos.density * vt * vt;
        let qbar_uw = 0.5 * atmos.density * m_uw2;
        let qbar_uv = 0.5 * atmos.density * (u * u + v * v);

        let mach = if atmos.sound_speed > 0.0 {
            vt / atmos.sound_speed
        } else {
            0.0
        };
        let mach_u = if atmos.sound_speed > 0.0 {
            u.max(0.0) / atmos.sound_speed
        } else {
            0.0
        };
        let vcas = calibrated_airspeed(mach, atmos.pressure);
        let veas = vt * (atmos.density / SL_DENSITY).max(0.0).sqrt();

        let gamma = if vt > 1.0e-6 {
            (-state.v_ned.z / vt).clamp(-1.0, 1.0).asin()
        } else {
            0.0
        };
        let vg = (state.v_ned.x * state.v_ned.x + state.v_ned.y * state.v_ned.y).sqrt();
        let psi_gt = if vg > 1.0e-6 {
            state.v_ned.y.atan2(state.v_ned.x)
        } else {
            state.euler.psi
        };

        // Specific force at the pilot's eye.
        let gravity_b = state.transforms.tec2b * frame.gravity_ecef;
        let n_pilot = if vt > 1.0 {
            let r_eye = structural_to_body(&self.metrics.eyepoint, &frame.mass.cg);
            frame.total.force / frame.mass.mass
                + frame.accel.pqr_dot.cross(&r_eye)
                + state.pqr.cross(&state.pqr.cross(&r_eye))
        } else {
            -gravity_b
        };
        let nz = -n_pilot.z / G_ACCEL;

        frame.air = AirData {
            v_aero,
            vt,
            mach,
            mach_u,
            alpha,
            beta,
            alpha_dot,
            beta_dot,
            qbar,
            qbar_uw,
            qbar_uv,
            vcas,
            veas,
            gamma,
            psi_gt,
            vg,
            n_pilot,
            nz,
        };

        let writes: [(Option<PropertyId>, f64); 20] = [
            (self.p_vt, vt),
            (self.p_vc, vcas * FPS_TO_KTS),
            (self.p_ve, veas * FPS_TO_KTS),
            (self.p_vg, vg),
            (self.p_mach, mach),
            (self.p_mach_u, mach_u),
            (self.p_alpha, alpha),
            (self.p_alpha_deg, alpha.to_degrees()),
            (self.p_beta, beta),
            (self.p_beta_deg, beta.to_degrees()),
            (self.p_alpha_dot, alpha_dot),
            (self.p_beta_dot, beta_dot),
            (self.p_qbar, qbar),
            (self.p_qbar_uw, qbar_uw),
            (self.p_qbar_uv, qbar_uv),
            (self.p_gamma, gamma),
            (self.p_psi_gt, psi_gt),
            (self.p_nz, nz),
            (self.p_epa, state.epa),
            (self.p_sim_time, env.sim_time),
        ];
        for (id, value) in writes {
            if let Some(id) = id {
                bus.set(id, value);
            }
        }
        let pqr_aero = state.pqr + frame.atmos.turb_rates;
        for i in 0..3 {
            if let Some(id) = self.p_uvw_aero[i] {
                bus.set(id, frame.air.v_aero[i]);
            }
            if let Some(id) = self.p_pqr_aero[i] {
                bus.set(id, pqr_aero[i]);
            }
        }
        Ok(())
    }
}
