//! Aerodynamic force and moment assembly.
//!
//! Six axis buckets keyed {Drag, Side, Lift, Roll, Pitch, Yaw}, each an
//! ordered list of coefficient functions, plus shared function variables
//! evaluated once per tick and republished on the bus.

pub mod functions;
pub mod tables;

pub use functions::{AeroFunction, FunctionNode};
pub use tables::{Table1D, Table2D};

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::{structural_to_body, Result};
use crate::vehicle::Metrics;

/// Axis bucket order. The first three are stability-axis forces, the last
/// three body-axis moments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeroAxis {
    Drag = 0,
    Side = 1,
    Lift = 2,
    Roll = 3,
    Pitch = 4,
    Yaw = 5,
}

impl AeroAxis {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "DRAG" => Some(AeroAxis::Drag),
            "SIDE" => Some(AeroAxis::Side),
            "LIFT" => Some(AeroAxis::Lift),
            "ROLL" => Some(AeroAxis::Roll),
            "PITCH" => Some(AeroAxis::Pitch),
            "YAW" => Some(AeroAxis::Yaw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AeroConfig {
    /// Angle of attack at CLmax (rad); drives the impending-stall signal.
    pub alpha_clmax: f64,
    /// Stall hysteresis band (rad): (re-arm threshold, trip threshold).
    pub hysteresis_limits: Option<(f64, f64)>,
    /// Shared precomputed variables, republished as properties by name.
    pub functions: Vec<AeroFunction>,
    /// Per-axis force/moment terms.
    pub axes: [Vec<AeroFunction>; 6],
}

/// Aerodynamics outputs for the frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AeroOutput {
    /// Body-frame force (lbf).
    pub force: Vector3<f64>,
    /// Body-frame moment about the CG (lbf*ft).
    pub moment: Vector3<f64>,
    /// Wind-axis forces (drag, side, lift), conventional positive (lbf).
    pub fw: Vector3<f64>,
    pub cl_squared: f64,
    pub lod: f64,
    pub stall_warn: f64,
    pub stall_hyst: bool,
    pub bi2vel: f64,
    pub ci2vel: f64,
}

/// C6: evaluates the coefficient buckets and assembles body force/moment.
pub struct Aerodynamics {
    config: AeroConfig,
    metrics: Metrics,
    stall_hyst: bool,

    function_props: Vec<PropertyId>,
    p_bi2vel: Option<PropertyId>,
    p_ci2vel: Option<PropertyId>,
    p_cl_sq: Option<PropertyId>,
    p_lod: Option<PropertyId>,
    p_stall_warn: Option<PropertyId>,
    p_stall_hyst: Option<PropertyId>,
    p_alpha_max: Option<PropertyId>,
    p_fw: [Option<PropertyId>; 3],
}

impl Aerodynamics {
    pub fn new(config: AeroConfig, metrics: Metrics) -> Self {
        Self {
            config,
            metrics,
            stall_hyst: false,
            function_props: Vec::new(),
            p_bi2vel: None,
            p_ci2vel: None,
            p_cl_sq: None,
            p_lod: None,
            p_stall_warn: None,
            p_stall_hyst: None,
            p_alpha_max: None,
            p_fw: [None; 3],
        }
    }

    /// Wind-to-body rotation from angle of attack and sideslip.
    pub fn tw2b(alpha: f64, beta: f64) -> Matrix3<f64> {
        let (sa, ca) = alpha.sin_cos();
        let (sb, cb) = beta.sin_cos();
        Matrix3::new(
            ca * cb,
            -ca * sb,
            -sa,
            sb,
            cb,
            0.0,
            sa * cb,
            -sa * sb,
            ca,
        )
    }
}

impl Module for Aerodynamics {
    fn name(&self) -> &'static str {
        "aerodynamics"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "aerodynamics";
        for f in &mut self.config.functions {
            f.resolve(bus);
            self.function_props.push(bus.touch(o, &f.name));
        }
        for axis in &mut self.config.axes {
            for f in axis {
                f.resolve(bus);
            }
        }
        self.p_bi2vel = Some(bus.publish(o, "aero/bi2vel", 0.0, Access::ReadOnly)?);
        self.p_ci2vel = Some(bus.publish(o, "aero/ci2vel", 0.0, Access::ReadOnly)?);
        self.p_cl_sq = Some(bus.publish(o, "aero/cl-squared", 0.0, Access::ReadOnly)?);
        self.p_lod = Some(bus.publish(o, "aero/lod-norm", 0.0, Access::ReadOnly)?);
        self.p_stall_warn = Some(bus.publish(o, "aero/stall-warn-norm", 0.0, Access::ReadOnly)?);
        self.p_stall_hyst = Some(bus.publish(o, "aero/stall-hyst-norm", 0.0, Access::ReadOnly)?);
        self.p_alpha_max = Some(bus.publish(
            o,
            "aero/alpha-max-rad",
            self.config.alpha_clmax,
            Access::ReadWrite,
        )?);
        for (i, name) in ["drag", "side", "lift"].iter().enumerate() {
            self.p_fw[i] = Some(bus.publish(
                o,
                &format!("forces/fw-{}-lbs", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, _env: &TickEnv) -> Result<()> {
        let alpha = frame.air.alpha;
        let beta = frame.air.beta;
        let vt = frame.air.vt;

        // Velocity ratios feed many coefficient tables; publish before the
        // axis sums are evaluated.
        let (bi2vel, ci2vel) = if vt > 0.1 {
            (
                self.metrics.wing_span / (2.0 * vt),
                self.metrics.chord / (2.0 * vt),
            )
        } else {
            (0.0, 0.0)
        };
        if let Some(id) = self.p_bi2vel {
            bus.set(id, bi2vel);
        }
        if let Some(id) = self.p_ci2vel {
            bus.set(id, ci2vel);
        }

        // 1. shared variables, evaluated once and cached on the bus
        for (f, &id) in self.config.functions.iter().zip(&self.function_props) {
            let v = f.eval(bus);
            bus.set(id, v);
        }

        // 2. stability-axis force sums
        let drag: f64 = self.config.axes[AeroAxis::Drag as usize]
            .iter()
            .map(|f| f.eval(bus))
            .sum();
        let side: f64 = self.config.axes[AeroAxis::Side as usize]
            .iter()
            .map(|f| f.eval(bus))
            .sum();
        let lift: f64 = self.config.axes[AeroAxis::Lift as usize]
            .iter()
            .map(|f| f.eval(bus))
            .sum();

        // 3./4. flip into wind convention and rotate to body axes
        let fw = Vector3::new(-drag, side, -lift);
        let force = Self::tw2b(alpha, beta) * fw;

        // 5./6. moment about the CG
        let arm = structural_to_body(&self.metrics.aero_rp, &frame.mass.cg);
        let mut moment = arm.cross(&force);
        for (i, axis) in [AeroAxis::Roll, AeroAxis::Pitch, AeroAxis::Yaw]
            .iter()
            .enumerate()
        {
            moment[i] += self.config.axes[*axis as usize]
                .iter()
                .map(|f| f.eval(bus))
                .sum::<f64>();
        }

        // derived observables
        let qbar_s = frame.air.qbar * self.metrics.wing_area;
        let (cl_squared, lod) = if qbar_s > 1.0e-9 {
            let cl = lift / qbar_s;
            let lod = if drag.abs() > 1.0e-9 {
                (lift / drag).abs()
            } else {
                0.0
            };
            (cl * cl, lod)
        } else {
            (0.0, 0.0)
        };

        let alpha_max = self
            .p_alpha_max
            .map(|id| bus.get(id))
            .unwrap_or(self.config.alpha_clmax);
        let stall_warn = if alpha_max > 0.0 && alpha > 0.85 * alpha_max {
            10.0 * (alpha / alpha_max - 0.85)
        } else {
            0.0
        };
        if let Some((lo, hi)) = self.config.hysteresis_limits {
            if alpha > hi {
                self.stall_hyst = true;
            } else if alpha < lo {
                self.stall_hyst = false;
            }
        }

        if let Some(id) = self.p_cl_sq {
            bus.set(id, cl_squared);
        }
        if let Some(id) = self.p_lod {
            bus.set(id, lod);
        }
        if let Some(id) = self.p_stall_warn {
            bus.set(id, stall_warn);
        }
        if let Some(id) = self.p_stall_hyst {
            bus.set(id, if self.stall_hyst { 1.0 } else { 0.0 });
        }
        for (i, value) in [drag, side, lift].iter().enumerate() {
            if let Some(id) = self.p_fw[i] {
                bus.set(id, *value);
            }
        }

        frame.aero = AeroOutput {
            force,
            moment,
            fw: Vector3::new(drag, side, lift),
            cl_squared,
            lod,
            stall_warn,
            stall_hyst: self.stall_hyst,
            bi2vel,
            ci2vel,
        };
        Ok(())
    }
}
