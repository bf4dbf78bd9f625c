use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::constants::{G_ACCEL, IN_TO_FT};
use crate::utils::{Result, SimError};

/// A discrete mass fixed to the airframe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointMass {
    pub name: String,
    /// slugs
    pub mass: f64,
    /// Structural frame, inches.
    pub location: Vector3<f64>,
}

/// Per-tank mass summary published by Propulsion for the mass balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TankMass {
    /// slugs
    pub mass: f64,
    /// Structural frame, inches.
    pub location: Vector3<f64>,
}

/// Static mass properties loaded from the aircraft file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassBalanceConfig {
    /// Empty weight (lbf).
    pub empty_weight: f64,
    /// Empty CG, structural frame (in).
    pub empty_cg: Vector3<f64>,
    /// Empty inertia about the empty CG, body axes (slug*ft^2):
    /// (ixx, iyy, izz, ixy, ixz, iyz).
    pub inertia: [f64; 6],
    pub point_masses: Vec<PointMass>,
}

impl Default for MassBalanceConfig {
    fn default() -> Self {
        Self {
            empty_weight: 1500.0,
            empty_cg: Vector3::new(39.0, 0.0, 36.0),
            inertia: [948.0, 1346.0, 1967.0, 0.0, 0.0, 0.0],
            point_masses: Vec::new(),
        }
    }
}

/// Current mass properties shared through the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassProperties {
    /// slugs
    pub mass: f64,
    /// lbf
    pub weight: f64,
    /// CG, structural frame (in).
    pub cg: Vector3<f64>,
    /// Inertia tensor about the current CG, body axes (slug*ft^2).
    pub inertia: Matrix3<f64>,
    pub inertia_inv: Matrix3<f64>,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            weight: G_ACCEL,
            cg: Vector3::zeros(),
            inertia: Matrix3::identity(),
            inertia_inv: Matrix3::identity(),
        }
    }
}

/// C5: assembles total mass, CG, and the inertia tensor each tick from the
/// empty airframe, point masses, and current fuel load.
pub struct MassBalance {
    config: MassBalanceConfig,
    p_mass: Option<PropertyId>,
    p_weight: Option<PropertyId>,
    p_cg: [Option<PropertyId>; 3],
    p_moments: [Option<PropertyId>; 3],
}

impl MassBalance {
    pub fn new(config: MassBalanceConfig) -> Self {
        Self {
            config,
            p_mass: None,
            p_weight: None,
            p_cg: [None; 3],
            p_moments: [None; 3],
        }
    }

    /// Closed-form inverse of a symmetric inertia tensor (Stevens & Lewis).
    pub fn invert_inertia(j: &Matrix3<f64>) -> Option<Matrix3<f64>> {
        let (ixx, iyy, izz) = (j[(0, 0)], j[(1, 1)], j[(2, 2)]);
        let (ixy, ixz, iyz) = (-j[(0, 1)], -j[(0, 2)], -j[(1, 2)]);
        let det = ixx * iyy * izz - ixx * iyz * iyz - iyy * ixz * ixz - izz * ixy * ixy
            - 2.0 * ixy * ixz * iyz;
        if det.abs() < 1.0e-12 {
            return None;
        }
        let k1 = (iyy * izz - iyz * iyz) / det;
        let k2 = (ixy * izz + ixz * iyz) / det;
        let k3 = (ixy * iyz + iyy * ixz) / det;
        let k4 = (ixx * izz - ixz * ixz) / det;
        let k5 = (ixx * iyz + ixy * ixz) / det;
        let k6 = (ixx * iyy - ixy * ixy) / det;
        Some(Matrix3::new(k1, k2, k3, k2, k4, k5, k3, k5, k6))
    }

    /// Point-mass inertia contribution about the CG for a body-frame offset
    /// r (ft): m (|r|^2 I - r r^T).
    fn point_inertia(mass: f64, r: &Vector3<f64>) -> Matrix3<f64> {
        let r2 = r.norm_squared();
        mass * (Matrix3::identity() * r2 - r * r.transpose())
    }

    /// Body-frame offset (ft) of a structural point from a structural CG.
    fn body_offset(point_in: &Vector3<f64>, cg_in: &Vector3<f64>) -> Vector3<f64> {
        let d = point_in - cg_in;
        Vector3::new(-d.x, d.y, -d.z) * IN_TO_FT
    }

    /// Assemble the mass properties for a given tank loading.
    pub fn properties(&self, tanks: &[TankMass]) -> Result<MassProperties> {
        let empty_mass = self.config.empty_weight / G_ACCEL;
        let mut total = empty_mass;
        let mut moment = self.config.empty_cg * empty_mass;

        for pm in &self.config.point_masses {
            total += pm.mass;
            moment += pm.location * pm.mass;
        }
        for tank in tanks {
            total += tank.mass;
            moment += tank.location * tank.mass;
        }
        if total <= 0.0 {
            return Err(SimError::Numerical {
                module: "mass-balance",
                detail: "non-positive total mass".to_string(),
            });
        }
        let cg = moment / total;

        // Empty inertia about the empty CG, shifted to the instantaneous CG.
        let [ixx, iyy, izz, ixy, ixz, iyz] = self.config.inertia;
        let mut j = Matrix3::new(ixx, -ixy, -ixz, -ixy, iyy, -iyz, -ixz, -iyz, izz);
        j += Self::point_inertia(empty_mass, &Self::body_offset(&self.config.empty_cg, &cg));
        for pm in &self.config.point_masses {
            j += Self::point_inertia(pm.mass, &Self::body_offset(&pm.location, &cg));
        }
        for tank in tanks {
            j += Self::point_inertia(tank.mass, &Self::body_offset(&tank.location, &cg));
        }

        let j_inv = Self::invert_inertia(&j).ok_or_else(|| SimError::Numerical {
            module: "mass-balance",
            detail: "singular inertia tensor".to_string(),
        })?;

        Ok(MassProperties {
            mass: total,
            weight: total * G_ACCEL,
            cg,
            inertia: j,
            inertia_inv: j_inv,
        })
    }
}

impl Module for MassBalance {
    fn name(&self) -> &'static str {
        "mass-balance"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "mass-balance";
        self.p_mass = Some(bus.publish(o, "inertia/mass-slugs", 0.0, Access::ReadOnly)?);
        self.p_weight = Some(bus.publish(o, "inertia/weight-lbs", 0.0, Access::ReadOnly)?);
        for (i, axis) in ["x", "y", "z"].iter().enumerate() {
            self.p_cg[i] = Some(bus.publish(
                o,
                &format!("inertia/cg-{}-in", axis),
                0.0,
                Access::ReadOnly,
            )?);
        }
        for (i, name) in ["ixx", "iyy", "izz"].iter().enumerate() {
            self.p_moments[i] = Some(bus.publish(
                o,
                &format!("inertia/{}-slugs_ft2", name),
                0.0,
                Access::ReadOnly,
            )?);
        }
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, _env: &TickEnv) -> Result<()> {
        let props = self.properties(&frame.tanks)?;

        if let Some(id) = self.p_mass {
            bus.set(id, props.mass);
        }
        if let Some(id) = self.p_weight {
            bus.set(id, props.weight);
        }
        for i in 0..3 {
            if let Some(id) = self.p_cg[i] {
                bus.set(id, props.cg[i]);
            }
            if let Some(id) = self.p_moments[i] {
                bus.set(id, props.inertia[(i, i)]);
            }
        }
        frame.mass = props;
        Ok(())
    }
}
