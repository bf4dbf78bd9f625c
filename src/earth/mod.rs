//! Planet model: rotation, gravitation, and the terrain interface.

pub mod location;

pub use location::Location;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::module::{Module, TickEnv};
use crate::executive::frame::FrameData;
use crate::utils::constants::{EARTH_GM, EARTH_J2, EARTH_OMEGA, ELLIPSOID_A};
use crate::utils::Result;

/// Terrain data under a query point, in the local (NED) frame at that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainInfo {
    /// Terrain elevation above the ellipsoid (ft).
    pub elevation: f64,
    /// Unit surface normal; (0, 0, -1) is level ground.
    pub normal: Vector3<f64>,
    /// Linear velocity of the surface (ft/s), e.g. a moving deck.
    pub velocity: Vector3<f64>,
    /// Angular velocity of the surface (rad/s).
    pub angular_velocity: Vector3<f64>,
}

impl Default for TerrainInfo {
    fn default() -> Self {
        Self {
            elevation: 0.0,
            normal: Vector3::new(0.0, 0.0, -1.0),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

/// Host-replaceable terrain query. The executive owns the active callback
/// and only swaps it while the simulation is Holding.
pub trait GroundCallback: Send {
    fn terrain(&self, sim_time: f64, loc: &Location) -> TerrainInfo;
}

/// Flat terrain at zero elevation, so AGL equals ASL when the host does not
/// supply anything better.
#[derive(Debug, Default)]
pub struct FlatGround {
    pub elevation: f64,
}

impl GroundCallback for FlatGround {
    fn terrain(&self, _sim_time: f64, _loc: &Location) -> TerrainInfo {
        TerrainInfo {
            elevation: self.elevation,
            ..TerrainInfo::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GravityModel {
    Spherical,
    WGS84J2,
}

/// Planet rotation vector in ECI (and ECEF): Z-aligned.
pub fn planet_rotation() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, EARTH_OMEGA)
}

/// Point-mass gravitation, along -r_hat (ECEF frame).
pub fn gravity_spherical(loc: &Location) -> Vector3<f64> {
    let r = loc.radius();
    -loc.ecef() * (EARTH_GM / (r * r * r))
}

/// WGS-84 gravitation with the J2 zonal correction (ECEF frame).
pub fn gravity_j2(loc: &Location) -> Vector3<f64> {
    let p = loc.ecef();
    let r = loc.radius();
    let sin_lat = loc.sin_latitude();
    let adivr = ELLIPSOID_A / r;
    let j2_term = 1.5 * EARTH_J2 * adivr * adivr;
    let pre = -EARTH_GM / (r * r);
    let xy = 1.0 + j2_term * (1.0 - 5.0 * sin_lat * sin_lat);
    let z = 1.0 + j2_term * (3.0 - 5.0 * sin_lat * sin_lat);
    Vector3::new(
        pre * xy * p.x / r,
        pre * xy * p.y / r,
        pre * z * p.z / r,
    )
}

/// Earth model pipeline module: evaluates the selected gravity model at the
/// current position each tick.
pub struct EarthModel {
    model_prop: Option<PropertyId>,
}

impl EarthModel {
    pub fn new() -> Self {
        Self { model_prop: None }
    }

    pub fn gravity(model: GravityModel, loc: &Location) -> Vector3<f64> {
        match model {
            GravityModel::Spherical => gravity_spherical(loc),
            GravityModel::WGS84J2 => gravity_j2(loc),
        }
    }
}

impl Default for EarthModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for EarthModel {
    fn name(&self) -> &'static str {
        "earth"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        // 0 = spherical, 1 = WGS-84 J2 (default)
        self.model_prop = Some(bus.publish(
            "earth",
            "simulation/gravity-model",
            1.0,
            Access::ReadWrite,
        )?);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, _env: &TickEnv) -> Result<()> {
        let model = match self.model_prop.map(|id| bus.get(id)) {
            Some(v) if v < 0.5 => GravityModel::Spherical,
            _ => GravityModel::WGS84J2,
        };
        frame.gravity_ecef = Self::gravity(model, &frame.state.location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::utils::constants::ELLIPSOID_B;

    #[test]
    fn spherical_gravity_at_equator_surface() {
        let loc = Location::from_geocentric(0.0, 0.0, ELLIPSOID_A);
        let g = gravity_spherical(&loc);
        assert_relative_eq!(g.norm(), 32.17, epsilon = 1e-3 * 32.17);
        // Directed along -r_hat
        assert!(g.x < 0.0);
        assert_relative_eq!(g.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(g.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn j2_gravity_stronger_at_poles() {
        let eq = Location::from_geocentric(0.0, 0.0, ELLIPSOID_A);
        let pole = Location::from_geocentric(0.0, std::f64::consts::FRAC_PI_2, ELLIPSOID_B);
        let g_eq = gravity_j2(&eq).norm();
        let g_pole = gravity_j2(&pole).norm();
        assert!(g_pole > g_eq, "{} <= {}", g_pole, g_eq);
    }

    #[test]
    fn j2_reduces_to_near_spherical_at_altitude() {
        let loc = Location::from_geocentric(1.0, 0.5, ELLIPSOID_A * 10.0);
        let gj2 = gravity_j2(&loc);
        let gs = gravity_spherical(&loc);
        assert_relative_eq!(gj2.norm(), gs.norm(), max_relative = 1e-4);
    }

    #[test]
    fn flat_ground_reports_level_terrain() {
        let ground = FlatGround::default();
        let info = ground.terrain(0.0, &Location::default());
        assert_eq!(info.elevation, 0.0);
        assert_relative_eq!(info.normal.z, -1.0, epsilon = 1e-15);
    }
}
