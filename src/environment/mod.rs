//! Atmosphere, winds, and turbulence.

pub mod atmosphere;
pub mod turbulence;

pub use atmosphere::{AtmosProps, StandardAtmosphere};
pub use turbulence::{Turbulence, TurbulenceKind, TurbulenceSample};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::constants::{SL_DENSITY, SL_PRESSURE};
use crate::utils::Result;

/// Environment outputs shared with the rest of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmosphereState {
    pub temperature: f64,
    pub pressure: f64,
    pub density: f64,
    pub sound_speed: f64,
    /// density / sea-level density
    pub sigma: f64,
    /// pressure / sea-level pressure
    pub delta: f64,
    /// Steady wind, NED (ft/s).
    pub wind_ned: Vector3<f64>,
    /// Steady wind plus gusts, NED (ft/s).
    pub total_wind_ned: Vector3<f64>,
    /// Turbulence body-rate disturbance (rad/s).
    pub turb_rates: Vector3<f64>,
    /// Altitude above terrain from the ground callback (ft).
    pub altitude_agl: f64,
    /// Terrain elevation under the vehicle (ft).
    pub terrain_elevation: f64,
}

impl Default for AtmosphereState {
    fn default() -> Self {
        Self {
            temperature: 518.67,
            pressure: SL_PRESSURE,
            density: SL_DENSITY,
            sound_speed: 1116.45,
            sigma: 1.0,
            delta: 1.0,
            wind_ned: Vector3::zeros(),
            total_wind_ned: Vector3::zeros(),
            turb_rates: Vector3::zeros(),
            altitude_agl: 0.0,
            terrain_elevation: 0.0,
        }
    }
}

/// C4: standard atmosphere lookup, winds, turbulence.
pub struct Environment {
    atmosphere: StandardAtmosphere,
    turbulence: Turbulence,
    wingspan: f64,

    delta_t: Option<PropertyId>,
    wind_north: Option<PropertyId>,
    wind_east: Option<PropertyId>,
    wind_down: Option<PropertyId>,
    turb_type: Option<PropertyId>,
    turb_intensity: Option<PropertyId>,
    turb_seed: Option<PropertyId>,
    p_temperature: Option<PropertyId>,
    p_pressure: Option<PropertyId>,
    p_density: Option<PropertyId>,
    p_sound: Option<PropertyId>,

    seed_in_use: u64,
}

impl Environment {
    pub fn new(wingspan: f64) -> Self {
        Self {
            atmosphere: StandardAtmosphere::new(),
            turbulence: Turbulence::new(0),
            wingspan,
            delta_t: None,
            wind_north: None,
            wind_east: None,
            wind_down: None,
            turb_type: None,
            turb_intensity: None,
            turb_seed: None,
            p_temperature: None,
            p_pressure: None,
            p_density: None,
            p_sound: None,
            seed_in_use: 0,
        }
    }

    pub fn atmosphere(&self) -> &StandardAtmosphere {
        &self.atmosphere
    }

    pub fn atmosphere_mut(&mut self) -> &mut StandardAtmosphere {
        &mut self.atmosphere
    }
}

impl Module for Environment {
    fn name(&self) -> &'static str {
        "atmosphere"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "atmosphere";
        self.delta_t = Some(bus.publish(o, "atmosphere/delta-T", 0.0, Access::ReadWrite)?);
        self.wind_north = Some(bus.publish(o, "atmosphere/wind-north-fps", 0.0, Access::ReadWrite)?);
        self.wind_east = Some(bus.publish(o, "atmosphere/wind-east-fps", 0.0, Access::ReadWrite)?);
        self.wind_down = Some(bus.publish(o, "atmosphere/wind-down-fps", 0.0, Access::ReadWrite)?);
        self.turb_type = Some(bus.publish(o, "atmosphere/turb-type", 0.0, Access::ReadWrite)?);
        self.turb_intensity = Some(bus.publish(
            o,
            "atmosphere/turbulence-magnitude-fps",
            0.0,
            Access::ReadWrite,
        )?);
        self.turb_seed = Some(bus.publish(o, "atmosphere/turb-seed", 0.0, Access::ReadWrite)?);
        self.p_temperature = Some(bus.publish(o, "atmosphere/T-R", 518.67, Access::ReadOnly)?);
        self.p_pressure = Some(bus.publish(o, "atmosphere/P-psf", SL_PRESSURE, Access::ReadOnly)?);
        self.p_density = Some(bus.publish(
            o,
            "atmosphere/rho-slugs_ft3",
            SL_DENSITY,
            Access::ReadOnly,
        )?);
        self.p_sound = Some(bus.publish(o, "atmosphere/a-fps", 1116.45, Access::ReadOnly)?);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        self.atmosphere.delta_t = self.delta_t.map(|id| bus.get(id)).unwrap_or(0.0);

        let altitude = frame.state.location.geodetic_altitude();
        let props = self.atmosphere.at(altitude);

        let terrain = env.ground.terrain(env.sim_time, &frame.state.location);
        let agl = altitude - terrain.elevation;

        let seed = self.turb_seed.map(|id| bus.get(id) as u64).unwrap_or(0);
        if seed != self.seed_in_use {
            self.turbulence.reseed(seed);
            self.seed_in_use = seed;
        }

        let kind = TurbulenceKind::from_index(self.turb_type.map(|id| bus.get(id)).unwrap_or(0.0));
        let intensity = self.turb_intensity.map(|id| bus.get(id)).unwrap_or(0.0);
        let sample = self.turbulence.step(
            kind,
            env.dt,
            intensity,
            frame.air.vt,
            self.wingspan,
            agl,
        );

        let wind = Vector3::new(
            self.wind_north.map(|id| bus.get(id)).unwrap_or(0.0),
            self.wind_east.map(|id| bus.get(id)).unwrap_or(0.0),
            self.wind_down.map(|id| bus.get(id)).unwrap_or(0.0),
        );

        frame.atmos = AtmosphereState {
            temperature: props.temperature,
            pressure: props.pressure,
            density: props.density,
            sound_speed: props.sound_speed,
            sigma: props.density / SL_DENSITY,
            delta: props.pressure / SL_PRESSURE,
            wind_ned: wind,
            total_wind_ned: wind + sample.linear_ned,
            turb_rates: sample.rates,
            altitude_agl: agl,
            terrain_elevation: terrain.elevation,
        };

        if let Some(id) = self.p_temperature {
            bus.set(id, props.temperature);
        }
        if let Some(id) = self.p_pressure {
            bus.set(id, props.pressure);
        }
        if let Some(id) = self.p_density {
            bus.set(id, props.density);
        }
        if let Some(id) = self.p_sound {
            bus.set(id, props.sound_speed);
        }
        Ok(())
    }
}
