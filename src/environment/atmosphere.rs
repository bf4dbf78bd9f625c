use serde::{Deserialize, Serialize};

use crate::utils::constants::{
    AIR_GAS_CONSTANT, GAMMA_AIR, G_ACCEL, SL_PRESSURE, SL_TEMPERATURE, TROPOPAUSE_ALT,
};

/// US Standard Atmosphere 1976 breakpoints: geopotential altitude (ft) and
/// temperature (degR). Seven segments up to the mesopause.
const BREAKPOINTS: [(f64, f64); 8] = [
    (0.0, 518.67),
    (36_089.239, 389.97),
    (65_616.798, 389.97),
    (104_986.878, 411.57),
    (154_199.475, 487.17),
    (167_322.835, 487.17),
    (232_939.632, 386.37),
    (278_385.827, 336.5028),
];

/// A lapse-rate segment is treated as isothermal below this gradient.
const ISOTHERMAL_EPS: f64 = 1.0e-9;

/// Static air properties at one altitude.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AtmosProps {
    /// degR
    pub temperature: f64,
    /// lbf/ft^2
    pub pressure: f64,
    /// slug/ft^3
    pub density: f64,
    /// ft/s
    pub sound_speed: f64,
}

/// Banded standard atmosphere with optional temperature biasing.
///
/// `delta_t` is a constant offset applied at all altitudes; `sl_bias` is a
/// sea-level offset that tapers linearly to zero at the tropopause. Pressure
/// follows the unbiased standard profile; density is recomputed from the
/// biased temperature through the gas law.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardAtmosphere {
    /// Reference pressure at each breakpoint, computed once (lbf/ft^2).
    ref_pressure: [f64; 8],
    pub delta_t: f64,
    pub sl_bias: f64,
}

impl Default for StandardAtmosphere {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardAtmosphere {
    pub fn new() -> Self {
        let mut ref_pressure = [0.0; 8];
        ref_pressure[0] = SL_PRESSURE;
        for i in 0..7 {
            let (h0, t0) = BREAKPOINTS[i];
            let (h1, t1) = BREAKPOINTS[i + 1];
            let lapse = (t1 - t0) / (h1 - h0);
            ref_pressure[i + 1] = if lapse.abs() < ISOTHERMAL_EPS {
                ref_pressure[i] * (-G_ACCEL * (h1 - h0) / (AIR_GAS_CONSTANT * t0)).exp()
            } else {
                ref_pressure[i] * (t1 / t0).powf(-G_ACCEL / (lapse * AIR_GAS_CONSTANT))
            };
        }
        Self {
            ref_pressure,
            delta_t: 0.0,
            sl_bias: 0.0,
        }
    }

    /// Set the sea-level temperature (degR); the implied bias tapers to zero
    /// at the tropopause.
    pub fn set_sl_temperature(&mut self, t: f64) {
        self.sl_bias = t - SL_TEMPERATURE;
    }

    fn segment(altitude: f64) -> usize {
        let mut i = 0;
        while i < 6 && altitude >= BREAKPOINTS[i + 1].0 {
            i += 1;
        }
        i
    }

    /// Unbiased standard temperature (degR) at a geopotential altitude (ft).
    pub fn std_temperature(&self, altitude: f64) -> f64 {
        let h = altitude.max(0.0);
        let i = Self::segment(h);
        let (h0, t0) = BREAKPOINTS[i];
        let (h1, t1) = BREAKPOINTS[i + 1];
        let lapse = (t1 - t0) / (h1 - h0);
        t0 + lapse * (h.min(BREAKPOINTS[7].0) - h0)
    }

    /// Temperature including biases (degR).
    pub fn temperature(&self, altitude: f64) -> f64 {
        let taper = (1.0 - altitude / TROPOPAUSE_ALT).clamp(0.0, 1.0);
        self.std_temperature(altitude) + self.delta_t + self.sl_bias * taper
    }

    /// Standard pressure (lbf/ft^2).
    pub fn pressure(&self, altitude: f64) -> f64 {
        let h = altitude.max(0.0).min(BREAKPOINTS[7].0);
        let i = Self::segment(h);
        let (h0, t0) = BREAKPOINTS[i];
        let (h1, t1) = BREAKPOINTS[i + 1];
        let lapse = (t1 - t0) / (h1 - h0);
        if lapse.abs() < ISOTHERMAL_EPS {
            self.ref_pressure[i] * (-G_ACCEL * (h - h0) / (AIR_GAS_CONSTANT * t0)).exp()
        } else {
            let t = t0 + lapse * (h - h0);
            self.ref_pressure[i] * (t / t0).powf(-G_ACCEL / (lapse * AIR_GAS_CONSTANT))
        }
    }

    /// All static properties at a geopotential altitude (ft).
    pub fn at(&self, altitude: f64) -> AtmosProps {
        let temperature = self.temperature(altitude);
        let pressure = self.pressure(altitude);
        let density = pressure / (AIR_GAS_CONSTANT * temperature);
        let sound_speed = (GAMMA_AIR * AIR_GAS_CONSTANT * temperature).sqrt();
        AtmosProps {
            temperature,
            pressure,
            density,
            sound_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{SL_DENSITY, SL_SOUND_SPEED};
    use approx::assert_relative_eq;

    #[test]
    fn sea_level_constants() {
        let atm = StandardAtmosphere::new();
        let p = atm.at(0.0);
        assert_relative_eq!(p.temperature, 518.67, max_relative = 1e-4);
        assert_relative_eq!(p.pressure, 2116.22, max_relative = 1e-4);
        assert_relative_eq!(p.density, SL_DENSITY, max_relative = 1e-4);
        assert_relative_eq!(p.sound_speed, SL_SOUND_SPEED, max_relative = 1e-3);
    }

    #[test]
    fn tropopause_pressure() {
        let atm = StandardAtmosphere::new();
        assert_relative_eq!(atm.pressure(36_089.0), 472.452, max_relative = 1e-3);
    }

    #[test]
    fn lapse_is_monotonic_to_tropopause() {
        let atm = StandardAtmosphere::new();
        let mut last = atm.at(0.0);
        for i in 1..=100 {
            let h = 36_089.0 * (i as f64) / 100.0;
            let p = atm.at(h);
            assert!(p.temperature < last.temperature, "T rose at {h} ft");
            assert!(p.density > 0.0);
            assert!(p.pressure < last.pressure);
            last = p;
        }
    }

    #[test]
    fn stratosphere_is_isothermal() {
        let atm = StandardAtmosphere::new();
        assert_relative_eq!(
            atm.std_temperature(40_000.0),
            atm.std_temperature(60_000.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn delta_t_biases_temperature_not_pressure() {
        let mut atm = StandardAtmosphere::new();
        let p0 = atm.at(10_000.0);
        atm.delta_t = 27.0;
        let p1 = atm.at(10_000.0);
        assert_relative_eq!(p1.temperature - p0.temperature, 27.0, epsilon = 1e-9);
        assert_relative_eq!(p1.pressure, p0.pressure, epsilon = 1e-9);
        assert!(p1.density < p0.density);
    }

    #[test]
    fn sl_bias_tapers_out_at_tropopause() {
        let mut atm = StandardAtmosphere::new();
        atm.set_sl_temperature(518.67 + 18.0);
        assert_relative_eq!(atm.temperature(0.0), 518.67 + 18.0, epsilon = 1e-9);
        assert_relative_eq!(
            atm.temperature(40_000.0),
            atm.std_temperature(40_000.0),
            epsilon = 1e-9
        );
    }
}
