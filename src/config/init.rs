//! Initial condition loader.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;

use crate::config::units::Dimension;
use crate::config::xml::{self, Element};
use crate::config::{ConfigError, Result};
use crate::dynamics::state::EulerAngles;
use crate::earth::Location;

/// Parsed `initialize` file: geodetic position, body velocity, attitude,
/// and steady winds.
#[derive(Debug, Clone)]
pub struct InitConfig {
    /// rad, geodetic
    pub latitude: f64,
    /// rad
    pub longitude: f64,
    /// ft above the ellipsoid
    pub altitude: f64,
    /// Body velocity (ft/s).
    pub uvw: Vector3<f64>,
    /// Body rates (rad/s).
    pub pqr: Vector3<f64>,
    pub euler: EulerAngles,
    /// Steady wind, NED (ft/s).
    pub wind_ned: Vector3<f64>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            uvw: Vector3::zeros(),
            pqr: Vector3::zeros(),
            euler: EulerAngles::default(),
            wind_ned: Vector3::zeros(),
        }
    }
}

struct Reader<'a> {
    file: &'a str,
}

impl<'a> Reader<'a> {
    fn number(&self, el: &Element) -> Result<f64> {
        el.text_trimmed().parse().map_err(|_| ConfigError::Invalid {
            file: self.file.to_string(),
            line: el.line,
            detail: format!("expected a number in <{}>", el.name),
        })
    }

    fn value(
        &self,
        parent: &Element,
        name: &str,
        dimension: Dimension,
        default_unit: &str,
    ) -> Result<Option<f64>> {
        let Some(el) = parent.child(name) else {
            return Ok(None);
        };
        let raw = self.number(el)?;
        let unit = el.attr("unit").unwrap_or(default_unit);
        crate::config::units::convert(raw, unit, dimension)
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownUnit {
                file: self.file.to_string(),
                line: el.line,
                unit: unit.to_string(),
            })
    }
}

impl InitConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            file: file.clone(),
            source,
        })?;
        let root = xml::parse(&text).map_err(|source| ConfigError::Xml {
            file: file.clone(),
            source,
        })?;
        Self::from_xml(&root, &file)
    }

    pub fn from_xml(root: &Element, file: &str) -> Result<Self> {
        let r = Reader { file };
        let mut init = InitConfig {
            latitude: r
                .value(root, "latitude", Dimension::Angle, "DEG")?
                .unwrap_or(0.0),
            longitude: r
                .value(root, "longitude", Dimension::Angle, "DEG")?
                .unwrap_or(0.0),
            altitude: r
                .value(root, "altitude", Dimension::Length, "FT")?
                .unwrap_or(0.0),
            ..InitConfig::default()
        };

        init.euler = EulerAngles {
            phi: r.value(root, "phi", Dimension::Angle, "DEG")?.unwrap_or(0.0),
            theta: r
                .value(root, "theta", Dimension::Angle, "DEG")?
                .unwrap_or(0.0),
            psi: r.value(root, "psi", Dimension::Angle, "DEG")?.unwrap_or(0.0),
        };

        // Velocity: either explicit body components, or a true airspeed
        // with optional alpha/beta.
        let ubody = r.value(root, "ubody", Dimension::Velocity, "FT/SEC")?;
        let vbody = r.value(root, "vbody", Dimension::Velocity, "FT/SEC")?;
        let wbody = r.value(root, "wbody", Dimension::Velocity, "FT/SEC")?;
        if ubody.is_some() || vbody.is_some() || wbody.is_some() {
            init.uvw = Vector3::new(
                ubody.unwrap_or(0.0),
                vbody.unwrap_or(0.0),
                wbody.unwrap_or(0.0),
            );
        } else if let Some(vt) = r.value(root, "vt", Dimension::Velocity, "FT/SEC")? {
            let alpha = r
                .value(root, "alpha", Dimension::Angle, "DEG")?
                .unwrap_or(0.0);
            let beta = r.value(root, "beta", Dimension::Angle, "DEG")?.unwrap_or(0.0);
            init.uvw = Vector3::new(
                vt * alpha.cos() * beta.cos(),
                vt * beta.sin(),
                vt * alpha.sin() * beta.cos(),
            );
        }

        init.pqr = Vector3::new(
            r.value(root, "p", Dimension::Angle, "RAD")?.unwrap_or(0.0),
            r.value(root, "q", Dimension::Angle, "RAD")?.unwrap_or(0.0),
            r.value(root, "r", Dimension::Angle, "RAD")?.unwrap_or(0.0),
        );

        init.wind_ned = Vector3::new(
            r.value(root, "wind-north", Dimension::Velocity, "FT/SEC")?
                .unwrap_or(0.0),
            r.value(root, "wind-east", Dimension::Velocity, "FT/SEC")?
                .unwrap_or(0.0),
            r.value(root, "wind-down", Dimension::Velocity, "FT/SEC")?
                .unwrap_or(0.0),
        );
        Ok(init)
    }

    pub fn location(&self) -> Location {
        Location::from_geodetic(self.longitude, self.latitude, self.altitude)
    }
}
