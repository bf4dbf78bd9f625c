use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::utils::constants::{ELLIPSOID_A, ELLIPSOID_B};

/// A geodetic-aware point on the rotating planet.
///
/// The primary representation is (longitude, geocentric latitude, radius).
/// Derived quantities (trig caches, geodetic latitude and altitude over the
/// reference ellipsoid, and the local-frame transforms) are recomputed at
/// every mutation, so readers always see a consistent set. A version counter
/// lets consumers detect changes cheaply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    lon: f64,
    lat: f64,
    radius: f64,

    version: u64,

    // Caches, valid for the scalars above.
    sin_lon: f64,
    cos_lon: f64,
    sin_lat: f64,
    cos_lat: f64,
    tan_lat: f64,
    geodetic_lat: f64,
    geodetic_alt: f64,
    tec2l: Matrix3<f64>,
    tl2ec: Matrix3<f64>,
}

impl Default for Location {
    fn default() -> Self {
        Self::from_geocentric(0.0, 0.0, ELLIPSOID_A)
    }
}

impl Location {
    /// Build from longitude (rad), geocentric latitude (rad), radius (ft).
    pub fn from_geocentric(lon: f64, lat: f64, radius: f64) -> Self {
        let mut loc = Self {
            lon,
            lat,
            radius,
            version: 0,
            sin_lon: 0.0,
            cos_lon: 0.0,
            sin_lat: 0.0,
            cos_lat: 0.0,
            tan_lat: 0.0,
            geodetic_lat: 0.0,
            geodetic_alt: 0.0,
            tec2l: Matrix3::identity(),
            tl2ec: Matrix3::identity(),
        };
        loc.recompute();
        loc
    }

    /// Build from longitude (rad), geodetic latitude (rad), altitude above
    /// the ellipsoid (ft).
    pub fn from_geodetic(lon: f64, geodetic_lat: f64, altitude: f64) -> Self {
        let a = ELLIPSOID_A;
        let b = ELLIPSOID_B;
        let e2 = (a * a - b * b) / (a * a);
        let (sin_phi, cos_phi) = geodetic_lat.sin_cos();
        let n = a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let p = (n + altitude) * cos_phi;
        let z = (n * (1.0 - e2) + altitude) * sin_phi;
        Self::from_ecef(&Vector3::new(p * lon.cos(), p * lon.sin(), z))
    }

    /// Build from an ECEF position vector (ft).
    pub fn from_ecef(ecef: &Vector3<f64>) -> Self {
        let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
        let lon = ecef.y.atan2(ecef.x);
        let lat = ecef.z.atan2(p);
        let radius = ecef.norm();
        Self::from_geocentric(lon, lat, radius)
    }

    pub fn longitude(&self) -> f64 {
        self.lon
    }

    /// Geocentric latitude (rad).
    pub fn latitude(&self) -> f64 {
        self.lat
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn sin_longitude(&self) -> f64 {
        self.sin_lon
    }

    pub fn cos_longitude(&self) -> f64 {
        self.cos_lon
    }

    pub fn sin_latitude(&self) -> f64 {
        self.sin_lat
    }

    pub fn cos_latitude(&self) -> f64 {
        self.cos_lat
    }

    pub fn tan_latitude(&self) -> f64 {
        self.tan_lat
    }

    /// Geodetic latitude over the reference ellipsoid (rad).
    pub fn geodetic_latitude(&self) -> f64 {
        self.geodetic_lat
    }

    /// Altitude above the reference ellipsoid (ft).
    pub fn geodetic_altitude(&self) -> f64 {
        self.geodetic_alt
    }

    /// ECEF position vector (ft).
    pub fn ecef(&self) -> Vector3<f64> {
        Vector3::new(
            self.radius * self.cos_lat * self.cos_lon,
            self.radius * self.cos_lat * self.sin_lon,
            self.radius * self.sin_lat,
        )
    }

    /// ECEF-to-local (NED) rotation at this point. Down is along the
    /// ellipsoid normal (geodetic latitude).
    pub fn tec2l(&self) -> &Matrix3<f64> {
        &self.tec2l
    }

    /// Local (NED) to ECEF rotation.
    pub fn tl2ec(&self) -> &Matrix3<f64> {
        &self.tl2ec
    }

    /// Radius of the ellipsoid surface point directly below (ft), used for
    /// the runway-radius observable and the AGL fallback.
    pub fn sea_level_radius(&self) -> f64 {
        self.radius - self.geodetic_alt_along_radius()
    }

    pub fn set_longitude(&mut self, lon: f64) {
        self.lon = lon;
        self.recompute();
    }

    pub fn set_latitude(&mut self, lat: f64) {
        self.lat = lat;
        self.recompute();
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
        self.recompute();
    }

    pub fn set_ecef(&mut self, ecef: &Vector3<f64>) {
        let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
        self.lon = ecef.y.atan2(ecef.x);
        self.lat = ecef.z.atan2(p);
        self.radius = ecef.norm();
        self.recompute();
    }

    /// Shift geodetic altitude, holding the ground track point.
    pub fn set_geodetic_altitude(&mut self, altitude: f64) {
        let next = Self::from_geodetic(self.lon, self.geodetic_lat, altitude);
        *self = Self {
            version: self.version + 1,
            ..next
        };
    }

    fn geodetic_alt_along_radius(&self) -> f64 {
        // The geodetic altitude is measured along the ellipsoid normal; the
        // difference from the radial direction is second order in flattening
        // and ignored for the surface-radius estimate.
        self.geodetic_alt
    }

    fn recompute(&mut self) {
        self.version += 1;
        let (sin_lon, cos_lon) = self.lon.sin_cos();
        let (sin_lat, cos_lat) = self.lat.sin_cos();
        self.sin_lon = sin_lon;
        self.cos_lon = cos_lon;
        self.sin_lat = sin_lat;
        self.cos_lat = cos_lat;
        self.tan_lat = if cos_lat.abs() > 0.0 {
            sin_lat / cos_lat
        } else {
            f64::INFINITY
        };

        let (gd_lat, gd_alt) = geocentric_to_geodetic(&Vector3::new(
            self.radius * cos_lat * cos_lon,
            self.radius * cos_lat * sin_lon,
            self.radius * sin_lat,
        ));
        self.geodetic_lat = gd_lat;
        self.geodetic_alt = gd_alt;

        let (sin_gd, cos_gd) = gd_lat.sin_cos();
        self.tec2l = Matrix3::new(
            -sin_gd * cos_lon,
            -sin_gd * sin_lon,
            cos_gd,
            -sin_lon,
            cos_lon,
            0.0,
            -cos_gd * cos_lon,
            -cos_gd * sin_lon,
            -sin_gd,
        );
        self.tl2ec = self.tec2l.transpose();
    }
}

/// Closed-form ECEF to geodetic conversion (Heikkinen).
///
/// Returns (geodetic latitude rad, altitude over the ellipsoid ft).
fn geocentric_to_geodetic(ecef: &Vector3<f64>) -> (f64, f64) {
    let a = ELLIPSOID_A;
    let b = ELLIPSOID_B;
    let a2 = a * a;
    let b2 = b * b;
    let e2 = (a2 - b2) / a2;
    let ep2 = (a2 - b2) / b2;

    let z = ecef.z;
    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    if p < 1.0e-9 {
        // On the polar axis the closed form degenerates.
        return (z.signum() * std::f64::consts::FRAC_PI_2, z.abs() - b);
    }

    let f = 54.0 * b2 * z * z;
    let g = p * p + (1.0 - e2) * z * z - e2 * (a2 - b2);
    let c = e2 * e2 * f * p * p / (g * g * g);
    let s = (1.0 + c + (c * c + 2.0 * c).sqrt()).cbrt();
    let k = s + 1.0 + 1.0 / s;
    let pp = f / (3.0 * k * k * g * g);
    let q = (1.0 + 2.0 * e2 * e2 * pp).sqrt();
    let r0 = -pp * e2 * p / (1.0 + q)
        + (0.5 * a2 * (1.0 + 1.0 / q)
            - pp * (1.0 - e2) * z * z / (q * (1.0 + q))
            - 0.5 * pp * p * p)
            .max(0.0)
            .sqrt();
    let t = p - e2 * r0;
    let u = (t * t + z * z).sqrt();
    let v = (t * t + (1.0 - e2) * z * z).sqrt();
    let z0 = b2 * z / (a * v);
    let alt = u * (1.0 - b2 / (a * v));
    let lat = ((z + ep2 * z0) / p).atan();
    (lat, alt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn caches_agree_with_scalars() {
        let loc = Location::from_geocentric(0.7, -0.4, ELLIPSOID_A + 5000.0);
        assert_relative_eq!(loc.sin_longitude(), 0.7f64.sin(), epsilon = 1e-12);
        assert_relative_eq!(loc.cos_latitude(), 0.4f64.cos(), epsilon = 1e-12);
        assert_relative_eq!(loc.tan_latitude(), (-0.4f64).tan(), epsilon = 1e-12);
    }

    #[test]
    fn equator_geodetic_matches_geocentric() {
        let loc = Location::from_geocentric(0.0, 0.0, ELLIPSOID_A + 1000.0);
        assert_relative_eq!(loc.geodetic_latitude(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(loc.geodetic_altitude(), 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn geodetic_round_trip() {
        for &(lat, alt) in &[(0.6, 8000.0), (-1.1, 35000.0), (0.0, 0.0), (1.4, 200.0)] {
            let loc = Location::from_geodetic(0.3, lat, alt);
            assert_relative_eq!(loc.geodetic_latitude(), lat, epsilon = 1e-10);
            assert_relative_eq!(loc.geodetic_altitude(), alt, epsilon = 1e-4);
        }
    }

    #[test]
    fn ecef_round_trip() {
        let loc = Location::from_geocentric(-2.1, 0.8, ELLIPSOID_A + 12000.0);
        let back = Location::from_ecef(&loc.ecef());
        assert_relative_eq!(back.longitude(), -2.1, epsilon = 1e-12);
        assert_relative_eq!(back.latitude(), 0.8, epsilon = 1e-12);
        assert_relative_eq!(back.radius(), ELLIPSOID_A + 12000.0, epsilon = 1e-4);
    }

    #[test]
    fn local_frame_is_orthonormal() {
        let loc = Location::from_geodetic(2.0, 0.9, 4000.0);
        let t = loc.tec2l();
        let should_be_eye = t * t.transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(should_be_eye[(i, j)], expect, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn local_down_points_inward_at_equator() {
        let loc = Location::from_geocentric(0.0, 0.0, ELLIPSOID_A);
        // Third row of Tec2l is the down axis expressed in ECEF.
        let down = loc.tec2l().row(2);
        assert_relative_eq!(down[0], -1.0, epsilon = 1e-9);
        assert_relative_eq!(down[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(down[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn version_bumps_on_mutation() {
        let mut loc = Location::default();
        let v = loc.version();
        loc.set_longitude(PI / 4.0);
        assert!(loc.version() > v);
    }
}
