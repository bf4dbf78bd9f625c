//! Unit attribute handling. Configuration files may declare units per
//! element; everything converts to the canonical set at load time:
//! feet, slugs, seconds, radians, pounds force.

/// Dimension families with their canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// ft
    Length,
    /// ft^2
    Area,
    /// rad
    Angle,
    /// lbf (weights are carried as force and divided by g where needed)
    Force,
    /// slug*ft^2
    Inertia,
    /// ft/s
    Velocity,
    /// lbf/ft
    SpringRate,
    /// lbf/(ft/s)
    DampingRate,
    /// ft*lbf/s
    Power,
    /// ft*lbf
    Torque,
    /// s
    Time,
}

/// Conversion factor from `unit` into the canonical unit of its dimension,
/// or None for an unknown unit string.
pub fn factor(unit: &str) -> Option<(Dimension, f64)> {
    let u = unit.trim().to_ascii_uppercase();
    Some(match u.as_str() {
        "FT" => (Dimension::Length, 1.0),
        "IN" => (Dimension::Length, 1.0 / 12.0),
        "M" => (Dimension::Length, 3.280_839_895),
        "FT2" => (Dimension::Area, 1.0),
        "M2" => (Dimension::Area, 10.763_910_4),
        "RAD" => (Dimension::Angle, 1.0),
        "DEG" => (Dimension::Angle, std::f64::consts::PI / 180.0),
        "LBS" => (Dimension::Force, 1.0),
        "N" => (Dimension::Force, 0.224_808_94),
        "KG" => (Dimension::Force, 2.204_622_62),
        "SLUG*FT2" => (Dimension::Inertia, 1.0),
        "KG*M2" => (Dimension::Inertia, 0.737_562_15),
        "FT/SEC" => (Dimension::Velocity, 1.0),
        "KTS" => (Dimension::Velocity, 1.687_810),
        "M/SEC" => (Dimension::Velocity, 3.280_839_895),
        "LBS/FT" => (Dimension::SpringRate, 1.0),
        "LBS/FT/SEC" => (Dimension::DampingRate, 1.0),
        "WATTS" => (Dimension::Power, 0.737_562_15),
        "HP" => (Dimension::Power, 550.0),
        "FT*LBS/SEC" => (Dimension::Power, 1.0),
        "FT-LBS" => (Dimension::Torque, 1.0),
        "N-M" => (Dimension::Torque, 0.737_562_15),
        "SEC" => (Dimension::Time, 1.0),
        _ => return None,
    })
}

/// Convert `value` declared in `unit` to canonical units, checking the
/// dimension matches what the element expects.
pub fn convert(value: f64, unit: &str, expected: Dimension) -> Option<f64> {
    let (dimension, k) = factor(unit)?;
    if dimension != expected {
        return None;
    }
    Some(value * k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn common_conversions() {
        assert_relative_eq!(convert(12.0, "IN", Dimension::Length).unwrap(), 1.0);
        assert_relative_eq!(
            convert(180.0, "DEG", Dimension::Angle).unwrap(),
            std::f64::consts::PI
        );
        assert_relative_eq!(convert(1.0, "KTS", Dimension::Velocity).unwrap(), 1.687_810);
        assert_relative_eq!(convert(1.0, "HP", Dimension::Power).unwrap(), 550.0);
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        assert!(convert(1.0, "DEG", Dimension::Length).is_none());
        assert!(convert(1.0, "NO-SUCH-UNIT", Dimension::Length).is_none());
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        assert!(convert(1.0, " ft ", Dimension::Length).is_some());
        assert!(convert(1.0, "slug*ft2", Dimension::Inertia).is_some());
    }
}
