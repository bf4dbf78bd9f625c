//! Canonical constants. All simulation math runs in English units:
//! feet, slugs, seconds, radians, degrees Rankine.

/// Standard gravity at the surface (ft/s^2).
pub const G_ACCEL: f64 = 32.174_05;

/// WGS-84 semi-major axis (ft).
pub const ELLIPSOID_A: f64 = 20_925_646.325_46;
/// WGS-84 semi-minor axis (ft).
pub const ELLIPSOID_B: f64 = 20_855_486.595_1;
/// Gravitational parameter GM (ft^3/s^2).
pub const EARTH_GM: f64 = 1.407_644_175_72e16;
/// Earth rotation rate (rad/s), about the ECI +Z axis.
pub const EARTH_OMEGA: f64 = 7.292_115e-5;
/// Second zonal harmonic J2 (dimensionless).
pub const EARTH_J2: f64 = 1.082_629_82e-3;

/// Specific gas constant for dry air (ft*lbf/(slug*degR)).
pub const AIR_GAS_CONSTANT: f64 = 1716.0;
/// Ratio of specific heats for air.
pub const GAMMA_AIR: f64 = 1.4;
/// Sea-level standard temperature (degR).
pub const SL_TEMPERATURE: f64 = 518.67;
/// Sea-level standard pressure (lbf/ft^2).
pub const SL_PRESSURE: f64 = 2116.22;
/// Sea-level standard density (slug/ft^3).
pub const SL_DENSITY: f64 = 0.002_377_67;
/// Sea-level speed of sound (ft/s).
pub const SL_SOUND_SPEED: f64 = 1116.45;
/// Geopotential altitude of the tropopause (ft).
pub const TROPOPAUSE_ALT: f64 = 36_089.239;

/// Feet per nautical mile.
pub const FT_PER_NM: f64 = 6076.115_49;
/// Knots to feet per second.
pub const KTS_TO_FPS: f64 = 1.687_810;
/// Feet per second to knots.
pub const FPS_TO_KTS: f64 = 1.0 / KTS_TO_FPS;
/// Inches to feet.
pub const IN_TO_FT: f64 = 1.0 / 12.0;
/// Pounds (force) to slugs under standard gravity.
pub const LBS_TO_SLUG: f64 = 1.0 / G_ACCEL;
/// Watts to ft*lbf/s.
pub const WATTS_TO_FTLBPS: f64 = 0.737_562_15;
/// One horsepower in ft*lbf/s.
pub const HP_TO_FTLBPS: f64 = 550.0;

// Divergence thresholds. Exceeding any of these is treated as a crash.
pub const MAX_CONTACT_FORCE: f64 = 1.0e8; // lbf
pub const MAX_CONTACT_MOMENT: f64 = 5.0e9; // lbf*ft
pub const MAX_STRUT_COMPRESSION: f64 = 500.0; // ft
pub const MAX_SINK_RATE: f64 = 1.4666 * 30.0; // ft/s at ground contact

/// Default base simulation rate (s).
pub const DEFAULT_DT: f64 = 1.0 / 120.0;
