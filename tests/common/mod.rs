use approx::assert_relative_eq;
use nalgebra::{Matrix3, Vector3};

use kestrel::dynamics::state::EulerAngles;
use kestrel::earth::Location;
use kestrel::executive::{Executive, VehicleBuild};
use kestrel::environment::Environment;
use kestrel::vehicle::aero::{AeroConfig, AeroFunction, Aerodynamics, FunctionNode, Table1D};
use kestrel::vehicle::fcs::FlightControls;
use kestrel::vehicle::gear::{BrakeGroup, ContactConfig, GroundReactions, SteerType};
use kestrel::vehicle::mass::{MassBalance, MassBalanceConfig, PointMass};
use kestrel::vehicle::propulsion::{Engine, EngineKind, Propulsion, Tank, Thruster};
use kestrel::vehicle::Metrics;

/// Airframe metrics for the test vehicle (C172-sized).
pub fn test_metrics() -> Metrics {
    Metrics {
        wing_area: 174.0,
        wing_span: 36.0,
        chord: 4.9,
        wing_incidence: 0.0,
        htail_area: 21.9,
        htail_arm: 15.7,
        vtail_area: 16.5,
        vtail_arm: 15.7,
        aero_rp: Vector3::new(41.0, 0.0, 36.5),
        eyepoint: Vector3::new(37.0, 0.0, 48.0),
    }
}

pub fn test_mass_config() -> MassBalanceConfig {
    MassBalanceConfig {
        empty_weight: 1620.0,
        empty_cg: Vector3::new(41.0, 0.0, 36.5),
        inertia: [948.0, 1346.0, 1967.0, 0.0, 0.0, 0.0],
        point_masses: vec![PointMass {
            name: "pilot".to_string(),
            mass: 180.0 / 32.174_05,
            location: Vector3::new(41.0, 0.0, 30.0),
        }],
    }
}

/// qbarS * (c0 + c1 * property) as a coefficient function tree.
fn linear_term(name: &str, c0: f64, c1: f64, property: &str) -> AeroFunction {
    AeroFunction {
        name: name.to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0),
            FunctionNode::Sum(vec![
                FunctionNode::Value(c0),
                FunctionNode::Product(vec![
                    FunctionNode::Value(c1),
                    FunctionNode::property(property),
                ]),
            ]),
        ]),
    }
}

/// A clean linear aero model: lift/drag/pitch as analytic functions of
/// alpha, elevator, and pitch rate.
pub fn test_aero_config() -> AeroConfig {
    let mut config = AeroConfig {
        alpha_clmax: 0.28,
        hysteresis_limits: Some((0.24, 0.31)),
        functions: Vec::new(),
        axes: Default::default(),
    };
    // LIFT = qbarS * (0.25 + 5.0 a + 0.43 de)
    config.axes[2].push(linear_term("lift-alpha", 0.25, 5.0, "aero/alpha-rad"));
    config.axes[2].push(linear_term(
        "lift-elevator",
        0.0,
        0.43,
        "fcs/elevator-pos-rad",
    ));
    // DRAG = qbarS * (0.027 + 1.45 a^2)
    config.axes[0].push(AeroFunction {
        name: "drag".to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0),
            FunctionNode::Sum(vec![
                FunctionNode::Value(0.027),
                FunctionNode::Product(vec![
                    FunctionNode::Value(1.45),
                    FunctionNode::property("aero/alpha-rad"),
                    FunctionNode::property("aero/alpha-rad"),
                ]),
            ]),
        ]),
    });
    // SIDE = qbarS * (-0.31 b)
    config.axes[1].push(linear_term("side-beta", 0.0, -0.31, "aero/beta-rad"));
    // ROLL: damping only, L = qbarS b * (-0.47 p b/2V)
    config.axes[3].push(AeroFunction {
        name: "roll-damp".to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0 * 36.0 * -0.47),
            FunctionNode::property("aero/bi2vel"),
            FunctionNode::property("velocities/p-aero-rad_sec"),
        ]),
    });
    // PITCH = qbarS c * (0.04 - 0.98 a - 1.28 de - 12.4 q c/2V)
    config.axes[4].push(AeroFunction {
        name: "pitch-static".to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0 * 4.9),
            FunctionNode::Sum(vec![
                FunctionNode::Value(0.04),
                FunctionNode::Product(vec![
                    FunctionNode::Value(-0.98),
                    FunctionNode::property("aero/alpha-rad"),
                ]),
                FunctionNode::Product(vec![
                    FunctionNode::Value(-1.28),
                    FunctionNode::property("fcs/elevator-pos-rad"),
                ]),
            ]),
        ]),
    });
    config.axes[4].push(AeroFunction {
        name: "pitch-damp".to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0 * 4.9 * -12.4),
            FunctionNode::property("aero/ci2vel"),
            FunctionNode::property("velocities/q-aero-rad_sec"),
        ]),
    });
    // YAW = qbarS b * (0.065 b - 0.099 r b/2V)
    config.axes[5].push(AeroFunction {
        name: "yaw-beta".to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0 * 36.0 * 0.065),
            FunctionNode::property("aero/beta-rad"),
        ]),
    });
    config.axes[5].push(AeroFunction {
        name: "yaw-damp".to_string(),
        root: FunctionNode::Product(vec![
            FunctionNode::property("aero/qbar-psf"),
            FunctionNode::Value(174.0 * 36.0 * -0.099),
            FunctionNode::property("aero/bi2vel"),
            FunctionNode::property("velocities/r-aero-rad_sec"),
        ]),
    });
    config
}

fn strut(name: &str, location: Vector3<f64>, spring: f64, brake_group: BrakeGroup) -> ContactConfig {
    ContactConfig {
        name: name.to_string(),
        location,
        spring_coeff: spring,
        damping_coeff: spring / 3.0,
        damping_coeff_rebound: spring / 1.5,
        static_friction: 0.8,
        dynamic_friction: 0.5,
        rolling_friction: 0.02,
        max_steer: 0.17,
        retractable: false,
        steer_type: if name == "NOSE" {
            SteerType::Steerable
        } else {
            SteerType::Fixed
        },
        brake_group,
        cornering_table: None,
    }
}

pub fn test_contacts() -> Vec<ContactConfig> {
    vec![
        strut("NOSE", Vector3::new(6.0, 0.0, -20.0), 1800.0, BrakeGroup::None),
        strut(
            "LEFT_MAIN",
            Vector3::new(58.0, -43.0, -17.0),
            5400.0,
            BrakeGroup::Left,
        ),
        strut(
            "RIGHT_MAIN",
            Vector3::new(58.0, 43.0, -17.0),
            5400.0,
            BrakeGroup::Right,
        ),
    ]
}

pub fn test_engine() -> Engine {
    Engine {
        name: "engine".to_string(),
        kind: EngineKind::Piston {
            rated_power: 180.0 * 550.0,
            bsfc: 0.45 / (3600.0 * 550.0),
        },
        thruster: Thruster::Propeller {
            diameter: 6.25,
            nominal_rps: 40.0,
            efficiency: Table1D::new(vec![(0.0, 0.5), (0.5, 0.8), (0.8, 0.85), (1.4, 0.55)]),
        },
        location: Vector3::new(12.0, 0.0, 36.5),
        pitch: 0.0,
        yaw: 0.0,
        feed: vec![0, 1],
        starved: false,
        spool_thrust: 0.0,
    }
}

pub fn test_tanks() -> Vec<Tank> {
    vec![
        Tank {
            capacity: 130.0,
            contents: 100.0,
            location: Vector3::new(48.0, -35.0, 45.0),
        },
        Tank {
            capacity: 130.0,
            contents: 100.0,
            location: Vector3::new(48.0, 35.0, 45.0),
        },
    ]
}

/// Assemble the standard test vehicle.
pub fn test_build() -> VehicleBuild {
    let metrics = test_metrics();
    VehicleBuild {
        environment: Environment::new(metrics.wing_span),
        fcs: FlightControls::new(Vec::new(), 1, true),
        mass: MassBalance::new(test_mass_config()),
        aero: Aerodynamics::new(test_aero_config(), metrics.clone()),
        propulsion: Propulsion::new(vec![test_engine()], test_tanks()),
        gear: GroundReactions::new(test_contacts()),
        metrics,
    }
}

/// Executive initialized in level flight.
pub fn airborne_executive(altitude: f64, airspeed: f64) -> Executive {
    let mut exec = Executive::new(test_build(), 1.0 / 120.0).expect("build");
    let location = Location::from_geodetic(-2.13, 0.646, altitude);
    exec.initialize(
        location,
        Vector3::new(airspeed, 0.0, 0.0),
        Vector3::zeros(),
        EulerAngles::default(),
    )
    .expect("initialize");
    exec
}

/// Executive parked on flat terrain, roughly at gear equilibrium.
pub fn ground_executive(ground_speed: f64) -> Executive {
    let mut exec = Executive::new(test_build(), 1.0 / 120.0).expect("build");
    let location = Location::from_geodetic(-2.13, 0.646, 4.35);
    exec.initialize(
        location,
        Vector3::new(ground_speed, 0.0, 0.0),
        Vector3::zeros(),
        EulerAngles::default(),
    )
    .expect("initialize");
    exec
}

#[track_caller]
pub fn assert_orthonormal(m: &Matrix3<f64>, epsilon: f64) {
    let eye = m * m.transpose();
    for i in 0..3 {
        for j in 0..3 {
            let expect = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(eye[(i, j)], expect, epsilon = epsilon);
        }
    }
}

/// Drive the executive for a stretch of simulated time.
#[track_caller]
pub fn run_for(exec: &mut Executive, seconds: f64) {
    let steps = (seconds / exec.dt()).round() as usize;
    for _ in 0..steps {
        exec.step().expect("step");
    }
}
