mod common;

use approx::assert_relative_eq;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use pretty_assertions::assert_eq as assert_eq_pretty;

use kestrel::dynamics::integrators::{self, History, Scheme};
use kestrel::executive::RunState;
use kestrel::utils::SimError;
use kestrel::vehicle::mass::{MassBalance, TankMass};

use common::*;

/// Invariants over a stretch of free flight: unit quaternion, orthonormal
/// transforms, closed mass budget.
#[test]
fn flight_invariants_hold_over_time() {
    let mut exec = airborne_executive(8000.0, 180.0);
    let steps = (2.0 / exec.dt()).round() as usize;
    for _ in 0..steps {
        exec.step().expect("step");
        let state = &exec.frame.state;
        assert!(
            (state.q_eci.norm() - 1.0).abs() < 1.0e-8,
            "quaternion norm drifted"
        );
        assert_orthonormal(&state.transforms.tb2l, 1.0e-10);
        assert_relative_eq!(
            (state.transforms.tb2l - state.transforms.tl2b.transpose()).norm(),
            0.0,
            epsilon = 1.0e-12
        );

        let mass = &exec.frame.mass;
        let fuel_slugs = exec.bus.get_path("propulsion/total-fuel-lbs").unwrap() / 32.174_05;
        let expected = 1800.0 / 32.174_05 + fuel_slugs;
        assert_relative_eq!(mass.mass, expected, max_relative = 1.0e-9);
    }
}

/// Scenario: quaternion integrator agreement. A constant 1 rad/s roll for
/// 2*pi seconds lands Buss-1 and Adams-Bashforth-4 on the same attitude.
#[test]
fn buss1_and_ab4_agree_on_constant_rate() {
    let omega = Vector3::new(1.0, 0.0, 0.0);
    let dt = 1.0 / 120.0;
    let steps = (2.0 * std::f64::consts::PI / dt).round() as usize;

    let mut q_buss = Quaternion::new(1.0, 0.0, 0.0, 0.0);
    let mut q_ab4 = Quaternion::new(1.0, 0.0, 0.0, 0.0);
    let qdot0 = kestrel::dynamics::VehicleState::attitude_derivative(&q_ab4, &omega);
    let mut hist = History::filled(qdot0);
    let empty = History::filled(Quaternion::new(0.0, 0.0, 0.0, 0.0));

    for _ in 0..steps {
        q_buss = integrators::step_attitude(
            Scheme::Buss1,
            q_buss,
            dt,
            &omega,
            &Vector3::zeros(),
            &empty,
        );

        let qdot = kestrel::dynamics::VehicleState::attitude_derivative(&q_ab4, &omega);
        hist.push(qdot);
        q_ab4 = integrators::step(Scheme::AdamsBashforth4, q_ab4, dt, &hist);
        q_ab4 = q_ab4 * (1.0 / q_ab4.norm());
    }

    let ua = UnitQuaternion::from_quaternion(q_buss);
    let ub = UnitQuaternion::from_quaternion(q_ab4);
    let difference = ua.inverse() * ub;
    assert!(
        difference.angle() < 1.0e-3,
        "attitudes diverged by {} rad",
        difference.angle()
    );
}

/// Scenario: level cruise. Trim longitudinally, fly five seconds, and the
/// wing carries the weight.
#[test]
fn trimmed_level_flight_carries_the_weight() {
    let mut exec = airborne_executive(3000.0, 170.0);
    exec.trim_longitudinal().expect("trim");
    run_for(&mut exec, 5.0);

    let lift = exec.bus.get_path("forces/fw-lift-lbs").unwrap();
    let weight = exec.frame.mass.weight;
    assert_relative_eq!(lift, weight, max_relative = 0.01);
    // Still flying straight: negligible bank and sideslip.
    assert!(exec.frame.state.euler.phi.abs() < 0.02);
    assert!(exec.frame.air.beta.abs() < 0.01);
}

/// Scenario: braking stop. Rolling at 20 ft/s with full brakes, the
/// aircraft stops within ten seconds and stays stopped.
#[test]
fn full_brakes_bring_the_rollout_to_rest() {
    let mut exec = ground_executive(20.0);
    exec.bus.set_path("fcs/left-brake-cmd-norm", 1.0).unwrap();
    exec.bus.set_path("fcs/right-brake-cmd-norm", 1.0).unwrap();

    let mut samples = Vec::new();
    for _ in 0..10 {
        run_for(&mut exec, 1.0);
        samples.push(exec.frame.state.uvw.x.abs());
    }
    for pair in samples.windows(2) {
        assert!(
            pair[1] <= pair[0] + 1.0e-3,
            "ground speed rose: {:?}",
            samples
        );
    }
    assert!(
        *samples.last().unwrap() < 0.05,
        "still rolling at {} ft/s",
        samples.last().unwrap()
    );
    assert!(exec.frame.gear.wow);
}

/// Scenario: ground friction. A 1000 lbf horizontal push on a parked,
/// braked aircraft is absorbed by the contact solver.
#[test]
fn static_friction_holds_against_external_force() {
    let mut exec = ground_executive(0.0);
    exec.bus.set_path("fcs/left-brake-cmd-norm", 1.0).unwrap();
    exec.bus.set_path("fcs/right-brake-cmd-norm", 1.0).unwrap();
    run_for(&mut exec, 3.0);

    exec.bus.set_path("forces/external-x-lbs", 1000.0).unwrap();
    run_for(&mut exec, 2.0);

    assert!(
        exec.frame.state.uvw.x.abs() < 0.05,
        "aircraft crept to {} ft/s",
        exec.frame.state.uvw.x
    );
    assert!(
        exec.frame.accel.uvw_dot.x.abs() < 1.0e-3,
        "residual surge acceleration {}",
        exec.frame.accel.uvw_dot.x
    );
    // The friction sum opposes the push.
    assert!(exec.frame.accel.friction.force.x < -800.0);
}

/// Scenario: crash detection. A strut buried far past its travel engages
/// Holding within one tick.
#[test]
fn overcompressed_strut_is_a_crash() {
    let mut exec = ground_executive(0.0);
    // Rebuild far below the terrain: every strut reads > 500 ft compressed.
    let location = kestrel::earth::Location::from_geodetic(-2.13, 0.646, -600.0);
    exec.initialize(
        location,
        Vector3::new(0.0, 0.0, 50.0),
        Vector3::zeros(),
        kestrel::dynamics::EulerAngles::default(),
    )
    .expect("initialize");

    let err = exec.step().unwrap_err();
    assert!(matches!(err, SimError::OutOfDomain(_)), "got {err}");
    assert!(exec.crashed());
    assert_eq_pretty!(exec.run_state(), RunState::Holding);
}

/// Scenario: asymmetric fuel burn. Draining the left tank walks the CG
/// toward the full tank and shrinks the inertia monotonically.
#[test]
fn fuel_burn_shifts_cg_and_inertia() {
    let mass_module = MassBalance::new(test_mass_config());
    let tank_mass = |lbs: f64, y: f64| TankMass {
        mass: lbs / 32.174_05,
        location: Vector3::new(48.0, y, 45.0),
    };

    let mut last_cg_y = f64::NEG_INFINITY;
    let mut last_moments = [f64::INFINITY; 3];
    for step in 0..=10 {
        let burned = step as f64; // 1 lb per step, 10 lb total
        let props = mass_module
            .properties(&[tank_mass(20.0 - burned, -35.0), tank_mass(20.0, 35.0)])
            .expect("mass properties");
        assert!(
            props.cg.y > last_cg_y,
            "CG failed to move toward the full tank"
        );
        last_cg_y = props.cg.y;
        for (i, last) in last_moments.iter_mut().enumerate() {
            let moment = props.inertia[(i, i)];
            assert!(moment < *last, "J{}{} did not shrink", i, i);
            *last = moment;
        }
    }
}

/// Scenario: hold-down. The body state freezes while the ECI state keeps
/// tracking the rotating planet.
#[test]
fn hold_down_tracks_the_rotating_ground() {
    // Enter hold-down straight from the initial condition so the body
    // state is exactly at rest with respect to the ground.
    let mut exec = ground_executive(0.0);
    exec.hold_down();

    let lat_before = exec.frame.state.location.geodetic_latitude();
    let lon_before = exec.frame.state.location.longitude();
    let alt_before = exec.frame.state.location.geodetic_altitude();
    run_for(&mut exec, 5.0);

    // Geodetic position is pinned even though the ECI position moved.
    assert_relative_eq!(
        exec.frame.state.location.geodetic_latitude(),
        lat_before,
        epsilon = 1.0e-9
    );
    assert_relative_eq!(
        exec.frame.state.location.longitude(),
        lon_before,
        epsilon = 1.0e-9
    );
    assert_relative_eq!(
        exec.frame.state.location.geodetic_altitude(),
        alt_before,
        epsilon = 1.0e-4
    );
    assert!(exec.frame.state.uvw.norm() < 1.0e-3);
}

/// Scenario seed: the full C172 cruise-hold calibration run. Long, and
/// driven from the shipped script; kept out of the default test pass.
#[test]
#[ignore = "400 s calibration scenario"]
fn c172_cruise_hold_calibration() {
    let script =
        kestrel::RunScript::load(std::path::Path::new("data/c172_cruise.xml")).expect("script");
    let aircraft =
        kestrel::AircraftConfig::load(&script.aircraft).expect("aircraft");
    let init = kestrel::InitConfig::load(&script.initialize).expect("init");

    let mut exec = kestrel::Executive::new(aircraft.build(), script.dt).expect("build");
    exec.initialize(init.location(), init.uvw, init.pqr, init.euler)
        .expect("initialize");

    let mut runner = kestrel::ScriptRunner::new(&script);
    exec.run_until(script.end, |exec| runner.apply(exec))
        .expect("run");

    let altitude = exec.frame.state.location.geodetic_altitude();
    assert!((altitude - 8000.0).abs() < 50.0, "altitude {altitude}");
    let heading = exec.frame.state.euler.psi.to_degrees().rem_euclid(360.0);
    assert!((heading - 200.0).abs() < 2.0, "heading {heading}");
    for i in 0..1 {
        let starved = exec
            .bus
            .get_path(&format!("propulsion/engine[{i}]/starved"))
            .unwrap();
        assert_eq!(starved, 0.0, "engine {i} starved");
    }
}
