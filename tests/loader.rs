mod common;

use std::path::Path;

use approx::assert_relative_eq;

use kestrel::config::{AircraftConfig, ConfigError, InitConfig};
use kestrel::output::{CsvWriter, OutputGroup};
use kestrel::vehicle::gear::{BrakeGroup, SteerType};
use kestrel::vehicle::propulsion::EngineKind;
use kestrel::{Executive, RunScript};

use common::run_for;

#[test]
fn c172_file_loads_and_converts_units() {
    let config = AircraftConfig::load(Path::new("data/c172.xml")).expect("load");
    assert_eq!(config.name, "c172");
    assert_relative_eq!(config.metrics.wing_area, 174.0);
    assert_relative_eq!(config.metrics.wing_incidence, 1.5f64.to_radians());

    assert_relative_eq!(config.mass.empty_weight, 1620.0);
    assert_eq!(config.mass.point_masses.len(), 1);

    assert_eq!(config.contacts.len(), 3);
    let nose = &config.contacts[0];
    assert_eq!(nose.steer_type, SteerType::Steerable);
    assert_eq!(nose.brake_group, BrakeGroup::None);
    assert_relative_eq!(nose.max_steer, 10.0f64.to_radians());
    assert_eq!(config.contacts[1].brake_group, BrakeGroup::Left);

    assert_eq!(config.engines.len(), 1);
    match &config.engines[0].kind {
        EngineKind::Piston { rated_power, .. } => {
            assert_relative_eq!(*rated_power, 180.0 * 550.0);
        }
        other => panic!("unexpected engine kind {other:?}"),
    }
    assert_eq!(config.engines[0].feed, vec![0, 1]);
    assert_eq!(config.tanks.len(), 2);
    assert_relative_eq!(config.tanks[0].contents, 100.0);

    // Lift, drag, side, roll, pitch, yaw buckets all populated.
    for (axis, bucket) in config.aero.axes.iter().enumerate() {
        assert!(!bucket.is_empty(), "axis {axis} is empty");
    }
    assert!(!config.channels.is_empty());
}

#[test]
fn missing_file_is_an_io_error() {
    let err = AircraftConfig::load(Path::new("data/no-such-aircraft.xml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn bad_unit_is_reported_with_location() {
    let doc = r#"<fdm_config name="broken">
        <metrics>
            <wingarea unit="ACRES"> 174.0 </wingarea>
            <wingspan unit="FT"> 36.0 </wingspan>
            <chord unit="FT"> 4.9 </chord>
            <location name="AERORP" unit="IN"><x>0</x><y>0</y><z>0</z></location>
        </metrics>
    </fdm_config>"#;
    let root = kestrel::config::xml::parse(doc).unwrap();
    let err = AircraftConfig::from_xml(&root, "broken.xml").unwrap_err();
    match err {
        ConfigError::UnknownUnit { file, unit, .. } => {
            assert_eq!(file, "broken.xml");
            assert_eq!(unit, "ACRES");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn script_and_init_load_together() {
    let script = RunScript::load(Path::new("data/c172_cruise.xml")).expect("script");
    assert_relative_eq!(script.end, 400.0);
    assert_eq!(script.events.len(), 1);

    let init = InitConfig::load(&script.initialize).expect("init");
    assert_relative_eq!(init.altitude, 8000.0);
    assert_relative_eq!(init.euler.psi, 200.0f64.to_radians(), epsilon = 1e-12);

    let aircraft = AircraftConfig::load(&script.aircraft).expect("aircraft");
    let mut exec = Executive::new(aircraft.build(), script.dt).expect("build");
    exec.initialize(init.location(), init.uvw, init.pqr, init.euler)
        .expect("initialize");
    assert_relative_eq!(
        exec.frame.state.location.geodetic_altitude(),
        8000.0,
        epsilon = 1e-3
    );
}

#[test]
fn csv_output_writes_header_and_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.csv");

    let mut exec = common::airborne_executive(5000.0, 170.0);
    let mut writer = CsvWriter::create(
        &path,
        &exec.bus,
        exec.dt(),
        0.0,
        &OutputGroup::ALL,
        &["velocities/mach".to_string()],
    )
    .expect("writer");

    for _ in 0..24 {
        exec.step().expect("step");
        writer.log(&exec).expect("log");
    }
    writer.flush().expect("flush");

    let text = std::fs::read_to_string(&path).expect("read");
    let mut lines = text.lines();
    let banner = lines.next().unwrap();
    assert!(banner.starts_with('#'));
    let header = lines.next().unwrap();
    assert!(header.starts_with("Time,"));
    assert!(header.contains("Altitude"));
    assert!(header.contains("velocities/mach"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 24);
    // Every row has exactly the header's column count.
    let columns = header.split(',').count();
    for row in rows {
        assert_eq!(row.split(',').count(), columns);
    }
}

#[test]
fn property_catalog_dumps_as_json() {
    let exec = common::airborne_executive(5000.0, 170.0);
    let json = exec.bus.catalog_json();
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    let entries = parsed.as_array().expect("array");
    assert!(entries.len() > 50);
    assert!(entries
        .iter()
        .any(|e| e["path"] == "velocities/vt-fps"));
}

#[test]
fn console_commands_apply_between_ticks() {
    let mut exec = common::airborne_executive(5000.0, 170.0);
    let sender = exec.command_sender();
    sender
        .send(kestrel::Command::Set {
            path: "fcs/throttle-cmd-norm[0]".to_string(),
            value: 0.75,
        })
        .unwrap();
    run_for(&mut exec, 0.1);
    assert_relative_eq!(
        exec.bus.get_path("fcs/throttle-cmd-norm[0]").unwrap(),
        0.75
    );

    sender.send(kestrel::Command::Hold).unwrap();
    exec.step().expect("step");
    assert_eq!(exec.run_state(), kestrel::RunState::Holding);
    let t = exec.sim_time();
    exec.step().expect("step");
    assert_eq!(exec.sim_time(), t, "sim time advanced while holding");
}
