use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use kestrel::config::ConfigError;
use kestrel::executive::console;
use kestrel::output::{CsvWriter, OutputGroup};
use kestrel::{AircraftConfig, Executive, InitConfig, RunScript, ScriptRunner, SimError};

/// Execute an XML run script to completion and write CSV output.
#[derive(Parser, Debug)]
#[command(name = "kestrel_run", version, about)]
struct Args {
    /// Run script (XML).
    script: PathBuf,

    /// CSV output file.
    #[arg(short, long, default_value = "out.csv")]
    output: PathBuf,

    /// Output rate in Hz (0 logs every frame).
    #[arg(long, default_value_t = 20.0)]
    rate: f64,

    /// Extra property columns appended to the CSV.
    #[arg(long = "property")]
    properties: Vec<String>,

    /// Dump the property catalog as JSON after binding and exit.
    #[arg(long)]
    catalog: bool,

    /// Listen for console commands on this TCP port.
    #[arg(long)]
    console_port: Option<u16>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Io { .. } => 3,
        _ => 2,
    }
}

fn run(args: &Args) -> Result<(), u8> {
    let script = RunScript::load(&args.script).map_err(|err| {
        error!("{}", err);
        config_exit_code(&err)
    })?;
    info!(
        "script \"{}\": t = {}..{} s, dt = {} s",
        script.name, script.start, script.end, script.dt
    );

    let aircraft = AircraftConfig::load(&script.aircraft).map_err(|err| {
        error!("{}", err);
        config_exit_code(&err)
    })?;
    let init = InitConfig::load(&script.initialize).map_err(|err| {
        error!("{}", err);
        config_exit_code(&err)
    })?;

    let name = aircraft.name.clone();
    let mut exec = Executive::new(aircraft.build(), script.dt).map_err(|err| {
        error!("{}", err);
        4u8
    })?;
    info!("aircraft \"{}\" bound", name);

    if args.catalog {
        println!("{}", exec.bus.catalog_json());
        return Ok(());
    }

    exec.initialize(
        init.location(),
        init.uvw,
        init.pqr,
        init.euler,
    )
    .map_err(|err| {
        error!("initialization failed: {}", err);
        4u8
    })?;
    for (axis, value) in [
        ("atmosphere/wind-north-fps", init.wind_ned.x),
        ("atmosphere/wind-east-fps", init.wind_ned.y),
        ("atmosphere/wind-down-fps", init.wind_ned.z),
    ] {
        let _ = exec.bus.set_path(axis, value);
    }

    if let Some(port) = args.console_port {
        console::spawn(port, exec.command_sender()).map_err(|err| {
            error!("console failed to bind: {}", err);
            4u8
        })?;
    }

    let mut writer = CsvWriter::create(
        &args.output,
        &exec.bus,
        exec.dt(),
        args.rate,
        &OutputGroup::ALL,
        &args.properties,
    )
    .map_err(|err| {
        error!("{}", err);
        4u8
    })?;

    let mut runner = ScriptRunner::new(&script);
    let end = script.end;
    let result = exec.run_until(end, |exec| {
        runner.apply(exec)?;
        writer.log(exec)
    });
    writer.flush().ok();

    match result {
        Ok(()) if exec.crashed() => {
            error!("run ended in a crash state");
            Err(5)
        }
        Ok(()) => {
            info!("run complete at t = {:.2} s", exec.sim_time());
            Ok(())
        }
        Err(SimError::OutOfDomain(reason)) => {
            error!("run diverged: {}", reason);
            Err(5)
        }
        Err(err) => {
            error!("{}", err);
            Err(5)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}
