//! The executive: owns every module, the property bus, and the clock, and
//! drives the fixed pipeline.

pub mod console;
pub mod frame;
pub mod module;

pub use frame::{ForceMoment, FrameData};
pub use module::{Module, RunState, TickEnv};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::{error, info, warn};

use crate::bus::PropertyBus;
use crate::dynamics::accelerations::Accelerations;
use crate::dynamics::auxiliary::Auxiliary;
use crate::dynamics::propagate::{self, Propagate};
use crate::dynamics::state::EulerAngles;
use crate::earth::{EarthModel, FlatGround, GroundCallback, Location};
use crate::environment::Environment;
use crate::utils::constants::{
    DEFAULT_DT, MAX_CONTACT_FORCE, MAX_CONTACT_MOMENT, MAX_SINK_RATE, MAX_STRUT_COMPRESSION,
};
use crate::utils::{Result, SimError};
use crate::vehicle::aero::Aerodynamics;
use crate::vehicle::fcs::FlightControls;
use crate::vehicle::gear::GroundReactions;
use crate::vehicle::mass::MassBalance;
use crate::vehicle::propulsion::Propulsion;
use crate::vehicle::Aircraft;
use nalgebra::Vector3;

/// Commands accepted at the tick barrier.
#[derive(Debug, Clone)]
pub enum Command {
    Set { path: String, value: f64 },
    Hold,
    Resume,
    HoldDown,
    Quit,
}

/// Trim iteration limits.
const TRIM_MAX_ITERATIONS: usize = 200;
const TRIM_TOLERANCE: f64 = 1.0e-3;

pub struct Executive {
    pub bus: PropertyBus,
    pub frame: FrameData,
    ground: Box<dyn GroundCallback>,

    dt: f64,
    sim_time: f64,
    frame_count: u64,
    run_state: RunState,
    crashed: bool,
    quit: bool,

    command_tx: Sender<Command>,
    command_rx: Receiver<Command>,

    earth: EarthModel,
    environment: Environment,
    fcs: FlightControls,
    mass: MassBalance,
    aero: Aerodynamics,
    propulsion: Propulsion,
    gear: GroundReactions,
    aircraft: Aircraft,
    accelerations: Accelerations,
    propagate: Propagate,
    auxiliary: Auxiliary,
    metrics: crate::vehicle::Metrics,
}

/// Everything the executive needs to assemble a vehicle.
pub struct VehicleBuild {
    pub metrics: crate::vehicle::Metrics,
    pub environment: Environment,
    pub fcs: FlightControls,
    pub mass: MassBalance,
    pub aero: Aerodynamics,
    pub propulsion: Propulsion,
    pub gear: GroundReactions,
}

impl Executive {
    pub fn new(build: VehicleBuild, dt: f64) -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let mut exec = Self {
            bus: PropertyBus::new(),
            frame: FrameData::default(),
            ground: Box::new(FlatGround::default()),
            dt: if dt > 0.0 { dt } else { DEFAULT_DT },
            sim_time: 0.0,
            frame_count: 0,
            run_state: RunState::Running,
            crashed: false,
            quit: false,
            command_tx,
            command_rx,
            earth: EarthModel::new(),
            environment: build.environment,
            fcs: build.fcs,
            mass: build.mass,
            aero: build.aero,
            propulsion: build.propulsion,
            gear: build.gear,
            aircraft: Aircraft::new(),
            accelerations: Accelerations::new(),
            propagate: Propagate::new(),
            auxiliary: Auxiliary::new(build.metrics.clone()),
            metrics: build.metrics,
        };
        exec.bind()?;
        Ok(exec)
    }

    fn bind(&mut self) -> Result<()> {
        self.earth.bind(&mut self.bus)?;
        self.environment.bind(&mut self.bus)?;
        self.fcs.bind(&mut self.bus)?;
        self.mass.bind(&mut self.bus)?;
        self.aero.bind(&mut self.bus)?;
        self.propulsion.bind(&mut self.bus)?;
        self.gear.bind(&mut self.bus)?;
        self.aircraft.bind(&mut self.bus)?;
        self.accelerations.bind(&mut self.bus)?;
        self.propagate.bind(&mut self.bus)?;
        self.auxiliary.bind(&mut self.bus)?;
        Ok(())
    }

    /// Sender half of the asynchronous input channel; commands apply at the
    /// next tick boundary.
    pub fn command_sender(&self) -> Sender<Command> {
        self.command_tx.clone()
    }

    /// Swap the terrain source. Only honored while Holding.
    pub fn set_ground_callback(&mut self, ground: Box<dyn GroundCallback>) -> Result<()> {
        if self.run_state != RunState::Holding {
            return Err(SimError::Script(
                "ground callback may be replaced only while holding".to_string(),
            ));
        }
        self.ground = ground;
        Ok(())
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn crashed(&self) -> bool {
        self.crashed
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn hold(&mut self) {
        self.run_state = RunState::Holding;
    }

    pub fn resume(&mut self) {
        if !self.crashed {
            self.run_state = RunState::Running;
        }
    }

    pub fn hold_down(&mut self) {
        self.run_state = RunState::HoldDown;
    }

    /// Set the vehicle state from an initial condition and settle every
    /// module once without integrating.
    pub fn initialize(
        &mut self,
        location: Location,
        uvw: Vector3<f64>,
        pqr: Vector3<f64>,
        euler: EulerAngles,
    ) -> Result<()> {
        self.frame.state = propagate::initial_state(location, uvw, pqr, euler);
        self.frame.tanks = self.propulsion.tank_masses();
        self.propagate.initialize(&self.frame.state);
        self.sim_time = 0.0;
        self.frame_count = 0;
        self.crashed = false;

        // Two settle passes so every cross-module read sees current data.
        for _ in 0..2 {
            self.run_pipeline(false)?;
        }
        info!(
            "initialized at lat {:.4} deg, lon {:.4} deg, alt {:.0} ft",
            self.frame.state.location.geodetic_latitude().to_degrees(),
            self.frame.state.location.longitude().to_degrees(),
            self.frame.state.location.geodetic_altitude()
        );
        Ok(())
    }

    fn drain_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(Command::Set { path, value }) => {
                    if let Err(err) = self.bus.set_path(&path, value) {
                        warn!("console set rejected: {}", err);
                    }
                }
                Ok(Command::Hold) => self.hold(),
                Ok(Command::Resume) => self.resume(),
                Ok(Command::HoldDown) => self.hold_down(),
                Ok(Command::Quit) => self.quit = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn run_pipeline(&mut self, integrate: bool) -> Result<()> {
        let env = TickEnv {
            dt: self.dt,
            sim_time: self.sim_time,
            frame: self.frame_count,
            run_state: self.run_state,
            integrate,
            ground: self.ground.as_ref(),
        };
        let frame = &mut self.frame;
        let bus = &mut self.bus;
        let n = self.frame_count;
        macro_rules! run {
            ($module:expr) => {
                if n % $module.rate().max(1) == 0 {
                    $module.update(frame, bus, &env)?;
                }
            };
        }
        run!(self.earth);
        run!(self.environment);
        run!(self.fcs);
        run!(self.mass);
        run!(self.aero);
        run!(self.propulsion);
        run!(self.gear);
        run!(self.aircraft);
        run!(self.accelerations);
        run!(self.propagate);
        run!(self.auxiliary);
        Ok(())
    }

    /// Out-of-domain checks; any hit is a crash that engages Holding.
    fn check_divergence(&mut self) -> Option<String> {
        let gear = &self.frame.gear;
        if gear.max_compression > MAX_STRUT_COMPRESSION {
            return Some(format!(
                "strut compression {:.1} ft exceeds {:.0} ft",
                gear.max_compression, MAX_STRUT_COMPRESSION
            ));
        }
        if let Some(sink) = gear.touchdown_sink {
            if sink > MAX_SINK_RATE {
                return Some(format!(
                    "touchdown sink rate {:.1} ft/s exceeds {:.1} ft/s",
                    sink, MAX_SINK_RATE
                ));
            }
        }
        let total = &self.frame.total;
        if total.force.norm() > MAX_CONTACT_FORCE {
            return Some(format!("total force {:.3e} lbf diverged", total.force.norm()));
        }
        if total.moment.norm() > MAX_CONTACT_MOMENT {
            return Some(format!(
                "total moment {:.3e} lbf*ft diverged",
                total.moment.norm()
            ));
        }
        None
    }

    /// Advance the simulation one base tick.
    pub fn step(&mut self) -> Result<()> {
        // Synchronization barrier: external commands land between ticks.
        self.drain_commands();
        if self.quit {
            return Ok(());
        }

        let integrate = matches!(self.run_state, RunState::Running | RunState::HoldDown);
        match self.run_pipeline(integrate) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                error!("{} -- holding", err);
                self.hold();
                self.crashed = matches!(err, SimError::OutOfDomain(_));
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        if let Some(reason) = self.check_divergence() {
            error!("crash detected: {}", reason);
            self.crashed = true;
            self.run_state = RunState::Holding;
            return Err(SimError::OutOfDomain(reason));
        }

        self.gear.store_multipliers(&self.frame.gear.contacts);

        if integrate {
            self.sim_time += self.dt;
        }
        self.frame_count += 1;
        Ok(())
    }

    /// Run until `end_time` of simulated time has elapsed, calling `on_tick`
    /// after every step.
    pub fn run_until<F>(&mut self, end_time: f64, mut on_tick: F) -> Result<()>
    where
        F: FnMut(&mut Executive) -> Result<()>,
    {
        while self.sim_time < end_time && !self.quit {
            self.step()?;
            on_tick(self)?;
            if self.run_state == RunState::Holding && self.crashed {
                break;
            }
        }
        Ok(())
    }

    /// Longitudinal trim: damped fixed-point adjustment of pitch attitude,
    /// elevator, and throttle toward zero body-axis residual accelerations,
    /// with integration suspended throughout.
    pub fn trim_longitudinal(&mut self) -> Result<()> {
        let previous_state = self.run_state;
        self.run_state = RunState::Trimming;

        let mut euler = self.frame.state.euler;
        let location = self.frame.state.location.clone();
        // The flight path (NED velocity) is held; pitching the body then
        // genuinely changes the angle of attack.
        let v_ned = self.frame.state.v_ned;

        let mut converged = false;
        for _ in 0..TRIM_MAX_ITERATIONS {
            self.run_pipeline(false)?;

            let udot = self.frame.accel.uvw_dot.x;
            let wdot = self.frame.accel.uvw_dot.z;
            let qdot = self.frame.accel.pqr_dot.y;
            if udot.abs() < TRIM_TOLERANCE
                && wdot.abs() < TRIM_TOLERANCE
                && qdot.abs() < TRIM_TOLERANCE
            {
                converged = true;
                break;
            }

            // Sensitivity estimates from the current flight condition keep
            // the iteration damped across aircraft sizes.
            let qbar_s = (self.frame.air.qbar * self.metrics.wing_area).max(500.0);
            let mass = self.frame.mass.mass;
            let iyy = self.frame.mass.inertia[(1, 1)];

            let dtheta = (wdot / (5.0 * qbar_s / mass)).clamp(-0.02, 0.02);
            euler.theta = (euler.theta + 0.5 * dtheta).clamp(-0.5, 0.5);

            let de_sens = (1.5 * qbar_s * self.metrics.chord / iyy).max(1.0e-3);
            let de = (qdot / de_sens).clamp(-0.05, 0.05);
            let elevator =
                (self.bus.get_path("fcs/elevator-cmd-norm").unwrap_or(0.0) + 0.5 * de)
                    .clamp(-1.0, 1.0);
            let _ = self.bus.set_path("fcs/elevator-cmd-norm", elevator);

            let thrust_sens = (self.frame.mass.weight / 4.0 / mass).max(1.0e-3);
            let dth = (-udot / thrust_sens).clamp(-0.05, 0.05);
            if self.bus.contains("fcs/throttle-cmd-norm[0]") {
                let throttle = (self
                    .bus
                    .get_path("fcs/throttle-cmd-norm[0]")
                    .unwrap_or(0.0)
                    + 0.5 * dth)
                    .clamp(0.0, 1.0);
                let _ = self.bus.set_path("fcs/throttle-cmd-norm[0]", throttle);
            }

            let tl2b = crate::dynamics::state::VehicleState::quaternion_from_euler(&euler)
                .to_rotation_matrix()
                .matrix()
                .transpose();
            let uvw = tl2b * v_ned;
            self.frame.state =
                propagate::initial_state(location.clone(), uvw, Vector3::zeros(), euler);
            self.propagate.initialize(&self.frame.state);
        }

        self.run_state = previous_state;
        if converged {
            info!(
                "trim converged: theta {:.3} deg",
                euler.theta.to_degrees()
            );
            Ok(())
        } else {
            Err(SimError::TrimFailed(format!(
                "residuals udot {:.4}, wdot {:.4}, qdot {:.4} after {} iterations",
                self.frame.accel.uvw_dot.x,
                self.frame.accel.uvw_dot.z,
                self.frame.accel.pqr_dot.y,
                TRIM_MAX_ITERATIONS
            )))
        }
    }
}
