//! Line-oriented CSV output.
//!
//! The header is emitted once; each line carries `sim-time-sec` followed by
//! the enabled subsystem groups in a fixed order. Per-engine and per-gear
//! columns are discovered from the property catalog at attach time.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use log::info;

use crate::bus::PropertyBus;
use crate::executive::Executive;
use crate::utils::{Result, SimError};

/// Subsystem column groups, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputGroup {
    Aerosurfaces,
    Rates,
    Velocities,
    Forces,
    Moments,
    Atmosphere,
    MassProps,
    Position,
    Coefficients,
    Fcs,
    GroundReactions,
    Propulsion,
}

impl OutputGroup {
    pub const ALL: [OutputGroup; 12] = [
        OutputGroup::Aerosurfaces,
        OutputGroup::Rates,
        OutputGroup::Velocities,
        OutputGroup::Forces,
        OutputGroup::Moments,
        OutputGroup::Atmosphere,
        OutputGroup::MassProps,
        OutputGroup::Position,
        OutputGroup::Coefficients,
        OutputGroup::Fcs,
        OutputGroup::GroundReactions,
        OutputGroup::Propulsion,
    ];

    /// Fixed (header, property) pairs for this group.
    fn columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            OutputGroup::Aerosurfaces => &[
                ("Aileron Cmd", "fcs/aileron-cmd-norm"),
                ("Elevator Cmd", "fcs/elevator-cmd-norm"),
                ("Rudder Cmd", "fcs/rudder-cmd-norm"),
                ("Flap Cmd", "fcs/flap-cmd-norm"),
                ("Aileron Pos", "fcs/aileron-pos-rad"),
                ("Elevator Pos", "fcs/elevator-pos-rad"),
                ("Rudder Pos", "fcs/rudder-pos-rad"),
                ("Flap Pos", "fcs/flap-pos-norm"),
            ],
            OutputGroup::Rates => &[
                ("P", "velocities/p-rad_sec"),
                ("Q", "velocities/q-rad_sec"),
                ("R", "velocities/r-rad_sec"),
                ("Pdot", "accelerations/pdot-rad_sec2"),
                ("Qdot", "accelerations/qdot-rad_sec2"),
                ("Rdot", "accelerations/rdot-rad_sec2"),
            ],
            OutputGroup::Velocities => &[
                ("QBar", "aero/qbar-psf"),
                ("Vtotal", "velocities/vt-fps"),
                ("UBody", "velocities/u-fps"),
                ("VBody", "velocities/v-fps"),
                ("WBody", "velocities/w-fps"),
                ("UAero", "velocities/u-aero-fps"),
                ("VAero", "velocities/v-aero-fps"),
                ("WAero", "velocities/w-aero-fps"),
                ("Vn", "velocities/v-north-fps"),
                ("Ve", "velocities/v-east-fps"),
                ("Vd", "velocities/v-down-fps"),
            ],
            OutputGroup::Forces => &[
                ("F_Drag", "forces/fw-drag-lbs"),
                ("F_Side", "forces/fw-side-lbs"),
                ("F_Lift", "forces/fw-lift-lbs"),
                ("LoD", "aero/lod-norm"),
                ("Fx", "forces/fbx-lbs"),
                ("Fy", "forces/fby-lbs"),
                ("Fz", "forces/fbz-lbs"),
            ],
            OutputGroup::Moments => &[
                ("L", "moments/l-lbsft"),
                ("M", "moments/m-lbsft"),
                ("N", "moments/n-lbsft"),
            ],
            OutputGroup::Atmosphere => &[
                ("Rho", "atmosphere/rho-slugs_ft3"),
                ("Wind Vn", "atmosphere/wind-north-fps"),
                ("Wind Ve", "atmosphere/wind-east-fps"),
                ("Wind Vd", "atmosphere/wind-down-fps"),
            ],
            OutputGroup::MassProps => &[
                ("Ixx", "inertia/ixx-slugs_ft2"),
                ("Iyy", "inertia/iyy-slugs_ft2"),
                ("Izz", "inertia/izz-slugs_ft2"),
                ("Mass", "inertia/mass-slugs"),
                ("Xcg", "inertia/cg-x-in"),
                ("Ycg", "inertia/cg-y-in"),
                ("Zcg", "inertia/cg-z-in"),
            ],
            OutputGroup::Position => &[
                ("Altitude", "position/h-sl-ft"),
                ("Phi", "attitude/phi-rad"),
                ("Tht", "attitude/theta-rad"),
                ("Psi", "attitude/psi-rad"),
                ("Alpha", "aero/alpha-rad"),
                ("Beta", "aero/beta-rad"),
                ("Latitude", "position/lat-gc-deg"),
                ("Longitude", "position/long-gc-deg"),
                ("AGL", "position/h-agl-ft"),
                ("Runway Radius", "position/runway-radius-ft"),
            ],
            OutputGroup::Coefficients => &[
                ("CLsq", "aero/cl-squared"),
                ("Stall Warn", "aero/stall-warn-norm"),
                ("Stall Hyst", "aero/stall-hyst-norm"),
            ],
            OutputGroup::Fcs => &[("Steer Cmd", "fcs/steer-cmd-norm")],
            OutputGroup::GroundReactions => &[("WOW", "gear/wow"), ("Steer Pos", "gear/steer-pos-rad")],
            OutputGroup::Propulsion => &[("Total Fuel", "propulsion/total-fuel-lbs")],
        }
    }

    /// Catalog prefixes contributing indexed columns (engines, gear units).
    fn dynamic_prefixes(&self) -> &'static [&'static str] {
        match self {
            OutputGroup::Fcs => &["fcs/throttle-cmd-norm["],
            OutputGroup::GroundReactions => &["gear/unit["],
            OutputGroup::Propulsion => &["propulsion/engine[", "propulsion/tank["],
            _ => &[],
        }
    }
}

/// CSV writer with an output rate divisor and an optional user column list.
pub struct CsvWriter {
    writer: BufWriter<File>,
    columns: Vec<(String, String)>,
    divisor: u64,
    wrote_header: bool,
    frames_seen: u64,
}

impl CsvWriter {
    /// `rate_hz` of 0 (or >= the base rate) logs every tick.
    pub fn create(
        path: &Path,
        bus: &PropertyBus,
        base_dt: f64,
        rate_hz: f64,
        groups: &[OutputGroup],
        user_properties: &[String],
    ) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| SimError::Output(format!("{}: {}", path.display(), e)))?;

        let mut columns = Vec::new();
        for group in groups {
            for (header, property) in group.columns() {
                columns.push((header.to_string(), property.to_string()));
            }
            for prefix in group.dynamic_prefixes() {
                for entry in bus.catalog() {
                    if entry.path.starts_with(prefix) {
                        columns.push((entry.path.clone(), entry.path));
                    }
                }
            }
        }
        for property in user_properties {
            columns.push((property.clone(), property.clone()));
        }

        let divisor = if rate_hz > 0.0 {
            ((1.0 / (rate_hz * base_dt)).round() as u64).max(1)
        } else {
            1
        };

        info!(
            "CSV output to {} ({} columns, every {} frames)",
            path.display(),
            columns.len() + 1,
            divisor
        );
        Ok(Self {
            writer: BufWriter::new(file),
            columns,
            divisor,
            wrote_header: false,
            frames_seen: 0,
        })
    }

    fn write_header(&mut self) -> Result<()> {
        writeln!(
            self.writer,
            "# generated {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )
        .map_err(|e| SimError::Output(e.to_string()))?;
        let mut line = String::from("Time");
        for (header, _) in &self.columns {
            line.push(',');
            line.push_str(header);
        }
        writeln!(self.writer, "{}", line).map_err(|e| SimError::Output(e.to_string()))?;
        Ok(())
    }

    /// Log the current state; honors the rate divisor.
    pub fn log(&mut self, exec: &Executive) -> Result<()> {
        if !self.wrote_header {
            self.write_header()?;
            self.wrote_header = true;
        }
        let frame = self.frames_seen;
        self.frames_seen += 1;
        if frame % self.divisor != 0 {
            return Ok(());
        }

        let mut line = format!("{:.6}", exec.sim_time());
        for (_, property) in &self.columns {
            let value = exec.bus.get_path(property).unwrap_or(0.0);
            line.push(',');
            line.push_str(&format!("{:.8}", value));
        }
        writeln!(self.writer, "{}", line).map_err(|e| SimError::Output(e.to_string()))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| SimError::Output(e.to_string()))
    }
}
