use nalgebra::Vector3;

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::{ForceMoment, FrameData};
use crate::executive::module::{Module, TickEnv};
use crate::utils::Result;

/// C9: sums the force and moment contributions of every producer and
/// exposes the aggregate observables.
///
/// External forces arrive through writable properties so scripts and tests
/// can apply tow loads or disturbances in the body frame.
pub struct Aircraft {
    p_force: [Option<PropertyId>; 3],
    p_moment: [Option<PropertyId>; 3],
    p_ext_force: [Option<PropertyId>; 3],
    p_ext_moment: [Option<PropertyId>; 3],
    p_load_factor: Option<PropertyId>,
}

impl Aircraft {
    pub fn new() -> Self {
        Self {
            p_force: [None; 3],
            p_moment: [None; 3],
            p_ext_force: [None; 3],
            p_ext_moment: [None; 3],
            p_load_factor: None,
        }
    }
}

impl Default for Aircraft {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Aircraft {
    fn name(&self) -> &'static str {
        "aircraft"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "aircraft";
        for (i, axis) in ["x", "y", "z"].iter().enumerate() {
            self.p_force[i] = Some(bus.publish(
                o,
                &format!("forces/fb{}-lbs", axis),
                0.0,
                Access::ReadOnly,
            )?);
            self.p_moment[i] = Some(bus.publish(
                o,
                &format!("moments/{}-lbsft", ["l", "m", "n"][i]),
                0.0,
                Access::ReadOnly,
            )?);
            self.p_ext_force[i] = Some(bus.publish(
                o,
                &format!("forces/external-{}-lbs", axis),
                0.0,
                Access::ReadWrite,
            )?);
            self.p_ext_moment[i] = Some(bus.publish(
                o,
                &format!("moments/external-{}-lbsft", ["l", "m", "n"][i]),
                0.0,
                Access::ReadWrite,
            )?);
        }
        self.p_load_factor = Some(bus.publish(o, "forces/load-factor", 0.0, Access::ReadOnly)?);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, _env: &TickEnv) -> Result<()> {
        frame.external = ForceMoment {
            force: Vector3::new(
                self.p_ext_force[0].map(|id| bus.get(id)).unwrap_or(0.0),
                self.p_ext_force[1].map(|id| bus.get(id)).unwrap_or(0.0),
                self.p_ext_force[2].map(|id| bus.get(id)).unwrap_or(0.0),
            ),
            moment: Vector3::new(
                self.p_ext_moment[0].map(|id| bus.get(id)).unwrap_or(0.0),
                self.p_ext_moment[1].map(|id| bus.get(id)).unwrap_or(0.0),
                self.p_ext_moment[2].map(|id| bus.get(id)).unwrap_or(0.0),
            ),
        };

        let mut total = ForceMoment::default();
        total.force = frame.aero.force + frame.prop.force + frame.gear.force + frame.external.force;
        total.moment =
            frame.aero.moment + frame.prop.moment + frame.gear.moment + frame.external.moment;

        // Load factor: lift carried per pound of weight.
        let load_factor = if frame.mass.weight > 1.0e-9 {
            frame.aero.fw.z / frame.mass.weight
        } else {
            0.0
        };

        for i in 0..3 {
            if let Some(id) = self.p_force[i] {
                bus.set(id, total.force[i]);
            }
            if let Some(id) = self.p_moment[i] {
                bus.set(id, total.moment[i]);
            }
        }
        if let Some(id) = self.p_load_factor {
            bus.set(id, load_factor);
        }

        frame.total = total;
        Ok(())
    }
}
