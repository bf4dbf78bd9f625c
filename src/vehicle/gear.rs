//! Landing-gear contact detection and ground reaction forces.
//!
//! Each strut produces a spring/damper normal force directly; the friction
//! forces in the wheel plane are posed as bounded Lagrange multipliers and
//! resolved simultaneously by the accelerations module.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::FrameData;
use crate::executive::module::{Module, TickEnv};
use crate::utils::{structural_to_body, Result};
use crate::vehicle::aero::Table1D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SteerType {
    Steerable,
    Fixed,
    Castered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrakeGroup {
    Left,
    Right,
    Center,
    Nose,
    Tail,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    pub name: String,
    /// Structural frame (in).
    pub location: Vector3<f64>,
    /// lbs/ft
    pub spring_coeff: f64,
    /// lbs per ft/s, compression stroke
    pub damping_coeff: f64,
    /// lbs per ft/s, rebound stroke
    pub damping_coeff_rebound: f64,
    pub static_friction: f64,
    pub dynamic_friction: f64,
    pub rolling_friction: f64,
    /// rad
    pub max_steer: f64,
    pub retractable: bool,
    pub steer_type: SteerType,
    pub brake_group: BrakeGroup,
    /// Slip angle (deg) -> lateral friction coefficient.
    pub cornering_table: Option<Table1D>,
}

/// One bounded friction multiplier for the contact solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Contact {
    /// Unit force direction, body frame.
    pub jacobian: Vector3<f64>,
    /// Lever arm from the CG, body frame (ft).
    pub lever: Vector3<f64>,
    /// lbf
    pub min: f64,
    pub max: f64,
    /// Resolved multiplier; also the warm start for the next tick.
    pub lambda: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GearOutput {
    /// Normal (spring/damper) force sum, body frame (lbf).
    pub force: Vector3<f64>,
    /// Moment of the normal forces about the CG (lbf*ft).
    pub moment: Vector3<f64>,
    pub contacts: Vec<Contact>,
    /// Any strut in contact.
    pub wow: bool,
    /// Largest strut compression this tick (ft).
    pub max_compression: f64,
    /// Sink rate recorded at the instant a strut first touched (ft/s).
    pub touchdown_sink: Option<f64>,
}

struct StrutState {
    in_contact: bool,
    lambda_roll: f64,
    lambda_side: f64,
}

/// C8: per-strut contact detection and ground reaction assembly.
pub struct GroundReactions {
    contacts: Vec<ContactConfig>,
    struts: Vec<StrutState>,

    p_wow: Option<PropertyId>,
    p_unit_wow: Vec<PropertyId>,
    p_unit_compression: Vec<PropertyId>,
    p_steer_pos: Option<PropertyId>,
}

impl GroundReactions {
    pub fn new(contacts: Vec<ContactConfig>) -> Self {
        let struts = contacts
            .iter()
            .map(|_| StrutState {
                in_contact: false,
                lambda_roll: 0.0,
                lambda_side: 0.0,
            })
            .collect();
        Self {
            contacts,
            struts,
            p_wow: None,
            p_unit_wow: Vec::new(),
            p_unit_compression: Vec::new(),
            p_steer_pos: None,
        }
    }

    /// Piecewise lateral friction fallback when no cornering table is given:
    /// linear up to 10 deg of slip, blending to the dynamic coefficient by
    /// 40 deg, saturated beyond.
    fn lateral_coeff(config: &ContactConfig, slip_deg: f64) -> f64 {
        if let Some(table) = &config.cornering_table {
            return table.lookup(slip_deg).abs();
        }
        let a = slip_deg.abs();
        if a <= 10.0 {
            config.static_friction * a / 10.0
        } else if a <= 40.0 {
            config.static_friction
                + (config.dynamic_friction - config.static_friction) * (a - 10.0) / 30.0
        } else {
            config.dynamic_friction
        }
    }

    fn brake_command(group: BrakeGroup, controls: &crate::vehicle::fcs::Effectors) -> f64 {
        match group {
            BrakeGroup::Left => controls.brake_left,
            BrakeGroup::Right => controls.brake_right,
            BrakeGroup::Center | BrakeGroup::Nose | BrakeGroup::Tail => controls.brake_center,
            BrakeGroup::None => 0.0,
        }
    }
}

impl Module for GroundReactions {
    fn name(&self) -> &'static str {
        "ground-reactions"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "ground-reactions";
        self.p_wow = Some(bus.publish(o, "gear/wow", 0.0, Access::ReadOnly)?);
        for i in 0..self.contacts.len() {
            self.p_unit_wow.push(bus.publish(
                o,
                &format!("gear/unit[{}]/WOW", i),
                0.0,
                Access::ReadOnly,
            )?);
            self.p_unit_compression.push(bus.publish(
                o,
                &format!("gear/unit[{}]/compression-ft", i),
                0.0,
                Access::ReadOnly,
            )?);
        }
        self.p_steer_pos = Some(bus.publish(o, "gear/steer-pos-rad", 0.0, Access::ReadOnly)?);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        let state = &frame.state;
        let tb2l = state.transforms.tb2l;
        let tl2b = state.transforms.tl2b;
        let alt_cg = state.location.geodetic_altitude();

        let mut out = GearOutput::default();
        let mut steer_pos = 0.0;

        for (i, config) in self.contacts.iter().enumerate() {
            let strut = &mut self.struts[i];

            // A retractable unit carries load only when fully extended.
            if config.retractable && frame.controls.gear_pos < 0.99 {
                strut.in_contact = false;
                bus.set(self.p_unit_wow[i], 0.0);
                bus.set(self.p_unit_compression[i], 0.0);
                continue;
            }

            let r_b = structural_to_body(&config.location, &frame.mass.cg);
            let d_l = tb2l * r_b;
            let tip_alt = alt_cg - d_l.z;

            let terrain = env.ground.terrain(env.sim_time, &state.location);
            let compression = terrain.elevation - tip_alt;
            if compression <= 0.0 {
                strut.in_contact = false;
                strut.lambda_roll = 0.0;
                strut.lambda_side = 0.0;
                bus.set(self.p_unit_wow[i], 0.0);
                bus.set(self.p_unit_compression[i], 0.0);
                continue;
            }

            // Tip velocity relative to the terrain, local frame.
            let v_tip_b = state.uvw + state.pqr.cross(&r_b);
            let v_rel_l = tb2l * v_tip_b - terrain.velocity;
            let compression_rate = v_rel_l.z;

            if !strut.in_contact {
                let sink = compression_rate.max(0.0);
                out.touchdown_sink = Some(out.touchdown_sink.map_or(sink, |s: f64| s.max(sink)));
                strut.in_contact = true;
            }

            let damping = if compression_rate >= 0.0 {
                config.damping_coeff
            } else {
                config.damping_coeff_rebound
            };
            let normal_force =
                (config.spring_coeff * compression + damping * compression_rate).max(0.0);

            // Normal force acts along the terrain normal (up is -z local).
            let force_l = terrain.normal * normal_force;
            let force_b = tl2b * force_l;
            out.force += force_b;
            out.moment += r_b.cross(&force_b);

            // Wheel-plane axes, rotated by the current steer angle.
            let steer = match config.steer_type {
                SteerType::Fixed => 0.0,
                SteerType::Steerable => {
                    (frame.controls.steering * config.max_steer).clamp(-config.max_steer, config.max_steer)
                }
                SteerType::Castered => {
                    let v_b = tl2b * v_rel_l;
                    if (v_b.x * v_b.x + v_b.y * v_b.y).sqrt() > 0.1 {
                        v_b.y.atan2(v_b.x)
                    } else {
                        0.0
                    }
                }
            };
            if config.steer_type == SteerType::Steerable && config.max_steer > 0.0 {
                steer_pos = steer;
            }
            let (ss, cs) = steer.sin_cos();
            let fwd = Vector3::new(cs, ss, 0.0);
            let side = Vector3::new(-ss, cs, 0.0);

            let brake = Self::brake_command(config.brake_group, &frame.controls).clamp(0.0, 1.0);
            let mu_roll =
                config.rolling_friction * (1.0 - brake) + config.static_friction * brake;

            let v_b = tl2b * v_rel_l;
            let v_fwd = v_b.dot(&fwd);
            let v_side = v_b.dot(&side);
            let slip_deg = v_side.atan2(v_fwd.abs().max(1.0e-3)).to_degrees();
            let mu_side = Self::lateral_coeff(config, slip_deg).max(0.05);

            out.contacts.push(Contact {
                jacobian: fwd,
                lever: r_b,
                min: -mu_roll * normal_force,
                max: mu_roll * normal_force,
                lambda: strut.lambda_roll,
            });
            out.contacts.push(Contact {
                jacobian: side,
                lever: r_b,
                min: -mu_side * normal_force,
                max: mu_side * normal_force,
                lambda: strut.lambda_side,
            });

            out.wow = true;
            out.max_compression = out.max_compression.max(compression);
            bus.set(self.p_unit_wow[i], 1.0);
            bus.set(self.p_unit_compression[i], compression);
        }

        if let Some(id) = self.p_wow {
            bus.set(id, if out.wow { 1.0 } else { 0.0 });
        }
        if let Some(id) = self.p_steer_pos {
            bus.set(id, steer_pos);
        }

        frame.gear = out;
        Ok(())
    }
}

/// Called by the executive after the friction solve so the next tick warm
/// starts from the resolved multipliers.
impl GroundReactions {
    pub fn store_multipliers(&mut self, contacts: &[Contact]) {
        let mut iter = contacts.iter();
        for strut in &mut self.struts {
            if !strut.in_contact {
                continue;
            }
            if let Some(roll) = iter.next() {
                strut.lambda_roll = roll.lambda;
            }
            if let Some(side) = iter.next() {
                strut.lambda_side = side.lambda;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> ContactConfig {
        ContactConfig {
            name: "NOSE".to_string(),
            location: Vector3::new(0.0, 0.0, -20.0),
            spring_coeff: 1800.0,
            damping_coeff: 600.0,
            damping_coeff_rebound: 1200.0,
            static_friction: 0.8,
            dynamic_friction: 0.5,
            rolling_friction: 0.02,
            max_steer: 0.17,
            retractable: false,
            steer_type: SteerType::Steerable,
            brake_group: BrakeGroup::None,
            cornering_table: None,
        }
    }

    #[test]
    fn lateral_fallback_has_three_regimes() {
        let c = config();
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, 0.0), 0.0);
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, 5.0), 0.4);
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, 10.0), 0.8);
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, 25.0), 0.65);
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, 60.0), 0.5);
    }

    #[test]
    fn cornering_table_overrides_fallback() {
        let mut c = config();
        c.cornering_table = Some(Table1D::new(vec![(-20.0, -0.9), (0.0, 0.0), (20.0, 0.9)]));
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, 10.0), 0.45);
        // Magnitude only; the solver supplies the sign.
        assert_relative_eq!(GroundReactions::lateral_coeff(&c, -10.0), 0.45);
    }
}
