//! Engines, fuel tanks, and the per-tick drain accounting.

pub mod engine;

pub use engine::{Engine, EngineKind, EngineOutput, Thruster};

use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bus::{self, Access, PropertyBus, PropertyId};
use crate::executive::frame::{ForceMoment, FrameData};
use crate::executive::module::{Module, RunState, TickEnv};
use crate::utils::constants::LBS_TO_SLUG;
use crate::utils::{structural_to_body, Result};
use crate::vehicle::mass::TankMass;

/// Mass transfer rate while refueling or dumping in hold-down (lbs/s).
const TRANSFER_RATE: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tank {
    /// lbs
    pub capacity: f64,
    /// lbs
    pub contents: f64,
    /// Structural frame (in).
    pub location: Vector3<f64>,
}

impl Tank {
    pub fn is_empty(&self) -> bool {
        self.contents <= 0.0
    }

    /// Remove up to `amount` lbs; returns what was actually drained.
    pub fn drain(&mut self, amount: f64) -> f64 {
        let taken = amount.min(self.contents).max(0.0);
        self.contents -= taken;
        taken
    }

    /// Add up to `amount` lbs; returns what was actually accepted.
    pub fn fill(&mut self, amount: f64) -> f64 {
        let space = (self.capacity - self.contents).max(0.0);
        let added = amount.min(space).max(0.0);
        self.contents += added;
        added
    }

    pub fn as_mass(&self) -> TankMass {
        TankMass {
            mass: self.contents * LBS_TO_SLUG,
            location: self.location,
        }
    }
}

/// C7: runs every engine, spreads fuel demand over the feed tanks, and sums
/// body-frame thrust forces and moments.
pub struct Propulsion {
    engines: Vec<Engine>,
    tanks: Vec<Tank>,

    p_thrust: Vec<PropertyId>,
    p_fuel_flow: Vec<PropertyId>,
    p_starved: Vec<PropertyId>,
    p_contents: Vec<PropertyId>,
    p_total_fuel: Option<PropertyId>,
    p_refuel: Option<PropertyId>,
    p_dump: Option<PropertyId>,
}

impl Propulsion {
    pub fn new(engines: Vec<Engine>, tanks: Vec<Tank>) -> Self {
        Self {
            engines,
            tanks,
            p_thrust: Vec::new(),
            p_fuel_flow: Vec::new(),
            p_starved: Vec::new(),
            p_contents: Vec::new(),
            p_total_fuel: None,
            p_refuel: None,
            p_dump: None,
        }
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn tank_masses(&self) -> Vec<TankMass> {
        self.tanks.iter().map(Tank::as_mass).collect()
    }

    pub fn total_fuel_lbs(&self) -> f64 {
        self.tanks.iter().map(|t| t.contents).sum()
    }

    /// Spread an engine's demand evenly across its non-empty feed tanks.
    /// Returns true if the demand was fully met.
    fn consume(tanks: &mut [Tank], feed: &[usize], demand: f64) -> bool {
        if demand <= 0.0 {
            return true;
        }
        let mut remaining = demand;
        // A tank that runs dry pushes its share onto the others.
        for _ in 0..feed.len().max(1) {
            let live: Vec<usize> = feed
                .iter()
                .copied()
                .filter(|&i| i < tanks.len() && !tanks[i].is_empty())
                .collect();
            if live.is_empty() || remaining <= 1.0e-12 {
                break;
            }
            let share = remaining / live.len() as f64;
            for i in live {
                remaining -= tanks[i].drain(share);
            }
        }
        remaining <= 1.0e-9
    }
}

impl Module for Propulsion {
    fn name(&self) -> &'static str {
        "propulsion"
    }

    fn bind(&mut self, bus: &mut PropertyBus) -> bus::Result<()> {
        let o = "propulsion";
        for i in 0..self.engines.len() {
            self.p_thrust.push(bus.publish(
                o,
                &format!("propulsion/engine[{}]/thrust-lbs", i),
                0.0,
                Access::ReadOnly,
            )?);
            self.p_fuel_flow.push(bus.publish(
                o,
                &format!("propulsion/engine[{}]/fuel-flow-rate-pps", i),
                0.0,
                Access::ReadOnly,
            )?);
            self.p_starved.push(bus.publish(
                o,
                &format!("propulsion/engine[{}]/starved", i),
                0.0,
                Access::ReadOnly,
            )?);
        }
        for (i, tank) in self.tanks.iter().enumerate() {
            self.p_contents.push(bus.publish(
                o,
                &format!("propulsion/tank[{}]/contents-lbs", i),
                tank.contents,
                Access::ReadWrite,
            )?);
        }
        self.p_total_fuel = Some(bus.publish(o, "propulsion/total-fuel-lbs", 0.0, Access::ReadOnly)?);
        self.p_refuel = Some(bus.publish(o, "propulsion/refuel", 0.0, Access::ReadWrite)?);
        self.p_dump = Some(bus.publish(o, "propulsion/fuel-dump", 0.0, Access::ReadWrite)?);
        Ok(())
    }

    fn update(&mut self, frame: &mut FrameData, bus: &mut PropertyBus, env: &TickEnv) -> Result<()> {
        // Scripts may have rewritten tank contents through the bus.
        for (tank, &id) in self.tanks.iter_mut().zip(&self.p_contents) {
            tank.contents = bus.get(id).clamp(0.0, tank.capacity);
        }

        let mut total = ForceMoment::default();
        for (i, engine) in self.engines.iter_mut().enumerate() {
            let throttle = frame.controls.throttle.get(i).copied().unwrap_or(0.0);
            let mixture = frame.controls.mixture.get(i).copied().unwrap_or(1.0);
            let out = engine.calculate(env.dt, throttle, mixture, frame.air.vt, &frame.atmos);

            let demand = out.fuel_flow * env.dt;
            let fed = Self::consume(&mut self.tanks, &engine.feed, demand);
            if !fed && !engine.starved {
                warn!("engine {} fuel starved", engine.name);
            }
            engine.starved = !fed;

            let dir = engine.thrust_direction();
            let force = dir * out.thrust;
            let arm = structural_to_body(&engine.location, &frame.mass.cg);
            total.force += force;
            total.moment += arm.cross(&force);

            bus.set(self.p_thrust[i], out.thrust);
            bus.set(self.p_fuel_flow[i], out.fuel_flow);
            bus.set(self.p_starved[i], if engine.starved { 1.0 } else { 0.0 });
        }

        // Ground servicing: mass transfer only while held down.
        if env.run_state == RunState::HoldDown {
            if self.p_refuel.map(|id| bus.get_bool(id)).unwrap_or(false) {
                let mut budget = TRANSFER_RATE * env.dt;
                for tank in &mut self.tanks {
                    budget -= tank.fill(budget);
                    if budget <= 0.0 {
                        break;
                    }
                }
            }
            if self.p_dump.map(|id| bus.get_bool(id)).unwrap_or(false) {
                let mut budget = TRANSFER_RATE * env.dt;
                for tank in &mut self.tanks {
                    budget -= tank.drain(budget);
                    if budget <= 0.0 {
                        break;
                    }
                }
            }
        }

        for (tank, &id) in self.tanks.iter().zip(&self.p_contents) {
            bus.set(id, tank.contents);
        }
        if let Some(id) = self.p_total_fuel {
            bus.set(id, self.total_fuel_lbs());
        }

        frame.tanks = self.tank_masses();
        frame.prop = total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tank(contents: f64) -> Tank {
        Tank {
            capacity: 100.0,
            contents,
            location: Vector3::new(48.0, 0.0, 30.0),
        }
    }

    #[test]
    fn demand_spreads_evenly_over_feed_tanks() {
        let mut tanks = vec![tank(50.0), tank(50.0)];
        assert!(Propulsion::consume(&mut tanks, &[0, 1], 10.0));
        assert_relative_eq!(tanks[0].contents, 45.0, epsilon = 1e-9);
        assert_relative_eq!(tanks[1].contents, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn dry_tank_pushes_demand_to_the_rest() {
        let mut tanks = vec![tank(2.0), tank(50.0)];
        assert!(Propulsion::consume(&mut tanks, &[0, 1], 10.0));
        assert_relative_eq!(tanks[0].contents, 0.0, epsilon = 1e-9);
        assert_relative_eq!(tanks[1].contents, 42.0, epsilon = 1e-9);
    }

    #[test]
    fn underflow_reports_starvation_and_clamps() {
        let mut tanks = vec![tank(1.0)];
        assert!(!Propulsion::consume(&mut tanks, &[0], 5.0));
        assert_relative_eq!(tanks[0].contents, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn tank_mass_is_in_slugs() {
        let t = tank(32.174_05);
        assert_relative_eq!(t.as_mass().mass, 1.0, epsilon = 1e-6);
    }
}
