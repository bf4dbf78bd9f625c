use serde::{Deserialize, Serialize};

use crate::bus::{PropertyBus, PropertyId};
use crate::vehicle::aero::Table1D;

/// A signed property reference used as a component input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRef {
    pub path: String,
    pub sign: f64,
    #[serde(skip)]
    pub id: Option<PropertyId>,
}

impl InputRef {
    pub fn new(path: &str) -> Self {
        let (sign, path) = match path.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, path),
        };
        Self {
            path: path.to_string(),
            sign,
            id: None,
        }
    }

    pub fn resolve(&mut self, bus: &mut PropertyBus) {
        self.id = Some(bus.touch("fcs", &self.path));
    }

    pub fn value(&self, bus: &PropertyBus) -> f64 {
        self.sign * self.id.map(|id| bus.get(id)).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Ge,
    Le,
    Eq,
    Gt,
    Lt,
}

impl Comparison {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ge" | "GE" => Some(Comparison::Ge),
            "le" | "LE" => Some(Comparison::Le),
            "eq" | "EQ" => Some(Comparison::Eq),
            "gt" | "GT" => Some(Comparison::Gt),
            "lt" | "LT" => Some(Comparison::Lt),
            _ => None,
        }
    }

    pub fn test(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Ge => lhs >= rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => (lhs - rhs).abs() < 1.0e-9,
            Comparison::Gt => lhs > rhs,
            Comparison::Lt => lhs < rhs,
        }
    }
}

/// One branch of a switch: selected when its test passes (a branch without
/// a test is the default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub test: Option<(InputRef, Comparison, f64)>,
    pub value: InputRef,
}

/// Control-law component kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Sum of all inputs plus a bias.
    Summer { bias: f64 },
    /// Pure gain on the first input.
    Gain { gain: f64 },
    /// Gain scheduled on a lookup property.
    ScheduledGain { table: Table1D, schedule: InputRef },
    /// Zero output inside the band.
    Deadband { width: f64 },
    /// First matching branch wins.
    Switch { cases: Vec<SwitchCase> },
    /// First-order lag, exact discretization.
    Lag {
        tau: f64,
        #[serde(default)]
        state: f64,
    },
    /// Critically-parameterized second-order filter (wn, zeta).
    SecondOrder {
        wn: f64,
        zeta: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        ydot: f64,
    },
    /// Rate-limited traverse through position/time detents.
    Kinematic {
        /// (position, seconds from previous detent)
        detents: Vec<(f64, f64)>,
        #[serde(default)]
        state: f64,
    },
    /// Map a normalized [-1, 1] input onto [min, max].
    AerosurfaceScale { min: f64, max: f64 },
}

/// A named FCS pipeline stage with one output property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcsComponent {
    pub name: String,
    pub inputs: Vec<InputRef>,
    pub output: String,
    #[serde(skip)]
    pub output_id: Option<PropertyId>,
    pub clip: Option<(f64, f64)>,
    pub kind: ComponentKind,
}

impl FcsComponent {
    pub fn resolve(&mut self, bus: &mut PropertyBus) {
        for input in &mut self.inputs {
            input.resolve(bus);
        }
        if let ComponentKind::ScheduledGain { schedule, .. } = &mut self.kind {
            schedule.resolve(bus);
        }
        if let ComponentKind::Switch { cases } = &mut self.kind {
            for case in cases {
                case.value.resolve(bus);
                if let Some((test_input, _, _)) = &mut case.test {
                    test_input.resolve(bus);
                }
            }
        }
        self.output_id = Some(bus.touch("fcs", &self.output));
    }

    pub fn update(&mut self, bus: &mut PropertyBus, dt: f64) {
        let raw = match &mut self.kind {
            ComponentKind::Summer { bias } => {
                let sum: f64 = self.inputs.iter().map(|i| i.value(bus)).sum();
                sum + *bias
            }
            ComponentKind::Gain { gain } => {
                *gain * self.inputs.first().map(|i| i.value(bus)).unwrap_or(0.0)
            }
            ComponentKind::ScheduledGain { table, schedule } => {
                let gain = table.lookup(schedule.value(bus));
                gain * self.inputs.first().map(|i| i.value(bus)).unwrap_or(0.0)
            }
            ComponentKind::Deadband { width } => {
                let x = self.inputs.first().map(|i| i.value(bus)).unwrap_or(0.0);
                let half = *width / 2.0;
                if x.abs() <= half {
                    0.0
                } else {
                    x - half * x.signum()
                }
            }
            ComponentKind::Switch { cases } => cases
                .iter()
                .find(|case| match &case.test {
                    Some((input, cmp, value)) => cmp.test(input.value(bus), *value),
                    None => true,
                })
                .map(|case| case.value.value(bus))
                .unwrap_or(0.0),
            ComponentKind::Lag { tau, state } => {
                let x = self.inputs.first().map(|i| i.value(bus)).unwrap_or(0.0);
                if *tau > 1.0e-9 {
                    *state += (x - *state) * (1.0 - (-dt / *tau).exp());
                } else {
                    *state = x;
                }
                *state
            }
            ComponentKind::SecondOrder { wn, zeta, y, ydot } => {
                let x = self.inputs.first().map(|i| i.value(bus)).unwrap_or(0.0);
                let yddot = wn.powi(2) * (x - *y) - 2.0 * *zeta * *wn * *ydot;
                *ydot += yddot * dt;
                *y += *ydot * dt;
                *y
            }
            ComponentKind::Kinematic { detents, state } => {
                let cmd = self.inputs.first().map(|i| i.value(bus)).unwrap_or(0.0);
                let target = cmd.clamp(
                    detents.first().map(|d| d.0).unwrap_or(0.0),
                    detents.last().map(|d| d.0).unwrap_or(1.0),
                );
                // Traverse rate from the detent pair bracketing the state.
                let mut rate = f64::INFINITY;
                for pair in detents.windows(2) {
                    let (p0, _) = pair[0];
                    let (p1, t1) = pair[1];
                    let inside = *state >= p0.min(p1) - 1.0e-9 && *state <= p0.max(p1) + 1.0e-9;
                    if inside && t1 > 1.0e-9 {
                        rate = (p1 - p0).abs() / t1;
                        break;
                    }
                }
                if rate.is_infinite() {
                    *state = target;
                } else {
                    let step = rate * dt;
                    if (target - *state).abs() <= step {
                        *state = target;
                    } else {
                        *state += step * (target - *state).signum();
                    }
                }
                *state
            }
            ComponentKind::AerosurfaceScale { min, max } => {
                let x = self
                    .inputs
                    .first()
                    .map(|i| i.value(bus))
                    .unwrap_or(0.0)
                    .clamp(-1.0, 1.0);
                if x >= 0.0 {
                    x * *max
                } else {
                    -x * *min
                }
            }
        };

        let value = match self.clip {
            Some((lo, hi)) => raw.clamp(lo, hi),
            None => raw,
        };
        if let Some(id) = self.output_id {
            bus.set(id, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bus_with(path: &str, value: f64) -> PropertyBus {
        let mut bus = PropertyBus::new();
        let id = bus.touch("test", path);
        bus.set(id, value);
        bus
    }

    fn run(component: &mut FcsComponent, bus: &mut PropertyBus, dt: f64) -> f64 {
        component.resolve(bus);
        component.update(bus, dt);
        bus.get(component.output_id.unwrap())
    }

    #[test]
    fn summer_adds_signed_inputs_and_bias() {
        let mut bus = bus_with("a", 2.0);
        let id = bus.touch("test", "b");
        bus.set(id, 3.0);
        let mut c = FcsComponent {
            name: "sum".to_string(),
            inputs: vec![InputRef::new("a"), InputRef::new("-b")],
            output: "out".to_string(),
            output_id: None,
            clip: None,
            kind: ComponentKind::Summer { bias: 0.5 },
        };
        assert_relative_eq!(run(&mut c, &mut bus, 0.01), -0.5);
    }

    #[test]
    fn deadband_zeroes_small_signals() {
        let mut bus = bus_with("x", 0.05);
        let mut c = FcsComponent {
            name: "db".to_string(),
            inputs: vec![InputRef::new("x")],
            output: "out".to_string(),
            output_id: None,
            clip: None,
            kind: ComponentKind::Deadband { width: 0.2 },
        };
        assert_relative_eq!(run(&mut c, &mut bus, 0.01), 0.0);
        bus.set_path("x", 0.5).unwrap();
        c.update(&mut bus, 0.01);
        assert_relative_eq!(bus.get(c.output_id.unwrap()), 0.4);
    }

    #[test]
    fn switch_takes_first_passing_branch() {
        let mut bus = bus_with("cond", 5.0);
        for (p, v) in [("low", 1.0), ("high", 2.0)] {
            let id = bus.touch("test", p);
            bus.set(id, v);
        }
        let mut c = FcsComponent {
            name: "sw".to_string(),
            inputs: vec![],
            output: "out".to_string(),
            output_id: None,
            clip: None,
            kind: ComponentKind::Switch {
                cases: vec![
                    SwitchCase {
                        test: Some((InputRef::new("cond"), Comparison::Ge, 10.0)),
                        value: InputRef::new("high"),
                    },
                    SwitchCase {
                        test: None,
                        value: InputRef::new("low"),
                    },
                ],
            },
        };
        assert_relative_eq!(run(&mut c, &mut bus, 0.01), 1.0);
        bus.set_path("cond", 20.0).unwrap();
        c.update(&mut bus, 0.01);
        assert_relative_eq!(bus.get(c.output_id.unwrap()), 2.0);
    }

    #[test]
    fn lag_converges_on_step_input() {
        let mut bus = bus_with("x", 1.0);
        let mut c = FcsComponent {
            name: "lag".to_string(),
            inputs: vec![InputRef::new("x")],
            output: "out".to_string(),
            output_id: None,
            clip: None,
            kind: ComponentKind::Lag {
                tau: 0.1,
                state: 0.0,
            },
        };
        c.resolve(&mut bus);
        for _ in 0..200 {
            c.update(&mut bus, 1.0 / 120.0);
        }
        assert_relative_eq!(bus.get(c.output_id.unwrap()), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn kinematic_traverses_at_detent_rate() {
        let mut bus = bus_with("cmd", 1.0);
        let mut c = FcsComponent {
            name: "gear-act".to_string(),
            inputs: vec![InputRef::new("cmd")],
            output: "pos".to_string(),
            output_id: None,
            clip: None,
            kind: ComponentKind::Kinematic {
                detents: vec![(0.0, 0.0), (1.0, 5.0)],
                state: 0.0,
            },
        };
        c.resolve(&mut bus);
        // After one second of a five-second traverse: 20% extended.
        for _ in 0..120 {
            c.update(&mut bus, 1.0 / 120.0);
        }
        assert_relative_eq!(bus.get(c.output_id.unwrap()), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn aerosurface_scale_is_asymmetric() {
        let mut bus = bus_with("x", 0.5);
        let mut c = FcsComponent {
            name: "scale".to_string(),
            inputs: vec![InputRef::new("x")],
            output: "out".to_string(),
            output_id: None,
            clip: None,
            kind: ComponentKind::AerosurfaceScale {
                min: -0.2,
                max: 0.4,
            },
        };
        assert_relative_eq!(run(&mut c, &mut bus, 0.01), 0.2);
        bus.set_path("x", -0.5).unwrap();
        c.update(&mut bus, 0.01);
        assert_relative_eq!(bus.get(c.output_id.unwrap()), -0.1);
    }
}
