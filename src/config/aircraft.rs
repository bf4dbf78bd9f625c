//! Aircraft description loader.
//!
//! The file layout mirrors the usual flight-dynamics configuration format:
//! `metrics`, `mass_balance`, `ground_reactions`, `propulsion`,
//! `aerodynamics`, and `flight_control`, with per-element unit attributes.

use std::fs;
use std::path::Path;

use nalgebra::Vector3;

use crate::config::units::{self, Dimension};
use crate::config::xml::{self, Element};
use crate::config::{ConfigError, Result};
use crate::environment::Environment;
use crate::executive::VehicleBuild;
use crate::vehicle::aero::{
    AeroAxis, AeroConfig, AeroFunction, Aerodynamics, FunctionNode, Table1D, Table2D,
};
use crate::vehicle::fcs::{
    Comparison, ComponentKind, FcsComponent, FlightControls, InputRef, SwitchCase,
};
use crate::vehicle::gear::{BrakeGroup, ContactConfig, GroundReactions, SteerType};
use crate::vehicle::mass::{MassBalance, MassBalanceConfig, PointMass};
use crate::vehicle::propulsion::{Engine, EngineKind, Propulsion, Tank, Thruster};
use crate::vehicle::Metrics;
use crate::utils::constants::{G_ACCEL, HP_TO_FTLBPS};

#[derive(Debug, Clone)]
pub struct AircraftConfig {
    pub name: String,
    pub metrics: Metrics,
    pub mass: MassBalanceConfig,
    pub contacts: Vec<ContactConfig>,
    pub aero: AeroConfig,
    pub engines: Vec<Engine>,
    pub tanks: Vec<Tank>,
    pub channels: Vec<FcsComponent>,
}

struct Loader<'a> {
    file: &'a str,
}

impl<'a> Loader<'a> {
    fn missing(&self, element: &str) -> ConfigError {
        ConfigError::MissingElement {
            file: self.file.to_string(),
            element: element.to_string(),
        }
    }

    fn invalid(&self, line: usize, detail: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            file: self.file.to_string(),
            line,
            detail: detail.into(),
        }
    }

    fn number(&self, el: &Element) -> Result<f64> {
        el.text_trimmed()
            .parse()
            .map_err(|_| self.invalid(el.line, format!("expected a number in <{}>", el.name)))
    }

    /// Numeric child converted to canonical units. `default_unit` applies
    /// when the element carries no unit attribute.
    fn value(
        &self,
        parent: &Element,
        name: &str,
        dimension: Dimension,
        default_unit: &str,
    ) -> Result<Option<f64>> {
        let Some(el) = parent.child(name) else {
            return Ok(None);
        };
        let raw = self.number(el)?;
        let unit = el.attr("unit").unwrap_or(default_unit);
        units::convert(raw, unit, dimension)
            .map(Some)
            .ok_or_else(|| ConfigError::UnknownUnit {
                file: self.file.to_string(),
                line: el.line,
                unit: unit.to_string(),
            })
    }

    fn value_or(
        &self,
        parent: &Element,
        name: &str,
        dimension: Dimension,
        default_unit: &str,
        fallback: f64,
    ) -> Result<f64> {
        Ok(self.value(parent, name, dimension, default_unit)?.unwrap_or(fallback))
    }

    fn required(
        &self,
        parent: &Element,
        name: &str,
        dimension: Dimension,
        default_unit: &str,
    ) -> Result<f64> {
        self.value(parent, name, dimension, default_unit)?
            .ok_or_else(|| self.missing(name))
    }

    /// Dimensionless numeric child (coefficients, gains, normalized values).
    fn scalar(&self, parent: &Element, name: &str) -> Result<Option<f64>> {
        parent.child(name).map(|el| self.number(el)).transpose()
    }

    fn scalar_or(&self, parent: &Element, name: &str, fallback: f64) -> Result<f64> {
        Ok(self.scalar(parent, name)?.unwrap_or(fallback))
    }

    fn scalar_required(&self, parent: &Element, name: &str) -> Result<f64> {
        self.scalar(parent, name)?.ok_or_else(|| self.missing(name))
    }

    /// A `location` child (structural frame); converted to inches.
    fn location(&self, parent: &Element, name_attr: Option<&str>) -> Result<Option<Vector3<f64>>> {
        let found = parent.children_named("location").find(|el| match name_attr {
            Some(want) => el.attr("name") == Some(want),
            None => true,
        });
        let Some(el) = found else {
            return Ok(None);
        };
        let unit = el.attr("unit").unwrap_or("IN");
        let (_, k) = units::factor(unit).ok_or_else(|| ConfigError::UnknownUnit {
            file: self.file.to_string(),
            line: el.line,
            unit: unit.to_string(),
        })?;
        // Structural coordinates are carried in inches.
        let to_in = k * 12.0;
        let mut out = Vector3::zeros();
        for (i, axis) in ["x", "y", "z"].iter().enumerate() {
            let child = el
                .child(axis)
                .ok_or_else(|| self.invalid(el.line, format!("location missing <{axis}>")))?;
            out[i] = self.number(child)? * to_in;
        }
        Ok(Some(out))
    }

    fn metrics(&self, root: &Element) -> Result<Metrics> {
        let el = root.child("metrics").ok_or_else(|| self.missing("metrics"))?;
        let mut metrics = Metrics {
            wing_area: self.required(el, "wingarea", Dimension::Area, "FT2")?,
            wing_span: self.required(el, "wingspan", Dimension::Length, "FT")?,
            chord: self.required(el, "chord", Dimension::Length, "FT")?,
            wing_incidence: self.value_or(el, "wing_incidence", Dimension::Angle, "DEG", 0.0)?,
            htail_area: self.value_or(el, "htailarea", Dimension::Area, "FT2", 0.0)?,
            htail_arm: self.value_or(el, "htailarm", Dimension::Length, "FT", 0.0)?,
            vtail_area: self.value_or(el, "vtailarea", Dimension::Area, "FT2", 0.0)?,
            vtail_arm: self.value_or(el, "vtailarm", Dimension::Length, "FT", 0.0)?,
            aero_rp: Vector3::zeros(),
            eyepoint: Vector3::zeros(),
        };
        metrics.aero_rp = self
            .location(el, Some("AERORP"))?
            .ok_or_else(|| self.missing("location name=AERORP"))?;
        metrics.eyepoint = self.location(el, Some("EYEPOINT"))?.unwrap_or(metrics.aero_rp);
        Ok(metrics)
    }

    fn mass_balance(&self, root: &Element) -> Result<MassBalanceConfig> {
        let el = root
            .child("mass_balance")
            .ok_or_else(|| self.missing("mass_balance"))?;
        let mut config = MassBalanceConfig {
            empty_weight: self.required(el, "emptywt", Dimension::Force, "LBS")?,
            empty_cg: self
                .location(el, Some("CG"))?
                .ok_or_else(|| self.missing("location name=CG"))?,
            inertia: [
                self.required(el, "ixx", Dimension::Inertia, "SLUG*FT2")?,
                self.required(el, "iyy", Dimension::Inertia, "SLUG*FT2")?,
                self.required(el, "izz", Dimension::Inertia, "SLUG*FT2")?,
                self.value_or(el, "ixy", Dimension::Inertia, "SLUG*FT2", 0.0)?,
                self.value_or(el, "ixz", Dimension::Inertia, "SLUG*FT2", 0.0)?,
                self.value_or(el, "iyz", Dimension::Inertia, "SLUG*FT2", 0.0)?,
            ],
            point_masses: Vec::new(),
        };
        for pm in el.children_named("pointmass") {
            let weight = self.required(pm, "weight", Dimension::Force, "LBS")?;
            let location = self
                .location(pm, None)?
                .ok_or_else(|| self.invalid(pm.line, "pointmass missing <location>"))?;
            config.point_masses.push(PointMass {
                name: pm.attr("name").unwrap_or("pointmass").to_string(),
                mass: weight / G_ACCEL,
                location,
            });
        }
        Ok(config)
    }

    fn contacts(&self, root: &Element) -> Result<Vec<ContactConfig>> {
        let Some(el) = root.child("ground_reactions") else {
            return Ok(Vec::new());
        };
        let mut contacts = Vec::new();
        for c in el.children_named("contact") {
            let steer_type = match c.child("steer_type").map(Element::text_trimmed) {
                Some("STEERABLE") => SteerType::Steerable,
                Some("CASTERED") => SteerType::Castered,
                Some("FIXED") | None => SteerType::Fixed,
                Some(other) => {
                    return Err(self.invalid(c.line, format!("unknown steer_type {other}")))
                }
            };
            let brake_group = match c.child("brake_group").map(Element::text_trimmed) {
                Some("LEFT") => BrakeGroup::Left,
                Some("RIGHT") => BrakeGroup::Right,
                Some("CENTER") => BrakeGroup::Center,
                Some("NOSE") => BrakeGroup::Nose,
                Some("TAIL") => BrakeGroup::Tail,
                Some("NONE") | None => BrakeGroup::None,
                Some(other) => {
                    return Err(self.invalid(c.line, format!("unknown brake_group {other}")))
                }
            };
            let cornering_table = c
                .children_named("table")
                .find(|t| t.attr("name") == Some("CORNERING_COEFF"))
                .map(|t| self.table_1d(t))
                .transpose()?;
            contacts.push(ContactConfig {
                name: c.attr("name").unwrap_or("contact").to_string(),
                location: self
                    .location(c, None)?
                    .ok_or_else(|| self.invalid(c.line, "contact missing <location>"))?,
                spring_coeff: self.required(c, "spring_coeff", Dimension::SpringRate, "LBS/FT")?,
                damping_coeff: self.required(
                    c,
                    "damping_coeff",
                    Dimension::DampingRate,
                    "LBS/FT/SEC",
                )?,
                damping_coeff_rebound: self.value_or(
                    c,
                    "damping_coeff_rebound",
                    Dimension::DampingRate,
                    "LBS/FT/SEC",
                    self.required(c, "damping_coeff", Dimension::DampingRate, "LBS/FT/SEC")?,
                )?,
                static_friction: self.scalar_or(c, "static_friction", 0.8)?,
                dynamic_friction: self.scalar_or(c, "dynamic_friction", 0.5)?,
                rolling_friction: self.scalar_or(c, "rolling_friction", 0.02)?,
                max_steer: self.value_or(c, "max_steer", Dimension::Angle, "DEG", 0.0)?,
                retractable: c
                    .child("retractable")
                    .map(|e| e.text_trimmed() == "1")
                    .unwrap_or(false),
                steer_type,
                brake_group,
                cornering_table,
            });
        }
        Ok(contacts)
    }

    fn table_1d(&self, el: &Element) -> Result<Table1D> {
        let data = el
            .child("tableData")
            .ok_or_else(|| self.invalid(el.line, "table missing <tableData>"))?;
        let mut rows = Vec::new();
        for line in data.text.lines() {
            let numbers: Vec<f64> = line
                .split_whitespace()
                .map(|t| t.parse())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| self.invalid(data.line, "malformed tableData row"))?;
            match numbers.as_slice() {
                [] => continue,
                [x, y] => rows.push((*x, *y)),
                _ => return Err(self.invalid(data.line, "1-D tableData rows need two columns")),
            }
        }
        if rows.is_empty() {
            return Err(self.invalid(el.line, "empty tableData"));
        }
        Ok(Table1D::new(rows))
    }

    fn table_2d(&self, el: &Element) -> Result<Table2D> {
        let data = el
            .child("tableData")
            .ok_or_else(|| self.invalid(el.line, "table missing <tableData>"))?;
        let mut lines = data
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        let header: Vec<f64> = lines
            .next()
            .ok_or_else(|| self.invalid(data.line, "empty tableData"))?
            .split_whitespace()
            .map(|t| t.parse())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| self.invalid(data.line, "malformed column breakpoints"))?;
        let mut row_breaks = Vec::new();
        let mut rows = Vec::new();
        for line in lines {
            let numbers: Vec<f64> = line
                .split_whitespace()
                .map(|t| t.parse())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| self.invalid(data.line, "malformed tableData row"))?;
            if numbers.len() != header.len() + 1 {
                return Err(self.invalid(data.line, "ragged tableData row"));
            }
            row_breaks.push(numbers[0]);
            rows.push(numbers[1..].to_vec());
        }
        Ok(Table2D::new(row_breaks, header, rows))
    }

    fn function_node(&self, el: &Element) -> Result<FunctionNode> {
        Ok(match el.name.as_str() {
            "value" => FunctionNode::Value(self.number(el)?),
            "property" => FunctionNode::property(el.text_trimmed()),
            "product" => FunctionNode::Product(self.child_nodes(el)?),
            "sum" => FunctionNode::Sum(self.child_nodes(el)?),
            "difference" => FunctionNode::Difference(self.child_nodes(el)?),
            "quotient" => {
                let children = self.child_nodes(el)?;
                let mut iter = children.into_iter();
                match (iter.next(), iter.next()) {
                    (Some(a), Some(b)) => FunctionNode::Quotient(Box::new(a), Box::new(b)),
                    _ => return Err(self.invalid(el.line, "quotient needs two operands")),
                }
            }
            "pow" => {
                let children = self.child_nodes(el)?;
                let mut iter = children.into_iter();
                match (iter.next(), iter.next()) {
                    (Some(a), Some(b)) => FunctionNode::Pow(Box::new(a), Box::new(b)),
                    _ => return Err(self.invalid(el.line, "pow needs two operands")),
                }
            }
            "abs" => {
                let mut children = self.child_nodes(el)?;
                match children.pop() {
                    Some(a) if children.is_empty() => FunctionNode::Abs(Box::new(a)),
                    _ => return Err(self.invalid(el.line, "abs takes one operand")),
                }
            }
            "table" => {
                let vars: Vec<&Element> = el.children_named("independentVar").collect();
                match vars.len() {
                    1 => FunctionNode::Table1 {
                        input: Box::new(FunctionNode::property(vars[0].text_trimmed())),
                        table: self.table_1d(el)?,
                    },
                    2 => {
                        let row = vars
                            .iter()
                            .find(|v| v.attr("lookup") == Some("row"))
                            .unwrap_or(&vars[0]);
                        let col = vars
                            .iter()
                            .find(|v| v.attr("lookup") == Some("column"))
                            .unwrap_or(&vars[1]);
                        FunctionNode::Table2 {
                            row: Box::new(FunctionNode::property(row.text_trimmed())),
                            col: Box::new(FunctionNode::property(col.text_trimmed())),
                            table: self.table_2d(el)?,
                        }
                    }
                    n => {
                        return Err(
                            self.invalid(el.line, format!("table with {n} independent variables"))
                        )
                    }
                }
            }
            other => return Err(self.invalid(el.line, format!("unknown function element <{other}>"))),
        })
    }

    fn child_nodes(&self, el: &Element) -> Result<Vec<FunctionNode>> {
        el.children.iter().map(|c| self.function_node(c)).collect()
    }

    fn function(&self, el: &Element) -> Result<AeroFunction> {
        let root = el
            .children
            .first()
            .ok_or_else(|| self.invalid(el.line, "empty <function>"))?;
        Ok(AeroFunction {
            name: el.attr("name").unwrap_or("function").to_string(),
            root: self.function_node(root)?,
        })
    }

    fn aerodynamics(&self, root: &Element) -> Result<AeroConfig> {
        let el = root
            .child("aerodynamics")
            .ok_or_else(|| self.missing("aerodynamics"))?;
        let mut config = AeroConfig {
            alpha_clmax: self.value_or(el, "alpha_stall", Dimension::Angle, "DEG", 0.28)?,
            hysteresis_limits: None,
            functions: Vec::new(),
            axes: Default::default(),
        };
        if let Some(h) = el.child("hysteresis_limits") {
            let min = self.required(h, "min", Dimension::Angle, "DEG")?;
            let max = self.required(h, "max", Dimension::Angle, "DEG")?;
            config.hysteresis_limits = Some((min, max));
        }
        for f in el.children_named("function") {
            config.functions.push(self.function(f)?);
        }
        for axis in el.children_named("axis") {
            let name = axis
                .attr("name")
                .ok_or_else(|| self.invalid(axis.line, "axis missing name"))?;
            let which = AeroAxis::from_name(name)
                .ok_or_else(|| self.invalid(axis.line, format!("unknown axis {name}")))?;
            for f in axis.children_named("function") {
                config.axes[which as usize].push(self.function(f)?);
            }
        }
        Ok(config)
    }

    fn thruster(&self, el: Option<&Element>) -> Result<Thruster> {
        let Some(el) = el else {
            return Ok(Thruster::Direct);
        };
        match el.attr("type").unwrap_or("direct") {
            "direct" => Ok(Thruster::Direct),
            "propeller" => Ok(Thruster::Propeller {
                diameter: self.required(el, "diameter", Dimension::Length, "FT")?,
                nominal_rps: self.scalar_or(el, "rps", 40.0)?,
                efficiency: el
                    .children_named("table")
                    .next()
                    .map(|t| self.table_1d(t))
                    .transpose()?
                    .unwrap_or_else(|| {
                        Table1D::new(vec![(0.0, 0.55), (0.5, 0.8), (0.9, 0.85), (1.4, 0.6)])
                    }),
            }),
            "nozzle" => Ok(Thruster::Nozzle {
                exit_area: self.required(el, "area", Dimension::Area, "FT2")?,
            }),
            other => Err(self.invalid(el.line, format!("unknown thruster type {other}"))),
        }
    }

    fn propulsion(&self, root: &Element) -> Result<(Vec<Engine>, Vec<Tank>)> {
        let Some(el) = root.child("propulsion") else {
            return Ok((Vec::new(), Vec::new()));
        };
        let mut tanks = Vec::new();
        for t in el.children_named("tank") {
            tanks.push(Tank {
                capacity: self.required(t, "capacity", Dimension::Force, "LBS")?,
                contents: self.value_or(t, "contents", Dimension::Force, "LBS", 0.0)?,
                location: self
                    .location(t, None)?
                    .ok_or_else(|| self.invalid(t.line, "tank missing <location>"))?,
            });
        }
        let mut engines = Vec::new();
        for e in el.children_named("engine") {
            let kind = match e.attr("type").unwrap_or("piston") {
                "piston" => EngineKind::Piston {
                    rated_power: self.required(e, "power", Dimension::Power, "HP")?,
                    // BSFC is declared in lbs per horsepower-hour.
                    bsfc: self.scalar_or(e, "bsfc", 0.45)? / (3600.0 * HP_TO_FTLBPS),
                },
                "turbine" => EngineKind::Turbine {
                    max_thrust: self.required(e, "maxthrust", Dimension::Force, "LBS")?,
                    tsfc: self.scalar_or(e, "tsfc", 0.8)? / 3600.0,
                    spool_tau: self.value_or(e, "spool_time", Dimension::Time, "SEC", 2.0)?,
                },
                "turboprop" => EngineKind::Turboprop {
                    rated_power: self.required(e, "power", Dimension::Power, "HP")?,
                    psfc: self.scalar_or(e, "psfc", 0.55)? / (3600.0 * HP_TO_FTLBPS),
                },
                "rocket" => EngineKind::Rocket {
                    isp: self.required(e, "isp", Dimension::Time, "SEC")?,
                    // lbs/s at full throttle
                    max_flow: self.scalar_required(e, "maxflow")?,
                },
                "electric" => EngineKind::Electric {
                    rated_power: self.required(e, "power", Dimension::Power, "WATTS")?,
                },
                other => return Err(self.invalid(e.line, format!("unknown engine type {other}"))),
            };
            let feed: Vec<usize> = e
                .children_named("feed")
                .map(|f| {
                    f.text_trimmed()
                        .parse()
                        .map_err(|_| self.invalid(f.line, "feed must be a tank index"))
                })
                .collect::<Result<_>>()?;
            engines.push(Engine {
                name: e.attr("name").unwrap_or("engine").to_string(),
                kind,
                thruster: self.thruster(e.child("thruster"))?,
                location: self
                    .location(e, None)?
                    .ok_or_else(|| self.invalid(e.line, "engine missing <location>"))?,
                pitch: self.value_or(e, "pitch", Dimension::Angle, "DEG", 0.0)?,
                yaw: self.value_or(e, "yaw", Dimension::Angle, "DEG", 0.0)?,
                feed,
                starved: false,
                spool_thrust: 0.0,
            });
        }
        Ok((engines, tanks))
    }

    fn input_refs(&self, el: &Element) -> Vec<InputRef> {
        el.children_named("input")
            .map(|i| InputRef::new(i.text_trimmed()))
            .collect()
    }

    fn clip(&self, el: &Element) -> Result<Option<(f64, f64)>> {
        let Some(c) = el.child("clipto") else {
            return Ok(None);
        };
        let min = c
            .child("min")
            .ok_or_else(|| self.invalid(c.line, "clipto missing <min>"))
            .and_then(|e| self.number(e))?;
        let max = c
            .child("max")
            .ok_or_else(|| self.invalid(c.line, "clipto missing <max>"))
            .and_then(|e| self.number(e))?;
        Ok(Some((min, max)))
    }

    fn fcs_component(&self, el: &Element) -> Result<Option<FcsComponent>> {
        let kind = match el.name.as_str() {
            "summer" => ComponentKind::Summer {
                bias: self.scalar_or(el, "bias", 0.0)?,
            },
            "pure_gain" => ComponentKind::Gain {
                gain: self.scalar_or(el, "gain", 1.0)?,
            },
            "scheduled_gain" => {
                let table_el = el
                    .children_named("table")
                    .next()
                    .ok_or_else(|| self.invalid(el.line, "scheduled_gain missing <table>"))?;
                let schedule = table_el
                    .child("independentVar")
                    .ok_or_else(|| self.invalid(el.line, "scheduled_gain missing independentVar"))?;
                ComponentKind::ScheduledGain {
                    table: self.table_1d(table_el)?,
                    schedule: InputRef::new(schedule.text_trimmed()),
                }
            }
            "deadband" => ComponentKind::Deadband {
                width: self.scalar_or(el, "width", 0.0)?,
            },
            "lag_filter" => ComponentKind::Lag {
                tau: self.value_or(el, "c1", Dimension::Time, "SEC", 1.0)?,
                state: 0.0,
            },
            "second_order_filter" => ComponentKind::SecondOrder {
                wn: self.scalar_or(el, "wn", 1.0)?,
                zeta: self.scalar_or(el, "zeta", 0.7)?,
                y: 0.0,
                ydot: 0.0,
            },
            "aerosurface_scale" => {
                let range = el
                    .child("range")
                    .ok_or_else(|| self.invalid(el.line, "aerosurface_scale missing <range>"))?;
                ComponentKind::AerosurfaceScale {
                    min: self.scalar_required(range, "min")?,
                    max: self.scalar_required(range, "max")?,
                }
            }
            "kinematic" => {
                let traverse = el
                    .child("traverse")
                    .ok_or_else(|| self.invalid(el.line, "kinematic missing <traverse>"))?;
                let mut detents = Vec::new();
                for setting in traverse.children_named("setting") {
                    detents.push((
                        self.scalar_required(setting, "position")?,
                        self.scalar_required(setting, "time")?,
                    ));
                }
                if detents.len() < 2 {
                    return Err(self.invalid(el.line, "kinematic needs at least two settings"));
                }
                ComponentKind::Kinematic {
                    detents,
                    state: 0.0,
                }
            }
            "switch" => {
                let mut cases = Vec::new();
                for case in el.children_named("case") {
                    let test = match case.child("test") {
                        Some(t) => {
                            let prop = t
                                .attr("property")
                                .ok_or_else(|| self.invalid(t.line, "test missing property"))?;
                            let cmp = t
                                .attr("comparison")
                                .and_then(Comparison::from_name)
                                .ok_or_else(|| self.invalid(t.line, "bad comparison"))?;
                            let value = t.attr("value").and_then(|v| v.parse().ok()).ok_or_else(
                                || self.invalid(t.line, "test missing numeric value"),
                            )?;
                            Some((InputRef::new(prop), cmp, value))
                        }
                        None => None,
                    };
                    let value = case
                        .child("value")
                        .ok_or_else(|| self.invalid(case.line, "case missing <value>"))?;
                    cases.push(SwitchCase {
                        test,
                        value: InputRef::new(value.text_trimmed()),
                    });
                }
                ComponentKind::Switch { cases }
            }
            _ => return Ok(None),
        };

        let output = el
            .child("output")
            .map(Element::text_trimmed)
            .ok_or_else(|| self.invalid(el.line, format!("<{}> missing <output>", el.name)))?;
        Ok(Some(FcsComponent {
            name: el.attr("name").unwrap_or(&el.name).to_string(),
            inputs: self.input_refs(el),
            output: output.to_string(),
            output_id: None,
            clip: self.clip(el)?,
            kind,
        }))
    }

    fn flight_control(&self, root: &Element) -> Result<Vec<FcsComponent>> {
        let Some(el) = root.child("flight_control") else {
            return Ok(Vec::new());
        };
        let mut channels = Vec::new();
        for channel in el.children_named("channel") {
            for component in &channel.children {
                if let Some(parsed) = self.fcs_component(component)? {
                    channels.push(parsed);
                }
            }
        }
        Ok(channels)
    }
}

impl AircraftConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            file: file.clone(),
            source,
        })?;
        let root = xml::parse(&text).map_err(|source| ConfigError::Xml {
            file: file.clone(),
            source,
        })?;
        Self::from_xml(&root, &file)
    }

    pub fn from_xml(root: &Element, file: &str) -> Result<Self> {
        let loader = Loader { file };
        let (engines, tanks) = loader.propulsion(root)?;
        Ok(Self {
            name: root.attr("name").unwrap_or("aircraft").to_string(),
            metrics: loader.metrics(root)?,
            mass: loader.mass_balance(root)?,
            contacts: loader.contacts(root)?,
            aero: loader.aerodynamics(root)?,
            engines,
            tanks,
            channels: loader.flight_control(root)?,
        })
    }

    /// Assemble the pipeline modules for the executive.
    pub fn build(self) -> VehicleBuild {
        let engine_count = self.engines.len();
        let gear_down = !self.contacts.is_empty();
        VehicleBuild {
            environment: Environment::new(self.metrics.wing_span),
            fcs: FlightControls::new(self.channels, engine_count, gear_down),
            mass: MassBalance::new(self.mass),
            aero: Aerodynamics::new(self.aero, self.metrics.clone()),
            propulsion: Propulsion::new(self.engines, self.tanks),
            gear: GroundReactions::new(self.contacts),
            metrics: self.metrics,
        }
    }
}
