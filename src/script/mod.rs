//! Run-script engine: `when` predicates over bus properties trigger `set`
//! actions with step, ramp, or exponential shaping.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::xml::{self, Element};
use crate::config::{ConfigError, Result as ConfigResult};
use crate::executive::Executive;
use crate::utils::Result;
use crate::vehicle::fcs::Comparison;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetShape {
    Step,
    Ramp,
    Exp,
}

impl SetShape {
    fn from_name(name: &str) -> Self {
        match name {
            "FG_RAMP" => SetShape::Ramp,
            "FG_EXP" => SetShape::Exp,
            _ => SetShape::Step,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub parameter: String,
    pub comparison: Comparison,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct SetAction {
    pub name: String,
    pub value: f64,
    pub shape: SetShape,
    /// Time constant for ramp/exp shaping (s).
    pub tc: f64,
}

#[derive(Debug, Clone)]
pub struct WhenEvent {
    pub conditions: Vec<Condition>,
    pub sets: Vec<SetAction>,
    triggered: bool,
}

#[derive(Debug, Clone)]
pub struct RunScript {
    pub name: String,
    pub aircraft: PathBuf,
    pub initialize: PathBuf,
    pub start: f64,
    pub end: f64,
    pub dt: f64,
    pub events: Vec<WhenEvent>,
}

impl RunScript {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let file = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            file: file.clone(),
            source,
        })?;
        let root = xml::parse(&text).map_err(|source| ConfigError::Xml {
            file: file.clone(),
            source,
        })?;
        Self::from_xml(&root, &file, path.parent().unwrap_or(Path::new(".")))
    }

    pub fn from_xml(root: &Element, file: &str, base_dir: &Path) -> ConfigResult<Self> {
        let invalid = |line: usize, detail: String| ConfigError::Invalid {
            file: file.to_string(),
            line,
            detail,
        };

        let mut aircraft = None;
        let mut initialize = None;
        for use_el in root.children_named("use") {
            if let Some(a) = use_el.attr("aircraft") {
                aircraft = Some(base_dir.join(a));
            }
            if let Some(i) = use_el.attr("initialize") {
                initialize = Some(base_dir.join(i));
            }
        }
        let aircraft = aircraft.ok_or_else(|| ConfigError::MissingElement {
            file: file.to_string(),
            element: "use aircraft=".to_string(),
        })?;
        let initialize = initialize.ok_or_else(|| ConfigError::MissingElement {
            file: file.to_string(),
            element: "use initialize=".to_string(),
        })?;

        let run = root.child("run").ok_or_else(|| ConfigError::MissingElement {
            file: file.to_string(),
            element: "run".to_string(),
        })?;
        let attr_num = |el: &Element, name: &str, fallback: f64| -> ConfigResult<f64> {
            match el.attr(name) {
                Some(text) => text
                    .trim()
                    .parse()
                    .map_err(|_| invalid(el.line, format!("bad numeric attribute {name}"))),
                None => Ok(fallback),
            }
        };

        let mut events = Vec::new();
        for when in run.children_named("when") {
            let mut conditions = Vec::new();
            for p in when.children_named("parameter") {
                let name = p
                    .attr("name")
                    .ok_or_else(|| invalid(p.line, "parameter missing name".to_string()))?;
                let comparison = p
                    .attr("comparison")
                    .and_then(Comparison::from_name)
                    .ok_or_else(|| invalid(p.line, "parameter missing comparison".to_string()))?;
                let value = p
                    .attr("value")
                    .and_then(|v| v.trim().parse().ok())
                    .ok_or_else(|| invalid(p.line, "parameter missing value".to_string()))?;
                conditions.push(Condition {
                    parameter: name.to_string(),
                    comparison,
                    value,
                });
            }
            let mut sets = Vec::new();
            for s in when.children_named("set") {
                let name = s
                    .attr("name")
                    .ok_or_else(|| invalid(s.line, "set missing name".to_string()))?;
                let value = s
                    .attr("value")
                    .and_then(|v| v.trim().parse().ok())
                    .ok_or_else(|| invalid(s.line, "set missing value".to_string()))?;
                sets.push(SetAction {
                    name: name.to_string(),
                    value,
                    shape: SetShape::from_name(s.attr("action").unwrap_or("FG_STEP")),
                    tc: attr_num(s, "tc", 1.0)?,
                });
            }
            events.push(WhenEvent {
                conditions,
                sets,
                triggered: false,
            });
        }

        Ok(Self {
            name: root.attr("name").unwrap_or("runscript").to_string(),
            aircraft,
            initialize,
            start: attr_num(run, "start", 0.0)?,
            end: attr_num(run, "end", 60.0)?,
            dt: attr_num(run, "dt", 1.0 / 120.0)?,
            events,
        })
    }
}

#[derive(Debug)]
struct ActiveShaping {
    path: String,
    from: f64,
    to: f64,
    start_time: f64,
    tc: f64,
    shape: SetShape,
}

/// Evaluates script events against the executive between ticks.
#[derive(Debug)]
pub struct ScriptRunner {
    events: Vec<WhenEvent>,
    active: Vec<ActiveShaping>,
}

impl ScriptRunner {
    pub fn new(script: &RunScript) -> Self {
        Self {
            events: script.events.clone(),
            active: Vec::new(),
        }
    }

    /// Evaluate predicates, fire newly satisfied events, and advance any
    /// active ramps. Call once per tick, at the barrier.
    pub fn apply(&mut self, exec: &mut Executive) -> Result<()> {
        let now = exec.sim_time();

        for event in self.events.iter_mut().filter(|e| !e.triggered) {
            let all_hold = event.conditions.iter().all(|c| {
                exec.bus
                    .get_path(&c.parameter)
                    .map(|v| c.comparison.test(v, c.value))
                    .unwrap_or(false)
            });
            if !all_hold {
                continue;
            }
            event.triggered = true;
            for set in &event.sets {
                let current = exec.bus.get_path(&set.name).unwrap_or(0.0);
                match set.shape {
                    SetShape::Step => {
                        if let Err(err) = exec.bus.set_path(&set.name, set.value) {
                            warn!("script set {} rejected: {}", set.name, err);
                        }
                    }
                    SetShape::Ramp | SetShape::Exp => self.active.push(ActiveShaping {
                        path: set.name.clone(),
                        from: current,
                        to: set.value,
                        start_time: now,
                        tc: set.tc.max(1.0e-3),
                        shape: set.shape,
                    }),
                }
                info!("script: {} -> {} at t={:.2}", set.name, set.value, now);
            }
        }

        self.active.retain(|ramp| {
            let elapsed = now - ramp.start_time;
            let (value, done) = match ramp.shape {
                SetShape::Ramp => {
                    let frac = (elapsed / ramp.tc).clamp(0.0, 1.0);
                    (ramp.from + (ramp.to - ramp.from) * frac, frac >= 1.0)
                }
                SetShape::Exp => {
                    let frac = 1.0 - (-elapsed / ramp.tc).exp();
                    (ramp.from + (ramp.to - ramp.from) * frac, frac > 0.999)
                }
                SetShape::Step => (ramp.to, true),
            };
            if exec.bus.set_path(&ramp.path, value).is_err() {
                return false;
            }
            !done
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_runscript() {
        let doc = r#"<runscript name="cruise test">
            <use aircraft="c172.xml" initialize="cruise_init.xml"/>
            <run start="0.0" end="400.0" dt="0.00833333">
                <when>
                    <parameter name="sim-time-sec" comparison="ge" value="0.5"/>
                    <set name="fcs/throttle-cmd-norm[0]" value="0.8" action="FG_RAMP" tc="2.0"/>
                </when>
                <when>
                    <parameter name="sim-time-sec" comparison="ge" value="5.0"/>
                    <parameter name="velocities/vc-kts" comparison="ge" value="60.0"/>
                    <set name="ap/heading_setpoint" value="200"/>
                </when>
            </run>
        </runscript>"#;
        let root = xml::parse(doc).unwrap();
        let script = RunScript::from_xml(&root, "test", Path::new("scripts")).unwrap();
        assert_eq!(script.aircraft, Path::new("scripts/c172.xml"));
        assert_eq!(script.end, 400.0);
        assert_eq!(script.events.len(), 2);
        assert_eq!(script.events[0].sets[0].shape, SetShape::Ramp);
        assert_eq!(script.events[1].conditions.len(), 2);
    }
}
