use serde::{Deserialize, Serialize};

use crate::bus::{PropertyBus, PropertyId};
use crate::vehicle::aero::tables::{Table1D, Table2D};

/// A scalar coefficient function evaluated against the property bus.
///
/// Aircraft files express forces and moments as products of flight
/// condition properties, constants, and table lookups; the loader builds
/// this tree and `resolve` binds property references to bus handles once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FunctionNode {
    Value(f64),
    Property {
        path: String,
        /// Sign applied on read; config may prefix a path with '-'.
        sign: f64,
        #[serde(skip)]
        id: Option<PropertyId>,
    },
    Product(Vec<FunctionNode>),
    Sum(Vec<FunctionNode>),
    /// First child minus the rest.
    Difference(Vec<FunctionNode>),
    Quotient(Box<FunctionNode>, Box<FunctionNode>),
    Pow(Box<FunctionNode>, Box<FunctionNode>),
    Abs(Box<FunctionNode>),
    Table1 {
        input: Box<FunctionNode>,
        table: Table1D,
    },
    Table2 {
        row: Box<FunctionNode>,
        col: Box<FunctionNode>,
        table: Table2D,
    },
}

impl FunctionNode {
    pub fn property(path: &str) -> Self {
        let (sign, path) = match path.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, path),
        };
        FunctionNode::Property {
            path: path.to_string(),
            sign,
            id: None,
        }
    }

    /// Bind every property reference in the tree to a bus handle.
    /// Unknown paths are created writable so load order does not matter.
    pub fn resolve(&mut self, bus: &mut PropertyBus) {
        match self {
            FunctionNode::Property { path, id, .. } => {
                *id = Some(bus.touch("aero-function", path));
            }
            FunctionNode::Product(children)
            | FunctionNode::Sum(children)
            | FunctionNode::Difference(children) => {
                for c in children {
                    c.resolve(bus);
                }
            }
            FunctionNode::Quotient(a, b) | FunctionNode::Pow(a, b) => {
                a.resolve(bus);
                b.resolve(bus);
            }
            FunctionNode::Abs(a) => a.resolve(bus),
            FunctionNode::Table1 { input, .. } => input.resolve(bus),
            FunctionNode::Table2 { row, col, .. } => {
                row.resolve(bus);
                col.resolve(bus);
            }
            FunctionNode::Value(_) => {}
        }
    }

    pub fn eval(&self, bus: &PropertyBus) -> f64 {
        match self {
            FunctionNode::Value(v) => *v,
            FunctionNode::Property { id, sign, .. } => {
                sign * id.map(|id| bus.get(id)).unwrap_or(0.0)
            }
            FunctionNode::Product(children) => children.iter().map(|c| c.eval(bus)).product(),
            FunctionNode::Sum(children) => children.iter().map(|c| c.eval(bus)).sum(),
            FunctionNode::Difference(children) => {
                let mut iter = children.iter();
                let first = iter.next().map(|c| c.eval(bus)).unwrap_or(0.0);
                first - iter.map(|c| c.eval(bus)).sum::<f64>()
            }
            FunctionNode::Quotient(a, b) => {
                let denom = b.eval(bus);
                if denom.abs() < 1.0e-12 {
                    0.0
                } else {
                    a.eval(bus) / denom
                }
            }
            FunctionNode::Pow(a, b) => a.eval(bus).powf(b.eval(bus)),
            FunctionNode::Abs(a) => a.eval(bus).abs(),
            FunctionNode::Table1 { input, table } => table.lookup(input.eval(bus)),
            FunctionNode::Table2 { row, col, table } => {
                table.lookup(row.eval(bus), col.eval(bus))
            }
        }
    }
}

/// A named function: either a shared variable published back to the bus, or
/// one term of an axis sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AeroFunction {
    pub name: String,
    pub root: FunctionNode,
}

impl AeroFunction {
    pub fn resolve(&mut self, bus: &mut PropertyBus) {
        self.root.resolve(bus);
    }

    pub fn eval(&self, bus: &PropertyBus) -> f64 {
        self.root.eval(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn product_of_property_and_table() {
        let mut bus = PropertyBus::new();
        let alpha = bus.touch("test", "aero/alpha-rad");
        bus.set(alpha, 0.1);
        let qbar = bus.touch("test", "aero/qbar-psf");
        bus.set(qbar, 50.0);

        let mut f = AeroFunction {
            name: "aero/force/lift-alpha".to_string(),
            root: FunctionNode::Product(vec![
                FunctionNode::property("aero/qbar-psf"),
                FunctionNode::Table1 {
                    input: Box::new(FunctionNode::property("aero/alpha-rad")),
                    table: Table1D::new(vec![(-0.2, -1.0), (0.0, 0.0), (0.2, 1.0)]),
                },
            ]),
        };
        f.resolve(&mut bus);
        assert_relative_eq!(f.eval(&bus), 50.0 * 0.5);
    }

    #[test]
    fn negative_property_prefix() {
        let mut bus = PropertyBus::new();
        let p = bus.touch("test", "velocities/p-rad_sec");
        bus.set(p, 2.0);
        let mut f = FunctionNode::property("-velocities/p-rad_sec");
        f.resolve(&mut bus);
        assert_relative_eq!(f.eval(&bus), -2.0);
    }

    #[test]
    fn quotient_guards_zero_denominator() {
        let f = FunctionNode::Quotient(
            Box::new(FunctionNode::Value(1.0)),
            Box::new(FunctionNode::Value(0.0)),
        );
        assert_eq!(f.eval(&PropertyBus::new()), 0.0);
    }
}
