use std::ops::{Add, Mul};

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Integration scheme, selectable per state slot through the bus.
/// The Buss and local-linearization schemes apply only to the rotational
/// position (quaternion) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    None,
    RectEuler,
    Trapezoidal,
    AdamsBashforth2,
    AdamsBashforth3,
    AdamsBashforth4,
    Buss1,
    Buss2,
    LocalLinearization,
    AdamsBashforth5,
}

impl Scheme {
    pub fn from_index(v: f64) -> Self {
        match v as i64 {
            0 => Scheme::None,
            1 => Scheme::RectEuler,
            2 => Scheme::Trapezoidal,
            3 => Scheme::AdamsBashforth2,
            4 => Scheme::AdamsBashforth3,
            5 => Scheme::AdamsBashforth4,
            6 => Scheme::Buss1,
            7 => Scheme::Buss2,
            8 => Scheme::LocalLinearization,
            9 => Scheme::AdamsBashforth5,
            _ => Scheme::RectEuler,
        }
    }

    pub fn is_exponential(&self) -> bool {
        matches!(self, Scheme::Buss1 | Scheme::Buss2)
    }
}

/// Fixed five-deep derivative history with an integer head index; entry 0
/// is the newest derivative.
#[derive(Debug, Clone, Copy)]
pub struct History<T: Copy> {
    items: [T; 5],
    head: usize,
}

impl<T: Copy> History<T> {
    pub fn filled(value: T) -> Self {
        Self {
            items: [value; 5],
            head: 0,
        }
    }

    /// Reset every slot, e.g. after an initial-condition change.
    pub fn fill(&mut self, value: T) {
        self.items = [value; 5];
        self.head = 0;
    }

    pub fn push(&mut self, value: T) {
        self.head = (self.head + 4) % 5;
        self.items[self.head] = value;
    }

    pub fn get(&self, age: usize) -> T {
        self.items[(self.head + age) % 5]
    }
}

/// One explicit integration step: x_{n+1} = x_n + dt * combination of the
/// derivative history (entry 0 must already hold the derivative at t_n).
pub fn step<T>(scheme: Scheme, x: T, dt: f64, hist: &History<T>) -> T
where
    T: Copy + Add<T, Output = T> + Mul<f64, Output = T>,
{
    let d0 = hist.get(0);
    match scheme {
        Scheme::None => x,
        Scheme::RectEuler => x + d0 * dt,
        Scheme::Trapezoidal => x + (d0 + hist.get(1)) * (0.5 * dt),
        Scheme::AdamsBashforth2 => x + (d0 * 1.5 + hist.get(1) * -0.5) * dt,
        Scheme::AdamsBashforth3 => {
            x + (d0 * 23.0 + hist.get(1) * -16.0 + hist.get(2) * 5.0) * (dt / 12.0)
        }
        Scheme::AdamsBashforth4 => {
            x + (d0 * 55.0 + hist.get(1) * -59.0 + hist.get(2) * 37.0 + hist.get(3) * -9.0)
                * (dt / 24.0)
        }
        Scheme::AdamsBashforth5 => {
            x + (d0 * 1901.0
                + hist.get(1) * -2774.0
                + hist.get(2) * 2616.0
                + hist.get(3) * -1274.0
                + hist.get(4) * 251.0)
                * (dt / 720.0)
        }
        // Exponential-map schemes are quaternion-specific; in a vector slot
        // they degrade to the rectangular rule.
        Scheme::Buss1 | Scheme::Buss2 | Scheme::LocalLinearization => x + d0 * dt,
    }
}

/// Exponential of a pure quaternion (0, v): exactly unit for any v.
pub fn qexp(v: &Vector3<f64>) -> Quaternion<f64> {
    let angle = v.norm();
    if angle < 1.0e-12 {
        // Series limit keeps the result unit to machine precision.
        Quaternion::new(1.0 - angle * angle / 2.0, v.x, v.y, v.z)
    } else {
        let s = angle.sin() / angle;
        Quaternion::new(angle.cos(), v.x * s, v.y * s, v.z * s)
    }
}

/// Advance the attitude quaternion one step.
///
/// Buss-1 is exact for constant rate; Buss-2 augments the rate with the
/// second-order terms in the angular acceleration; local linearization uses
/// the midpoint rate through the same exponential map and renormalizes at
/// step end. Everything else integrates the raw quaternion derivative
/// history (the caller renormalizes).
pub fn step_attitude(
    scheme: Scheme,
    q: Quaternion<f64>,
    dt: f64,
    omega: &Vector3<f64>,
    omega_dot: &Vector3<f64>,
    hist: &History<Quaternion<f64>>,
) -> Quaternion<f64> {
    match scheme {
        Scheme::Buss1 => q * qexp(&(omega * (0.5 * dt))),
        Scheme::Buss2 => {
            let augmented =
                omega + omega_dot * (0.5 * dt) + omega_dot.cross(omega) * (dt * dt / 12.0);
            q * qexp(&(augmented * (0.5 * dt)))
        }
        Scheme::LocalLinearization => {
            let midpoint = omega + omega_dot * (0.5 * dt);
            let next = q * qexp(&(midpoint * (0.5 * dt)));
            next * (1.0 / next.norm())
        }
        _ => step(scheme, q, dt, hist),
    }
}
