//! Projected Gauss-Seidel resolution of simultaneous contact friction.
//!
//! Each contact contributes one bounded Lagrange multiplier along its force
//! jacobian. The solver finds multipliers that drive the contact-point
//! accelerations (including a velocity-kill term over one step) to zero,
//! clamped to the friction-cone bounds supplied by the gear module.

use nalgebra::{Matrix3, Vector3};

use crate::executive::frame::ForceMoment;
use crate::vehicle::gear::Contact;

pub const MAX_SWEEPS: usize = 50;
pub const CONVERGENCE_TOL: f64 = 1.0e-5;

/// Solve for the contact multipliers in place and return the total friction
/// force and moment about the CG (body frame).
///
/// `vdot` and `wdot` are the body-frame linear and angular accelerations
/// before friction, already augmented with the relative-velocity terms
/// (v_rel / dt) that drive motion against the terrain to zero in one step.
pub fn solve(
    contacts: &mut [Contact],
    mass: f64,
    inertia_inv: &Matrix3<f64>,
    vdot: &Vector3<f64>,
    wdot: &Vector3<f64>,
) -> ForceMoment {
    let n = contacts.len();
    if n == 0 || mass <= 0.0 {
        return ForceMoment::default();
    }

    // A[i][j]: acceleration response at contact i to a unit multiplier at j.
    let mut a = vec![vec![0.0; n]; n];
    let mut rhs = vec![0.0; n];
    for (j, cj) in contacts.iter().enumerate() {
        let linear = cj.jacobian / mass;
        let angular = inertia_inv * cj.lever.cross(&cj.jacobian);
        for (i, ci) in contacts.iter().enumerate() {
            a[i][j] = ci.jacobian.dot(&(linear + angular.cross(&ci.lever)));
        }
    }
    for (i, ci) in contacts.iter().enumerate() {
        rhs[i] = -ci.jacobian.dot(&(vdot + wdot.cross(&ci.lever)));
    }

    // Row-normalize so the sweep is a plain clamped relaxation.
    for i in 0..n {
        let diag = a[i][i];
        if diag.abs() < 1.0e-12 {
            continue;
        }
        rhs[i] /= diag;
        for j in 0..n {
            a[i][j] /= diag;
        }
    }

    for _ in 0..MAX_SWEEPS {
        let mut delta_sum = 0.0;
        for i in 0..n {
            let mut residual = rhs[i];
            for j in 0..n {
                residual -= a[i][j] * contacts[j].lambda;
            }
            let updated = (contacts[i].lambda + residual).clamp(contacts[i].min, contacts[i].max);
            delta_sum += (updated - contacts[i].lambda).abs();
            contacts[i].lambda = updated;
        }
        if delta_sum < CONVERGENCE_TOL {
            break;
        }
    }

    let mut out = ForceMoment::default();
    for c in contacts.iter() {
        let force = c.jacobian * c.lambda;
        out.force += force;
        out.moment += c.lever.cross(&force);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn contact(jacobian: Vector3<f64>, lever: Vector3<f64>, bound: f64) -> Contact {
        Contact {
            jacobian,
            lever,
            min: -bound,
            max: bound,
            lambda: 0.0,
        }
    }

    #[test]
    fn single_contact_cancels_acceleration_within_bounds() {
        // 1000 lbf of external push on a 100 slug vehicle: 10 ft/s^2.
        // A contact with a generous bound must absorb it completely.
        let mut contacts = vec![contact(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::zeros(),
            5000.0,
        )];
        let vdot = Vector3::new(10.0, 0.0, 0.0);
        let out = solve(
            &mut contacts,
            100.0,
            &Matrix3::identity(),
            &vdot,
            &Vector3::zeros(),
        );
        assert_relative_eq!(out.force.x, -1000.0, epsilon = 1e-6);
        // Residual acceleration along the jacobian is ~zero.
        let resid = vdot.x + out.force.x / 100.0;
        assert!(resid.abs() < 1.0e-3);
    }

    #[test]
    fn multiplier_saturates_at_friction_cone() {
        let mut contacts = vec![contact(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros(), 300.0)];
        let out = solve(
            &mut contacts,
            100.0,
            &Matrix3::identity(),
            &Vector3::new(10.0, 0.0, 0.0),
            &Vector3::zeros(),
        );
        assert_relative_eq!(out.force.x, -300.0, epsilon = 1e-9);
        assert_relative_eq!(contacts[0].lambda, -300.0, epsilon = 1e-9);
    }

    #[test]
    fn symmetric_contacts_share_load() {
        let mut contacts = vec![
            contact(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, -4.0, 0.0), 2000.0),
            contact(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 4.0, 0.0), 2000.0),
        ];
        let out = solve(
            &mut contacts,
            150.0,
            &(Matrix3::identity() * 1.0e-3),
            &Vector3::new(8.0, 0.0, 0.0),
            &Vector3::zeros(),
        );
        assert_relative_eq!(contacts[0].lambda, contacts[1].lambda, epsilon = 1e-6);
        assert_relative_eq!(out.force.x, -8.0 * 150.0, epsilon = 1e-3);
        // Symmetric levers: no net rolling or yawing moment.
        assert_relative_eq!(out.moment.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn no_contacts_is_a_no_op() {
        let out = solve(
            &mut [],
            100.0,
            &Matrix3::identity(),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::zeros(),
        );
        assert_eq!(out.force, Vector3::zeros());
    }
}
