pub mod constants;
pub mod errors;

pub use errors::{Result, SimError};

use nalgebra::Vector3;

/// Convert a point in the structural frame (inches, X aft, Z up) to the body
/// frame (feet, X forward, Z down), relative to the current CG.
///
/// The structural frame is the one used in aircraft configuration files; the
/// CG itself is given in the same frame.
pub fn structural_to_body(point_in: &Vector3<f64>, cg_in: &Vector3<f64>) -> Vector3<f64> {
    let d = point_in - cg_in;
    Vector3::new(-d.x, d.y, -d.z) * constants::IN_TO_FT
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    #[test]
    fn cross_product_is_orthogonal_to_its_operands() {
        let a = Vector3::new(0.3, -1.7, 2.9);
        let b = Vector3::new(-4.1, 0.2, 0.8);
        let c = a.cross(&b);
        assert_relative_eq!(c.dot(&a), 0.0, epsilon = 1e-10);
        assert_relative_eq!(c.dot(&b), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn orthonormal_matrix_inverse_is_its_transpose() {
        // A rotation assembled from unit axes: R * R^T recovers identity.
        let r = nalgebra::Rotation3::from_euler_angles(0.4, -0.9, 2.2);
        let m: Matrix3<f64> = *r.matrix();
        let eye = m * m.transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(eye[(i, j)], expect, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn structural_conversion_flips_x_and_z() {
        // A point 12 in aft and 24 in above the CG is 1 ft behind and 2 ft
        // above in body coordinates (body Z is down).
        let cg = Vector3::new(100.0, 0.0, 36.0);
        let p = Vector3::new(112.0, 6.0, 60.0);
        let b = structural_to_body(&p, &cg);
        assert_relative_eq!(b.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(b.y, 0.5, epsilon = 1e-12);
        assert_relative_eq!(b.z, -2.0, epsilon = 1e-12);
    }
}
