// src/utils/linalg.rs

use nalgebra::{Matrix3, Vector3};

/// Convert fractional coordinates to Cartesian using the lattice matrix
///
/// # Arguments
/// * `frac` - Fractional coordinates [x, y, z]
/// * `vectors` - Lattice vectors as row matrix [[ax, ay, az], [bx, by, bz], [cx, cy, cz]]
///
/// # Formula
/// ```text
/// Cartesian = Lattice^T × Fractional
/// ```
pub fn frac_to_cart(frac: &Vector3<f64>, vectors: &Matrix3<f64>) -> Vector3<f64> {
    vectors.transpose() * frac
}

/// Convert Cartesian coordinates to fractional using the lattice matrix
///
/// # Returns
/// Fractional coordinates or None if the lattice is singular
///
/// # Formula
/// ```text
/// Fractional = (Lattice^T)^-1 × Cartesian
/// ```
pub fn cart_to_frac(cart: &Vector3<f64>, vectors: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let inv = vectors.transpose().try_inverse()?;
    Some(inv * cart)
}
