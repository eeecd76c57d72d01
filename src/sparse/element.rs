// src/sparse/element.rs

use nalgebra::Scalar;
use num_complex::Complex;
use std::ops::{Add, AddAssign};

/// Scalar element type stored in a sparse periodic matrix.
///
/// The element type is fixed when the matrix is created, so there is no
/// per-element dispatch at runtime. Real matrices use `f64`/`f32`,
/// complex ones `Complex<f64>`; `to_complex` promotes everything to
/// double-precision complex so Bloch accumulation always runs in f64
/// regardless of the stored precision.
pub trait MatrixElement:
    Copy + PartialEq + Add<Output = Self> + AddAssign + Send + Sync + Scalar
{
    fn zero() -> Self;

    /// Exact zero test, used by `finalize()` to drop explicit zeros
    fn is_zero(&self) -> bool;

    /// Complex conjugate; identity for real types
    fn conjugate(&self) -> Self;

    /// Promote to double-precision complex
    fn to_complex(&self) -> Complex<f64>;
}

impl MatrixElement for f64 {
    fn zero() -> Self {
        0.0
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn conjugate(&self) -> Self {
        *self
    }

    fn to_complex(&self) -> Complex<f64> {
        Complex::new(*self, 0.0)
    }
}

impl MatrixElement for f32 {
    fn zero() -> Self {
        0.0
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn conjugate(&self) -> Self {
        *self
    }

    fn to_complex(&self) -> Complex<f64> {
        Complex::new(*self as f64, 0.0)
    }
}

impl MatrixElement for Complex<f64> {
    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }

    fn conjugate(&self) -> Self {
        self.conj()
    }

    fn to_complex(&self) -> Complex<f64> {
        *self
    }
}
