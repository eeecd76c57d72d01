// src/model/lattice.rs

use crate::utils::linalg;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Relative determinant threshold below which a cell counts as degenerate
const DET_TOLERANCE: f64 = 1e-12;

// --- 1. PERIODIC IMAGE OFFSETS ---

/// Identifies one periodic image of the unit cell as an integer triple
/// multiplying the lattice vectors. `(0, 0, 0)` is the home cell.
///
/// The derived ordering is lexicographic over (axis-0, axis-1, axis-2),
/// which is the canonical iteration/sort order everywhere in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageOffset(pub [i32; 3]);

impl ImageOffset {
    /// The home cell (zero offset)
    pub const HOME: ImageOffset = ImageOffset([0, 0, 0]);

    pub fn new(a: i32, b: i32, c: i32) -> Self {
        ImageOffset([a, b, c])
    }

    pub fn is_home(&self) -> bool {
        self.0 == [0, 0, 0]
    }

    /// Offset of the mirror image: (i, j, R) transposed lives at (j, i, -R)
    pub fn neg(&self) -> Self {
        ImageOffset([-self.0[0], -self.0[1], -self.0[2]])
    }
}

impl fmt::Display for ImageOffset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0[0], self.0[1], self.0[2])
    }
}

// --- 2. ERROR HANDLING ---

#[derive(Debug, Clone)]
pub enum LatticeError {
    /// Lattice vectors are linearly dependent (determinant ~ 0)
    Degenerate(f64),
    /// Image count must be odd (offsets run symmetrically around zero)
    /// and exactly 1 along non-periodic axes
    BadImageCount { axis: usize, count: u32 },
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LatticeError::Degenerate(det) => {
                write!(f, "Lattice vectors are degenerate (determinant {:.3e})", det)
            }
            LatticeError::BadImageCount { axis, count } => write!(
                f,
                "Invalid image count {} on axis {}: counts must be odd, and 1 on non-periodic axes",
                count, axis
            ),
        }
    }
}

impl std::error::Error for LatticeError {}

// --- 3. LATTICE ---

/// The repeating unit cell: three lattice vectors, per-axis periodicity
/// flags and the shape of the tracked supercell.
///
/// `images` gives the number of explicitly tracked periodic images per
/// axis. Counts are odd so image offsets run symmetrically around the
/// home cell, e.g. `images = [3, 3, 1]` tracks offsets -1..=1 along the
/// first two axes. Non-periodic axes always track exactly the home cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LatticeData")]
pub struct Lattice {
    /// Lattice vectors as rows: [a; b; c]
    vectors: Matrix3<f64>,
    /// Which axes are periodic
    pbc: [bool; 3],
    /// Tracked image counts per axis (odd)
    images: [u32; 3],
    /// Reciprocal lattice vectors as rows, 2π·(A⁻¹)ᵀ
    reciprocal: Matrix3<f64>,
}

/// Wire form of a lattice. Deserialization funnels through `try_from` so
/// hand-edited input cannot bypass validation or carry a stale
/// reciprocal matrix; any serialized `reciprocal` field is ignored and
/// recomputed.
#[derive(Deserialize)]
struct LatticeData {
    vectors: Matrix3<f64>,
    pbc: [bool; 3],
    images: [u32; 3],
}

impl TryFrom<LatticeData> for Lattice {
    type Error = LatticeError;

    fn try_from(data: LatticeData) -> Result<Self, LatticeError> {
        Lattice::from_matrix(data.vectors, data.pbc, data.images)
    }
}

impl Lattice {
    /// Build a lattice and validate it up front.
    ///
    /// # Errors
    /// - `Degenerate` when the cell determinant is within tolerance of zero
    ///   (raised here so downstream reciprocal-space code never has to)
    /// - `BadImageCount` when an image count is even, zero, or not 1 on a
    ///   non-periodic axis
    pub fn new(
        vectors: [[f64; 3]; 3],
        pbc: [bool; 3],
        images: [u32; 3],
    ) -> Result<Self, LatticeError> {
        let mat = Matrix3::new(
            vectors[0][0], vectors[0][1], vectors[0][2],
            vectors[1][0], vectors[1][1], vectors[1][2],
            vectors[2][0], vectors[2][1], vectors[2][2],
        );
        Self::from_matrix(mat, pbc, images)
    }

    fn from_matrix(
        mat: Matrix3<f64>,
        pbc: [bool; 3],
        images: [u32; 3],
    ) -> Result<Self, LatticeError> {
        // Relative tolerance: scale by the product of row norms so the
        // check is invariant under uniform scaling of the cell.
        let det = mat.determinant();
        let scale = mat.row(0).norm() * mat.row(1).norm() * mat.row(2).norm();
        if det.abs() <= DET_TOLERANCE * scale.max(1.0) {
            return Err(LatticeError::Degenerate(det));
        }

        for axis in 0..3 {
            let count = images[axis];
            if count == 0 || count % 2 == 0 || (!pbc[axis] && count != 1) {
                return Err(LatticeError::BadImageCount { axis, count });
            }
        }

        let reciprocal = match mat.try_inverse() {
            Some(inv) => inv.transpose() * (2.0 * PI),
            None => return Err(LatticeError::Degenerate(det)),
        };

        Ok(Self {
            vectors: mat,
            pbc,
            images,
            reciprocal,
        })
    }

    /// Lattice vectors as a row matrix [a; b; c]
    pub fn vectors(&self) -> &Matrix3<f64> {
        &self.vectors
    }

    /// Single lattice vector (row `axis`)
    pub fn vector(&self, axis: usize) -> Vector3<f64> {
        self.vectors.row(axis).transpose()
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    /// Tracked image counts per axis
    pub fn images(&self) -> [u32; 3] {
        self.images
    }

    /// Reciprocal lattice vectors as rows, b_i · a_j = 2π δ_ij
    pub fn reciprocal(&self) -> &Matrix3<f64> {
        &self.reciprocal
    }

    /// Largest tracked offset component per axis: (images - 1) / 2
    pub fn half_range(&self) -> [i32; 3] {
        [
            (self.images[0] as i32 - 1) / 2,
            (self.images[1] as i32 - 1) / 2,
            (self.images[2] as i32 - 1) / 2,
        ]
    }

    /// Total number of tracked periodic images
    pub fn image_count(&self) -> usize {
        self.images.iter().map(|&n| n as usize).product()
    }

    /// Whether `offset` lies within the tracked supercell range
    pub fn contains(&self, offset: ImageOffset) -> bool {
        let half = self.half_range();
        (0..3).all(|axis| offset.0[axis].abs() <= half[axis])
    }

    /// Enumerate every tracked image offset in lexicographic
    /// (axis-0, axis-1, axis-2) order. Restartable: each call yields a
    /// fresh iterator over the same deterministic sequence.
    pub fn image_offsets(&self) -> impl Iterator<Item = ImageOffset> + '_ {
        let [ha, hb, hc] = self.half_range();
        (-ha..=ha).flat_map(move |a| {
            (-hb..=hb).flat_map(move |b| (-hc..=hc).map(move |c| ImageOffset([a, b, c])))
        })
    }

    /// Cartesian displacement of a periodic image: R = o₀·a + o₁·b + o₂·c
    pub fn cell_displacement(&self, offset: ImageOffset) -> Vector3<f64> {
        let frac = Vector3::new(offset.0[0] as f64, offset.0[1] as f64, offset.0[2] as f64);
        linalg::frac_to_cart(&frac, &self.vectors)
    }

    /// Fractional -> Cartesian coordinates
    pub fn frac_to_cart(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        linalg::frac_to_cart(frac, &self.vectors)
    }

    /// Cartesian -> fractional coordinates.
    /// The inverse exists because degeneracy is rejected at construction;
    /// it is recovered from the stored reciprocal matrix.
    pub fn cart_to_frac(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        // (A^T)^-1 = reciprocal / 2π
        self.reciprocal * cart / (2.0 * PI)
    }

    /// Minimum-image offset of a Cartesian displacement vector: the
    /// nearest tracked periodic image under periodic wrap. Components on
    /// non-periodic axes are always zero; periodic components are clamped
    /// to the tracked range.
    pub fn min_image_offset(&self, cart: &Vector3<f64>) -> ImageOffset {
        let frac = self.cart_to_frac(cart);
        let half = self.half_range();
        let mut offset = [0i32; 3];
        for axis in 0..3 {
            if self.pbc[axis] {
                offset[axis] = (frac[axis].round() as i32).clamp(-half[axis], half[axis]);
            }
        }
        ImageOffset(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(a: f64, images: [u32; 3]) -> Lattice {
        Lattice::new(
            [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
            [true, true, true],
            images,
        )
        .unwrap()
    }

    #[test]
    fn test_reciprocal_cubic() {
        let lat = cubic(2.0, [1, 1, 1]);
        let recip = lat.reciprocal();

        assert!((recip[(0, 0)] - PI).abs() < 1e-12);
        assert!((recip[(1, 1)] - PI).abs() < 1e-12);
        assert!((recip[(2, 2)] - PI).abs() < 1e-12);
        assert!(recip[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_lattice_rejected() {
        let result = Lattice::new(
            [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            [true, true, true],
            [1, 1, 1],
        );
        assert!(matches!(result, Err(LatticeError::Degenerate(_))));
    }

    #[test]
    fn test_even_image_count_rejected() {
        let result = Lattice::new(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            [true, true, true],
            [2, 1, 1],
        );
        assert!(matches!(
            result,
            Err(LatticeError::BadImageCount { axis: 0, count: 2 })
        ));
    }

    #[test]
    fn test_nonperiodic_axis_must_track_home_only() {
        let result = Lattice::new(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            [true, false, true],
            [3, 3, 3],
        );
        assert!(matches!(
            result,
            Err(LatticeError::BadImageCount { axis: 1, count: 3 })
        ));
    }

    #[test]
    fn test_image_enumeration_order() {
        let lat = cubic(1.0, [3, 3, 1]);
        let offsets: Vec<_> = lat.image_offsets().collect();

        assert_eq!(offsets.len(), 9);
        assert_eq!(lat.image_count(), 9);
        assert_eq!(offsets[0], ImageOffset::new(-1, -1, 0));
        assert_eq!(offsets[4], ImageOffset::HOME);
        assert_eq!(offsets[8], ImageOffset::new(1, 1, 0));

        // Lexicographic and strictly increasing
        let mut sorted = offsets.clone();
        sorted.sort();
        assert_eq!(offsets, sorted);

        // Restartable: second pass yields the same sequence
        let again: Vec<_> = lat.image_offsets().collect();
        assert_eq!(offsets, again);
    }

    #[test]
    fn test_contains() {
        let lat = cubic(1.0, [3, 1, 1]);
        assert!(lat.contains(ImageOffset::new(1, 0, 0)));
        assert!(lat.contains(ImageOffset::new(-1, 0, 0)));
        assert!(!lat.contains(ImageOffset::new(2, 0, 0)));
        assert!(!lat.contains(ImageOffset::new(0, 1, 0)));
    }

    #[test]
    fn test_cell_displacement() {
        let lat = cubic(4.0, [3, 3, 3]);
        let r = lat.cell_displacement(ImageOffset::new(1, -1, 0));
        assert!((r - Vector3::new(4.0, -4.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_min_image_offset() {
        let lat = Lattice::new(
            [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 10.0]],
            [true, true, false],
            [3, 3, 1],
        )
        .unwrap();

        // 3.5 Å along x is closer to the +1 image than to home
        let off = lat.min_image_offset(&Vector3::new(3.5, 0.2, 8.0));
        assert_eq!(off, ImageOffset::new(1, 0, 0));

        // Non-periodic z never wraps
        let off = lat.min_image_offset(&Vector3::new(0.1, -3.7, 25.0));
        assert_eq!(off, ImageOffset::new(0, -1, 0));
    }

    #[test]
    fn test_min_image_offset_hexagonal() {
        // Skewed (hexagonal) cell: axis-aligned rounding would misplace
        // displacements with components along both a and b
        let lat = Lattice::new(
            [
                [1.0, 0.0, 0.0],
                [-0.5, 0.866_025_403_784_438_6, 0.0],
                [0.0, 0.0, 10.0],
            ],
            [true, true, false],
            [3, 3, 1],
        )
        .unwrap();

        let near_a = lat.frac_to_cart(&Vector3::new(0.9, -0.1, 3.0));
        assert_eq!(lat.min_image_offset(&near_a), ImageOffset::new(1, 0, 0));

        let near_b = lat.frac_to_cart(&Vector3::new(0.1, 1.2, 0.0));
        assert_eq!(lat.min_image_offset(&near_b), ImageOffset::new(0, 1, 0));

        // 0.9·a + 0.9·b in raw Cartesian coordinates
        let diagonal = Vector3::new(0.45, 0.779_422_863_405_995, 0.0);
        assert_eq!(lat.min_image_offset(&diagonal), ImageOffset::new(1, 1, 0));
    }

    #[test]
    fn test_image_count_no_overflow() {
        // 99999³ exceeds u32; per-factor widening must keep this exact
        let lat = cubic(1.0, [99_999, 99_999, 99_999]);
        assert_eq!(lat.image_count(), 999_970_000_299_999);
    }

    #[test]
    fn test_deserialize_rejects_degenerate() {
        let lat = cubic(2.0, [1, 1, 1]);
        let mut value = serde_json::to_value(&lat).unwrap();
        // Two parallel rows -> determinant zero
        value["vectors"] =
            serde_json::to_value(Matrix3::new(1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0))
                .unwrap();

        let result: Result<Lattice, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_recomputes_reciprocal() {
        let lat = cubic(2.0, [3, 3, 3]);
        let mut value = serde_json::to_value(&lat).unwrap();
        // A tampered reciprocal on the wire must not survive
        value["reciprocal"] = serde_json::to_value(Matrix3::<f64>::identity()).unwrap();

        let back: Lattice = serde_json::from_value(value).unwrap();
        assert!((back.reciprocal() - lat.reciprocal()).norm() < 1e-12);
    }

    #[test]
    fn test_offset_ordering_and_neg() {
        let a = ImageOffset::new(-1, 2, 0);
        assert_eq!(a.neg(), ImageOffset::new(1, -2, 0));
        assert!(ImageOffset::new(-1, 0, 0) < ImageOffset::HOME);
        assert!(ImageOffset::HOME < ImageOffset::new(0, 0, 1));
        assert!(ImageOffset::HOME.is_home());
    }
}
