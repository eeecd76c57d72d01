// src/physics/bloch.rs

use crate::model::ImageOffset;
use crate::sparse::element::MatrixElement;
use crate::sparse::folded::AtomMatrix;
use crate::sparse::matrix::SparseMatrix;
use nalgebra::DMatrix;
use num_complex::Complex;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Per-offset phase factors exp(i·2π·k·R). `k` is fractional (units of
/// the reciprocal lattice vectors) so the dot product is a plain real
/// number; one exponential per distinct offset covers all entries.
fn phase_table(offsets: &[ImageOffset], k: [f64; 3]) -> BTreeMap<ImageOffset, Complex<f64>> {
    offsets
        .iter()
        .map(|&offset| {
            let dot = k[0] * offset.0[0] as f64
                + k[1] * offset.0[1] as f64
                + k[2] * offset.0[2] as f64;
            (offset, Complex::new(0.0, 2.0 * PI * dot).exp())
        })
        .collect()
}

/// Evaluate the Bloch sum M(k) = Σ_R exp(i·2π·k·R) · M_R as a dense
/// complex matrix of the source's dimension.
///
/// `k` is given in reciprocal-lattice (fractional) units. Accumulation
/// runs in double-precision complex regardless of the stored element
/// type, and the result is independent of storage order up to rounding.
/// The transform is a pure linear map: it does not symmetrize, so the
/// output is Hermitian only if the stored matrix is.
///
/// An empty matrix yields an all-zero matrix of the declared dimension.
/// At k = 0 with only home-cell couplings the dense home block is
/// returned directly, with no complex phases computed.
pub fn evaluate<T: MatrixElement>(matrix: &SparseMatrix<T>, k: [f64; 3]) -> DMatrix<Complex<f64>> {
    let dim = matrix.dimension();
    let mut out = DMatrix::from_element(dim, dim, Complex::new(0.0, 0.0));

    let offsets = matrix.offsets();
    if k == [0.0, 0.0, 0.0] && offsets.iter().all(|o| o.is_home()) {
        for (row, col, _, value) in matrix.entries() {
            out[(row, col)] += value.to_complex();
        }
        return out;
    }

    let phases = phase_table(&offsets, k);
    for (row, col, offset, value) in matrix.entries() {
        if let Some(&phase) = phases.get(&offset) {
            out[(row, col)] += phase * value.to_complex();
        }
    }
    out
}

/// Bloch sum evaluated from an atom-folded view; identical to
/// [`evaluate`] on the source matrix, scattering whole phase-weighted
/// blocks into the dense output.
pub fn evaluate_folded<T: MatrixElement>(
    folded: &AtomMatrix<T>,
    k: [f64; 3],
) -> DMatrix<Complex<f64>> {
    let dim = folded.dimension();
    let mut out = DMatrix::from_element(dim, dim, Complex::new(0.0, 0.0));
    let phases = phase_table(&folded.offsets(), k);
    let geometry = folded.geometry();

    for row in 0..folded.atom_count() {
        let row_range = match geometry.site_orbitals(row) {
            Ok(range) => range,
            Err(_) => continue,
        };
        for block in folded.blocks(row) {
            let col_range = match geometry.site_orbitals(block.col) {
                Ok(range) => range,
                Err(_) => continue,
            };
            let phase = match phases.get(&block.offset) {
                Some(&phase) => phase,
                None => continue,
            };
            for (i, r) in row_range.clone().enumerate() {
                for (j, c) in col_range.clone().enumerate() {
                    out[(r, c)] += phase * block.values[(i, j)].to_complex();
                }
            }
        }
    }
    out
}

/// Evaluate the Bloch sum at a batch of k-vectors in parallel.
///
/// Each evaluation owns its output buffer and only reads the shared
/// matrix, so the batch splits across rayon workers with no locking.
pub fn evaluate_path<T: MatrixElement>(
    matrix: &SparseMatrix<T>,
    ks: &[[f64; 3]],
) -> Vec<DMatrix<Complex<f64>>> {
    ks.par_iter().map(|&k| evaluate(matrix, k)).collect()
}
