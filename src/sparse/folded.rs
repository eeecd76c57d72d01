// src/sparse/folded.rs

use crate::model::{Geometry, ImageOffset};
use crate::sparse::element::MatrixElement;
use crate::sparse::matrix::{MatrixError, SparseMatrix};
use log::debug;
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One atom-pair block: every orbital coupling between two sites in a
/// given periodic image, gathered into a dense sub-block sized
/// (orbitals of row site) × (orbitals of column site).
#[derive(Debug, Clone)]
pub struct AtomBlock<T: MatrixElement> {
    /// Column site index
    pub col: usize,
    pub offset: ImageOffset,
    pub values: DMatrix<T>,
}

/// Atom-folded view of a finalized `SparseMatrix`: elements re-keyed by
/// (row site, column site, image offset) for algorithms that operate per
/// atom rather than per orbital.
///
/// The view is read-only and derived; it does not track later mutations
/// of the source matrix. Re-invoke [`fold`] after changing the source.
#[derive(Debug, Clone)]
pub struct AtomMatrix<T: MatrixElement> {
    geometry: Arc<Geometry>,
    rows: Vec<Vec<AtomBlock<T>>>,
}

/// Aggregate a finalized orbital matrix into atom blocks.
///
/// Each orbital element is scattered into its position inside the block
/// of its (row site, column site, offset) triple; missing couplings stay
/// as zeros inside the block. Per row site, blocks come out sorted by
/// (offset, column site), matching the row ordering convention of the
/// finalized source.
///
/// # Errors
/// `NotFinalized` when the source matrix is still in `Building` state.
pub fn fold<T: MatrixElement>(matrix: &SparseMatrix<T>) -> Result<AtomMatrix<T>, MatrixError> {
    if !matrix.is_finalized() {
        return Err(MatrixError::NotFinalized);
    }
    let geometry = Arc::clone(matrix.geometry());
    let site_count = geometry.site_count();
    let orbital_count = geometry.orbital_count();

    // BTreeMap keys give the deterministic (offset, column site) order
    let mut grouped: Vec<BTreeMap<(ImageOffset, usize), DMatrix<T>>> =
        vec![BTreeMap::new(); site_count];

    let index_error = |index: usize| MatrixError::IndexOutOfRange {
        index,
        count: orbital_count,
    };

    for (row, col, offset, value) in matrix.entries() {
        let row_site = geometry.orbital_to_site(row).map_err(|_| index_error(row))?;
        let col_site = geometry.orbital_to_site(col).map_err(|_| index_error(col))?;
        let row_range = geometry.site_orbitals(row_site).map_err(|_| index_error(row))?;
        let col_range = geometry.site_orbitals(col_site).map_err(|_| index_error(col))?;

        let block = grouped[row_site]
            .entry((offset, col_site))
            .or_insert_with(|| {
                DMatrix::from_element(row_range.len(), col_range.len(), T::zero())
            });
        block[(row - row_range.start, col - col_range.start)] = value;
    }

    let rows: Vec<Vec<AtomBlock<T>>> = grouped
        .into_iter()
        .map(|blocks| {
            blocks
                .into_iter()
                .map(|((offset, col), values)| AtomBlock { col, offset, values })
                .collect()
        })
        .collect();

    let block_count: usize = rows.iter().map(|r| r.len()).sum();
    debug!(
        "fold: {} orbital entries -> {} atom blocks",
        matrix.nnz(),
        block_count
    );

    Ok(AtomMatrix { geometry, rows })
}

impl<T: MatrixElement> AtomMatrix<T> {
    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    pub fn atom_count(&self) -> usize {
        self.rows.len()
    }

    /// Orbital dimension of the matrix this view was folded from
    pub fn dimension(&self) -> usize {
        self.geometry.orbital_count()
    }

    /// Number of stored atom blocks
    pub fn block_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// Distinct image offsets present, sorted
    pub fn offsets(&self) -> Vec<ImageOffset> {
        let mut offsets: Vec<ImageOffset> = self
            .rows
            .iter()
            .flat_map(|row| row.iter().map(|b| b.offset))
            .collect();
        offsets.sort();
        offsets.dedup();
        offsets
    }

    /// Blocks of one row site, sorted by (offset, column site)
    pub fn row_blocks(&self, row: usize) -> Result<impl Iterator<Item = &AtomBlock<T>> + '_, MatrixError> {
        if row >= self.rows.len() {
            return Err(MatrixError::IndexOutOfRange {
                index: row,
                count: self.rows.len(),
            });
        }
        Ok(self.rows[row].iter())
    }

    pub(crate) fn blocks(&self, row: usize) -> &[AtomBlock<T>] {
        &self.rows[row]
    }

    /// Dense sub-block for a (row site, column site, offset) triple
    pub fn block(&self, row: usize, col: usize, offset: ImageOffset) -> Option<&DMatrix<T>> {
        self.rows.get(row)?.iter().find_map(|b| {
            if b.col == col && b.offset == offset {
                Some(&b.values)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lattice, Orbital};

    fn geometry() -> Arc<Geometry> {
        let lattice = Lattice::new(
            [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]],
            [true, false, false],
            [3, 1, 1],
        )
        .unwrap();
        let mut geom = Geometry::new(lattice);
        // Site 0: orbitals 0,1 -- site 1: orbital 2
        geom.add_site(
            [0.0, 0.0, 0.0],
            vec![Orbital::s(2.0), Orbital::new("pz", 1, 2.5)],
        );
        geom.add_site([2.0, 0.0, 0.0], vec![Orbital::s(2.0)]);
        Arc::new(geom)
    }

    #[test]
    fn test_fold_requires_finalized() {
        let m: SparseMatrix<f64> = SparseMatrix::new(geometry());
        assert!(matches!(fold(&m), Err(MatrixError::NotFinalized)));
    }

    #[test]
    fn test_fold_block_shapes_and_placement() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(geometry());
        // Intra-site couplings of site 0
        m.set(0, 0, ImageOffset::HOME, 1.0).unwrap();
        m.set(1, 1, ImageOffset::HOME, 2.0).unwrap();
        // Site 0 -> site 1, home and +1 image
        m.set(1, 2, ImageOffset::HOME, 3.0).unwrap();
        m.set(0, 2, ImageOffset::new(1, 0, 0), 4.0).unwrap();
        m.finalize();

        let folded = fold(&m).unwrap();
        assert_eq!(folded.atom_count(), 2);
        assert_eq!(folded.dimension(), 3);
        assert_eq!(folded.block_count(), 3);

        // Diagonal block of site 0 is 2x2 with missing couplings at zero
        let diag = folded.block(0, 0, ImageOffset::HOME).unwrap();
        assert_eq!(diag.shape(), (2, 2));
        assert_eq!(diag[(0, 0)], 1.0);
        assert_eq!(diag[(1, 1)], 2.0);
        assert_eq!(diag[(0, 1)], 0.0);

        // Off-diagonal blocks are 2x1
        let home = folded.block(0, 1, ImageOffset::HOME).unwrap();
        assert_eq!(home.shape(), (2, 1));
        assert_eq!(home[(1, 0)], 3.0);

        let image = folded.block(0, 1, ImageOffset::new(1, 0, 0)).unwrap();
        assert_eq!(image[(0, 0)], 4.0);

        // Site 1 has no stored couplings
        assert_eq!(folded.row_blocks(1).unwrap().count(), 0);
        assert!(folded.block(1, 0, ImageOffset::HOME).is_none());
    }

    #[test]
    fn test_fold_block_order() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(geometry());
        m.set(0, 2, ImageOffset::new(1, 0, 0), 1.0).unwrap();
        m.set(0, 0, ImageOffset::new(1, 0, 0), 2.0).unwrap();
        m.set(0, 2, ImageOffset::new(-1, 0, 0), 3.0).unwrap();
        m.set(0, 0, ImageOffset::HOME, 4.0).unwrap();
        m.finalize();

        let folded = fold(&m).unwrap();
        let keys: Vec<_> = folded
            .row_blocks(0)
            .unwrap()
            .map(|b| (b.offset, b.col))
            .collect();
        assert_eq!(
            keys,
            vec![
                (ImageOffset::new(-1, 0, 0), 1),
                (ImageOffset::HOME, 0),
                (ImageOffset::new(1, 0, 0), 0),
                (ImageOffset::new(1, 0, 0), 1),
            ]
        );
    }

    #[test]
    fn test_row_blocks_index_error() {
        let mut m: SparseMatrix<f64> = SparseMatrix::new(geometry());
        m.finalize();
        let folded = fold(&m).unwrap();
        assert!(folded.row_blocks(2).is_err());
    }
}
