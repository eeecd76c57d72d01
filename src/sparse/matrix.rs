// src/sparse/matrix.rs

use crate::model::{Geometry, ImageOffset};
use crate::sparse::element::MatrixElement;
use log::debug;
use std::fmt;
use std::sync::Arc;

// --- 1. ERROR HANDLING ---

#[derive(Debug, Clone)]
pub enum MatrixError {
    /// Row or column orbital index outside [0, N)
    IndexOutOfRange { index: usize, count: usize },
    /// Periodic image offset outside the lattice's tracked supercell range
    OffsetOutOfRange {
        offset: ImageOffset,
        half_range: [i32; 3],
    },
    /// Operation requires `finalize()` to have been called first
    NotFinalized,
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatrixError::IndexOutOfRange { index, count } => {
                write!(f, "Orbital index {} out of range (dimension {})", index, count)
            }
            MatrixError::OffsetOutOfRange { offset, half_range } => write!(
                f,
                "Image offset {} outside tracked supercell range ±{:?}",
                offset, half_range
            ),
            MatrixError::NotFinalized => {
                write!(f, "Operation requires a finalized matrix")
            }
        }
    }
}

impl std::error::Error for MatrixError {}

// --- 2. STORAGE ---

/// Lifecycle state of a `SparseMatrix`.
///
/// `Building` allows mutation; `finalize()` moves to `Finalized`, which
/// guarantees sorted rows and no explicit zeros. Any successful mutation
/// returns the matrix to `Building` and voids the sorted-order guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixState {
    Building,
    Finalized,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    col: usize,
    offset: ImageOffset,
    value: T,
}

/// Sparse matrix over a periodic orbital basis.
///
/// Elements are keyed by (row orbital, column orbital, image offset);
/// each row owns its entry list, so row iteration never touches the rest
/// of the matrix. At most one entry exists per key at all times.
///
/// The geometry is shared behind an `Arc`; a finalized matrix has no
/// interior mutability, so `get`/`row_entries`/Bloch evaluation are safe
/// for any number of concurrent readers.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T: MatrixElement> {
    geometry: Arc<Geometry>,
    rows: Vec<Vec<Entry<T>>>,
    state: MatrixState,
}

impl<T: MatrixElement> SparseMatrix<T> {
    /// Empty matrix over the geometry's orbital index space
    pub fn new(geometry: Arc<Geometry>) -> Self {
        let dim = geometry.orbital_count();
        Self {
            geometry,
            rows: vec![Vec::new(); dim],
            state: MatrixState::Building,
        }
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    /// Matrix dimension N (total orbital count)
    pub fn dimension(&self) -> usize {
        self.rows.len()
    }

    pub fn state(&self) -> MatrixState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == MatrixState::Finalized
    }

    /// Number of stored elements
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }

    fn check_index(&self, index: usize) -> Result<(), MatrixError> {
        if index >= self.rows.len() {
            return Err(MatrixError::IndexOutOfRange {
                index,
                count: self.rows.len(),
            });
        }
        Ok(())
    }

    /// Validate a (row, col, offset) key. Runs before any mutation so a
    /// failed call leaves storage and state untouched.
    fn check_key(&self, row: usize, col: usize, offset: ImageOffset) -> Result<(), MatrixError> {
        self.check_index(row)?;
        self.check_index(col)?;
        if !self.geometry.lattice().contains(offset) {
            return Err(MatrixError::OffsetOutOfRange {
                offset,
                half_range: self.geometry.lattice().half_range(),
            });
        }
        Ok(())
    }

    /// Insert or overwrite the element at (row, col, offset).
    /// Unlike `add`, an existing value is replaced, not accumulated.
    pub fn set(&mut self, row: usize, col: usize, offset: ImageOffset, value: T) -> Result<(), MatrixError> {
        self.check_key(row, col, offset)?;
        self.state = MatrixState::Building;
        match self.rows[row]
            .iter_mut()
            .find(|e| e.col == col && e.offset == offset)
        {
            Some(entry) => entry.value = value,
            None => self.rows[row].push(Entry { col, offset, value }),
        }
        Ok(())
    }

    /// Accumulate into the element at (row, col, offset), creating it
    /// with `value` when absent
    pub fn add(&mut self, row: usize, col: usize, offset: ImageOffset, value: T) -> Result<(), MatrixError> {
        self.check_key(row, col, offset)?;
        self.state = MatrixState::Building;
        match self.rows[row]
            .iter_mut()
            .find(|e| e.col == col && e.offset == offset)
        {
            Some(entry) => entry.value += value,
            None => self.rows[row].push(Entry { col, offset, value }),
        }
        Ok(())
    }

    /// Value at (row, col, offset); zero when no element is stored.
    /// Never creates storage.
    pub fn get(&self, row: usize, col: usize, offset: ImageOffset) -> Result<T, MatrixError> {
        self.check_key(row, col, offset)?;
        Ok(self.rows[row]
            .iter()
            .find(|e| e.col == col && e.offset == offset)
            .map(|e| e.value)
            .unwrap_or_else(T::zero))
    }

    /// Remove the element at (row, col, offset); no-op when absent
    pub fn delete(&mut self, row: usize, col: usize, offset: ImageOffset) -> Result<(), MatrixError> {
        self.check_key(row, col, offset)?;
        self.state = MatrixState::Building;
        if let Some(pos) = self.rows[row]
            .iter()
            .position(|e| e.col == col && e.offset == offset)
        {
            self.rows[row].remove(pos);
        }
        Ok(())
    }

    /// Iterate one row's entries as (col, offset, value).
    /// Restartable and stable across calls while the row is unmodified;
    /// sorted by (offset, col) while the matrix is `Finalized`.
    pub fn row_entries(
        &self,
        row: usize,
    ) -> Result<impl Iterator<Item = (usize, ImageOffset, T)> + '_, MatrixError> {
        self.check_index(row)?;
        Ok(self.rows[row].iter().map(|e| (e.col, e.offset, e.value)))
    }

    /// Enumerate every stored element as (row, col, offset, value).
    /// This is the serialization interface consumed by external writers.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, ImageOffset, T)> + '_ {
        self.rows.iter().enumerate().flat_map(|(row, entries)| {
            entries.iter().map(move |e| (row, e.col, e.offset, e.value))
        })
    }

    /// Distinct image offsets present in the matrix, sorted
    pub fn offsets(&self) -> Vec<ImageOffset> {
        let mut offsets: Vec<ImageOffset> = self
            .rows
            .iter()
            .flat_map(|row| row.iter().map(|e| e.offset))
            .collect();
        offsets.sort();
        offsets.dedup();
        offsets
    }

    /// Structural reduction: sort each row by (offset, col), merge
    /// duplicate keys by summation, drop exact zeros and compact storage.
    /// Transitions the matrix to `Finalized`.
    pub fn finalize(&mut self) {
        let before = self.nnz();
        for row in &mut self.rows {
            row.sort_by_key(|e| (e.offset, e.col));

            let mut reduced: Vec<Entry<T>> = Vec::with_capacity(row.len());
            for entry in row.drain(..) {
                match reduced.last_mut() {
                    Some(last) if last.col == entry.col && last.offset == entry.offset => {
                        last.value += entry.value
                    }
                    _ => reduced.push(entry),
                }
            }
            reduced.retain(|e| !e.value.is_zero());
            reduced.shrink_to_fit();
            *row = reduced;
        }

        let after = self.nnz();
        if after != before {
            debug!("finalize: reduced {} entries to {}", before, after);
        }
        self.state = MatrixState::Finalized;
    }

    /// Transposed copy: element (i, j, R) moves to (j, i, -R). With
    /// `conjugate` the values are complex-conjugated as well, which turns
    /// this into the Hermitian adjoint for complex matrices.
    ///
    /// The result is finalized iff `self` is.
    pub fn transpose(&self, conjugate: bool) -> SparseMatrix<T> {
        let mut out = SparseMatrix::new(Arc::clone(&self.geometry));
        for (row, col, offset, value) in self.entries() {
            let value = if conjugate { value.conjugate() } else { value };
            // Keys stay unique under (i,j,R) -> (j,i,-R), and negated
            // offsets stay inside the symmetric tracked range.
            out.rows[col].push(Entry {
                col: row,
                offset: offset.neg(),
                value,
            });
        }
        if self.is_finalized() {
            out.finalize();
        }
        out
    }
}
