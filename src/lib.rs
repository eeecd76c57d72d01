// src/lib.rs

//! Sparse operators on crystalline orbital bases under periodic boundary
//! conditions, and their reconstruction as dense complex matrices at
//! arbitrary reciprocal-space points (Bloch sums).
//!
//! The building blocks, leaves first:
//! - [`model::Lattice`]: unit cell, periodicity flags and the tracked
//!   supercell of periodic images
//! - [`model::Geometry`]: sites carrying orbitals, defining the dense
//!   orbital index space
//! - [`sparse::SparseMatrix`]: elements keyed by (row orbital, column
//!   orbital, image offset), with a Building/Finalized lifecycle
//! - [`sparse::AtomMatrix`]: the same couplings folded into per-atom-pair
//!   dense blocks
//! - [`physics::bloch`]: M(k) = Σ_R exp(i·2π·k·R)·M_R as a dense matrix
//!
//! File I/O, eigensolvers and plotting are deliberately left to
//! downstream crates; the element enumeration on `SparseMatrix` and the
//! dense output of the Bloch transform are the hand-off points.

pub mod model;
pub mod physics;
pub mod sparse;
pub mod utils;

// Re-exports for cleaner imports
pub use model::{Geometry, GeometryError, ImageOffset, Lattice, LatticeError, Orbital, Site};
pub use sparse::{fold, AtomBlock, AtomMatrix, MatrixElement, MatrixError, MatrixState, SparseMatrix};
