//src/sparse/mod.rs
pub mod element;
pub mod folded;
pub mod matrix;

// Re-exports for cleaner imports
pub use element::MatrixElement;
pub use folded::{fold, AtomBlock, AtomMatrix};
pub use matrix::{MatrixError, MatrixState, SparseMatrix};
