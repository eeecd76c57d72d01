//src/model/mod.rs
pub mod geometry;
pub mod lattice;
pub mod orbital;

// Re-exports for cleaner imports
pub use geometry::{Geometry, GeometryError, Site};
pub use lattice::{ImageOffset, Lattice, LatticeError};
pub use orbital::Orbital;
