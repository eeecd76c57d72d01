//src/physics/mod.rs
pub mod bloch;
pub mod kpath;
