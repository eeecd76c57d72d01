// src/model/orbital.rs

use serde::{Deserialize, Serialize};

/// A single basis orbital attached to a site.
///
/// The matrix row/column index space is built from orbitals; sites group
/// them into contiguous ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orbital {
    /// Short label, e.g. "s", "pz", "dxy"
    pub tag: String,
    /// Angular momentum quantum number
    pub l: i32,
    /// Interaction cutoff radius in Å
    pub cutoff: f64,
}

impl Orbital {
    pub fn new(tag: &str, l: i32, cutoff: f64) -> Self {
        Self {
            tag: tag.to_string(),
            l,
            cutoff,
        }
    }

    /// Convenience constructor for an s-like orbital
    pub fn s(cutoff: f64) -> Self {
        Self::new("s", 0, cutoff)
    }
}
