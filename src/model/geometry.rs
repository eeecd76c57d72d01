// src/model/geometry.rs

use crate::model::lattice::Lattice;
use crate::model::orbital::Orbital;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

// --- 1. ERROR HANDLING ---

#[derive(Debug, Clone)]
pub enum GeometryError {
    OrbitalOutOfRange { index: usize, count: usize },
    SiteOutOfRange { index: usize, count: usize },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GeometryError::OrbitalOutOfRange { index, count } => {
                write!(f, "Orbital index {} out of range ({} orbitals)", index, count)
            }
            GeometryError::SiteOutOfRange { index, count } => {
                write!(f, "Site index {} out of range ({} sites)", index, count)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

// --- 2. SITES ---

/// One site (atom) with its Cartesian position and attached orbitals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub position: Vector3<f64>,
    pub orbitals: Vec<Orbital>,
}

// --- 3. GEOMETRY ---

/// An ordered set of sites inside a lattice, defining the orbital index
/// space of any matrix built on top of it.
///
/// Orbital indices are dense in `[0, orbital_count())` and assigned in
/// site order; `first_orbital` is the monotonic site -> first-orbital
/// offset table used for O(log S) lookups.
///
/// A `SparseMatrix` consumes the geometry behind an `Arc`, so the borrow
/// rules prevent `add_site` (which needs `&mut self`) from mutating a
/// geometry any matrix still refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "GeometryData")]
pub struct Geometry {
    lattice: Lattice,
    sites: Vec<Site>,
    /// Length sites.len() + 1; last entry is the total orbital count
    first_orbital: Vec<usize>,
}

/// Wire form of a geometry. The offset table is derived state, so
/// deserialization rebuilds it from the sites instead of trusting (or
/// even reading) a serialized `first_orbital` field.
#[derive(Deserialize)]
struct GeometryData {
    lattice: Lattice,
    sites: Vec<Site>,
}

impl From<GeometryData> for Geometry {
    fn from(data: GeometryData) -> Self {
        let mut first_orbital = Vec::with_capacity(data.sites.len() + 1);
        first_orbital.push(0);
        for site in &data.sites {
            let last = first_orbital[first_orbital.len() - 1];
            first_orbital.push(last + site.orbitals.len());
        }
        Self {
            lattice: data.lattice,
            sites: data.sites,
            first_orbital,
        }
    }
}

impl Geometry {
    pub fn new(lattice: Lattice) -> Self {
        Self {
            lattice,
            sites: Vec::new(),
            first_orbital: vec![0],
        }
    }

    /// Append a site, returning the orbital index range it was assigned
    pub fn add_site(&mut self, position: [f64; 3], orbitals: Vec<Orbital>) -> Range<usize> {
        let start = self.orbital_count();
        let end = start + orbitals.len();
        self.sites.push(Site {
            position: Vector3::from(position),
            orbitals,
        });
        self.first_orbital.push(end);
        start..end
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Total orbital count N; matrix rows/columns are indexed [0, N)
    pub fn orbital_count(&self) -> usize {
        self.first_orbital[self.sites.len()]
    }

    pub fn site(&self, index: usize) -> Result<&Site, GeometryError> {
        self.sites.get(index).ok_or(GeometryError::SiteOutOfRange {
            index,
            count: self.sites.len(),
        })
    }

    /// Orbital index range owned by a site
    pub fn site_orbitals(&self, index: usize) -> Result<Range<usize>, GeometryError> {
        if index >= self.sites.len() {
            return Err(GeometryError::SiteOutOfRange {
                index,
                count: self.sites.len(),
            });
        }
        Ok(self.first_orbital[index]..self.first_orbital[index + 1])
    }

    /// Map an orbital index back to the site that owns it.
    /// Binary search over the monotonic offset table.
    pub fn orbital_to_site(&self, orbital: usize) -> Result<usize, GeometryError> {
        if orbital >= self.orbital_count() {
            return Err(GeometryError::OrbitalOutOfRange {
                index: orbital,
                count: self.orbital_count(),
            });
        }
        Ok(self.first_orbital.partition_point(|&start| start <= orbital) - 1)
    }

    /// Fractional position of a site within the lattice
    pub fn fractional_position(&self, index: usize) -> Result<Vector3<f64>, GeometryError> {
        let site = self.site(index)?;
        Ok(self.lattice.cart_to_frac(&site.position))
    }
}
