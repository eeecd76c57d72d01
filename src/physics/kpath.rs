// src/physics/kpath.rs

use crate::model::lattice::Lattice;
use nalgebra::Vector3;

/// Labelled high-symmetry point in fractional reciprocal coordinates
#[derive(Debug, Clone)]
pub struct KPoint {
    pub label: String,
    pub coords: [f64; 3],
}

impl KPoint {
    pub fn new(label: &str, coords: [f64; 3]) -> Self {
        Self {
            label: label.to_string(),
            coords,
        }
    }
}

/// A sampled polyline through reciprocal space, ready to feed into
/// `bloch::evaluate_path`
#[derive(Debug, Clone)]
pub struct KPath {
    /// Sampled k-vectors in fractional coordinates
    pub kpoints: Vec<[f64; 3]>,
    /// Cumulative distance along the path in Cartesian reciprocal units
    /// (the x-axis of a band plot)
    pub distances: Vec<f64>,
    /// (sample index, label) of each input vertex
    pub labels: Vec<(usize, String)>,
}

/// Sample `nk` points along the polyline through `points`.
///
/// Samples are spaced uniformly in arc length, measured with the
/// reciprocal metric so segments get samples proportional to their true
/// Cartesian length in reciprocal space. Both endpoints are included.
pub fn interpolate(lattice: &Lattice, points: &[KPoint], nk: usize) -> KPath {
    if points.is_empty() || nk == 0 {
        return KPath {
            kpoints: Vec::new(),
            distances: Vec::new(),
            labels: Vec::new(),
        };
    }
    if points.len() == 1 || nk == 1 {
        return KPath {
            kpoints: vec![points[0].coords],
            distances: vec![0.0],
            // One sample can only stand for the first vertex
            labels: vec![(0, points[0].label.clone())],
        };
    }

    let recip = lattice.reciprocal();
    let cart = |frac: [f64; 3]| -> Vector3<f64> { recip.transpose() * Vector3::from(frac) };

    // Cumulative arc length at each vertex
    let mut vertex_dist = vec![0.0];
    for pair in points.windows(2) {
        let length = (cart(pair[1].coords) - cart(pair[0].coords)).norm();
        let last = vertex_dist[vertex_dist.len() - 1];
        vertex_dist.push(last + length);
    }
    let total = vertex_dist[vertex_dist.len() - 1];

    let mut kpoints = Vec::with_capacity(nk);
    let mut distances = Vec::with_capacity(nk);
    let mut segment = 0;
    for sample in 0..nk {
        let s = total * sample as f64 / (nk - 1) as f64;
        // Vertices are sorted by distance; advance to the segment holding s
        while segment + 2 < points.len() && vertex_dist[segment + 1] < s {
            segment += 1;
        }
        let span = vertex_dist[segment + 1] - vertex_dist[segment];
        let t = if span > 0.0 {
            ((s - vertex_dist[segment]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let a = points[segment].coords;
        let b = points[segment + 1].coords;
        kpoints.push([
            a[0] + t * (b[0] - a[0]),
            a[1] + t * (b[1] - a[1]),
            a[2] + t * (b[2] - a[2]),
        ]);
        distances.push(s);
    }

    let labels = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let index = if total > 0.0 {
                (vertex_dist[i] / total * (nk - 1) as f64).round() as usize
            } else {
                0
            };
            (index, p.label.clone())
        })
        .collect();

    KPath {
        kpoints,
        distances,
        labels,
    }
}
