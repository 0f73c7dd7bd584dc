//! Post-solve smoothing over unmatched vertices.
//!
//! The harmonic solve already produces smooth fields; this pass exists
//! for meshes where the transition between matched and inpainted regions
//! still shows. Matched vertices are never touched, so source data
//! survives any number of iterations.

use nalgebra::Vector3;
use tracing::debug;

use crate::adjacency::VertexAdjacency;
use crate::types::{DisplacementField, MeshSnapshot};

/// Relax unmatched displacements toward an edge-weighted average of
/// their one-ring.
///
/// Edge weight is `1 / (1 + edge_length)`, so short edges pull harder.
/// Each iteration reads the previous field and writes a fresh one
/// (Jacobi-style), keeping the result independent of vertex order.
pub fn smooth_unmatched(
    field: &mut DisplacementField,
    target: &MeshSnapshot,
    matched: &[bool],
    adjacency: &VertexAdjacency,
    iterations: usize,
) {
    if iterations == 0 {
        return;
    }

    let n = field.len();
    for _ in 0..iterations {
        let previous = field.clone();
        for v in 0..n {
            if matched[v] {
                continue;
            }
            let neighbors = adjacency.neighbors(v);
            if neighbors.is_empty() {
                continue;
            }

            let p = target.positions()[v];
            let mut total = Vector3::zeros();
            let mut weight_sum = 0.0;
            for &u in neighbors {
                let edge_length = (target.positions()[u as usize] - p).norm();
                let w = 1.0 / (1.0 + edge_length);
                total += w * previous.get(u as usize);
                weight_sum += w;
            }
            if weight_sum > 0.0 {
                field.set(v, total / weight_sum);
            }
        }
    }

    debug!(iterations, "Smoothed unmatched displacements");
}
