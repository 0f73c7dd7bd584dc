//! Discrete Laplacian operators.
//!
//! All three variants share the same sign convention: off-diagonal
//! entries are non-negative edge weights, and each diagonal entry is the
//! negated row sum, so `L * 1 = 0` and the operator is negative
//! semi-definite. The constrained solve in [`crate::inpaint`] relies on
//! this to hand a positive semi-definite system to the solver.

use hashbrown::HashMap;
use nalgebra::Point3;
use sprs::{CsMat, TriMat};
use tracing::{debug, warn};

use crate::adjacency::VertexAdjacency;
use crate::error::{TransferError, TransferResult};

/// Neighborhood size for the point-cloud operator.
pub const POINTCLOUD_NEIGHBORS: usize = 8;

/// Triangles with a cross-product norm below this are treated as
/// degenerate and skipped.
const DEGENERATE_AREA_EPS: f64 = 1e-12;

/// Assemble a Laplacian from accumulated non-negative edge weights.
///
/// Edges are sorted before accumulation: hash-map iteration order is
/// randomized per instance, and the floating-point row sums must not
/// depend on it.
fn assemble(n: usize, weights: &HashMap<[u32; 2], f64>) -> CsMat<f64> {
    let mut edges: Vec<([u32; 2], f64)> = weights
        .iter()
        .filter(|(_, &w)| w > 0.0)
        .map(|(&key, &w)| (key, w))
        .collect();
    edges.sort_unstable_by_key(|&(key, _)| key);

    let mut triplets = TriMat::new((n, n));
    let mut row_sums = vec![0.0f64; n];

    for &([a, b], w) in &edges {
        triplets.add_triplet(a as usize, b as usize, w);
        triplets.add_triplet(b as usize, a as usize, w);
        row_sums[a as usize] += w;
        row_sums[b as usize] += w;
    }
    for (i, &sum) in row_sums.iter().enumerate() {
        triplets.add_triplet(i, i, -sum);
    }

    triplets.to_csr()
}

/// Cotangent-weighted Laplacian of a triangle mesh.
///
/// Each triangle corner contributes half its cotangent to the opposite
/// edge. Degenerate triangles are skipped; if more than half of the
/// triangles are degenerate the operator is meaningless and an error is
/// returned so the caller can fall back to uniform weights. Negative
/// accumulated edge weights (obtuse one-rings) are clamped to zero to
/// keep the operator semi-definite.
pub fn cotangent_laplacian(
    positions: &[Point3<f64>],
    faces: &[[u32; 3]],
) -> TransferResult<CsMat<f64>> {
    let n = positions.len();
    let mut weights: HashMap<[u32; 2], f64> = HashMap::with_capacity(faces.len() * 3);
    let mut degenerate = 0usize;

    for face in faces {
        let p0 = positions[face[0] as usize];
        let p1 = positions[face[1] as usize];
        let p2 = positions[face[2] as usize];
        let cross = (p1 - p0).cross(&(p2 - p0));
        if cross.norm() < DEGENERATE_AREA_EPS {
            degenerate += 1;
            continue;
        }

        // Corner at `apex` weights the edge (a, b) opposite to it.
        for (apex, a, b) in [
            (p0, face[1], face[2]),
            (p1, face[2], face[0]),
            (p2, face[0], face[1]),
        ] {
            let pa = positions[a as usize];
            let pb = positions[b as usize];
            let u = pa - apex;
            let v = pb - apex;
            let cross_norm = u.cross(&v).norm();
            if cross_norm < DEGENERATE_AREA_EPS {
                continue;
            }
            let cot = u.dot(&v) / cross_norm;
            let key = if a < b { [a, b] } else { [b, a] };
            *weights.entry(key).or_insert(0.0) += 0.5 * cot;
        }
    }

    if degenerate * 2 > faces.len() {
        return Err(TransferError::DegenerateGeometry {
            degenerate_triangles: degenerate,
            total_triangles: faces.len(),
        });
    }
    if degenerate > 0 {
        debug!(
            degenerate,
            total = faces.len(),
            "Skipped degenerate triangles in cotangent operator"
        );
    }

    // Clamp edges whose accumulated cotangents went negative.
    let mut clamped = 0usize;
    for w in weights.values_mut() {
        if *w < 0.0 {
            *w = 0.0;
            clamped += 1;
        }
    }
    if clamped > 0 {
        warn!(clamped, "Clamped negative cotangent edge weights to zero");
    }

    Ok(assemble(n, &weights))
}

/// Uniform (combinatorial) Laplacian: every edge weighs 1.
pub fn uniform_laplacian(adjacency: &VertexAdjacency) -> CsMat<f64> {
    let n = adjacency.vertex_count();
    let mut weights: HashMap<[u32; 2], f64> = HashMap::with_capacity(adjacency.edges().len());
    for &edge in adjacency.edges() {
        weights.insert(edge, 1.0);
    }
    assemble(n, &weights)
}

/// k-NN point-cloud Laplacian, independent of the triangulation.
///
/// Each vertex is linked to its `k` nearest neighbors with weight
/// `1 / (eps + distance)`; the resulting graph is symmetrized by taking
/// the larger weight of each directed pair. Deliberately couples
/// disconnected islands through spatial proximity.
pub fn pointcloud_laplacian(
    positions: &[Point3<f64>],
    k: usize,
) -> TransferResult<CsMat<f64>> {
    let n = positions.len();
    if n <= k {
        return Err(TransferError::InsufficientPoints {
            points: n,
            needed: k + 1,
        });
    }

    let mut kdtree: kiddo::KdTree<f64, 3> = kiddo::KdTree::new();
    for (i, p) in positions.iter().enumerate() {
        kdtree.add(&[p.x, p.y, p.z], i as u64);
    }

    let mut weights: HashMap<[u32; 2], f64> = HashMap::with_capacity(n * k);
    for (i, p) in positions.iter().enumerate() {
        // k + 1 because the query point is its own nearest neighbor.
        let neighbors = kdtree.nearest_n::<kiddo::SquaredEuclidean>(&[p.x, p.y, p.z], k + 1);
        for neighbor in neighbors {
            let j = neighbor.item as usize;
            if j == i {
                continue;
            }
            let distance = neighbor.distance.sqrt();
            let w = 1.0 / (1e-8 + distance);
            let key = if i < j {
                [i as u32, j as u32]
            } else {
                [j as u32, i as u32]
            };
            // Symmetrize: keep the larger of the two directed weights.
            let entry = weights.entry(key).or_insert(0.0);
            if w > *entry {
                *entry = w;
            }
        }
    }

    debug!(
        points = n,
        k,
        edges = weights.len(),
        "Built point-cloud Laplacian graph"
    );

    Ok(assemble(n, &weights))
}
